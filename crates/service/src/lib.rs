//! Service layer for the chirper backend.
//! - `auth`: registration and login over an abstract user store.
//! - `loader`: request-scoped batching and caching of user lookups.
//! - `metrics`: Prometheus counters shared by both.

pub mod auth;
pub mod loader;
pub mod metrics;
