//! Auth module: three-layer architecture (domain, repository, service).
//!
//! Registration and login business logic, plus the hashing and token
//! primitives it is wired with.

pub mod domain;
pub mod errors;
pub mod hasher;
pub mod repository;
pub mod service;
pub mod token;
#[cfg(feature = "seaorm")]
pub mod repo;

pub use domain::{AuthResult, InputRules, LoginInput, NewUser, RegisterInput, User};
pub use errors::AuthError;
pub use service::AuthService;
