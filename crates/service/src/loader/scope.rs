use std::sync::Arc;

use tracing::debug;

use super::{LoaderConfig, UserLoader};
use crate::auth::repository::UserRepository;

/// Builds a fresh set of loaders for every inbound request.
///
/// Loaders never outlive the request that created them, so a cached user can
/// never leak from one caller to another.
#[derive(Clone)]
pub struct LoaderFactory {
    repo: Arc<dyn UserRepository>,
    config: LoaderConfig,
}

impl LoaderFactory {
    pub fn new(repo: Arc<dyn UserRepository>, config: LoaderConfig) -> Self {
        Self { repo, config }
    }

    pub fn for_request(&self) -> RequestLoaders {
        RequestLoaders { users: UserLoader::new(Arc::clone(&self.repo), self.config) }
    }
}

/// Loaders carried in a request's context.
#[derive(Clone)]
pub struct RequestLoaders {
    pub users: UserLoader,
}

impl RequestLoaders {
    /// Called once the response is produced.
    pub fn close(&self) {
        debug!(batches = self.users.batches_dispatched(), "closing request loaders");
        self.users.close();
    }
}
