use std::sync::Arc;

use service::auth::hasher::CredentialHasher;
use service::auth::repository::UserRepository;
use service::auth::token::TokenIssuer;
use service::auth::{AuthService, InputRules};
use service::loader::{LoaderConfig, LoaderFactory};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub loaders: LoaderFactory,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenIssuer>,
        rules: InputRules,
        loader: LoaderConfig,
    ) -> Self {
        let auth = AuthService::new(Arc::clone(&repo), hasher, tokens).with_rules(rules);
        Self { auth, loaders: LoaderFactory::new(repo, loader) }
    }

    pub fn tokens(&self) -> &Arc<dyn TokenIssuer> {
        self.auth.tokens()
    }
}
