use thiserror::Error;

use super::repository::{StoreError, UniqueField};

/// Business errors for auth workflows
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("username taken")]
    UsernameTaken,
    #[error("email taken")]
    EmailTaken,
    #[error("email/password combination is wrong")]
    BadCredentials,
    #[error("not found")]
    NotFound,
    #[error("could not generate access token: {0}")]
    GenAccessToken(String),
    #[error("server error: {0}")]
    Server(String),
}

impl AuthError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            AuthError::Validation(_) => 1001,
            AuthError::UsernameTaken => 1002,
            AuthError::EmailTaken => 1003,
            AuthError::BadCredentials => 1004,
            AuthError::NotFound => 1005,
            AuthError::GenAccessToken(_) => 1102,
            AuthError::Server(_) => 1200,
        }
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation",
            AuthError::UsernameTaken => "username_taken",
            AuthError::EmailTaken => "email_taken",
            AuthError::BadCredentials => "bad_credentials",
            AuthError::NotFound => "not_found",
            AuthError::GenAccessToken(_) => "gen_access_token",
            AuthError::Server(_) => "server",
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(UniqueField::Username) => AuthError::UsernameTaken,
            StoreError::Conflict(UniqueField::Email) => AuthError::EmailTaken,
            StoreError::Backend(msg) => AuthError::Server(msg),
        }
    }
}
