use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;
use uuid::Uuid;

use service::loader::RequestLoaders;

use crate::errors::ApiError;
use crate::state::AppState;

pub const AUTH_COOKIE: &str = "auth_token";

/// Identity of the caller, present when a valid access token came with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CurrentUser>().copied().ok_or(ApiError::Unauthenticated)
    }
}

struct CloseOnDrop(RequestLoaders);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Give the request its own loaders and tear them down once the response is built.
pub async fn install_loaders(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let loaders = state.loaders.for_request();
    req.extensions_mut().insert(loaders.clone());
    let _guard = CloseOnDrop(loaders);
    next.run(req).await
}

/// Attach [`CurrentUser`] from `Authorization: Bearer` or the auth cookie.
/// Never rejects: bad or missing tokens leave the request anonymous.
pub async fn attach_identity(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let token = bearer_token(&req).or_else(|| jar.get(AUTH_COOKIE).map(|c| c.value().to_string()));
    if let Some(token) = token {
        match state.tokens().parse_access_token(&token).and_then(|c| c.user_id()) {
            Ok(id) => {
                req.extensions_mut().insert(CurrentUser(id));
            }
            Err(e) => debug!(path = %req.uri().path(), error = %e, "ignoring invalid access token"),
        }
    }
    next.run(req).await
}

fn bearer_token(req: &Request) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}
