use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use service::auth::{AuthError, User};
use service::loader::{LoadError, RequestLoaders};

use crate::errors::ApiError;
use crate::middleware::CurrentUser;

const MAX_IDS: usize = 200;

#[derive(Debug, Deserialize)]
pub struct IdsQuery {
    pub ids: String,
}

/// One slot of a bulk lookup, in the order the ids were given.
#[derive(Debug, Serialize)]
pub struct UserEntry {
    pub id: Uuid,
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "users",
    responses(
        (status = 200, description = "The caller", body = crate::openapi::UserDoc),
        (status = 401, description = "No valid access token", body = crate::errors::ErrorBody)
    )
)]
pub async fn me(
    CurrentUser(id): CurrentUser,
    Extension(loaders): Extension<RequestLoaders>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(loaders.users.load(id).await?))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Found", body = crate::openapi::UserDoc),
        (status = 404, description = "No such user", body = crate::errors::ErrorBody)
    )
)]
pub async fn get_user(
    Path(id): Path<Uuid>,
    Extension(loaders): Extension<RequestLoaders>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(loaders.users.load(id).await?))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(("ids" = String, Query, description = "Comma-separated user ids")),
    responses(
        (status = 200, description = "One entry per id", body = [crate::openapi::UserEntryDoc]),
        (status = 400, description = "Malformed id list", body = crate::errors::ErrorBody)
    )
)]
pub async fn list_users(
    Query(q): Query<IdsQuery>,
    Extension(loaders): Extension<RequestLoaders>,
) -> Result<Json<Vec<UserEntry>>, ApiError> {
    let ids = parse_ids(&q.ids)?;
    let results = loaders.users.load_many(&ids).await;

    let mut entries = Vec::with_capacity(ids.len());
    for (id, res) in ids.into_iter().zip(results) {
        let entry = match res {
            Ok(user) => UserEntry { id, user: Some(user), error: None },
            Err(LoadError::NotFound(_)) => UserEntry { id, user: None, error: Some("not_found") },
            Err(e) => return Err(e.into()),
        };
        entries.push(entry);
    }
    Ok(Json(entries))
}

fn parse_ids(raw: &str) -> Result<Vec<Uuid>, AuthError> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Uuid::parse_str(s).map_err(|_| AuthError::Validation(format!("ids: '{s}' is not a valid id"))))
        .collect::<Result<Vec<_>, _>>()?;
    if ids.is_empty() {
        return Err(AuthError::Validation("ids: required".into()));
    }
    if ids.len() > MAX_IDS {
        return Err(AuthError::Validation(format!("ids: at most {MAX_IDS} per request")));
    }
    Ok(ids)
}
