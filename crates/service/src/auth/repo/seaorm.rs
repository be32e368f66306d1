use sea_orm::DatabaseConnection;
use uuid::Uuid;

use models::errors::ModelError;
use models::user::{EMAIL_UNIQUE, USERNAME_UNIQUE};
use crate::auth::domain::{NewUser, User};
use crate::auth::repository::{Lookup, StoreError, UniqueField, UserRepository};

/// [`UserRepository`] backed by the `users` table.
#[derive(Clone)]
pub struct SeaOrmUserRepository {
    pub db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_domain(m: models::user::Model) -> User {
    User {
        id: m.id,
        username: m.username,
        email: m.email,
        password_hash: m.password,
        created_at: m.created_at.into(),
    }
}

fn store_err(e: ModelError) -> StoreError {
    match e {
        ModelError::UniqueViolation(msg) if msg.contains(EMAIL_UNIQUE) => StoreError::Conflict(UniqueField::Email),
        ModelError::UniqueViolation(msg) if msg.contains(USERNAME_UNIQUE) => StoreError::Conflict(UniqueField::Username),
        other => StoreError::Backend(other.to_string()),
    }
}

fn lookup(r: Result<Option<models::user::Model>, ModelError>) -> Lookup<User> {
    r.map(|o| o.map(to_domain)).map_err(store_err).into()
}

#[async_trait::async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn get_by_username(&self, username: &str) -> Lookup<User> {
        lookup(models::user::find_by_username(&self.db, username).await)
    }

    async fn get_by_email(&self, email: &str) -> Lookup<User> {
        lookup(models::user::find_by_email(&self.db, email).await)
    }

    async fn get_by_id(&self, id: Uuid) -> Lookup<User> {
        lookup(models::user::find_by_id(&self.db, id).await)
    }

    async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let rows = models::user::find_by_ids(&self.db, ids).await.map_err(store_err)?;
        Ok(rows.into_iter().map(to_domain).collect())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let created = models::user::create(&self.db, &user.username, &user.email, &user.password_hash)
            .await
            .map_err(store_err)?;
        Ok(to_domain(created))
    }
}
