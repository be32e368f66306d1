use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::domain::{NewUser, User};

/// Field guarded by a store-level uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Username => f.write_str("username"),
            UniqueField::Email => f.write_str("email"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(UniqueField),
    #[error("storage failure: {0}")]
    Backend(String),
}

/// Outcome of a single-row lookup. Absence is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Failed(StoreError),
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(o: Option<T>) -> Self {
        match o {
            Some(v) => Lookup::Found(v),
            None => Lookup::NotFound,
        }
    }
}

impl<T> From<Result<Option<T>, StoreError>> for Lookup<T> {
    fn from(r: Result<Option<T>, StoreError>) -> Self {
        match r {
            Ok(Some(v)) => Lookup::Found(v),
            Ok(None) => Lookup::NotFound,
            Err(e) => Lookup::Failed(e),
        }
    }
}

/// Storage abstraction for users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_username(&self, username: &str) -> Lookup<User>;
    async fn get_by_email(&self, email: &str) -> Lookup<User>;
    async fn get_by_id(&self, id: Uuid) -> Lookup<User>;
    /// Bulk fetch; ids with no row are absent from the result, not errors.
    async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;
    /// Persist a user. Uniqueness violations surface as [`StoreError::Conflict`].
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
}

/// In-memory repository for tests, benches and doc examples.
///
/// Records every call and supports fault injection.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use std::time::Duration;

    use chrono::Utc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum StoreCall {
        GetByUsername(String),
        GetByEmail(String),
        GetById(Uuid),
        GetByIds(Vec<Uuid>),
        Create(String),
    }

    impl StoreCall {
        pub fn name(&self) -> &'static str {
            match self {
                StoreCall::GetByUsername(_) => "get_by_username",
                StoreCall::GetByEmail(_) => "get_by_email",
                StoreCall::GetById(_) => "get_by_id",
                StoreCall::GetByIds(_) => "get_by_ids",
                StoreCall::Create(_) => "create",
            }
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct Faults {
        /// single-row lookups fail with a backend error
        pub lookups: bool,
        /// `get_by_ids` fails with a backend error
        pub bulk: bool,
        /// `create` fails with a backend error
        pub create: bool,
        /// `create` reports a uniqueness conflict regardless of contents
        pub create_conflict: Option<UniqueField>,
        /// `get_by_ids` sleeps before answering
        pub bulk_delay: Option<Duration>,
        /// single-row lookups panic instead of answering
        pub panic_lookups: bool,
    }

    #[derive(Default)]
    pub struct MemoryUserRepository {
        users: Mutex<HashMap<Uuid, User>>,
        calls: Mutex<Vec<StoreCall>>,
        faults: Mutex<Faults>,
    }

    fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
        m.lock().unwrap_or_else(PoisonError::into_inner)
    }

    impl MemoryUserRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Insert a user directly, bypassing call recording.
        pub fn seed(&self, username: &str, email: &str, password_hash: &str) -> User {
            let user = User {
                id: Uuid::new_v4(),
                username: username.to_string(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                created_at: Utc::now(),
            };
            lock(&self.users).insert(user.id, user.clone());
            user
        }

        pub fn set_faults(&self, faults: Faults) {
            *lock(&self.faults) = faults;
        }

        pub fn calls(&self) -> Vec<StoreCall> {
            lock(&self.calls).clone()
        }

        pub fn count(&self, name: &str) -> usize {
            lock(&self.calls).iter().filter(|c| c.name() == name).count()
        }

        /// Key sets passed to each `get_by_ids` call, in call order.
        pub fn bulk_calls(&self) -> Vec<Vec<Uuid>> {
            lock(&self.calls)
                .iter()
                .filter_map(|c| match c {
                    StoreCall::GetByIds(ids) => Some(ids.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn reset_calls(&self) {
            lock(&self.calls).clear();
        }

        pub fn len(&self) -> usize {
            lock(&self.users).len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        fn record(&self, call: StoreCall) -> Faults {
            lock(&self.calls).push(call);
            lock(&self.faults).clone()
        }

        fn find(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
            lock(&self.users).values().find(|u| pred(u)).cloned()
        }
    }

    fn injected() -> StoreError {
        StoreError::Backend("injected failure".into())
    }

    #[async_trait]
    impl UserRepository for MemoryUserRepository {
        async fn get_by_username(&self, username: &str) -> Lookup<User> {
            let faults = self.record(StoreCall::GetByUsername(username.to_string()));
            if faults.panic_lookups {
                panic!("injected panic in get_by_username");
            }
            if faults.lookups {
                return Lookup::Failed(injected());
            }
            self.find(|u| u.username == username).into()
        }

        async fn get_by_email(&self, email: &str) -> Lookup<User> {
            let faults = self.record(StoreCall::GetByEmail(email.to_string()));
            if faults.panic_lookups {
                panic!("injected panic in get_by_email");
            }
            if faults.lookups {
                return Lookup::Failed(injected());
            }
            self.find(|u| u.email == email).into()
        }

        async fn get_by_id(&self, id: Uuid) -> Lookup<User> {
            let faults = self.record(StoreCall::GetById(id));
            if faults.panic_lookups {
                panic!("injected panic in get_by_id");
            }
            if faults.lookups {
                return Lookup::Failed(injected());
            }
            self.find(|u| u.id == id).into()
        }

        async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
            let faults = self.record(StoreCall::GetByIds(ids.to_vec()));
            if let Some(delay) = faults.bulk_delay {
                tokio::time::sleep(delay).await;
            }
            if faults.bulk {
                return Err(injected());
            }
            let users = lock(&self.users);
            Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
        }

        async fn create(&self, user: NewUser) -> Result<User, StoreError> {
            let faults = self.record(StoreCall::Create(user.username.clone()));
            if faults.create {
                return Err(injected());
            }
            if let Some(field) = faults.create_conflict {
                return Err(StoreError::Conflict(field));
            }
            let mut users = lock(&self.users);
            if users.values().any(|u| u.username == user.username) {
                return Err(StoreError::Conflict(UniqueField::Username));
            }
            if users.values().any(|u| u.email == user.email) {
                return Err(StoreError::Conflict(UniqueField::Email));
            }
            let created = User {
                id: Uuid::new_v4(),
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                created_at: Utc::now(),
            };
            users.insert(created.id, created.clone());
            Ok(created)
        }
    }
}
