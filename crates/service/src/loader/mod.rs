//! Request-scoped batching of user lookups.
//!
//! A [`UserLoader`] collects every `load(id)` issued within one batch window,
//! fetches the distinct ids with a single `get_by_ids` call and fans the
//! outcome back out. Found users are memoized for the life of the loader,
//! which is one inbound request (see [`scope`]).

pub mod scope;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{AuthError, User};
use crate::auth::repository::UserRepository;
use crate::metrics::{LOADER_BATCHES_TOTAL, LOADER_BATCH_FAILURES_TOTAL, LOADER_BATCH_SIZE};

pub use scope::{LoaderFactory, RequestLoaders};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("user {0} not found")]
    NotFound(Uuid),
    #[error("server error: {0}")]
    Server(String),
}

impl From<LoadError> for AuthError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::NotFound(_) => AuthError::NotFound,
            LoadError::Server(msg) => AuthError::Server(msg),
        }
    }
}

type Outcome = Result<User, LoadError>;

#[derive(Debug, Clone, Copy)]
pub struct LoaderConfig {
    /// How long a batch collects keys before dispatching. Zero yields once.
    pub wait: Duration,
    /// A batch reaching this many distinct keys dispatches immediately.
    pub max_batch: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { wait: Duration::from_millis(1), max_batch: 100 }
    }
}

impl From<&configs::LoaderSettings> for LoaderConfig {
    fn from(s: &configs::LoaderSettings) -> Self {
        Self { wait: Duration::from_millis(s.wait_ms), max_batch: s.max_batch.max(1) }
    }
}

struct Batch {
    id: u64,
    keys: Vec<Uuid>,
}

#[derive(Default)]
struct State {
    cache: HashMap<Uuid, User>,
    /// Waiters for every id that is collecting or in flight.
    waiters: HashMap<Uuid, Vec<oneshot::Sender<Outcome>>>,
    collecting: Option<Batch>,
    next_batch: u64,
    closed: bool,
}

struct Inner {
    repo: Arc<dyn UserRepository>,
    config: LoaderConfig,
    state: Mutex<State>,
    dispatched: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Coalescing, caching user loader. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct UserLoader {
    inner: Arc<Inner>,
}

impl UserLoader {
    pub fn new(repo: Arc<dyn UserRepository>, config: LoaderConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                repo,
                config,
                state: Mutex::new(State::default()),
                dispatched: AtomicU64::new(0),
            }),
        }
    }

    /// Resolve one user, joining the current batch window.
    ///
    /// Must be polled inside a tokio runtime.
    pub async fn load(&self, id: Uuid) -> Result<User, LoadError> {
        let rx = {
            let mut state = self.inner.lock();
            if state.closed {
                return Err(closed());
            }
            if let Some(user) = state.cache.get(&id) {
                return Ok(user.clone());
            }
            let (tx, rx) = oneshot::channel();
            if let Some(waiting) = state.waiters.get_mut(&id) {
                waiting.push(tx);
            } else {
                state.waiters.insert(id, vec![tx]);
                self.enqueue(&mut state, id);
            }
            rx
        };
        rx.await
            .unwrap_or_else(|_| Err(LoadError::Server("batch dropped before completion".into())))
    }

    /// Resolve several users; outcomes line up with `ids`.
    pub async fn load_many(&self, ids: &[Uuid]) -> Vec<Result<User, LoadError>> {
        join_all(ids.iter().map(|id| self.load(*id))).await
    }

    /// Seed the cache without a store call. Returns `false` if the id was already cached.
    pub fn prime(&self, user: User) -> bool {
        let mut state = self.inner.lock();
        if state.closed || state.cache.contains_key(&user.id) {
            return false;
        }
        state.cache.insert(user.id, user);
        true
    }

    /// Drop a cached entry so the next load refetches it.
    pub fn clear(&self, id: Uuid) {
        self.inner.lock().cache.remove(&id);
    }

    /// Number of bulk fetches this loader has issued.
    pub fn batches_dispatched(&self) -> u64 {
        self.inner.dispatched.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// End of request: reject further loads, fail keys still collecting and
    /// drop the cache. Fetches already in flight finish for their waiters.
    pub fn close(&self) {
        let mut state = self.inner.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.cache.clear();
        if let Some(batch) = state.collecting.take() {
            for id in batch.keys {
                for tx in state.waiters.remove(&id).unwrap_or_default() {
                    let _ = tx.send(Err(closed()));
                }
            }
        }
    }

    fn enqueue(&self, state: &mut State, id: Uuid) {
        if state.collecting.is_none() {
            let batch_id = state.next_batch;
            state.next_batch += 1;
            state.collecting = Some(Batch { id: batch_id, keys: Vec::new() });
            self.schedule(batch_id);
        }
        let full = match state.collecting.as_mut() {
            Some(batch) => {
                batch.keys.push(id);
                batch.keys.len() >= self.inner.config.max_batch
            }
            None => false,
        };
        if full {
            if let Some(batch) = state.collecting.take() {
                tokio::spawn(dispatch(Arc::clone(&self.inner), batch));
            }
        }
    }

    /// Close the window for `batch_id` after the configured wait, unless it
    /// already filled up and left.
    fn schedule(&self, batch_id: u64) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if inner.config.wait.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(inner.config.wait).await;
            }
            let batch = {
                let mut state = inner.lock();
                let current = matches!(&state.collecting, Some(b) if b.id == batch_id);
                if current {
                    state.collecting.take()
                } else {
                    None
                }
            };
            if let Some(batch) = batch {
                dispatch(inner, batch).await;
            }
        });
    }
}

/// Owned by the dispatch task while its fetch is in flight. If the task
/// unwinds or is cancelled before fulfilling, dropping this releases the
/// batch's senders so every waiter sees a terminal error.
struct InFlight {
    inner: Arc<Inner>,
    batch: Batch,
    armed: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(batch_id = self.batch.id, keys = self.batch.keys.len(), "user batch abandoned before completion");
        let mut state = self.inner.lock();
        for id in &self.batch.keys {
            state.waiters.remove(id);
        }
    }
}

async fn dispatch(inner: Arc<Inner>, batch: Batch) {
    inner.dispatched.fetch_add(1, Ordering::Relaxed);
    LOADER_BATCHES_TOTAL.inc();
    LOADER_BATCH_SIZE.observe(batch.keys.len() as f64);
    debug!(batch_id = batch.id, keys = batch.keys.len(), "dispatching user batch");

    let mut flight = InFlight { inner: Arc::clone(&inner), batch, armed: true };
    let result = inner.repo.get_by_ids(&flight.batch.keys).await;

    let mut state = inner.lock();
    flight.armed = false;
    let batch = &flight.batch;
    match result {
        Ok(users) => {
            let mut found: HashMap<Uuid, User> = users.into_iter().map(|u| (u.id, u)).collect();
            for id in &batch.keys {
                let outcome = found.get(id).cloned().ok_or(LoadError::NotFound(*id));
                for tx in state.waiters.remove(id).unwrap_or_default() {
                    let _ = tx.send(outcome.clone());
                }
            }
            if !state.closed {
                for (id, user) in found.drain() {
                    state.cache.entry(id).or_insert(user);
                }
            }
        }
        Err(e) => {
            LOADER_BATCH_FAILURES_TOTAL.inc();
            warn!(batch_id = batch.id, keys = batch.keys.len(), error = %e, "user batch failed");
            let err = LoadError::Server(e.to_string());
            for id in &batch.keys {
                for tx in state.waiters.remove(id).unwrap_or_default() {
                    let _ = tx.send(Err(err.clone()));
                }
            }
        }
    }
}

fn closed() -> LoadError {
    LoadError::Server("loader closed".into())
}
