use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::error::{ClientError, ClientResult};
use crate::store::SessionStore;
use crate::types::{Credential, Route, SessionState};

/// In-memory holder of the current session, injected into every component
/// that needs it.
///
/// Starts as `{ data: None, loading: true }`. The first [`initialize`] call
/// consults the store and settles `loading` to `false` for good. A
/// `set_session` or `clear_session` that comes first settles it instead, and
/// the store is then never consulted. Updates are
/// broadcast through a `watch` channel.
///
/// [`set_session`] is two-phase: memory is committed and broadcast first,
/// then the record is appended to the store. Observers may therefore see a
/// paired state that is not yet durable; if the append fails the in-memory
/// state is kept and the error is returned.
///
/// [`initialize`]: SessionContext::initialize
/// [`set_session`]: SessionContext::set_session
#[derive(Clone)]
pub struct SessionContext {
    store: SessionStore,
    state: Arc<watch::Sender<SessionState>>,
    /// Serializes mutations; holds whether the store has been consulted.
    initialized: Arc<Mutex<bool>>,
}

impl SessionContext {
    pub fn new(store: SessionStore) -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self { store, state: Arc::new(tx), initialized: Arc::new(Mutex::new(false)) }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Current credential, if paired.
    pub fn credential(&self) -> Option<Credential> {
        self.state.borrow().data.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Route decision. While loading the answer is always [`Route::Pending`],
    /// never "unauthenticated".
    pub fn route(&self) -> Route {
        let state = self.state.borrow();
        match (&state.data, state.loading) {
            (_, true) => Route::Pending,
            (Some(_), false) => Route::Home,
            (None, false) => Route::Pair,
        }
    }

    /// Reads the latest persisted credential, exactly once.
    ///
    /// A store failure is treated as "no session": the state still settles
    /// with `loading = false`, and the error is returned to this caller.
    /// Later calls return the settled snapshot without touching the store.
    pub async fn initialize(&self) -> ClientResult<SessionState> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return Ok(self.snapshot());
        }
        *initialized = true;

        let latest = self.store.latest().await;
        let data = match &latest {
            Ok(data) => data.clone(),
            Err(e) => {
                tracing::warn!("failed to read persisted session, starting unpaired: {}", e);
                None
            }
        };
        self.state.send_modify(|s| {
            s.data = data;
            s.loading = false;
        });
        tracing::info!(paired = self.state.borrow().data.is_some(), "session initialized");

        latest.map(|_| self.snapshot())
    }

    /// Makes `credential` the current session, then persists it.
    pub async fn set_session(&self, credential: Credential) -> ClientResult<()> {
        if !credential.is_valid() {
            return Err(ClientError::NoSession);
        }
        {
            // A pairing made before initialize supersedes whatever the store holds
            let mut initialized = self.initialized.lock().await;
            *initialized = true;
            let data = credential.clone();
            self.state.send_modify(|s| {
                s.data = Some(data);
                s.loading = false;
            });
        }
        tracing::info!(url = %credential.url, "session set");

        if let Err(e) = self.store.append(&credential).await {
            tracing::error!(url = %credential.url, "session set in memory but not persisted: {}", e);
            return Err(e);
        }
        Ok(())
    }

    /// Drops the current session in memory and in the store.
    pub async fn clear_session(&self) -> ClientResult<()> {
        {
            let mut initialized = self.initialized.lock().await;
            *initialized = true;
            self.state.send_modify(|s| {
                s.data = None;
                s.loading = false;
            });
        }
        tracing::info!("session cleared");

        self.store.clear().await.map(|_| ())
    }
}
