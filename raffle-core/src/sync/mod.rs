//! Shared session synchronisation.
//!
//! Every client keeps a cached copy of the [`SharedSessionState`] document
//! and mirrors it into the local [`Storage`]. While [`SyncMode::Connected`],
//! remote changes replace the cache wholesale and local writes are pushed as
//! whole documents; the backend resolves races last-writer-wins. Any backend
//! failure moves the client to [`SyncMode::Degraded`] for the rest of its
//! lifetime. A new session is the recovery path.

pub mod backend;
pub mod http;

pub use backend::{MemoryBackend, RemoteBackend};
pub use http::HttpBackend;

use crate::clock::Clock;
use crate::config::RaffleConfig;
use crate::error::{RaffleError, Result};
use crate::storage::{SessionStore, Storage};
use crate::types::{SessionPatch, SharedSessionState};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Initial read or seed against the backend is running.
    Reconciling,
    /// Remote subscription live, writes are pushed.
    Connected,
    /// Local cache only.
    Degraded,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Reconciling => write!(f, "reconciling"),
            SyncMode::Connected => write!(f, "connected"),
            SyncMode::Degraded => write!(f, "degraded (local only)"),
        }
    }
}

/// Build the remote backend described by `config`, or `None` when the
/// configuration has no usable remote (absent or placeholder credentials).
pub fn backend_from_config(config: &RaffleConfig) -> Result<Option<Arc<dyn RemoteBackend>>> {
    match (&config.remote, config.usable_remote()) {
        (_, Some(remote)) => {
            let backend = HttpBackend::new(remote, config)?;
            tracing::debug!("Using sync endpoint {}", backend.endpoint());
            Ok(Some(Arc::new(backend)))
        }
        (Some(_), None) => {
            tracing::info!("Remote sync configured with placeholder credentials, staying local");
            Ok(None)
        }
        (None, None) => Ok(None),
    }
}

enum PushCommand {
    Push(SharedSessionState),
    Flush(oneshot::Sender<()>),
}

/// State reachable from the background tasks.
struct Shared {
    client_id: String,
    state: watch::Sender<SharedSessionState>,
    mode: watch::Sender<SyncMode>,
    storage: Arc<Storage>,
    cache_key: String,
    total_prizes: u32,
    /// Held from merge until the merged document is persisted, so the local
    /// cache and the push queue see changes in merge order.
    write_lock: tokio::sync::Mutex<()>,
}

impl Shared {
    fn mode(&self) -> SyncMode {
        *self.mode.borrow()
    }

    fn set_mode(&self, mode: SyncMode) {
        self.mode.send_if_modified(|current| {
            if *current == mode {
                false
            } else {
                *current = mode;
                true
            }
        });
    }

    fn degrade(&self, reason: &str) {
        if self.mode() != SyncMode::Degraded {
            tracing::warn!(
                "Client {} switching to local-only mode: {}",
                self.client_id,
                reason
            );
        }
        self.set_mode(SyncMode::Degraded);
    }

    async fn persist(&self, state: &SharedSessionState) -> Result<()> {
        SessionStore::new(&self.storage, &self.cache_key)
            .save(state)
            .await
    }

    /// Replace the cached document with a remote one and mirror it locally.
    /// Returns `false` without touching the cache once degraded.
    async fn apply_remote(&self, remote: SharedSessionState) -> bool {
        let _guard = self.write_lock.lock().await;
        if self.mode() == SyncMode::Degraded {
            return false;
        }

        self.state.send_replace(remote.clone());

        if let Err(e) = self.persist(&remote).await {
            tracing::error!("Failed to mirror remote document into local cache: {}", e);
        }
        true
    }
}

pub struct SyncManager {
    shared: Arc<Shared>,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
    pushes: Option<mpsc::UnboundedSender<PushCommand>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncManager {
    /// Load the local cache, then try the backend once. Backend trouble
    /// never fails this call; it leaves the manager degraded instead.
    pub async fn connect(
        config: &RaffleConfig,
        storage: Arc<Storage>,
        backend: Option<Arc<dyn RemoteBackend>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let local = SessionStore::new(&storage, &config.cache_key)
            .load(config.total_prizes, clock.now())
            .await?;

        let initial = local
            .clone()
            .unwrap_or_else(|| SharedSessionState::initial(config.total_prizes, clock.now()));

        let (state, _) = watch::channel(initial);
        let (mode, _) = watch::channel(SyncMode::Reconciling);

        let shared = Arc::new(Shared {
            client_id: Self::get_or_create_client_id(),
            state,
            mode,
            storage,
            cache_key: config.cache_key.clone(),
            total_prizes: config.total_prizes,
            write_lock: tokio::sync::Mutex::new(()),
        });

        let mut manager = Self {
            shared,
            clock,
            request_timeout: config.request_timeout(),
            pushes: None,
            tasks: Mutex::new(Vec::new()),
        };

        let Some(backend) = backend else {
            manager.shared.degrade("no usable remote backend");
            return Ok(manager);
        };

        if let Err(e) = manager.bootstrap(backend.as_ref(), local).await {
            manager.shared.degrade(&format!("initial sync failed: {}", e));
            return Ok(manager);
        }

        let events = match manager
            .with_timeout("remote subscription", backend.watch())
            .await
        {
            Ok(events) => events,
            Err(e) => {
                manager
                    .shared
                    .degrade(&format!("could not subscribe to remote changes: {}", e));
                return Ok(manager);
            }
        };

        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let listener = tokio::spawn(run_listener(
            manager.shared.clone(),
            manager.clock.clone(),
            events,
        ));
        let pusher = tokio::spawn(run_pusher(
            manager.shared.clone(),
            backend,
            manager.request_timeout,
            push_rx,
        ));

        manager.tasks.lock().extend([listener, pusher]);
        manager.pushes = Some(push_tx);
        manager.shared.set_mode(SyncMode::Connected);

        tracing::info!("Client {} connected to shared session", manager.client_id());
        Ok(manager)
    }

    /// Client identity used in logs
    fn get_or_create_client_id() -> String {
        if let Ok(id) = std::env::var("RAFFLE_CLIENT_ID") {
            id
        } else {
            Uuid::new_v4().to_string()
        }
    }

    async fn bootstrap(
        &self,
        backend: &dyn RemoteBackend,
        local: Option<SharedSessionState>,
    ) -> Result<()> {
        match self.with_timeout("initial read", backend.fetch()).await? {
            Some(document) => {
                let remote = SharedSessionState::from_value(
                    document,
                    self.shared.total_prizes,
                    self.clock.now(),
                )?;

                tracing::info!(
                    "Loaded shared session: {} participants, {} winners",
                    remote.participant_pool.len(),
                    remote.prize_ledger.winners().len()
                );
                self.shared.apply_remote(remote).await;
            }
            None => {
                let had_local = local.is_some();
                let seed = local.unwrap_or_else(|| self.read());

                self.with_timeout("seeding remote", backend.store(&seed))
                    .await?;
                self.shared.persist(&seed).await?;

                tracing::info!(
                    "Remote held no session, seeded it from {}",
                    if had_local { "local cache" } else { "empty state" }
                );
            }
        }

        Ok(())
    }

    async fn with_timeout<T>(&self, what: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| {
                RaffleError::timeout(format!("{} after {:?}", what, self.request_timeout))
            })?
    }

    pub fn client_id(&self) -> &str {
        &self.shared.client_id
    }

    pub fn total_prizes(&self) -> u32 {
        self.shared.total_prizes
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn mode(&self) -> SyncMode {
        self.shared.mode()
    }

    pub fn is_degraded(&self) -> bool {
        self.mode() == SyncMode::Degraded
    }

    pub fn watch_mode(&self) -> watch::Receiver<SyncMode> {
        self.shared.mode.subscribe()
    }

    /// Snapshot of the cached document.
    pub fn read(&self) -> SharedSessionState {
        self.shared.state.borrow().clone()
    }

    /// Every converged state, local or remote. Drop the receiver to
    /// unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<SharedSessionState> {
        self.shared.state.subscribe()
    }

    /// Merge `patch` into the cached document, persist it locally and queue
    /// it for the backend. Returns the merged document without waiting for
    /// the network.
    pub async fn write(&self, patch: SessionPatch) -> Result<SharedSessionState> {
        let _guard = self.shared.write_lock.lock().await;
        let now = self.clock.now();
        let mut merged = None;

        self.shared.state.send_modify(|state| {
            patch.apply_to(state, now);
            merged = Some(state.clone());
        });

        let merged = merged.ok_or_else(|| RaffleError::internal("session update was not applied"))?;

        if let Some(pushes) = &self.pushes {
            if !self.is_degraded() && pushes.send(PushCommand::Push(merged.clone())).is_err() {
                self.shared.degrade("push worker stopped");
            }
        }

        self.shared.persist(&merged).await?;

        Ok(merged)
    }

    /// Wait until every write issued so far has been pushed or dropped.
    pub async fn flush(&self) {
        let Some(pushes) = &self.pushes else {
            return;
        };

        let (done_tx, done_rx) = oneshot::channel();
        if pushes.send(PushCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Apply a document received out of band (e.g. a snapshot file) after
    /// validating it like a remote one.
    pub async fn restore(&self, document: Value) -> Result<SharedSessionState> {
        let state =
            SharedSessionState::from_value(document, self.shared.total_prizes, self.clock.now())?;
        self.write(SessionPatch::replace(state)).await
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

async fn run_listener(
    shared: Arc<Shared>,
    clock: Arc<dyn Clock>,
    mut events: mpsc::Receiver<Value>,
) {
    while let Some(document) = events.recv().await {
        if shared.mode() == SyncMode::Degraded {
            break;
        }

        match SharedSessionState::from_value(document, shared.total_prizes, clock.now()) {
            Ok(remote) => {
                tracing::debug!(
                    "Applying remote session ({} winners, {} remaining)",
                    remote.prize_ledger.winners().len(),
                    remote.prize_ledger.remaining()
                );
                if !shared.apply_remote(remote).await {
                    break;
                }
            }
            Err(e) => tracing::warn!("Dropping invalid remote document: {}", e),
        }
    }

    shared.degrade("remote subscription closed");
}

/// Pushes queued documents in order. Documents queued back to back are
/// collapsed into the newest one; a flush request ends a batch.
async fn run_pusher(
    shared: Arc<Shared>,
    backend: Arc<dyn RemoteBackend>,
    request_timeout: Duration,
    mut commands: mpsc::UnboundedReceiver<PushCommand>,
) {
    while let Some(first) = commands.recv().await {
        let mut latest = None;
        let mut waiters = Vec::new();
        let mut next = Some(first);

        while let Some(command) = next.take() {
            match command {
                PushCommand::Push(document) => latest = Some(document),
                PushCommand::Flush(done) => waiters.push(done),
            }
            if waiters.is_empty() {
                next = commands.try_recv().ok();
            }
        }

        if let Some(document) = latest {
            if shared.mode() == SyncMode::Degraded {
                tracing::debug!("Skipping push while degraded");
            } else {
                match tokio::time::timeout(request_timeout, backend.store(&document)).await {
                    Ok(Ok(())) => tracing::debug!(
                        "Pushed session document stamped {}",
                        document.last_updated.timestamp_millis()
                    ),
                    Ok(Err(e)) => shared.degrade(&format!("push failed: {}", e)),
                    Err(_) => shared.degrade("push timed out"),
                }
            }
        }

        for done in waiters {
            let _ = done.send(());
        }
    }
}
