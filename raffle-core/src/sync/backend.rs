use crate::error::{RaffleError, Result};
use crate::types::SharedSessionState;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Document store holding the authoritative shared session.
///
/// Documents cross this boundary untyped; the sync layer validates them
/// before they reach the ledger.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Current remote document, `None` when nothing has been stored yet.
    async fn fetch(&self) -> Result<Option<Value>>;

    /// Replace the remote document as a whole.
    async fn store(&self, state: &SharedSessionState) -> Result<()>;

    /// Stream of remote documents. The channel closing means the
    /// subscription was lost.
    async fn watch(&self) -> Result<mpsc::Receiver<Value>>;
}

const WATCH_BUFFER: usize = 32;

/// In-process document store shared by every client holding the same `Arc`.
pub struct MemoryBackend {
    document: RwLock<Option<Value>>,
    changes: Mutex<broadcast::Sender<Value>>,
    offline: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(WATCH_BUFFER);
        Arc::new(Self {
            document: RwLock::new(None),
            changes: Mutex::new(changes),
            offline: AtomicBool::new(false),
        })
    }

    pub fn with_document(document: Value) -> Arc<Self> {
        let backend = Self::new();
        *backend.document.write() = Some(document);
        backend
    }

    pub fn document(&self) -> Option<Value> {
        self.document.read().clone()
    }

    /// Write from outside any sync client, e.g. another operator's tool.
    pub fn replace(&self, document: Value) {
        *self.document.write() = Some(document.clone());
        let _ = self.changes.lock().send(document);
    }

    /// Make every call fail as if the network were down.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Drop all live subscriptions.
    pub fn disconnect_watchers(&self) {
        let (changes, _) = broadcast::channel(WATCH_BUFFER);
        *self.changes.lock() = changes;
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RaffleError::network("memory backend is offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn fetch(&self) -> Result<Option<Value>> {
        self.ensure_online()?;
        Ok(self.document())
    }

    async fn store(&self, state: &SharedSessionState) -> Result<()> {
        self.ensure_online()?;
        self.replace(serde_json::to_value(state)?);
        Ok(())
    }

    async fn watch(&self) -> Result<mpsc::Receiver<Value>> {
        self.ensure_online()?;

        let mut changes = self.changes.lock().subscribe();
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);

        tokio::spawn(async move {
            loop {
                let document = tokio::select! {
                    _ = tx.closed() => break,
                    received = changes.recv() => received,
                };

                match document {
                    Ok(document) => {
                        if tx.send(document).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Memory backend watcher skipped {} documents", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(rx)
    }
}
