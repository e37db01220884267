use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::engine::{EngineEventSink, EngineNotice, PeerEngineFactory};
use crate::error::EngineError;
use crate::events::SessionObserver;
use crate::session::{Outbound, PeerSession};
use crate::utils::random_id;

/// Shared reference to one live session instance.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    instance: String,
    retired: Arc<AtomicBool>,
    session: Arc<Mutex<PeerSession>>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Random tag distinguishing this session from earlier ones with the same id.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub async fn lock(&self) -> MutexGuard<'_, PeerSession> {
        self.session.lock().await
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }
}

/// Identifier → session map. At most one live session per identifier.
///
/// `get_or_create` and `remove` are serialized through the map lock; a
/// session's own lock is never held while waiting for the map.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    factory: Arc<dyn PeerEngineFactory>,
    observer: Arc<dyn SessionObserver>,
    outbound: mpsc::UnboundedSender<Outbound>,
    notices: mpsc::UnboundedSender<EngineNotice>,
}

impl SessionRegistry {
    pub fn new(
        factory: Arc<dyn PeerEngineFactory>,
        observer: Arc<dyn SessionObserver>,
        outbound: mpsc::UnboundedSender<Outbound>,
        notices: mpsc::UnboundedSender<EngineNotice>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            factory,
            observer,
            outbound,
            notices,
        }
    }

    pub fn observer(&self) -> &Arc<dyn SessionObserver> {
        &self.observer
    }

    /// UI target for `id` appeared.
    pub async fn mount(&self, id: &str) -> Result<SessionHandle, EngineError> {
        self.get_or_create(id).await
    }

    /// UI target for `id` went away. Returns whether a session was removed.
    pub async fn unmount(&self, id: &str) -> bool {
        self.remove(id).await
    }

    /// Existing live session for `id`, or a fresh one. A retired session
    /// (closed or failed) is torn down and replaced.
    pub async fn get_or_create(&self, id: &str) -> Result<SessionHandle, EngineError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(handle) = sessions.get(id) {
            if !handle.is_retired() {
                return Ok(handle.clone());
            }
            debug!(session = %id, instance = %handle.instance, "replacing retired session");
            if let Some(stale) = sessions.remove(id) {
                self.dispose(stale).await;
            }
        }

        let instance = random_id();
        let retired = Arc::new(AtomicBool::new(false));
        let sink = EngineEventSink::new(id.to_string(), instance.clone(), self.notices.clone());
        let engine = self.factory.create(sink).await?;
        let session = PeerSession::new(
            id.to_string(),
            instance.clone(),
            engine,
            self.outbound.clone(),
            retired.clone(),
        );
        let handle = SessionHandle {
            id: id.to_string(),
            instance,
            retired,
            session: Arc::new(Mutex::new(session)),
        };
        sessions.insert(id.to_string(), handle.clone());
        info!(session = %id, instance = %handle.instance, "session created");
        Ok(handle)
    }

    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.lock().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> bool {
        let handle = self.sessions.lock().await.remove(id);
        match handle {
            Some(handle) => {
                self.dispose(handle).await;
                true
            }
            None => false,
        }
    }

    /// Remove `id` only while it still maps to `instance`, so a teardown
    /// requested by an old session cannot take out its replacement.
    pub async fn remove_instance(&self, id: &str, instance: &str) -> bool {
        let handle = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get(id) {
                Some(current) if current.instance == instance => sessions.remove(id),
                _ => None,
            }
        };
        match handle {
            Some(handle) => {
                self.dispose(handle).await;
                true
            }
            None => false,
        }
    }

    pub async fn close_all(&self) {
        let handles: Vec<_> = self.sessions.lock().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            self.dispose(handle).await;
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.sessions.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn dispose(&self, handle: SessionHandle) {
        // in-flight operations see this before we get the session lock
        handle.retire();
        handle.lock().await.close().await;
        self.observer.on_removed(&handle.id);
        info!(session = %handle.id, instance = %handle.instance, "session removed");
    }
}
