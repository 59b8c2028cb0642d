//! Per-visitor conversations keyed by unguessable session ids.
//!
//! Sessions expire after an idle TTL and the store holds at most
//! `capacity` of them, evicting the least recently used one when full.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use folio_core::config::SessionSettings;

use crate::engine::ConversationEngine;

pub type SessionId = Uuid;
pub type SessionHandle = Arc<tokio::sync::Mutex<ConversationEngine>>;
pub type EngineFactory = Arc<dyn Fn() -> ConversationEngine + Send + Sync>;

struct Entry {
    handle: SessionHandle,
    last_used: Instant,
}

pub struct SessionStore {
    factory: EngineFactory,
    ttl: Duration,
    capacity: usize,
    sessions: Mutex<HashMap<SessionId, Entry>>,
}

impl SessionStore {
    pub fn new(factory: EngineFactory, ttl: Duration, capacity: usize) -> Self {
        Self { factory, ttl, capacity: capacity.max(1), sessions: Mutex::new(HashMap::new()) }
    }

    pub fn from_settings(factory: EngineFactory, settings: &SessionSettings) -> Self {
        Self::new(factory, Duration::from_secs(settings.ttl_secs), settings.capacity)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn purge(&self, sessions: &mut HashMap<SessionId, Entry>, now: Instant) -> usize {
        let before = sessions.len();
        sessions.retain(|_, e| now.duration_since(e.last_used) < self.ttl);
        before - sessions.len()
    }

    pub fn create(&self) -> (SessionId, SessionHandle) {
        let now = Instant::now();
        let id = Uuid::new_v4();
        let handle: SessionHandle = Arc::new(tokio::sync::Mutex::new((self.factory)()));
        let mut sessions = self.lock();
        let expired = self.purge(&mut sessions, now);
        if expired > 0 {
            tracing::debug!(expired, "expired idle sessions");
        }
        while sessions.len() >= self.capacity {
            let Some(oldest) = sessions.iter().min_by_key(|(_, e)| e.last_used).map(|(id, _)| *id) else { break };
            sessions.remove(&oldest);
            tracing::debug!(session = %oldest, "evicted least recently used session");
        }
        sessions.insert(id, Entry { handle: Arc::clone(&handle), last_used: now });
        tracing::info!(session = %id, "session created");
        (id, handle)
    }

    /// Handle for `id`, refreshing its idle timer. Expired sessions are gone.
    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        let now = Instant::now();
        let mut sessions = self.lock();
        self.purge(&mut sessions, now);
        sessions.get_mut(id).map(|e| {
            e.last_used = now;
            Arc::clone(&e.handle)
        })
    }

    /// Existing session for `id`, or a new one when `id` is absent or unknown.
    pub fn get_or_create(&self, id: Option<SessionId>) -> (SessionId, SessionHandle) {
        if let Some(id) = id {
            if let Some(handle) = self.get(&id) {
                return (id, handle);
            }
        }
        self.create()
    }

    /// Clears the history of `id`; `false` when there is no such session.
    pub async fn reset(&self, id: &SessionId) -> bool {
        match self.get(id) {
            Some(handle) => {
                handle.lock().await.reset();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &SessionId) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        let mut sessions = self.lock();
        self.purge(&mut sessions, Instant::now());
        sessions.len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn ids(&self) -> Vec<SessionId> {
        let mut sessions = self.lock();
        self.purge(&mut sessions, Instant::now());
        sessions.keys().copied().collect()
    }
}
