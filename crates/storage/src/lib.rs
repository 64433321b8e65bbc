use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use lyra_core::SessionContext;
use parking_lot::RwLock;

pub trait SessionRepository: Send + Sync {
    async fn load_session(&self, session_id: &str) -> Result<Option<SessionContext>>;
    async fn upsert_session(&self, session: &SessionContext) -> Result<()>;
    async fn delete_session(&self, session_id: &str) -> Result<bool>;

    /// Runs `apply` against the stored session with no other writer in
    /// between. Returns `None` when the id is unknown.
    async fn update_session<F, T>(&self, session_id: &str, apply: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut SessionContext) -> T + Send,
        T: Send;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Sessions live for the lifetime of the process only.
#[derive(Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<String, SessionContext>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionRepository for MemoryStore {
    async fn load_session(&self, session_id: &str) -> Result<Option<SessionContext>> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn upsert_session(&self, session: &SessionContext) -> Result<()> {
        self.sessions
            .write()
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.write().remove(session_id).is_some())
    }

    async fn update_session<F, T>(&self, session_id: &str, apply: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut SessionContext) -> T + Send,
        T: Send,
    {
        Ok(self.sessions.write().get_mut(session_id).map(apply))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut removed = 0_u64;
        self.sessions.write().retain(|_, value| {
            let keep = !value.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        Ok(removed)
    }
}
