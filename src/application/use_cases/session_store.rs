use crate::domain::conversation::ChatSession;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

pub type SessionHandle = Arc<AsyncMutex<ChatSession>>;

/// Process-wide chat sessions, created on first use.
///
/// The map lock is only held to look up a handle; each session has its own lock, so unrelated
/// sessions never wait on each other.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, session_id: &str) -> SessionHandle {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(ChatSession::new(session_id))))
            .clone()
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        let sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.get(session_id).cloned()
    }

    /// Drops the session entry and hands back its handle for callers still holding it.
    pub fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.remove(session_id)
    }
}
