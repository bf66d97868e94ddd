//! Session store module
//!
//! The one piece of cross-request shared state: server-side session data
//! keyed by token. Each entry carries its own lock so concurrent requests
//! for the same token serialize their read-modify-write, while requests
//! for different tokens proceed independently.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Key-value session state, cloned into the request context while the
/// per-token lock is held and committed back afterwards.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    values: HashMap<String, String>,
}

impl SessionData {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Session attached to a request context by the session wrapper.
///
/// Holds a working copy of the stored data; mutations become visible to
/// other requests only once the wrapper commits them back to the store.
pub struct SessionHandle {
    pub token: String,
    pub is_new: bool,
    pub data: SessionData,
}

/// Process-wide session store.
///
/// The outer map lock is held only to fetch or insert an entry, never
/// across a handler invocation; serialization per token happens on the
/// entry's own mutex.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionData>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the entry for `token`, creating an empty one if absent.
    pub async fn entry(&self, token: &str) -> Arc<Mutex<SessionData>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(entry) = sessions.get(token) {
                return Arc::clone(entry);
            }
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(token.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SessionData::default()))),
        )
    }

    /// Whether a session exists for `token` (no entry is created).
    pub async fn contains(&self, token: &str) -> bool {
        self.sessions.read().await.contains_key(token)
    }

    /// Generate a fresh session token.
    pub fn generate_token() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entry_is_stable_per_token() {
        let store = SessionStore::new();
        let a = store.entry("tok-a").await;
        let b = store.entry("tok-a").await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_entries_are_independent_across_tokens() {
        let store = SessionStore::new();
        let a = store.entry("tok-a").await;
        let b = store.entry("tok-b").await;
        assert!(!Arc::ptr_eq(&a, &b));

        a.lock().await.set("user", "alice");
        assert!(b.lock().await.get("user").is_none());
    }

    #[tokio::test]
    async fn test_contains_does_not_create() {
        let store = SessionStore::new();
        assert!(!store.contains("ghost").await);
        store.entry("real").await;
        assert!(store.contains("real").await);
        assert!(!store.contains("ghost").await);
    }

    #[test]
    fn test_tokens_are_unique() {
        let t1 = SessionStore::generate_token();
        let t2 = SessionStore::generate_token();
        assert_ne!(t1, t2);
        assert_eq!(t1.len(), 32);
    }
}
