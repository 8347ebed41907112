use dashmap::DashMap;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Key under which the runner stores the raw user input of the current turn
pub const USER_INPUT_KEY: &str = "user_input";
/// Key under which the runner stores the id of the session being served
pub const SESSION_ID_KEY: &str = "session_id";
/// Key under which the runner stores the path of a file attached to the turn.
/// Only the runner writes it; it is never derived from user text.
pub const ATTACHMENT_KEY: &str = "attachment";

/// Scratch space shared by the agents participating in a single turn.
///
/// A fresh context is created for every turn, so values written by one turn
/// never leak into the next.
#[derive(Clone, Debug)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: impl serde::Serialize) {
        self.set_sync(key, value);
    }

    pub fn set_sync(&self, key: impl Into<String>, value: impl serde::Serialize) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.data.insert(key, value);
            }
            Err(e) => warn!(key = %key, error = %e, "Dropping context value that failed to serialize"),
        }
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_sync(key)
    }

    /// Synchronous read, usable from handoff conditions
    pub fn get_sync<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub async fn clear(&self) {
        self.data.clear();
    }

    /// Raw user input for this turn, empty if the runner did not set one.
    pub async fn user_input(&self) -> String {
        self.get(USER_INPUT_KEY).await.unwrap_or_default()
    }

    pub async fn session_id(&self) -> Option<String> {
        self.get(SESSION_ID_KEY).await
    }

    /// File attached to this turn by the caller, if any
    pub async fn attachment(&self) -> Option<PathBuf> {
        self.get(ATTACHMENT_KEY).await
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
