use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Session-scoped mapping from a workflow id to the most recent execution id,
/// namespaced per feature so the workflow and web-creator panels never see
/// each other's executions.
#[derive(Debug, Clone)]
pub struct TaskIdStore {
    prefix: String,
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl TaskIdStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn workflow() -> Self {
        Self::new("workflow")
    }

    pub fn web_creator() -> Self {
        Self::new("webcreator")
    }

    /// Another namespace over the same backing map, like two prefixes in one
    /// browser session storage.
    pub fn sibling(&self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: Arc::clone(&self.entries),
        }
    }

    pub fn storage_key(&self, key: &str) -> String {
        format!("for_{}_task___{}", self.prefix, key)
    }

    pub async fn set(&self, key: &str, task_id: impl Into<String>) {
        let mut entries = self.entries.write().await;
        entries.insert(self.storage_key(key), task_id.into());
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries.get(&self.storage_key(key)).cloned()
    }

    pub async fn remove(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.write().await;
        entries.remove(&self.storage_key(key))
    }
}
