use std::collections::HashMap;
use std::sync::Mutex;

const THREAD_STORAGE_PREFIX: &str = "chatkit:thread:user:";

pub fn thread_storage_key(user_id: &str) -> String {
    format!("{THREAD_STORAGE_PREFIX}{user_id}")
}

#[derive(Debug, thiserror::Error)]
pub enum ThreadStoreError {
    #[error("thread storage unavailable: {0}")]
    Unavailable(String),
}

/// Where the current conversation thread is remembered, one per user.
pub trait ThreadStore {
    fn read(&self, user_id: &str) -> Result<Option<String>, ThreadStoreError>;

    /// Store `thread_id`, or remove the entry when it is `None`.
    fn write(&self, user_id: &str, thread_id: Option<&str>) -> Result<(), ThreadStoreError>;
}

/// Process-local store, used when nothing needs to survive a restart.
#[derive(Debug, Default)]
pub struct MemoryThreadStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ThreadStore for MemoryThreadStore {
    fn read(&self, user_id: &str) -> Result<Option<String>, ThreadStoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| ThreadStoreError::Unavailable(e.to_string()))?;
        Ok(entries.get(&thread_storage_key(user_id)).cloned())
    }

    fn write(&self, user_id: &str, thread_id: Option<&str>) -> Result<(), ThreadStoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| ThreadStoreError::Unavailable(e.to_string()))?;
        let key = thread_storage_key(user_id);
        match thread_id {
            Some(id) => {
                entries.insert(key, id.to_string());
            }
            None => {
                entries.remove(&key);
            }
        }
        Ok(())
    }
}
