//! File-backed thread references, the terminal's stand-in for browser
//! local storage.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use merak_core::thread::{ThreadStore, ThreadStoreError, thread_storage_key};

pub struct FileThreadStore {
    path: PathBuf,
}

impl FileThreadStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_location() -> Self {
        Self::new(crate::util::config_dir().join("threads.json"))
    }

    fn load(&self) -> Result<BTreeMap<String, String>, ThreadStoreError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(ThreadStoreError::Unavailable(e.to_string())),
        };
        serde_json::from_str(&data).map_err(|e| ThreadStoreError::Unavailable(e.to_string()))
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), ThreadStoreError> {
        let unavailable = |e: std::io::Error| ThreadStoreError::Unavailable(e.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(unavailable)?;
        }
        let data = serde_json::to_string_pretty(entries)
            .map_err(|e| ThreadStoreError::Unavailable(e.to_string()))?;
        let mut file = std::fs::File::create(&self.path).map_err(unavailable)?;
        file.write_all(data.as_bytes()).map_err(unavailable)
    }
}

impl ThreadStore for FileThreadStore {
    fn read(&self, user_id: &str) -> Result<Option<String>, ThreadStoreError> {
        Ok(self.load()?.remove(&thread_storage_key(user_id)))
    }

    fn write(&self, user_id: &str, thread_id: Option<&str>) -> Result<(), ThreadStoreError> {
        let mut entries = self.load()?;
        let key = thread_storage_key(user_id);
        match thread_id {
            Some(id) => {
                entries.insert(key, id.to_string());
            }
            None => {
                entries.remove(&key);
            }
        }
        self.save(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("merak-threads-{}-{name}", std::process::id()))
            .join("threads.json")
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let store = FileThreadStore::new(scratch_path("missing"));
        assert_eq!(store.read("u1").unwrap(), None);
    }

    #[test]
    fn round_trips_per_user() {
        let path = scratch_path("roundtrip");
        let store = FileThreadStore::new(path.clone());
        store.write("u1", Some("thr_1")).unwrap();
        store.write("u2", Some("thr_2")).unwrap();
        assert_eq!(store.read("u1").unwrap().as_deref(), Some("thr_1"));

        store.write("u1", None).unwrap();
        assert_eq!(store.read("u1").unwrap(), None);
        assert_eq!(store.read("u2").unwrap().as_deref(), Some("thr_2"));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("chatkit:thread:user:u2"));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn corrupt_file_is_unavailable() {
        let path = scratch_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        let store = FileThreadStore::new(path.clone());
        assert!(store.read("u1").is_err());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
