//! Session storage backends

use crate::core::record::SessionRecord;
use crate::error::Result;
use crate::traits::SessionStore;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Session list kept in a JSON file
///
/// Saves write a sibling temp file and rename it over the target, so a crash
/// mid-write leaves the previous list intact.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self) -> Result<Vec<SessionRecord>> {
        if !self.path.exists() {
            debug!("No session file at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, sessions: &[SessionRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        fs::write(&temp, serde_json::to_vec_pretty(sessions)?)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

/// Non-durable store for tests and storage-less setups
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<Vec<SessionRecord>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: Vec<SessionRecord>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
            saves: Mutex::new(0),
        }
    }

    /// Number of saves so far
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    pub fn snapshot(&self) -> Vec<SessionRecord> {
        self.sessions.lock().clone()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Vec<SessionRecord>> {
        Ok(self.sessions.lock().clone())
    }

    fn save(&self, sessions: &[SessionRecord]) -> Result<()> {
        *self.sessions.lock() = sessions.to_vec();
        *self.saves.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> SessionRecord {
        SessionRecord {
            id: id.into(),
            start_time: 1,
            is_active: true,
            auto_delete_at: 2,
            generated_music_count: 0,
        }
    }

    #[test]
    fn test_json_store_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("sessions.json"));

        assert!(store.load().unwrap().is_empty());

        store.save(&[record("a"), record("b")]).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].id, "b");
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        fs::write(&path, "{not json").unwrap();

        assert!(JsonFileStore::new(&path).load().is_err());
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemoryStore::new();
        store.save(&[record("a")]).unwrap();
        store.save(&[]).unwrap();

        assert_eq!(store.save_count(), 2);
        assert!(store.load().unwrap().is_empty());
    }
}
