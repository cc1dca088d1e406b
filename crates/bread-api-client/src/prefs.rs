/*
[INPUT]:  String keys and values from the client (flags, device id)
[OUTPUT]: A small persistent key/value cache
[POS]:    Local state - non-secret preferences
[UPDATE]: When adding backends or changing the on-disk format
*/

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::warn;

/// Non-secret key/value store (user-defaults equivalent).
///
/// Writes are best effort; a backend that cannot persist logs and keeps the
/// value in memory.
pub trait Preferences: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|value| value.parse().ok())
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.set(key, value.to_string());
    }
}

#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Preferences for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
    }
}

/// Preferences persisted as a flat JSON object in one file
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl FilePreferences {
    /// Open (or lazily create) the preferences file at `path`
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(values)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, bytes)
    }
}

impl Preferences for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        if let Err(e) = self.persist(&values) {
            warn!(path = %self.path.display(), key, error = %e, "failed to persist preferences");
        }
    }
}
