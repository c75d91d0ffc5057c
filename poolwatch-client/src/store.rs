//! Persistent stores
//!
//! Small key → bytes stores used to remember location lookups between
//! calls. Stores are best effort: a failed read is a miss and a failed write
//! is logged and dropped.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

/// Default freshness of an on-disk entry
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(3600);

/// Key → bytes store shared by the location cache and native backend
pub trait PersistentStore {
    /// Stored bytes for `key`, or `None` on a miss
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Remember `data` under `key`
    fn save(&self, key: &str, data: &[u8]);
}

/// Store that remembers nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneStore;

impl PersistentStore for NoneStore {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn save(&self, _key: &str, _data: &[u8]) {}
}

/// Process-lifetime in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.borrow().get(key).cloned()
    }

    fn save(&self, key: &str, data: &[u8]) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), data.to_vec());
    }
}

/// One file per key under a directory, fronted by an in-memory layer
///
/// Entries older than the cache duration are treated as misses.
#[derive(Debug)]
pub struct DiskStore {
    dir: PathBuf,
    cache_duration: Duration,
    memory: RefCell<HashMap<String, (SystemTime, Vec<u8>)>>,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache_duration: DEFAULT_CACHE_DURATION,
            memory: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = duration;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache_duration(&self) -> Duration {
        self.cache_duration
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are schedd names plus a suffix; keep them inside the directory
        let file: String = key
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(file)
    }

    fn is_fresh(&self, written: SystemTime) -> bool {
        match SystemTime::now().duration_since(written) {
            Ok(age) => age <= self.cache_duration,
            // Written "in the future" (clock skew); accept it
            Err(_) => true,
        }
    }

    fn read_file(&self, key: &str) -> Option<(SystemTime, Vec<u8>)> {
        let path = self.path_for(key);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(_) => return None,
        };
        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(e) => {
                warn!("Cannot read mtime of {}: {}", path.display(), e);
                return None;
            }
        };
        if !self.is_fresh(modified) {
            debug!("Store entry {} is stale", key);
            return None;
        }
        match fs::read(&path) {
            Ok(data) => Some((modified, data)),
            Err(e) => {
                warn!("Failed to read store entry {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write_file(&self, key: &str, data: &[u8]) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)
    }
}

impl PersistentStore for DiskStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        if let Some((written, data)) = self.memory.borrow().get(key) {
            if self.is_fresh(*written) {
                return Some(data.clone());
            }
        }

        let (written, data) = self.read_file(key)?;
        self.memory
            .borrow_mut()
            .insert(key.to_string(), (written, data.clone()));
        Some(data)
    }

    fn save(&self, key: &str, data: &[u8]) {
        self.memory
            .borrow_mut()
            .insert(key.to_string(), (SystemTime::now(), data.to_vec()));

        if let Err(e) = self.write_file(key, data) {
            warn!(
                "Failed to persist store entry {} in {}: {}",
                key,
                self.dir.display(),
                e
            );
        }
    }
}
