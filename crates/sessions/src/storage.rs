//! Client-side key/value persistence for credentials.
//!
//! Values are plain strings. Reads never touch the disk after open; writes
//! report failure to the caller so a credential change that did not reach
//! the disk is never mistaken for one that did.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use folio_domain::config::{StorageBackend, StorageConfig};
use folio_domain::error::{Error, Result};
use parking_lot::RwLock;

/// String key/value storage backing the credential record.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Write several pairs. Backends that persist should do it in one write.
    fn set_many(&self, pairs: &[(&str, &str)]) -> Result<()> {
        for (key, value) in pairs {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Remove several keys. Backends that persist should do it in one write.
    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Open the store selected by `[storage]`.
pub fn open_store(cfg: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
    match cfg.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::File => {
            let path = cfg.resolved_path().ok_or_else(|| {
                Error::Config("storage.path is unset and no home directory was found".into())
            })?;
            Ok(Arc::new(FileStore::open(path)?))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-local store. Used in tests and with `storage.backend = "memory"`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store.
    pub fn with_entries(pairs: &[(&str, &str)]) -> Self {
        let entries = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// JSON-file store with write-through caching.
///
/// Every write replaces the whole file: the JSON goes to a temp file in the
/// same directory which is then renamed over the target, so readers see
/// either the old or the new contents. Concurrent writers (two `folio`
/// processes) are serialized by an exclusive `fs2` lock on a sidecar
/// `<file>.lock`. On Unix the file is owner-only (`0o600`).
///
/// A failed write leaves the in-memory view unchanged. Removals are the
/// exception: see `remove_many`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Load the store at `path`, or start empty if the file does not exist.
    ///
    /// A file that is not a JSON string map is logged and treated as empty;
    /// the next write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            load_entries(&path)?
        } else {
            BTreeMap::new()
        };

        tracing::debug!(
            path = %path.display(),
            keys = entries.len(),
            "credential store loaded"
        );

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)])
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_many(&[key])
    }

    fn set_many(&self, pairs: &[(&str, &str)]) -> Result<()> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        for (key, value) in pairs {
            next.insert((*key).to_owned(), (*value).to_owned());
        }
        write_entries(&self.path, &next)?;
        *entries = next;
        Ok(())
    }

    /// Removed keys are dropped from memory even when the rewrite fails.
    /// In that case the file itself is deleted so the keys cannot come back
    /// on the next open; only when that also fails is an error returned.
    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(*key);
        }

        let Err(write_err) = write_entries(&self.path, &entries) else {
            return Ok(());
        };
        tracing::warn!(
            error = %write_err,
            path = %self.path.display(),
            "rewriting credential store failed; deleting it instead"
        );
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "credential store {} could not be rewritten ({write_err}) or deleted ({e})",
                self.path.display()
            ))),
        }
    }
}

fn load_entries(path: &Path) -> Result<BTreeMap<String, String>> {
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    match serde_json::from_str(&raw) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %path.display(),
                "credential store is not valid JSON; starting empty"
            );
            Ok(BTreeMap::new())
        }
    }
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_string_pretty(entries)?;

    let lock = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path(path))?;
    fs2::FileExt::lock_exclusive(&lock)
        .map_err(|e| Error::Storage(format!("credential store lock failed: {e}")))?;

    // NamedTempFile is created 0o600 on Unix, and `persist` keeps the mode.
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| Error::Storage(format!("replacing {}: {}", path.display(), e.error)))?;
    // Lock is released when `lock` is dropped.
    Ok(())
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}
