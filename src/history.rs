//! Persisted history of generated QR codes.
//!
//! The log lives under a single key as a JSON array of [`QrEntry`] values.
//! Whole batches are appended with a read-modify-write of that array; there
//! is no partial deletion, only [`HistoryStore::clear`]. Views read the most
//! recent [`HISTORY_VIEW_LIMIT`] entries; the persisted array itself keeps
//! growing until cleared.
//!
//! Any number of views can [`HistoryStore::subscribe`] and receive a
//! [`HistoryEvent`] after every change made through a clone of the same
//! store. Writes from another process sharing the backing file are picked up
//! by [`HistoryStore::sync_external`].
//!
//! Two writers racing on the same key can lose one batch: both read the old
//! array, both write back their own concatenation.

use crate::error::QrBatchError;
use crate::output::QrEntry;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Entries returned by [`HistoryStore::load`].
pub const HISTORY_VIEW_LIMIT: usize = 10;

/// Key the log is stored under unless another is given.
pub const DEFAULT_HISTORY_KEY: &str = "qr-history";

const EVENT_CAPACITY: usize = 64;

/// Change notifications delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    /// A batch of `count` entries was appended.
    Appended { count: usize },
    /// The log was wiped.
    Cleared,
    /// Another writer changed the persisted log.
    ExternalChange,
}

// ── Backends ─────────────────────────────────────────────────────────────

/// Raw key/value storage for the serialised log.
pub trait HistoryBackend: Send + Sync {
    /// `Ok(None)` when nothing is stored under `key`.
    fn read(&self, key: &str) -> io::Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> io::Result<()>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl HistoryBackend for FileBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        // Write to a sibling temp file and rename so readers never see a
        // half-written array.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.flush()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Process-local storage, for tests and embedders without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "history lock poisoned"))
    }
}

impl HistoryBackend for MemoryBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// ── Store ────────────────────────────────────────────────────────────────

struct Inner {
    backend: Arc<dyn HistoryBackend>,
    key: String,
    events: broadcast::Sender<HistoryEvent>,
    /// Fingerprint of the value this store last wrote or observed.
    last_seen: Mutex<Option<u64>>,
}

/// Handle to the persisted history log. Clones share one event channel.
#[derive(Clone)]
pub struct HistoryStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("key", &self.inner.key)
            .finish_non_exhaustive()
    }
}

impl HistoryStore {
    /// File-backed store in `<platform data dir>/qrbatch`.
    pub fn open_default() -> Result<Self, QrBatchError> {
        let dir = dirs::data_dir()
            .map(|d| d.join("qrbatch"))
            .ok_or_else(|| QrBatchError::InvalidConfig("No platform data directory; pass a history directory".into()))?;
        Ok(Self::open(dir))
    }

    /// File-backed store in `dir`. The directory is created on first write.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::with_backend(Arc::new(FileBackend::new(dir)), DEFAULT_HISTORY_KEY)
    }

    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::default()), DEFAULT_HISTORY_KEY)
    }

    pub fn with_backend(backend: Arc<dyn HistoryBackend>, key: impl Into<String>) -> Self {
        let key = key.into();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let initial = backend.read(&key).ok().flatten();
        Self {
            inner: Arc::new(Inner {
                backend,
                key,
                events,
                last_seen: Mutex::new(initial.as_deref().map(fingerprint)),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Receive an event after every append or clear, and on detected
    /// external changes.
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.inner.events.subscribe()
    }

    /// Append a batch to the end of the log and notify subscribers.
    ///
    /// Corrupt existing data is replaced; a backend read failure aborts the
    /// append so the stored log is never overwritten blind.
    pub fn append(&self, entries: &[QrEntry]) -> Result<(), QrBatchError> {
        let mut all = self.read_entries()?;
        all.extend_from_slice(entries);

        let json = serde_json::to_string(&all).map_err(|e| QrBatchError::Persistence {
            key: self.inner.key.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        self.write_raw(&json)?;

        info!("History '{}': appended {} entries ({} total)", self.inner.key, entries.len(), all.len());
        self.notify(HistoryEvent::Appended { count: entries.len() });
        Ok(())
    }

    /// The most recent [`HISTORY_VIEW_LIMIT`] entries, oldest first.
    pub fn load(&self) -> Vec<QrEntry> {
        let mut all = self.load_all();
        let skip = all.len().saturating_sub(HISTORY_VIEW_LIMIT);
        all.drain(..skip);
        all
    }

    /// Every persisted entry, oldest first. Never fails: missing, unreadable
    /// or corrupt data yields an empty log.
    pub fn load_all(&self) -> Vec<QrEntry> {
        self.read_entries().unwrap_or_else(|e| {
            warn!("History '{}' unreadable, treating as empty: {}", self.inner.key, e);
            Vec::new()
        })
    }

    /// Stored entries; backend I/O errors surface as `Persistence`, corrupt
    /// JSON reads as an empty log.
    fn read_entries(&self) -> Result<Vec<QrEntry>, QrBatchError> {
        let raw = match self.inner.backend.read(&self.inner.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(Vec::new()),
            Err(source) => {
                return Err(QrBatchError::Persistence {
                    key: self.inner.key.clone(),
                    source,
                })
            }
        };
        match serde_json::from_str::<Vec<QrEntry>>(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!("History '{}' is corrupt, treating as empty: {}", self.inner.key, e);
                Ok(Vec::new())
            }
        }
    }

    /// Number of persisted entries, not capped by the view limit.
    pub fn total_count(&self) -> usize {
        self.load_all().len()
    }

    /// The `n` most recent entries, newest first.
    pub fn recent(&self, n: usize) -> Vec<QrEntry> {
        self.load_all().into_iter().rev().take(n).collect()
    }

    /// Wipe the log and notify subscribers.
    pub fn clear(&self) -> Result<(), QrBatchError> {
        self.inner
            .backend
            .remove(&self.inner.key)
            .map_err(|source| QrBatchError::Persistence {
                key: self.inner.key.clone(),
                source,
            })?;
        self.remember(None);
        info!("History '{}' cleared", self.inner.key);
        self.notify(HistoryEvent::Cleared);
        Ok(())
    }

    /// Check whether another writer changed the persisted log since this
    /// store last touched it. Emits [`HistoryEvent::ExternalChange`] and
    /// returns `true` if so.
    pub fn sync_external(&self) -> bool {
        let current = match self.inner.backend.read(&self.inner.key) {
            Ok(v) => v.as_deref().map(fingerprint),
            Err(e) => {
                debug!("History '{}' sync read failed: {}", self.inner.key, e);
                return false;
            }
        };
        let changed = match self.inner.last_seen.lock() {
            Ok(mut seen) if *seen != current => {
                *seen = current;
                true
            }
            _ => false,
        };
        if changed {
            debug!("History '{}' changed externally", self.inner.key);
            self.notify(HistoryEvent::ExternalChange);
        }
        changed
    }

    fn write_raw(&self, json: &str) -> Result<(), QrBatchError> {
        self.inner
            .backend
            .write(&self.inner.key, json)
            .map_err(|source| QrBatchError::Persistence {
                key: self.inner.key.clone(),
                source,
            })?;
        self.remember(Some(fingerprint(json)));
        Ok(())
    }

    fn remember(&self, value: Option<u64>) {
        if let Ok(mut seen) = self.inner.last_seen.lock() {
            *seen = value;
        }
    }

    fn notify(&self, event: HistoryEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

fn fingerprint(raw: &str) -> u64 {
    let mut h = DefaultHasher::new();
    raw.hash(&mut h);
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn entries(tag: &str, n: usize) -> Vec<QrEntry> {
        (0..n)
            .map(|i| QrEntry {
                id: format!("qr-{tag}-{i}"),
                payload: format!("n: {i}"),
                created_at: DateTime::<Utc>::default(),
                image_data: String::new(),
            })
            .collect()
    }

    #[test]
    fn empty_store_loads_nothing() {
        let store = HistoryStore::in_memory();
        assert!(store.load().is_empty());
        assert_eq!(store.total_count(), 0);
    }

    #[test]
    fn append_then_load_shows_tail_capped_at_ten() {
        let store = HistoryStore::in_memory();
        store.append(&entries("a", 7)).unwrap();
        store.append(&entries("b", 6)).unwrap();

        let view = store.load();
        assert_eq!(view.len(), HISTORY_VIEW_LIMIT);
        assert_eq!(view.last().unwrap().id, "qr-b-5");
        assert_eq!(view.first().unwrap().id, "qr-a-3");
        assert_eq!(store.total_count(), 13);
    }

    #[test]
    fn load_is_stable_without_mutation() {
        let store = HistoryStore::in_memory();
        store.append(&entries("a", 3)).unwrap();
        assert_eq!(store.load(), store.load());
    }

    #[test]
    fn clear_empties_log() {
        let store = HistoryStore::in_memory();
        store.append(&entries("a", 3)).unwrap();
        store.clear().unwrap();
        assert!(store.load().is_empty());
        // Clearing an empty log is fine.
        store.clear().unwrap();
    }

    #[test]
    fn recent_is_newest_first() {
        let store = HistoryStore::in_memory();
        store.append(&entries("a", 5)).unwrap();
        let ids: Vec<String> = store.recent(3).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["qr-a-4", "qr-a-3", "qr-a-2"]);
    }

    #[test]
    fn corrupt_data_is_treated_as_empty() {
        let backend = Arc::new(MemoryBackend::default());
        backend.write(DEFAULT_HISTORY_KEY, "{not json").unwrap();
        let store = HistoryStore::with_backend(backend, DEFAULT_HISTORY_KEY);

        assert!(store.load().is_empty());
        store.append(&entries("a", 2)).unwrap();
        assert_eq!(store.total_count(), 2);
    }

    /// Memory storage whose next read can be made to fail.
    #[derive(Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        fail_read: std::sync::atomic::AtomicBool,
    }

    impl HistoryBackend for FlakyBackend {
        fn read(&self, key: &str) -> io::Result<Option<String>> {
            if self.fail_read.swap(false, std::sync::atomic::Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            self.inner.read(key)
        }
        fn write(&self, key: &str, value: &str) -> io::Result<()> {
            self.inner.write(key, value)
        }
        fn remove(&self, key: &str) -> io::Result<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn read_failure_aborts_append_and_keeps_log() {
        let backend = Arc::new(FlakyBackend::default());
        let store = HistoryStore::with_backend(backend.clone(), DEFAULT_HISTORY_KEY);
        let mut rx = store.subscribe();
        store.append(&entries("a", 50)).unwrap();
        assert_eq!(rx.try_recv().unwrap(), HistoryEvent::Appended { count: 50 });

        backend.fail_read.store(true, std::sync::atomic::Ordering::SeqCst);
        let err = store.append(&entries("b", 1)).unwrap_err();
        assert!(matches!(err, QrBatchError::Persistence { .. }), "got: {err}");
        assert!(rx.try_recv().is_err());
        assert_eq!(store.total_count(), 50);
    }

    #[test]
    fn read_failure_on_load_is_empty_view() {
        let backend = Arc::new(FlakyBackend::default());
        let store = HistoryStore::with_backend(backend.clone(), DEFAULT_HISTORY_KEY);
        store.append(&entries("a", 3)).unwrap();

        backend.fail_read.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(store.load().is_empty());
        assert_eq!(store.load().len(), 3);
    }

    #[test]
    fn subscribers_see_every_change() {
        let store = HistoryStore::in_memory();
        let mut rx = store.subscribe();
        let mut rx2 = store.clone().subscribe();

        store.append(&entries("a", 4)).unwrap();
        store.clear().unwrap();

        assert_eq!(rx.try_recv().unwrap(), HistoryEvent::Appended { count: 4 });
        assert_eq!(rx.try_recv().unwrap(), HistoryEvent::Cleared);
        assert_eq!(rx2.try_recv().unwrap(), HistoryEvent::Appended { count: 4 });
    }

    #[test]
    fn file_backend_persists_across_stores() {
        let dir = tempfile::tempdir().unwrap();
        HistoryStore::open(dir.path()).append(&entries("a", 2)).unwrap();

        let reopened = HistoryStore::open(dir.path());
        assert_eq!(reopened.total_count(), 2);
        assert!(dir.path().join("qr-history.json").exists());
    }

    #[test]
    fn external_writes_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        let ours = HistoryStore::open(dir.path());
        let theirs = HistoryStore::open(dir.path());
        let mut rx = ours.subscribe();

        assert!(!ours.sync_external());
        theirs.append(&entries("x", 1)).unwrap();

        assert!(ours.sync_external());
        assert_eq!(rx.try_recv().unwrap(), HistoryEvent::ExternalChange);
        // Seen now; a second check is quiet.
        assert!(!ours.sync_external());
    }

    #[test]
    fn own_writes_are_not_external() {
        let store = HistoryStore::in_memory();
        store.append(&entries("a", 1)).unwrap();
        assert!(!store.sync_external());
    }
}
