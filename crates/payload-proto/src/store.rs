//! Persisted favorites and recents.
//!
//! `StateStore` is the single writer of both collections. Every mutation is
//! a read-modify-write performed while holding one async mutex, so two
//! concurrent updates for different names never lose each other. The
//! in-memory copy is authoritative for the running process: when a durable
//! write is rejected the mutation still stands and the caller gets the error
//! alongside the new value.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub const FAVORITES_KEY: &str = "fav";
pub const RECENTS_KEY: &str = "recent";

/// Maximum number of entries kept in the recents list
pub const MAX_RECENTS: usize = 5;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("write rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to persist {key}: {source}")]
    PersistenceFailed {
        key: &'static str,
        #[source]
        source: BackendError,
    },
    #[error("failed to serialize {key}: {source}")]
    Serialize {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Whole-value key/value storage behind the store.
#[async_trait]
pub trait StateBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;
    async fn put(&self, key: &str, value: &str) -> Result<(), BackendError>;
}

// ── File backend ──────────────────────────────────────────────────────────────

/// One `<key>.json` file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl StateBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), BackendError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write atomically (write to temp, then rename)
        let path = self.path_for(key);
        let temp_path = path.with_extension("json.tmp");
        if let Err(e) = write_then_rename(&temp_path, &path, value).await {
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("could not remove {}: {}", temp_path.display(), cleanup);
                }
            }
            return Err(e.into());
        }

        debug!("persisted {} ({} bytes)", path.display(), value.len());
        Ok(())
    }
}

async fn write_then_rename(temp_path: &Path, path: &Path, value: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(temp_path).await?;
    file.write_all(value.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(temp_path, path).await
}

// ── Memory backend ────────────────────────────────────────────────────────────

/// In-process backend for tests. Can be told to reject writes.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    reject_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, key: &str, value: &str) -> Self {
        self.lock().insert(key.to_string(), value.to_string());
        self
    }

    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Raw stored value for `key`, as the backend would hand it out.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a usable map.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.raw(key))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), BackendError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Rejected("storage disabled".to_string()));
        }
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Result of a mutation: the new value plus whether it reached durable storage.
#[derive(Debug)]
pub struct Written<T> {
    pub value: T,
    pub persisted: Result<(), StoreError>,
}

impl<T> Written<T> {
    pub fn is_persisted(&self) -> bool {
        self.persisted.is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteToggle {
    pub favorites: Vec<String>,
    /// Whether the toggled name is a favorite after the call.
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    pub favorites: Vec<String>,
    pub recents: Vec<String>,
}

impl StateSnapshot {
    pub fn is_favorite(&self, name: &str) -> bool {
        self.favorites.iter().any(|f| f == name)
    }

    pub fn is_recent(&self, name: &str) -> bool {
        self.recents.iter().any(|r| r == name)
    }
}

pub struct StateStore {
    backend: Arc<dyn StateBackend>,
    state: tokio::sync::Mutex<StateSnapshot>,
}

impl StateStore {
    /// Open the store, loading both collections from `backend`.
    pub async fn open(backend: Arc<dyn StateBackend>) -> Self {
        let favorites = read_names(backend.as_ref(), FAVORITES_KEY).await;
        let recents = read_names(backend.as_ref(), RECENTS_KEY).await;
        let state = StateSnapshot {
            favorites: dedup_preserving_order(favorites),
            recents: normalize_recents(recents),
        };
        debug!(
            "state store opened: {} favorites, {} recents",
            state.favorites.len(),
            state.recents.len()
        );
        Self {
            backend,
            state: tokio::sync::Mutex::new(state),
        }
    }

    /// Favorites as stored durably. Empty if absent or unreadable.
    pub async fn load_favorites(&self) -> Vec<String> {
        dedup_preserving_order(read_names(self.backend.as_ref(), FAVORITES_KEY).await)
    }

    /// Recents as stored durably. Empty if absent or unreadable.
    pub async fn load_recents(&self) -> Vec<String> {
        normalize_recents(read_names(self.backend.as_ref(), RECENTS_KEY).await)
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        self.state.lock().await.clone()
    }

    pub async fn favorites(&self) -> Vec<String> {
        self.state.lock().await.favorites.clone()
    }

    pub async fn recents(&self) -> Vec<String> {
        self.state.lock().await.recents.clone()
    }

    pub async fn save_favorites(&self, favorites: Vec<String>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.favorites = dedup_preserving_order(favorites);
        self.persist(FAVORITES_KEY, &state.favorites).await
    }

    pub async fn save_recents(&self, recents: Vec<String>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.recents = normalize_recents(recents);
        self.persist(RECENTS_KEY, &state.recents).await
    }

    /// Flip membership of `name` in the favorite set.
    pub async fn toggle_favorite(&self, name: &str) -> Written<FavoriteToggle> {
        let mut state = self.state.lock().await;
        let (favorites, is_favorite) = toggle_member(&state.favorites, name);
        state.favorites = favorites;
        let persisted = self.persist(FAVORITES_KEY, &state.favorites).await;
        Written {
            value: FavoriteToggle {
                favorites: state.favorites.clone(),
                is_favorite,
            },
            persisted,
        }
    }

    /// Move `name` to the front of the recents list.
    pub async fn record_recent(&self, name: &str) -> Written<Vec<String>> {
        let mut state = self.state.lock().await;
        state.recents = push_recent(&state.recents, name);
        let persisted = self.persist(RECENTS_KEY, &state.recents).await;
        Written {
            value: state.recents.clone(),
            persisted,
        }
    }

    async fn persist(&self, key: &'static str, names: &[String]) -> Result<(), StoreError> {
        let json = serde_json::to_string(names)
            .map_err(|source| StoreError::Serialize { key, source })?;
        self.backend.put(key, &json).await.map_err(|source| {
            warn!("failed to persist {}: {}", key, source);
            StoreError::PersistenceFailed { key, source }
        })
    }
}

async fn read_names(backend: &dyn StateBackend, key: &str) -> Vec<String> {
    match backend.get(key).await {
        Ok(Some(raw)) => parse_names(&raw).unwrap_or_else(|e| {
            warn!("failed to parse {}, starting fresh: {}", key, e);
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("failed to read {}, starting fresh: {}", key, e);
            Vec::new()
        }
    }
}

fn parse_names(raw: &str) -> Result<Vec<String>, serde_json::Error> {
    serde_json::from_str::<Vec<String>>(raw)
}

/// Prepend `name`, drop any later copy of it, keep the first `MAX_RECENTS`.
pub fn push_recent(recents: &[String], name: &str) -> Vec<String> {
    std::iter::once(name.to_string())
        .chain(recents.iter().filter(|r| r.as_str() != name).cloned())
        .take(MAX_RECENTS)
        .collect()
}

/// Symmetric difference of `set` with `{name}`; returns the new set and
/// whether `name` is now a member.
pub fn toggle_member(set: &[String], name: &str) -> (Vec<String>, bool) {
    if set.iter().any(|f| f == name) {
        (set.iter().filter(|f| f.as_str() != name).cloned().collect(), false)
    } else {
        let mut next = set.to_vec();
        next.push(name.to_string());
        (next, true)
    }
}

fn dedup_preserving_order(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for n in names {
        if !out.contains(&n) {
            out.push(n);
        }
    }
    out
}

fn normalize_recents(names: Vec<String>) -> Vec<String> {
    let mut out = dedup_preserving_order(names);
    out.truncate(MAX_RECENTS);
    out
}
