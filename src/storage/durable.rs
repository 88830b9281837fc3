//! Durable snapshot storage: one pretty-printed JSON file replaced atomically.

use crate::core::{Result, StoreError, StoreSnapshot};
use async_trait::async_trait;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::OnceCell;
use tracing::{debug, info};

// ============================================================================
// Snapshot Store Trait
// ============================================================================

/// Whole-snapshot persistence.
///
/// Implementations must never expose a partially written snapshot: a reader
/// either sees the previous committed state or the new one.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn read_all(&self) -> Result<StoreSnapshot>;
    async fn write_all(&self, snapshot: &StoreSnapshot) -> Result<()>;
}

// ============================================================================
// JSON File Store
// ============================================================================

/// Store backed by one JSON file.
///
/// The file is seeded with an empty snapshot at most once, on the first
/// access through this handle. A file that goes missing after that is an
/// error, never an empty store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    initialized: OnceCell<()>,
}

impl JsonFileStore {
    /// Bind to `path` without touching the disk. The file and its directory
    /// are created on first read or write.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            initialized: OnceCell::new(),
        }
    }

    /// Bind to `path` and make sure the file exists, seeding it with an
    /// empty snapshot if needed.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self::new(path);
        store.ensure_initialized().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_initialized(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| async {
                let exists = tokio::fs::try_exists(&self.path).await.map_err(|e| {
                    StoreError::storage(&self.path, format!("Failed to stat store file: {}", e))
                })?;
                if !exists {
                    info!(path = %self.path.display(), "initializing empty store file");
                    self.write_snapshot(&StoreSnapshot::new()).await?;
                }
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(())
    }

    async fn write_snapshot(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| StoreError::storage(&self.path, format!("Failed to serialize snapshot: {}", e)))?;
        let len = bytes.len();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, |file| file.write_all(&bytes)))
            .await
            .map_err(|e| StoreError::storage(&self.path, format!("Snapshot writer task failed: {}", e)))??;
        debug!(path = %self.path.display(), bytes = len, "snapshot written");
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn read_all(&self) -> Result<StoreSnapshot> {
        self.ensure_initialized().await?;
        let data = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::storage(&self.path, "Store file is missing"),
            _ => StoreError::storage(&self.path, format!("Failed to read store file: {}", e)),
        })?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&data)
            .map_err(|e| StoreError::storage(&self.path, format!("Failed to parse store file: {}", e)))?;
        debug!(
            path = %self.path.display(),
            instances = snapshot.instances.len(),
            events = snapshot.events.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    async fn write_all(&self, snapshot: &StoreSnapshot) -> Result<()> {
        self.write_snapshot(snapshot).await?;
        // A full write leaves nothing to seed.
        let _ = self.initialized.set(());
        Ok(())
    }
}

// ============================================================================
// Atomic Replace
// ============================================================================

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Mode for the replacement file: the current file's, or `0644` for a new
/// store file.
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Some(metadata.permissions()),
        Ok(_) => None,
        Err(_) => default_permissions(),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Write through `fill` into a temp file next to `path`, sync it, then rename
/// it over `path`. If anything fails the temp file is removed and the
/// previously committed file is left untouched.
fn write_atomic<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> io::Result<()>,
{
    let dir = parent_dir(path);
    fs::create_dir_all(dir)
        .map_err(|e| StoreError::storage(path, format!("Failed to create store directory: {}", e)))?;

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|e| StoreError::storage(path, format!("Failed to create temp file: {}", e)))?;
    // Temp files are created owner-only; the replacement keeps the mode of
    // the file it replaces.
    if let Some(permissions) = target_permissions(path) {
        temp.as_file()
            .set_permissions(permissions)
            .map_err(|e| StoreError::storage(path, format!("Failed to set snapshot permissions: {}", e)))?;
    }
    fill(temp.as_file_mut())
        .map_err(|e| StoreError::storage(path, format!("Failed to write snapshot: {}", e)))?;
    temp.as_file_mut()
        .flush()
        .map_err(|e| StoreError::storage(path, format!("Failed to flush snapshot: {}", e)))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StoreError::storage(path, format!("Failed to sync snapshot: {}", e)))?;
    temp.persist(path)
        .map_err(|e| StoreError::storage(path, format!("Failed to rename snapshot: {}", e.error)))?;
    Ok(())
}
