//! Audit storage backends.

use async_trait::async_trait;
use quill_core::config::audit::{AuditConfig, StorageBackend};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::entry::AuditEntry;
use crate::error::AuditError;
use crate::logger::AuditFilter;

/// Trait for audit storage backends.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Store an audit entry.
    async fn store(&self, entry: AuditEntry) -> Result<(), AuditError>;

    /// Query audit entries with filters.
    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEntry>, AuditError>;

    /// Count entries matching a filter (ignores limit/offset).
    async fn count(&self, filter: AuditFilter) -> Result<usize, AuditError>;

    /// Get an audit entry by ID.
    async fn get(&self, entry_id: Uuid) -> Result<Option<AuditEntry>, AuditError>;

    /// Clear the record link of every entry pointing at a record.
    /// Returns how many entries were unlinked.
    async fn nullify(&self, auditable_type: &str, auditable_id: &str)
    -> Result<usize, AuditError>;
}

/// Create a storage backend based on configuration.
///
/// The database backend lives in `quill-adapter-pg`; pass it to
/// [`AuditLogger::with_storage`](crate::AuditLogger::with_storage).
pub fn create_storage(config: &AuditConfig) -> Result<Arc<dyn AuditStorage>, AuditError> {
    if !config.enabled {
        return Ok(Arc::new(NullStorage));
    }
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageBackend::Console => Ok(Arc::new(ConsoleStorage)),
        StorageBackend::Null => Ok(Arc::new(NullStorage)),
        StorageBackend::File => {
            let path = config
                .storage
                .file_path
                .as_deref()
                .unwrap_or("audit.log");
            Ok(Arc::new(FileStorage::open(path)?))
        }
        StorageBackend::Database => Err(AuditError::StorageError(
            "database storage must be constructed by quill-adapter-pg".to_string(),
        )),
    }
}

fn lock_error<E: std::fmt::Display>(e: E) -> AuditError {
    AuditError::StorageError(format!("Failed to acquire lock: {}", e))
}

/// Apply a filter to entries held in insertion (oldest first) order.
pub(crate) fn select(entries: &[AuditEntry], filter: &AuditFilter) -> Vec<AuditEntry> {
    let mut results: Vec<AuditEntry> = entries
        .iter()
        .filter(|e| filter.matches(e))
        .cloned()
        .collect();

    if filter.newest_first {
        results.reverse();
    }
    if let Some(offset) = filter.offset {
        results = results.into_iter().skip(offset).collect();
    }
    if let Some(limit) = filter.limit {
        results.truncate(limit);
    }
    results
}

fn unlink(entries: &mut [AuditEntry], auditable_type: &str, auditable_id: &str) -> usize {
    let mut unlinked = 0;
    for entry in entries.iter_mut() {
        if entry.auditable_type == auditable_type
            && entry.auditable_id.as_deref() == Some(auditable_id)
        {
            entry.auditable_id = None;
            unlinked += 1;
        }
    }
    unlinked
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored entry, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditStorage for MemoryStorage {
    async fn store(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.write().map_err(lock_error)?.push(entry);
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(select(&entries, &filter))
    }

    async fn count(&self, filter: AuditFilter) -> Result<usize, AuditError> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.iter().filter(|e| filter.matches(e)).count())
    }

    async fn get(&self, entry_id: Uuid) -> Result<Option<AuditEntry>, AuditError> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.iter().find(|e| e.id == entry_id).cloned())
    }

    async fn nullify(
        &self,
        auditable_type: &str,
        auditable_id: &str,
    ) -> Result<usize, AuditError> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        Ok(unlink(&mut entries, auditable_type, auditable_id))
    }
}

/// Console storage (one JSON line per entry on stdout).
pub struct ConsoleStorage;

#[async_trait]
impl AuditStorage for ConsoleStorage {
    async fn store(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let json = serde_json::to_string(&entry)?;
        println!("{}", json);
        Ok(())
    }

    async fn query(&self, _filter: AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        // Console storage doesn't support querying
        Ok(vec![])
    }

    async fn count(&self, _filter: AuditFilter) -> Result<usize, AuditError> {
        Ok(0)
    }

    async fn get(&self, _entry_id: Uuid) -> Result<Option<AuditEntry>, AuditError> {
        Ok(None)
    }

    async fn nullify(&self, _type: &str, _id: &str) -> Result<usize, AuditError> {
        // Lines already printed cannot be rewritten
        Ok(0)
    }
}

/// Storage that discards entries.
pub struct NullStorage;

#[async_trait]
impl AuditStorage for NullStorage {
    async fn store(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Ok(())
    }

    async fn query(&self, _filter: AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(vec![])
    }

    async fn count(&self, _filter: AuditFilter) -> Result<usize, AuditError> {
        Ok(0)
    }

    async fn get(&self, _entry_id: Uuid) -> Result<Option<AuditEntry>, AuditError> {
        Ok(None)
    }

    async fn nullify(&self, _type: &str, _id: &str) -> Result<usize, AuditError> {
        Ok(0)
    }
}

/// File storage (JSON Lines, one entry per line).
///
/// Existing entries are loaded when the file is opened and kept in memory
/// for querying. Unlinking rewrites the whole file.
pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<Vec<AuditEntry>>,
}

impl FileStorage {
    /// Open (or prepare to create) a log file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let entries = Self::load(&path)?;
        tracing::info!(path = %path.display(), "Loaded {} audit entries", entries.len());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry of a JSON Lines file.
    pub fn load(path: &Path) -> Result<Vec<AuditEntry>, AuditError> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(fs::File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    fn rewrite(&self, entries: &[AuditEntry]) -> Result<(), AuditError> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            for entry in entries {
                writeln!(file, "{}", serde_json::to_string(entry)?)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl AuditStorage for FileStorage {
    async fn store(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let json = serde_json::to_string(&entry)?;
        let mut entries = self.entries.write().map_err(lock_error)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", json)?;

        entries.push(entry);
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(select(&entries, &filter))
    }

    async fn count(&self, filter: AuditFilter) -> Result<usize, AuditError> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.iter().filter(|e| filter.matches(e)).count())
    }

    async fn get(&self, entry_id: Uuid) -> Result<Option<AuditEntry>, AuditError> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.iter().find(|e| e.id == entry_id).cloned())
    }

    async fn nullify(
        &self,
        auditable_type: &str,
        auditable_id: &str,
    ) -> Result<usize, AuditError> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        let unlinked = unlink(&mut entries, auditable_type, auditable_id);
        if unlinked > 0 {
            self.rewrite(&entries)?;
        }
        Ok(unlinked)
    }
}
