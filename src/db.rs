//! ParityDB-based persistent storage for mining simulator state
//!
//! Key-value storage with one column family per record type. All writes go
//! through ParityDB commits, so each put/delete is atomic on disk. The stores
//! built on top keep authoritative in-memory maps and use this layer as the
//! write-through backing.

use crate::error::{Error, Result};
use parity_db::{Db, Options};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// User records column family
pub const CF_USERS: &str = "users";
/// Mining session records column family
pub const CF_SESSIONS: &str = "sessions";
/// Referral records column family
pub const CF_REFERRALS: &str = "referrals";
/// Ad reward log column family
pub const CF_AD_REWARDS: &str = "ad_rewards";
/// Balance credit log column family
pub const CF_CREDITS: &str = "credits";
/// Counters and bookkeeping column family
pub const CF_METADATA: &str = "metadata";

/// All column families
const COLUMN_FAMILIES: &[&str] = &[
    CF_USERS,
    CF_SESSIONS,
    CF_REFERRALS,
    CF_AD_REWARDS,
    CF_CREDITS,
    CF_METADATA,
];

/// ParityDB-based database wrapper
pub struct ParityDatabase {
    db: Arc<Db>,
    path: PathBuf,
    column_count: u8,
    stats: Arc<RwLock<DatabaseStats>>,
}

/// Database statistics for monitoring and debugging
#[derive(Debug, Clone, Default)]
struct DatabaseStats {
    total_reads: u64,
    total_writes: u64,
    total_deletes: u64,
    total_bytes_written: u64,
}

/// Snapshot of database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStatistics {
    /// Total read operations
    pub total_reads: u64,
    /// Total write operations
    pub total_writes: u64,
    /// Total delete operations
    pub total_deletes: u64,
    /// Total bytes written
    pub total_bytes_written: u64,
    /// Database path
    pub path: PathBuf,
    /// Number of column families
    pub column_count: u8,
}

impl ParityDatabase {
    /// Create or open a ParityDB database (alias for `new`)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(path)
    }

    /// Create or open a ParityDB database at the given path
    ///
    /// Creates the directory if needed and verifies it is writable. If the
    /// database fails to open, the corrupted files are backed up aside and a
    /// fresh database is created in their place.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Initializing ParityDB at {:?}", path);

        if !path.exists() {
            std::fs::create_dir_all(&path).map_err(|e| {
                Error::Storage(format!("Failed to create database directory: {}", e))
            })?;
        }

        let test_file = path.join(".write_test");
        std::fs::write(&test_file, b"test")
            .map_err(|e| Error::Storage(format!("Database directory is not writable: {}", e)))?;
        let _ = std::fs::remove_file(&test_file);

        let options = Options::with_columns(&path, COLUMN_FAMILIES.len() as u8);

        let db = match Db::open_or_create(&options) {
            Ok(db) => db,
            Err(e) => {
                error!("Failed to open ParityDB: {}", e);
                warn!("Attempting database recovery...");
                Self::attempt_recovery(&path)?;
                Db::open_or_create(&options).map_err(|e| {
                    Error::Storage(format!("Failed to open ParityDB after recovery: {}", e))
                })?
            }
        };

        info!(
            "ParityDB initialized at {:?} with {} columns",
            path,
            COLUMN_FAMILIES.len()
        );

        Ok(Self {
            db: Arc::new(db),
            path,
            column_count: COLUMN_FAMILIES.len() as u8,
            stats: Arc::new(RwLock::new(DatabaseStats::default())),
        })
    }

    /// Move a corrupted database aside and create a fresh directory
    fn attempt_recovery(path: &Path) -> Result<()> {
        warn!("Attempting to recover database at {:?}", path);

        let backup_path = path
            .parent()
            .ok_or_else(|| Error::Storage("Invalid database path".to_string()))?
            .join(format!("backup_{}", chrono::Local::now().timestamp()));

        std::fs::rename(path, &backup_path)
            .map_err(|e| Error::Storage(format!("Failed to backup corrupted database: {}", e)))?;

        info!("Corrupted database backed up to {:?}", backup_path);

        std::fs::create_dir_all(path)
            .map_err(|e| Error::Storage(format!("Failed to create new database directory: {}", e)))?;

        Ok(())
    }

    /// Get a value from the database
    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf_index = self.get_column_index(cf_name)?;

        debug!("Reading from column {} with key length {}", cf_name, key.len());

        let result = self
            .db
            .get(cf_index, key)
            .map_err(|e| Error::Storage(format!("Failed to read from ParityDB: {}", e)))?;

        {
            let mut stats = self.stats.write();
            stats.total_reads += 1;
        }

        Ok(result)
    }

    /// Put a value in the database
    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf_index = self.get_column_index(cf_name)?;

        debug!(
            "Writing to column {} with key length {} and value length {}",
            cf_name,
            key.len(),
            value.len()
        );

        let tx = vec![(cf_index, key.to_vec(), Some(value.to_vec()))];

        self.db
            .commit(tx)
            .map_err(|e| Error::Storage(format!("Failed to write to ParityDB: {}", e)))?;

        {
            let mut stats = self.stats.write();
            stats.total_writes += 1;
            stats.total_bytes_written += value.len() as u64;
        }

        Ok(())
    }

    /// Delete a value from the database
    pub fn delete(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf_index = self.get_column_index(cf_name)?;

        debug!("Deleting from column {} with key length {}", cf_name, key.len());

        let tx = vec![(cf_index, key.to_vec(), None)];

        self.db
            .commit(tx)
            .map_err(|e| Error::Storage(format!("Failed to delete from ParityDB: {}", e)))?;

        {
            let mut stats = self.stats.write();
            stats.total_deletes += 1;
        }

        Ok(())
    }

    /// Batch write multiple key-value pairs atomically
    pub fn batch_write(&self, cf_name: &str, items: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        let cf_index = self.get_column_index(cf_name)?;

        debug!("Batch writing {} items to column {}", items.len(), cf_name);

        let tx: Vec<_> = items
            .iter()
            .map(|(k, v)| (cf_index, k.clone(), Some(v.clone())))
            .collect();

        self.db
            .commit(tx)
            .map_err(|e| Error::Storage(format!("Failed to batch write to ParityDB: {}", e)))?;

        {
            let mut stats = self.stats.write();
            stats.total_writes += items.len() as u64;
            stats.total_bytes_written += items.iter().map(|(_, v)| v.len()).sum::<usize>() as u64;
        }

        Ok(())
    }

    /// Check if a key exists in the database
    pub fn exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        Ok(self.get(cf_name, key)?.is_some())
    }

    /// Get database statistics
    pub fn get_stats(&self) -> DatabaseStatistics {
        let stats = self.stats.read();
        DatabaseStatistics {
            total_reads: stats.total_reads,
            total_writes: stats.total_writes,
            total_deletes: stats.total_deletes,
            total_bytes_written: stats.total_bytes_written,
            path: self.path.clone(),
            column_count: self.column_count,
        }
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get column family index from name
    fn get_column_index(&self, cf_name: &str) -> Result<u8> {
        COLUMN_FAMILIES
            .iter()
            .position(|&name| name == cf_name)
            .map(|idx| idx as u8)
            .ok_or_else(|| Error::Storage(format!("Column family '{}' not found", cf_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_get_delete_roundtrip() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = ParityDatabase::new(temp_dir.path()).expect("Failed to create database");

        db.put(CF_USERS, b"user:a", b"payload").expect("put failed");
        assert_eq!(
            db.get(CF_USERS, b"user:a").expect("get failed"),
            Some(b"payload".to_vec())
        );
        assert!(db.exists(CF_USERS, b"user:a").expect("exists failed"));

        db.delete(CF_USERS, b"user:a").expect("delete failed");
        assert_eq!(db.get(CF_USERS, b"user:a").expect("get failed"), None);
    }

    #[test]
    fn test_columns_are_isolated() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = ParityDatabase::new(temp_dir.path()).expect("Failed to create database");

        db.put(CF_USERS, b"key", b"user-data").expect("put failed");
        db.put(CF_SESSIONS, b"key", b"session-data").expect("put failed");

        assert_eq!(
            db.get(CF_USERS, b"key").expect("get failed"),
            Some(b"user-data".to_vec())
        );
        assert_eq!(
            db.get(CF_SESSIONS, b"key").expect("get failed"),
            Some(b"session-data".to_vec())
        );
    }

    #[test]
    fn test_unknown_column_family_is_storage_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = ParityDatabase::new(temp_dir.path()).expect("Failed to create database");

        let result = db.get("no_such_column", b"key");
        assert!(matches!(result, Err(Error::Storage(_))));
    }

    #[test]
    fn test_stats_count_operations() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = ParityDatabase::new(temp_dir.path()).expect("Failed to create database");

        db.put(CF_METADATA, b"k", b"v").expect("put failed");
        let _ = db.get(CF_METADATA, b"k").expect("get failed");

        let stats = db.get_stats();
        assert_eq!(stats.total_writes, 1);
        assert_eq!(stats.total_reads, 1);
        assert_eq!(stats.column_count, 6);
    }
}
