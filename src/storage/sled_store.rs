// Sled-backed applied-transaction log
use crate::pool::AppliedTransaction;
use crate::primitives::{PoolError, Result};
use sled::{Db, Tree};
use std::path::Path;
use std::sync::Arc;

use super::PoolStore;

/// Sled storage with an `applied` tree keyed by big-endian sequence
pub struct SledPoolStore {
    db: Arc<Db>,
    applied_tree: Tree,
    metadata_tree: Tree,
}

impl SledPoolStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)
            .map_err(|e| PoolError::Storage(format!("Failed to create directory: {}", e)))?;

        let db = sled::open(path)
            .map_err(|e| PoolError::Storage(format!("Failed to open Sled database: {}", e)))?;
        let db = Arc::new(db);

        let applied_tree = db
            .open_tree("applied")
            .map_err(|e| PoolError::Storage(format!("Failed to open applied tree: {}", e)))?;
        let metadata_tree = db
            .open_tree("metadata")
            .map_err(|e| PoolError::Storage(format!("Failed to open metadata tree: {}", e)))?;

        Ok(Self {
            db,
            applied_tree,
            metadata_tree,
        })
    }

    /// Record by sequence number
    pub async fn get(&self, sequence: u64) -> Result<Option<AppliedTransaction>> {
        let applied_tree = self.applied_tree.clone();

        tokio::task::spawn_blocking(move || -> Result<Option<AppliedTransaction>> {
            match applied_tree.get(sequence.to_be_bytes()) {
                Ok(Some(data)) => Ok(Some(bincode::deserialize(&data)?)),
                Ok(None) => Ok(None),
                Err(e) => Err(PoolError::Storage(format!("Failed to get record: {}", e))),
            }
        })
        .await
        .map_err(|e| PoolError::Storage(format!("Task join error: {}", e)))?
    }

    /// Sync database to disk
    pub async fn sync(&self) -> Result<()> {
        let db = self.db.clone();

        tokio::task::spawn_blocking(move || {
            db.flush()
                .map_err(|e| PoolError::Storage(format!("Failed to sync database: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| PoolError::Storage(format!("Task join error: {}", e)))?
    }
}

#[async_trait::async_trait]
impl PoolStore for SledPoolStore {
    async fn append(&self, record: &AppliedTransaction) -> Result<()> {
        let applied_tree = self.applied_tree.clone();
        let sequence = record.sequence;
        let value = bincode::serialize(record)?;

        tokio::task::spawn_blocking(move || {
            let expected = applied_tree.len() as u64;
            if sequence != expected {
                return Err(PoolError::Storage(format!(
                    "Out-of-order append: expected sequence {}, got {}",
                    expected, sequence
                )));
            }
            applied_tree
                .insert(sequence.to_be_bytes(), value)
                .map_err(|e| PoolError::Storage(format!("Failed to append record: {}", e)))?;
            applied_tree
                .flush()
                .map_err(|e| PoolError::Storage(format!("Failed to flush record: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| PoolError::Storage(format!("Task join error: {}", e)))?
    }

    async fn truncate(&self, sequence: u64) -> Result<()> {
        let applied_tree = self.applied_tree.clone();

        tokio::task::spawn_blocking(move || {
            for key in applied_tree.range(sequence.to_be_bytes()..).keys() {
                let key = key.map_err(|e| PoolError::Storage(format!("Failed to read record key: {}", e)))?;
                applied_tree
                    .remove(key)
                    .map_err(|e| PoolError::Storage(format!("Failed to remove record: {}", e)))?;
            }
            applied_tree
                .flush()
                .map_err(|e| PoolError::Storage(format!("Failed to flush log: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| PoolError::Storage(format!("Task join error: {}", e)))?
    }

    async fn load_all(&self) -> Result<Vec<AppliedTransaction>> {
        let applied_tree = self.applied_tree.clone();

        tokio::task::spawn_blocking(move || {
            applied_tree
                .iter()
                .values()
                .map(|value| -> Result<AppliedTransaction> {
                    let value = value.map_err(|e| PoolError::Storage(format!("Failed to read record: {}", e)))?;
                    Ok(bincode::deserialize(&value)?)
                })
                .collect::<Result<Vec<_>>>()
        })
        .await
        .map_err(|e| PoolError::Storage(format!("Task join error: {}", e)))?
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.applied_tree.len() as u64)
    }

    async fn put_metadata(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let metadata_tree = self.metadata_tree.clone();
        let key_bytes = key.as_bytes().to_vec();

        tokio::task::spawn_blocking(move || {
            metadata_tree
                .insert(key_bytes, value)
                .map_err(|e| PoolError::Storage(format!("Failed to put metadata: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| PoolError::Storage(format!("Task join error: {}", e)))?
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let metadata_tree = self.metadata_tree.clone();
        let key_bytes = key.as_bytes().to_vec();

        tokio::task::spawn_blocking(move || match metadata_tree.get(key_bytes) {
            Ok(Some(data)) => Ok(Some(data.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(PoolError::Storage(format!("Failed to get metadata: {}", e))),
        })
        .await
        .map_err(|e| PoolError::Storage(format!("Task join error: {}", e)))?
    }
}
