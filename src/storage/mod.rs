// Storage layer: append-only log of applied transactions
pub mod sled_store;

pub use sled_store::*;

use crate::pool::{AppliedTransaction, LedgerState, PoolConfig};
use crate::primitives::Result;

/// Persistence for the applied-transaction log
#[async_trait::async_trait]
pub trait PoolStore: Send + Sync {
    /// Append the next record; sequences must be contiguous from zero
    async fn append(&self, record: &AppliedTransaction) -> Result<()>;

    /// Drop the record at `sequence` and every later one
    async fn truncate(&self, sequence: u64) -> Result<()>;

    /// All records in application order
    async fn load_all(&self) -> Result<Vec<AppliedTransaction>>;

    /// Number of records in the log
    async fn len(&self) -> Result<u64>;

    async fn put_metadata(&self, key: &str, value: Vec<u8>) -> Result<()>;

    async fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Rebuild accumulator and nullifier set by replaying the log
    async fn replay_state(&self, config: &PoolConfig) -> Result<LedgerState> {
        let records = self.load_all().await?;
        let state = LedgerState::replay(config, &records)?;
        tracing::info!(
            "🔁 Replayed {} transactions, root {}",
            state.sequence,
            state.tree.root()
        );
        Ok(state)
    }
}
