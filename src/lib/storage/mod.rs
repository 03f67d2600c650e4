pub mod dummy_storage;
pub mod memory;
#[cfg(feature = "storage")]
pub mod sqlite;

pub use dummy_storage::NoStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use crate::core::JournalEntry;

/// Append-only journal of mined transactions.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn append(&self, entry: &JournalEntry) -> anyhow::Result<()>;
    /// Entries with a block number greater than `block_number`, in block order.
    async fn entries_after(&self, block_number: u64) -> anyhow::Result<Vec<JournalEntry>>;
}
