use async_trait::async_trait;
use anyhow::Result;

use crate::core::JournalEntry;

use super::Storage;

/// Keeps nothing; a ledger using it starts empty every time.
pub struct NoStorage;

#[async_trait]
impl Storage for NoStorage {
    async fn append(&self, _entry: &JournalEntry) -> Result<()> {
        Ok(()) // No-op
    }

    async fn entries_after(&self, _block_number: u64) -> Result<Vec<JournalEntry>> {
        Ok(vec![]) // Nothing stored
    }
}
