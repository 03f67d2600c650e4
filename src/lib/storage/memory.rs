use async_trait::async_trait;
use anyhow::Result;
use tokio::sync::Mutex;

use crate::core::JournalEntry;

use super::Storage;

/// Journal held in process memory. Survives ledger restarts within one process only.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<Vec<JournalEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if let Some(last) = entries.last() {
            anyhow::ensure!(
                entry.block_number > last.block_number,
                "block {} is not after block {}",
                entry.block_number,
                last.block_number
            );
        }
        entries.push(entry.clone());
        Ok(())
    }

    async fn entries_after(&self, block_number: u64) -> Result<Vec<JournalEntry>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter(|entry| entry.block_number > block_number)
            .cloned()
            .collect())
    }
}
