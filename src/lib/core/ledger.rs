use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::core::{
    Action, Address, Call, ContractError, JournalEntry, LedgerError, Query, QueryOutput, Receipt,
    TodoList, TxHash, TxStatus,
};
use crate::storage::Storage;
use crate::transport::Transport;

#[cfg(feature = "tracing")]
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub chain_id: u64,
    /// Delay before each block is mined. Zero mines as soon as a transaction arrives.
    pub block_time: Duration,
    pub confirmation_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            chain_id: 1337,
            block_time: Duration::ZERO,
            confirmation_capacity: 1024,
        }
    }
}

#[derive(Default)]
struct WorldState {
    contracts: HashMap<Address, TodoList>,
    receipts: HashMap<TxHash, Receipt>,
    pending: HashSet<TxHash>,
    block_number: u64,
}

impl WorldState {
    /// Executes a journal entry against the state. Used both when mining and when replaying.
    fn apply(&mut self, entry: &JournalEntry) -> Receipt {
        let mut receipt = Receipt {
            tx_hash: entry.tx_hash.clone(),
            block_number: entry.block_number,
            from: entry.from.clone(),
            to: None,
            contract_address: None,
            timestamp: entry.timestamp,
            status: TxStatus::Success,
            output: None,
            logs: vec![],
        };

        match &entry.action {
            Action::Deploy { address } => {
                self.contracts.entry(address.clone()).or_default();
                receipt.contract_address = Some(address.clone());
            }
            Action::Call { to, call } => {
                receipt.to = Some(to.clone());
                let result = match self.contracts.get_mut(to) {
                    Some(contract) => contract.execute(call),
                    None => Err(ContractError::ContractNotFound(to.clone())),
                };
                match result {
                    Ok(execution) => {
                        receipt.output = execution.output;
                        receipt.logs = execution.logs;
                    }
                    Err(e) => {
                        receipt.status = TxStatus::Reverted { reason: e.to_string() };
                    }
                }
            }
        }

        self.block_number = entry.block_number;
        self.pending.remove(&entry.tx_hash);
        self.receipts.insert(entry.tx_hash.clone(), receipt.clone());
        receipt
    }
}

struct Submission {
    tx_hash: TxHash,
    from: Address,
    action: Action,
}

/// Hosts todo contracts and orders every state change through one sequencer task.
///
/// Transactions become visible to queries only once mined; `wait_for_receipt` is the
/// confirmation point.
pub struct Ledger<S: Storage + Send + Sync + 'static> {
    state: Arc<RwLock<WorldState>>,
    storage: Option<Arc<S>>,
    submissions: mpsc::UnboundedSender<Submission>,
    confirmations: broadcast::Sender<Receipt>,
    chain_id: u64,
}

impl<S: Storage + Send + Sync + 'static> Ledger<S> {
    /// Replays the storage journal, then starts mining.
    pub async fn start(config: LedgerConfig, storage: Option<Arc<S>>) -> anyhow::Result<Self> {
        let mut world = WorldState::default();
        if let Some(storage) = &storage {
            let entries = storage.entries_after(0).await?;
            #[cfg(feature = "tracing")]
            info!(entries = entries.len(), "Replaying ledger journal");
            for entry in &entries {
                world.apply(entry);
            }
        }

        let state = Arc::new(RwLock::new(world));
        let (submissions, rx) = mpsc::unbounded_channel();
        let (confirmations, _) = broadcast::channel(config.confirmation_capacity);

        let sequencer = Sequencer {
            state: state.clone(),
            storage: storage.clone(),
            confirmations: confirmations.clone(),
            block_time: config.block_time,
        };
        tokio::spawn(sequencer.run(rx));

        Ok(Self {
            state,
            storage,
            submissions,
            confirmations,
            chain_id: config.chain_id,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn storage(&self) -> Option<&Arc<S>> {
        self.storage.as_ref()
    }

    pub async fn block_number(&self) -> u64 {
        self.state.read().await.block_number
    }

    /// Deploys an empty todo list and waits for it to be mined.
    pub async fn deploy(&self, from: &Address) -> Result<Address, LedgerError> {
        let address = Address::random();
        let tx_hash = self
            .submit(from.clone(), Action::Deploy { address: address.clone() })
            .await?;
        let receipt = self.wait_for_receipt(&tx_hash).await?;
        match receipt.failure() {
            None => Ok(address),
            Some(reason) => Err(LedgerError::DeploymentFailed(reason.to_string())),
        }
    }

    /// Queues a call and returns its hash without waiting for it to be mined.
    pub async fn send_transaction(
        &self,
        from: &Address,
        to: &Address,
        call: Call,
    ) -> Result<TxHash, LedgerError> {
        self.submit(from.clone(), Action::Call { to: to.clone(), call }).await
    }

    pub async fn receipt(&self, tx_hash: &TxHash) -> Option<Receipt> {
        self.state.read().await.receipts.get(tx_hash).cloned()
    }

    /// Resolves once the transaction is mined. There is no timeout.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn wait_for_receipt(&self, tx_hash: &TxHash) -> Result<Receipt, LedgerError> {
        // Subscribe before looking at the table so a confirmation landing in between is not lost.
        let mut rx = self.confirmations.subscribe();
        {
            let state = self.state.read().await;
            if let Some(receipt) = state.receipts.get(tx_hash) {
                return Ok(receipt.clone());
            }
            if !state.pending.contains(tx_hash) {
                return Err(LedgerError::UnknownTransaction(tx_hash.clone()));
            }
        }

        loop {
            match rx.recv().await {
                Ok(receipt) if &receipt.tx_hash == tx_hash => return Ok(receipt),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_skipped)) => {
                    #[cfg(feature = "tracing")]
                    debug!(skipped = _skipped, "Confirmation stream lagged");
                    if let Some(receipt) = self.receipt(tx_hash).await {
                        return Ok(receipt);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return Err(LedgerError::Stopped),
            }
        }
    }

    pub async fn query(&self, to: &Address, query: Query) -> Result<QueryOutput, LedgerError> {
        let state = self.state.read().await;
        let contract = state
            .contracts
            .get(to)
            .ok_or_else(|| LedgerError::ContractNotFound(to.clone()))?;
        Ok(contract.query(&query))
    }

    /// Stream of every receipt as it is mined.
    pub fn subscribe(&self) -> broadcast::Receiver<Receipt> {
        self.confirmations.subscribe()
    }

    async fn submit(&self, from: Address, action: Action) -> Result<TxHash, LedgerError> {
        let tx_hash = TxHash::random();
        self.state.write().await.pending.insert(tx_hash.clone());
        let submission = Submission {
            tx_hash: tx_hash.clone(),
            from,
            action,
        };
        if self.submissions.send(submission).is_err() {
            self.state.write().await.pending.remove(&tx_hash);
            return Err(LedgerError::Stopped);
        }
        #[cfg(feature = "tracing")]
        debug!(tx_hash = %tx_hash, "Transaction queued");
        Ok(tx_hash)
    }
}

struct Sequencer<S: Storage + Send + Sync + 'static> {
    state: Arc<RwLock<WorldState>>,
    storage: Option<Arc<S>>,
    confirmations: broadcast::Sender<Receipt>,
    block_time: Duration,
}

impl<S: Storage + Send + Sync + 'static> Sequencer<S> {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Submission>) {
        while let Some(submission) = rx.recv().await {
            if !self.block_time.is_zero() {
                tokio::time::sleep(self.block_time).await;
            }
            let receipt = self.mine(submission).await;
            // No subscribers is fine; the receipt table has it.
            let _ = self.confirmations.send(receipt);
        }
        #[cfg(feature = "tracing")]
        info!("Ledger sequencer stopped");
    }

    async fn mine(&self, submission: Submission) -> Receipt {
        let mut state = self.state.write().await;
        let entry = JournalEntry {
            block_number: state.block_number + 1,
            tx_hash: submission.tx_hash,
            from: submission.from,
            timestamp: Utc::now().timestamp(),
            action: submission.action,
        };

        // Journal before applying, so nothing visible is ever missing from storage.
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.append(&entry).await {
                #[cfg(feature = "tracing")]
                warn!(error = %e, tx_hash = %entry.tx_hash, "Journal write failed; dropping transaction");
                let receipt = Receipt {
                    tx_hash: entry.tx_hash.clone(),
                    block_number: 0,
                    from: entry.from,
                    to: match &entry.action {
                        Action::Call { to, .. } => Some(to.clone()),
                        Action::Deploy { .. } => None,
                    },
                    contract_address: None,
                    timestamp: entry.timestamp,
                    status: TxStatus::Dropped {
                        reason: format!("journal write failed: {e}"),
                    },
                    output: None,
                    logs: vec![],
                };
                state.pending.remove(&entry.tx_hash);
                state.receipts.insert(entry.tx_hash, receipt.clone());
                return receipt;
            }
        }

        let receipt = state.apply(&entry);
        #[cfg(feature = "tracing")]
        debug!(block = receipt.block_number, tx_hash = %receipt.tx_hash, status = ?receipt.status, "Block mined");
        receipt
    }
}

#[async_trait]
impl<S: Storage + Send + Sync + 'static> Transport for Ledger<S> {
    async fn chain_id(&self) -> anyhow::Result<u64> {
        Ok(self.chain_id)
    }

    async fn deploy(&self, from: &Address) -> anyhow::Result<Address> {
        Ok(Ledger::deploy(self, from).await?)
    }

    async fn send_transaction(&self, from: &Address, to: &Address, call: Call) -> anyhow::Result<TxHash> {
        Ok(Ledger::send_transaction(self, from, to, call).await?)
    }

    async fn receipt(&self, tx_hash: &TxHash) -> anyhow::Result<Option<Receipt>> {
        Ok(Ledger::receipt(self, tx_hash).await)
    }

    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> anyhow::Result<Receipt> {
        Ok(Ledger::wait_for_receipt(self, tx_hash).await?)
    }

    async fn query(&self, to: &Address, query: Query) -> anyhow::Result<QueryOutput> {
        Ok(Ledger::query(self, to, query).await?)
    }
}
