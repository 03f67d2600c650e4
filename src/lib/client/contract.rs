use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;

use crate::core::{Address, Call, ClientError, Query, QueryOutput, Receipt, TodoRecord, TxHash};
use crate::transport::Transport;

#[cfg(feature = "tracing")]
use tracing::debug;

/// Typed binding to one deployed todo list.
///
/// Reads work without an account. Mutations need a signer set with [`TodoListContract::connect`].
#[derive(Clone)]
pub struct TodoListContract {
    transport: Arc<dyn Transport>,
    address: Address,
    signer: Option<Address>,
}

impl fmt::Debug for TodoListContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TodoListContract")
            .field("address", &self.address)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl TodoListContract {
    pub fn new(transport: Arc<dyn Transport>, address: Address) -> Self {
        Self {
            transport,
            address,
            signer: None,
        }
    }

    /// Same contract, sending transactions from `signer`.
    pub fn connect(mut self, signer: Address) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn signer(&self) -> Option<&Address> {
        self.signer.as_ref()
    }

    pub async fn create_todo(&self, content: impl Into<String>) -> Result<PendingTransaction, ClientError> {
        self.send(Call::CreateTodo { content: content.into() }).await
    }

    pub async fn toggle_completed(&self, id: u64) -> Result<PendingTransaction, ClientError> {
        self.send(Call::ToggleCompleted { id }).await
    }

    pub async fn delete_todo(&self, id: u64) -> Result<PendingTransaction, ClientError> {
        self.send(Call::DeleteTodo { id }).await
    }

    pub async fn todos(&self, id: u64) -> Result<TodoRecord, ClientError> {
        match self.transport.query(&self.address, Query::Todos { id }).await? {
            QueryOutput::Todo(record) => Ok(record),
            other => Err(anyhow!("Unexpected output for todos({id}): {other:?}").into()),
        }
    }

    pub async fn todo_count(&self) -> Result<u64, ClientError> {
        match self.transport.query(&self.address, Query::TodoCount).await? {
            QueryOutput::Count(count) => Ok(count),
            other => Err(anyhow!("Unexpected output for todo_count: {other:?}").into()),
        }
    }

    async fn send(&self, call: Call) -> Result<PendingTransaction, ClientError> {
        let signer = self.signer.as_ref().ok_or(ClientError::NotConnected)?;
        let tx_hash = self.transport.send_transaction(signer, &self.address, call).await?;
        #[cfg(feature = "tracing")]
        debug!(tx_hash = %tx_hash, contract = %self.address, "Transaction sent");
        Ok(PendingTransaction {
            tx_hash,
            transport: self.transport.clone(),
        })
    }
}

/// A submitted transaction whose effect is not yet visible.
pub struct PendingTransaction {
    tx_hash: TxHash,
    transport: Arc<dyn Transport>,
}

impl PendingTransaction {
    pub fn tx_hash(&self) -> &TxHash {
        &self.tx_hash
    }

    /// Waits for confirmation. A reverted or dropped transaction is reported as rejected.
    pub async fn wait(self) -> Result<Receipt, ClientError> {
        let receipt = self.transport.wait_for_receipt(&self.tx_hash).await?;
        match receipt.failure() {
            None => Ok(receipt),
            Some(reason) => Err(ClientError::Rejected {
                tx_hash: self.tx_hash,
                reason: reason.to_string(),
            }),
        }
    }
}
