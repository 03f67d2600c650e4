use thiserror::Error;

use crate::core::{Address, TxHash};

/// Revert reasons raised while executing a contract call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("Todo {0} does not exist")]
    TodoNotFound(u64),
    #[error("Contract {0} not found")]
    ContractNotFound(Address),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Contract {0} not found")]
    ContractNotFound(Address),
    #[error("Unknown transaction {0}")]
    UnknownTransaction(TxHash),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid transaction hash: {0}")]
    InvalidTxHash(String),
    #[error("Deployment failed: {0}")]
    DeploymentFailed(String),
    #[error("Ledger sequencer has stopped")]
    Stopped,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by the client side to whoever invoked the operation.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No contract binding or no signing account.
    #[error("Contract not initialized. Please reconnect your wallet.")]
    NotConnected,
    #[error("Transaction {tx_hash} was rejected: {reason}")]
    Rejected { tx_hash: TxHash, reason: String },
    #[error("Remote call failed: {0}")]
    Remote(#[from] anyhow::Error),
}
