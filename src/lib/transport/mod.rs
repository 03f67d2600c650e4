pub mod tls;

pub use tls::*;

use async_trait::async_trait;

use crate::core::{Address, Call, Query, QueryOutput, Receipt, TxHash};

/// The remote call surface of a ledger, whether it runs in process or behind a socket.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn chain_id(&self) -> anyhow::Result<u64>;
    async fn deploy(&self, from: &Address) -> anyhow::Result<Address>;
    /// Returns as soon as the call is queued; the effect is not visible until its receipt exists.
    async fn send_transaction(&self, from: &Address, to: &Address, call: Call) -> anyhow::Result<TxHash>;
    async fn receipt(&self, tx_hash: &TxHash) -> anyhow::Result<Option<Receipt>>;
    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> anyhow::Result<Receipt>;
    async fn query(&self, to: &Address, query: Query) -> anyhow::Result<QueryOutput>;
}
