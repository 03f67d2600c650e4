use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage, MaybeTlsStream, WebSocketStream};

use crate::core::{Address, Call, Query, QueryOutput, Receipt, RpcMethod, RpcRequest, RpcResponse, RpcResult, TxHash};
use crate::transport::Transport;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingRequests = Arc<StdMutex<HashMap<u64, oneshot::Sender<RpcResponse>>>>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    pub reconnect_interval: Duration,
    /// Extra connection attempts after the first one fails.
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8545/ws".to_string(),
            reconnect_interval: Duration::from_millis(200),
            max_retries: 5,
        }
    }
}

/// WebSocket connection to a ledger node. Requests may be issued concurrently from shared references.
pub struct LedgerClient {
    sender: Mutex<SplitSink<WsConnection, WsMessage>>,
    pending: PendingRequests,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl LedgerClient {
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let mut attempts = 0;
        let ws_stream = loop {
            match connect_async(config.url.as_str()).await {
                Ok((ws_stream, _)) => break ws_stream,
                Err(_e) if attempts < config.max_retries => {
                    attempts += 1;
                    #[cfg(feature = "tracing")]
                    debug!(url = %config.url, attempt = attempts, error = %_e, "Connection failed, retrying");
                    tokio::time::sleep(config.reconnect_interval).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to connect to WebSocket server {}", config.url));
                }
            }
        };

        let (sender, receiver) = ws_stream.split();
        let pending = PendingRequests::default();
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(Self::read_responses(receiver, pending.clone(), closed.clone()));

        Ok(Self {
            sender: Mutex::new(sender),
            pending,
            closed,
            next_id: AtomicU64::new(1),
            reader,
        })
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.sender
            .lock()
            .await
            .close()
            .await
            .context("Failed to close WebSocket connection")
    }

    async fn request(&self, call: RpcMethod) -> Result<RpcResult> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&RpcRequest { id, call })?;

        let (tx, rx) = oneshot::channel();
        self.pending_requests().insert(id, tx);
        if self.closed.load(Ordering::SeqCst) {
            self.pending_requests().remove(&id);
            bail!("Connection to ledger node closed");
        }

        if let Err(e) = self.sender.lock().await.send(WsMessage::Text(frame)).await {
            self.pending_requests().remove(&id);
            return Err(e).context("Failed to send request");
        }

        let response = rx.await.context("Connection to ledger node closed")?;
        match (response.result, response.error) {
            (_, Some(error)) => Err(anyhow!(error)),
            (Some(result), None) => Ok(result),
            (None, None) => bail!("Empty response to request {id}"),
        }
    }

    fn pending_requests(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<RpcResponse>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn read_responses(
        mut receiver: SplitStream<WsConnection>,
        pending: PendingRequests,
        closed: Arc<AtomicBool>,
    ) {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => match serde_json::from_str::<RpcResponse>(&text) {
                    Ok(response) => {
                        let waiter = pending
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&response.id);
                        if let Some(waiter) = waiter {
                            let _ = waiter.send(response);
                        }
                    }
                    Err(_e) => {
                        #[cfg(feature = "tracing")]
                        warn!(error = %_e, "Failed to parse response");
                    }
                },
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => continue,
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    warn!(error = %_e, "WebSocket read error");
                    break;
                }
            }
        }
        closed.store(true, Ordering::SeqCst);
        // Dropping the senders fails every request still waiting.
        pending.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Drop for LedgerClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn unexpected(result: RpcResult) -> anyhow::Error {
    anyhow!("Unexpected response: {result:?}")
}

#[async_trait]
impl Transport for LedgerClient {
    async fn chain_id(&self) -> Result<u64> {
        match self.request(RpcMethod::ChainId).await? {
            RpcResult::ChainId(chain_id) => Ok(chain_id),
            other => Err(unexpected(other)),
        }
    }

    async fn deploy(&self, from: &Address) -> Result<Address> {
        match self.request(RpcMethod::Deploy { from: from.clone() }).await? {
            RpcResult::Deployed(address) => Ok(address),
            other => Err(unexpected(other)),
        }
    }

    async fn send_transaction(&self, from: &Address, to: &Address, call: Call) -> Result<TxHash> {
        let method = RpcMethod::SendTransaction {
            from: from.clone(),
            to: to.clone(),
            call,
        };
        match self.request(method).await? {
            RpcResult::TxHash(tx_hash) => Ok(tx_hash),
            other => Err(unexpected(other)),
        }
    }

    async fn receipt(&self, tx_hash: &TxHash) -> Result<Option<Receipt>> {
        match self.request(RpcMethod::GetReceipt { tx_hash: tx_hash.clone() }).await? {
            RpcResult::Receipt(receipt) => Ok(receipt),
            other => Err(unexpected(other)),
        }
    }

    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> Result<Receipt> {
        match self.request(RpcMethod::WaitForReceipt { tx_hash: tx_hash.clone() }).await? {
            RpcResult::Confirmed(receipt) => Ok(receipt),
            other => Err(unexpected(other)),
        }
    }

    async fn query(&self, to: &Address, query: Query) -> Result<QueryOutput> {
        match self.request(RpcMethod::Query { to: to.clone(), query }).await? {
            RpcResult::Output(output) => Ok(output),
            other => Err(unexpected(other)),
        }
    }
}
