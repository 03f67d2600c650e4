use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use futures::{SinkExt, StreamExt};
use futures::stream::SplitSink;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::core::{Ledger, LedgerError, RpcMethod, RpcRequest, RpcResponse, RpcResult};
use crate::storage::Storage;

#[cfg(feature = "tracing")]
use tracing::{debug, info, instrument, warn};

type WsSender = Arc<Mutex<SplitSink<WebSocket, AxumMessage>>>;

#[derive(Debug, Clone)]
pub struct WsConfig {
    pub route: String,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            route: "/ws".to_string(),
        }
    }
}

/// Serves a ledger's remote call surface over WebSocket.
pub struct LedgerNode<S: Storage + Send + Sync + 'static> {
    ledger: Arc<Ledger<S>>,
    config: WsConfig,
}

impl<S: Storage + Send + Sync + 'static> LedgerNode<S> {
    pub fn new(ledger: Arc<Ledger<S>>, config: WsConfig) -> Self {
        Self { ledger, config }
    }

    pub fn ledger(&self) -> &Arc<Ledger<S>> {
        &self.ledger
    }

    pub fn router(&self) -> Router {
        let ledger = self.ledger.clone();
        Router::new().route(
            &self.config.route,
            get(move |ws: WebSocketUpgrade| Self::handle_ws(ws, ledger.clone())),
        )
    }

    pub async fn serve(&self, addr: &str) -> Result<(), LedgerError> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener).await
    }

    /// Serves on an already bound listener; bind to port 0 to let the OS pick one.
    pub async fn serve_listener(&self, listener: TcpListener) -> Result<(), LedgerError> {
        #[cfg(feature = "tracing")]
        info!(addr = ?listener.local_addr().ok(), route = %self.config.route, "Ledger node listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    pub async fn serve_tls(&self, addr: SocketAddr, tls: RustlsConfig) -> Result<(), LedgerError> {
        #[cfg(feature = "tracing")]
        info!(addr = %addr, route = %self.config.route, "Ledger node listening with TLS");
        axum_server::bind_rustls(addr, tls)
            .serve(self.router().into_make_service())
            .await?;
        Ok(())
    }

    async fn handle_ws(ws: WebSocketUpgrade, ledger: Arc<Ledger<S>>) -> Response {
        ws.on_upgrade(move |socket| Self::handle_connection(socket, ledger))
    }

    #[cfg_attr(feature = "tracing", instrument(skip(socket, ledger)))]
    async fn handle_connection(socket: WebSocket, ledger: Arc<Ledger<S>>) {
        let (sender, mut receiver) = socket.split();
        let sender: WsSender = Arc::new(Mutex::new(sender));

        #[cfg(feature = "tracing")]
        info!("New WebSocket connection established");

        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(AxumMessage::Text(text)) => {
                    #[cfg(feature = "tracing")]
                    debug!(message = %text.as_str(), "Received WebSocket message");
                    match serde_json::from_str::<RpcRequest>(text.as_str()) {
                        Ok(request) => {
                            // Requests run concurrently; a pending wait must not block later queries.
                            let ledger = ledger.clone();
                            let sender = sender.clone();
                            tokio::spawn(async move {
                                let response = Self::dispatch(&ledger, request).await;
                                Self::reply(&sender, &response).await;
                            });
                        }
                        Err(e) => {
                            #[cfg(feature = "tracing")]
                            warn!(error = %e, message = %text.as_str(), "Failed to deserialize WebSocket message");
                            let id = serde_json::from_str::<Value>(text.as_str())
                                .ok()
                                .and_then(|value| value.get("id").and_then(Value::as_u64))
                                .unwrap_or(0);
                            Self::reply(&sender, &RpcResponse::err(id, format!("Invalid request: {e}"))).await;
                        }
                    }
                }
                Ok(AxumMessage::Close(_)) => {
                    #[cfg(feature = "tracing")]
                    info!("WebSocket connection closed");
                    break;
                }
                Ok(_) => continue,
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    warn!(error = %_e, "WebSocket message error");
                    break;
                }
            }
        }
    }

    async fn dispatch(ledger: &Ledger<S>, request: RpcRequest) -> RpcResponse {
        let id = request.id;
        match Self::execute(ledger, request.call).await {
            Ok(result) => RpcResponse::ok(id, result),
            Err(e) => {
                #[cfg(feature = "tracing")]
                debug!(id, error = %e, "Request failed");
                RpcResponse::err(id, e.to_string())
            }
        }
    }

    async fn execute(ledger: &Ledger<S>, method: RpcMethod) -> Result<RpcResult, LedgerError> {
        Ok(match method {
            RpcMethod::ChainId => RpcResult::ChainId(ledger.chain_id()),
            RpcMethod::Deploy { from } => RpcResult::Deployed(ledger.deploy(&from).await?),
            RpcMethod::SendTransaction { from, to, call } => {
                RpcResult::TxHash(ledger.send_transaction(&from, &to, call).await?)
            }
            RpcMethod::GetReceipt { tx_hash } => RpcResult::Receipt(ledger.receipt(&tx_hash).await),
            RpcMethod::WaitForReceipt { tx_hash } => {
                RpcResult::Confirmed(ledger.wait_for_receipt(&tx_hash).await?)
            }
            RpcMethod::Query { to, query } => RpcResult::Output(ledger.query(&to, query).await?),
        })
    }

    async fn reply(sender: &WsSender, response: &RpcResponse) {
        let json = match serde_json::to_string(response) {
            Ok(json) => json,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                warn!(error = %_e, "Failed to serialize response");
                return;
            }
        };
        if let Err(_e) = sender.lock().await.send(AxumMessage::Text(json.into())).await {
            #[cfg(feature = "tracing")]
            warn!(error = %_e, id = response.id, "Failed to send response; client gone");
        }
    }
}
