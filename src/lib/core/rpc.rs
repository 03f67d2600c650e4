//! JSON frames exchanged over the node's WebSocket.
//!
//! Each request carries a client-chosen `id` that is echoed in the response, so
//! several requests (a long `wait_for_receipt` among them) can be in flight on
//! one connection.

use serde::{Deserialize, Serialize};

use crate::core::{Address, Call, Query, QueryOutput, Receipt, TxHash};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub call: RpcMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RpcMethod {
    ChainId,
    Deploy { from: Address },
    SendTransaction { from: Address, to: Address, call: Call },
    GetReceipt { tx_hash: TxHash },
    WaitForReceipt { tx_hash: TxHash },
    Query { to: Address, query: Query },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcResult {
    ChainId(u64),
    Deployed(Address),
    TxHash(TxHash),
    Receipt(Option<Receipt>),
    Confirmed(Receipt),
    Output(QueryOutput),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RpcResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpcResponse {
    pub fn ok(id: u64, result: RpcResult) -> Self {
        Self { id, result: Some(result), error: None }
    }

    pub fn err(id: u64, error: impl Into<String>) -> Self {
        Self { id, result: None, error: Some(error.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_frame_layout() {
        let to: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
        let request = RpcRequest {
            id: 7,
            call: RpcMethod::Query { to: to.clone(), query: Query::Todos { id: 2 } },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({
                "id": 7,
                "call": {
                    "method": "query",
                    "to": "0x00000000000000000000000000000000000000aa",
                    "query": { "function": "todos", "id": 2 }
                }
            })
        );
        assert_eq!(serde_json::from_value::<RpcRequest>(json).unwrap(), request);
    }

    #[test]
    fn error_response_omits_result() {
        let json = serde_json::to_value(RpcResponse::err(3, "Contract not found")).unwrap();
        assert_eq!(json, json!({ "id": 3, "error": "Contract not found" }));

        let parsed: RpcResponse = serde_json::from_value(json!({ "id": 4, "result": { "output": { "count": 2 } } })).unwrap();
        assert_eq!(parsed, RpcResponse::ok(4, RpcResult::Output(QueryOutput::Count(2))));
    }
}
