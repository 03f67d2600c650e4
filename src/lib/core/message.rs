use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{LedgerError, TodoRecord};

const ADDRESS_BYTES: usize = 20;
const TX_HASH_BYTES: usize = 32;

/// Account or contract address: `0x` followed by 40 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn random() -> Self {
        Self(random_hex(ADDRESS_BYTES))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0x1234…abcd` form used when showing a connected account.
    pub fn short(&self) -> String {
        format!("{}...{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s, ADDRESS_BYTES)
            .map(Self)
            .ok_or_else(|| LedgerError::InvalidAddress(s.to_string()))
    }
}

impl TryFrom<String> for Address {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction hash: `0x` followed by 64 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(String);

impl TxHash {
    pub fn random() -> Self {
        Self(random_hex(TX_HASH_BYTES))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TxHash {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s, TX_HASH_BYTES)
            .map(Self)
            .ok_or_else(|| LedgerError::InvalidTxHash(s.to_string()))
    }
}

impl TryFrom<String> for TxHash {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self {
        hash.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Random bytes drawn from v4 UUIDs, with their fixed version and variant bits refilled.
fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(len + 16);
    while bytes.len() < len {
        let mut chunk = Uuid::new_v4().into_bytes();
        let filler = Uuid::new_v4().into_bytes();
        chunk[6] = (chunk[6] & 0x0f) | (filler[0] & 0xf0);
        chunk[8] = (chunk[8] & 0x3f) | (filler[1] & 0xc0);
        bytes.extend_from_slice(&chunk);
    }
    bytes.truncate(len);
    bytes
}

fn random_hex(len: usize) -> String {
    let mut out = String::with_capacity(2 + len * 2);
    out.push_str("0x");
    for byte in random_bytes(len) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn parse_hex(s: &str, len: usize) -> Option<String> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    if digits.len() != len * 2 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", digits.to_ascii_lowercase()))
}

/// State-changing contract functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "snake_case")]
pub enum Call {
    CreateTodo { content: String },
    ToggleCompleted { id: u64 },
    DeleteTodo { id: u64 },
}

/// Read-only contract functions, answered from confirmed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "snake_case")]
pub enum Query {
    Todos { id: u64 },
    TodoCount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutput {
    Todo(TodoRecord),
    Count(u64),
}

/// Events emitted by the contract, attached to the receipt of the transaction that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Log {
    TodoCreated { id: u64, content: String },
    TodoToggled { id: u64, completed: bool },
    TodoDeleted { id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Success,
    Reverted { reason: String },
    /// Never included in a block; state is untouched.
    Dropped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    /// 0 for dropped transactions.
    pub block_number: u64,
    pub from: Address,
    pub to: Option<Address>,
    /// Set by deployments.
    pub contract_address: Option<Address>,
    pub timestamp: i64,
    pub status: TxStatus,
    /// Numeric return value of the call, e.g. the id assigned by `create_todo`.
    pub output: Option<u64>,
    pub logs: Vec<Log>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == TxStatus::Success
    }

    /// Failure reason for reverted or dropped transactions.
    pub fn failure(&self) -> Option<&str> {
        match &self.status {
            TxStatus::Success => None,
            TxStatus::Reverted { reason } | TxStatus::Dropped { reason } => Some(reason),
        }
    }
}

/// What a journaled transaction does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Deploy { address: Address },
    Call { to: Address, call: Call },
}

/// One mined transaction as written to storage. Replaying entries in block order rebuilds the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub block_number: u64,
    pub tx_hash: TxHash,
    pub from: Address,
    pub timestamp: i64,
    pub action: Action,
}
