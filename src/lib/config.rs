//! Node configuration, read from `TODO_LEDGER_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::adapters::WsConfig;
use crate::core::{Address, LedgerConfig};
use crate::deployment::DEFAULT_ADDRESS_FILE;
use crate::transport::TlsPaths;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Listen address, `host:port`.
    pub addr: String,
    pub ledger: LedgerConfig,
    /// SQLite journal path. Without one the ledger starts empty on every run.
    pub db_path: Option<String>,
    pub max_db_connections: u32,
    pub tls: Option<TlsPaths>,
    pub address_file: PathBuf,
    /// Account that deploys the contract; random when unset.
    pub deployer: Option<Address>,
    pub ws: WsConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8545".to_string(),
            ledger: LedgerConfig::default(),
            db_path: None,
            max_db_connections: 4,
            tls: None,
            address_file: PathBuf::from(DEFAULT_ADDRESS_FILE),
            deployer: None,
            ws: WsConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("TODO_LEDGER_ADDR") {
            config.addr = addr;
        }
        if let Some(chain_id) = parse::<u64>(&lookup, "TODO_LEDGER_CHAIN_ID")? {
            config.ledger.chain_id = chain_id;
        }
        if let Some(ms) = parse::<u64>(&lookup, "TODO_LEDGER_BLOCK_TIME_MS")? {
            config.ledger.block_time = Duration::from_millis(ms);
        }
        config.db_path = lookup("TODO_LEDGER_DB").filter(|path| !path.is_empty());
        if let Some(max) = parse::<u32>(&lookup, "TODO_LEDGER_DB_CONNECTIONS")? {
            config.max_db_connections = max;
        }
        if let Some(path) = lookup("TODO_LEDGER_ADDRESS_FILE") {
            config.address_file = PathBuf::from(path);
        }
        config.deployer = parse::<Address>(&lookup, "TODO_LEDGER_DEPLOYER")?;
        if let Some(route) = lookup("TODO_LEDGER_WS_ROUTE") {
            anyhow::ensure!(route.starts_with('/'), "TODO_LEDGER_WS_ROUTE must start with '/'");
            config.ws.route = route;
        }

        config.tls = match (lookup("TODO_LEDGER_TLS_CERT"), lookup("TODO_LEDGER_TLS_KEY")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => anyhow::bail!("TODO_LEDGER_TLS_CERT and TODO_LEDGER_TLS_KEY must be set together"),
        };

        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| raw.parse::<T>().with_context(|| format!("Invalid value {raw:?} for {key}")))
        .transpose()
}
