//! Deploying the todo list and publishing its address to clients.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{Address, Query};
use crate::transport::Transport;

#[cfg(feature = "tracing")]
use tracing::info;

pub const DEFAULT_ADDRESS_FILE: &str = "config/contract-address.json";

/// Contents of `contract-address.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    #[serde(rename = "TodoList")]
    pub todo_list: Address,
}

pub async fn deploy_todo_list(transport: &dyn Transport, deployer: &Address) -> Result<Address> {
    #[cfg(feature = "tracing")]
    info!(deployer = %deployer, "Deploying TodoList");
    let address = transport
        .deploy(deployer)
        .await
        .context("Failed to deploy TodoList")?;
    #[cfg(feature = "tracing")]
    info!(address = %address, "TodoList deployed");
    Ok(address)
}

/// Reuses the contract recorded in `path` if the ledger still hosts it, otherwise deploys a
/// new one and records that.
pub async fn deploy_or_reuse(transport: &dyn Transport, deployer: &Address, path: &Path) -> Result<Address> {
    if path.exists() {
        let recorded = load_addresses(path)?.todo_list;
        if transport.query(&recorded, Query::TodoCount).await.is_ok() {
            #[cfg(feature = "tracing")]
            info!(address = %recorded, "Reusing deployed TodoList");
            return Ok(recorded);
        }
    }
    let address = deploy_todo_list(transport, deployer).await?;
    save_addresses(path, &ContractAddresses { todo_list: address.clone() })?;
    Ok(address)
}

pub fn save_addresses(path: &Path, addresses: &ContractAddresses) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(addresses)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn load_addresses(path: &Path) -> Result<ContractAddresses> {
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Malformed contract address file {}", path.display()))
}
