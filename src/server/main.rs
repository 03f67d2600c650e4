use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use todo_ledger::adapters::LedgerNode;
use todo_ledger::config::NodeConfig;
use todo_ledger::core::{Address, Ledger};
use todo_ledger::deployment::deploy_or_reuse;
use todo_ledger::transport::configure_tls;

#[cfg(feature = "storage")]
use todo_ledger::storage::sqlite::SQLiteStorage as NodeStorage;
#[cfg(not(feature = "storage"))]
use todo_ledger::storage::NoStorage as NodeStorage;

#[cfg(feature = "storage")]
async fn open_storage(config: &NodeConfig) -> anyhow::Result<Option<Arc<NodeStorage>>> {
    match &config.db_path {
        Some(path) => Ok(Some(Arc::new(NodeStorage::new(path, config.max_db_connections).await?))),
        None => Ok(None),
    }
}

#[cfg(not(feature = "storage"))]
async fn open_storage(config: &NodeConfig) -> anyhow::Result<Option<Arc<NodeStorage>>> {
    anyhow::ensure!(
        config.db_path.is_none(),
        "TODO_LEDGER_DB is set but this binary was built without the `storage` feature"
    );
    Ok(None)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(feature = "tracing")]
    {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let config = NodeConfig::from_env()?;
    let storage = open_storage(&config).await?;
    let ledger = Arc::new(Ledger::start(config.ledger.clone(), storage).await?);

    let deployer = config.deployer.clone().unwrap_or_else(Address::random);
    let address = deploy_or_reuse(ledger.as_ref(), &deployer, &config.address_file).await?;
    println!("TodoList deployed at {address} (chain {})", ledger.chain_id());
    println!("Contract address saved to {}", config.address_file.display());

    let node = LedgerNode::new(ledger, config.ws.clone());
    match &config.tls {
        Some(paths) => {
            let tls = configure_tls(paths).await?;
            let addr: SocketAddr = config
                .addr
                .parse()
                .with_context(|| format!("Invalid listen address {}", config.addr))?;
            node.serve_tls(addr, tls).await?;
        }
        None => node.serve(&config.addr).await?,
    }
    Ok(())
}
