use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use crate::adapters::{LedgerNode, WsConfig};
use crate::client::{ClientConfig, Filter, LedgerClient, TodoApp, TodoListContract};
use crate::core::{Address, Call, ClientError, Ledger, LedgerConfig, Query, QueryOutput, TodoRecord, TxStatus};
use crate::deployment::deploy_todo_list;
use crate::storage::{MemoryStorage, NoStorage, Storage};
use crate::transport::Transport;

async fn start_node<S: Storage + Send + Sync + 'static>(
    ledger: Ledger<S>,
) -> Result<(ClientConfig, JoinHandle<()>), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let node = LedgerNode::new(Arc::new(ledger), WsConfig::default());
    let server_handle = tokio::spawn(async move {
        node.serve_listener(listener).await.unwrap();
    });

    let config = ClientConfig {
        url: format!("ws://{addr}/ws"),
        reconnect_interval: Duration::from_millis(200),
        max_retries: 5,
    };
    Ok((config, server_handle))
}

async fn local_node() -> Result<(ClientConfig, JoinHandle<()>), Box<dyn std::error::Error>> {
    let ledger = Ledger::<NoStorage>::start(LedgerConfig::default(), None).await?;
    start_node(ledger).await
}

async fn contract_over_ws(
    config: &ClientConfig,
) -> Result<(Arc<dyn Transport>, TodoListContract), Box<dyn std::error::Error>> {
    let transport: Arc<dyn Transport> = Arc::new(LedgerClient::connect(config.clone()).await?);
    let account = Address::random();
    let address = deploy_todo_list(transport.as_ref(), &account).await?;
    let contract = TodoListContract::new(transport.clone(), address).connect(account);
    Ok((transport, contract))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_create_todo() -> Result<(), Box<dyn std::error::Error>> {
    let (config, server_handle) = local_node().await?;
    let (_, contract) = contract_over_ws(&config).await?;

    assert_eq!(contract.todo_count().await?, 0);
    contract.create_todo("Test todo").await?.wait().await?;

    let todo = contract.todos(1).await?;
    assert_eq!(todo.id, 1);
    assert_eq!(todo.content, "Test todo");
    assert!(!todo.completed);

    server_handle.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_toggle_completed() -> Result<(), Box<dyn std::error::Error>> {
    let (config, server_handle) = local_node().await?;
    let (_, contract) = contract_over_ws(&config).await?;

    contract.create_todo("Test todo").await?.wait().await?;
    contract.toggle_completed(1).await?.wait().await?;
    assert!(contract.todos(1).await?.completed);

    contract.toggle_completed(1).await?.wait().await?;
    assert!(!contract.todos(1).await?.completed);

    server_handle.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_delete_todo() -> Result<(), Box<dyn std::error::Error>> {
    let (config, server_handle) = local_node().await?;
    let (_, contract) = contract_over_ws(&config).await?;

    contract.create_todo("Test todo").await?.wait().await?;
    contract.delete_todo(1).await?.wait().await?;
    assert_eq!(contract.todos(1).await?, TodoRecord::zero());

    server_handle.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_todo_count() -> Result<(), Box<dyn std::error::Error>> {
    let (config, server_handle) = local_node().await?;
    let (_, contract) = contract_over_ws(&config).await?;

    assert_eq!(contract.todo_count().await?, 0);
    contract.create_todo("First todo").await?.wait().await?;
    assert_eq!(contract.todo_count().await?, 1);
    contract.create_todo("Second todo").await?.wait().await?;
    assert_eq!(contract.todo_count().await?, 2);

    // Deleting does not shrink the count.
    contract.delete_todo(1).await?.wait().await?;
    assert_eq!(contract.todo_count().await?, 2);

    server_handle.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_effect_hidden_until_confirmed() -> Result<(), Box<dyn std::error::Error>> {
    let ledger = Ledger::<NoStorage>::start(
        LedgerConfig { block_time: Duration::from_millis(300), ..Default::default() },
        None,
    )
    .await?;
    let (config, server_handle) = start_node(ledger).await?;
    let (transport, contract) = contract_over_ws(&config).await?;

    let pending = contract.create_todo("slow").await?;
    assert_eq!(transport.receipt(pending.tx_hash()).await?, None);
    assert_eq!(contract.todo_count().await?, 0);

    let receipt = pending.wait().await?;
    assert_eq!(receipt.status, TxStatus::Success);
    assert_eq!(contract.todo_count().await?, 1);

    server_handle.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_clients_get_distinct_ids() -> Result<(), Box<dyn std::error::Error>> {
    let (config, server_handle) = local_node().await?;
    let (_, first) = contract_over_ws(&config).await?;

    let second_transport: Arc<dyn Transport> = Arc::new(LedgerClient::connect(config.clone()).await?);
    let second = TodoListContract::new(second_transport, first.address().clone()).connect(Address::random());

    let (a, b) = tokio::join!(
        async { Ok::<_, ClientError>(first.create_todo("from first").await?.wait().await?) },
        async { Ok::<_, ClientError>(second.create_todo("from second").await?.wait().await?) },
    );
    let mut ids = vec![a?.output, b?.output];
    ids.sort();
    assert_eq!(ids, vec![Some(1), Some(2)]);
    assert_eq!(first.todo_count().await?, 2);

    server_handle.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_app_over_websocket() -> Result<(), Box<dyn std::error::Error>> {
    let (config, server_handle) = local_node().await?;
    let (_, contract) = contract_over_ws(&config).await?;

    let mut app = TodoApp::new();
    app.connect(contract).await?;
    app.add_todo("Buy milk").await?;
    app.add_todo("Write docs").await?;
    app.toggle_todo(1).await?;
    app.delete_todo(2).await?;
    app.add_todo("Ship it").await?;

    assert_eq!(app.total(), 2);
    let completed: Vec<u64> = app.filtered(Filter::Completed).iter().map(|t| t.id).collect();
    let active: Vec<u64> = app.filtered(Filter::Active).iter().map(|t| t.id).collect();
    assert_eq!(completed, vec![1]);
    assert_eq!(active, vec![3]);

    let err = app.toggle_todo(2).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { .. }));
    assert_eq!(app.total(), 2);

    server_handle.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_errors_and_bad_frames() -> Result<(), Box<dyn std::error::Error>> {
    let (config, server_handle) = local_node().await?;
    let client = LedgerClient::connect(config.clone()).await?;

    assert_eq!(client.chain_id().await?, 1337);
    let err = client.query(&Address::random(), Query::TodoCount).await.unwrap_err();
    assert!(err.to_string().contains("not found"));

    // A raw socket sending garbage gets an error frame back instead of a dropped connection.
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;
    let (mut raw, _) = tokio_tungstenite::connect_async(config.url.as_str()).await?;
    raw.send(Message::Text("{\"id\": 9, \"call\": {\"method\": \"mint\"}}".to_string())).await?;
    let reply = raw.next().await.ok_or("connection closed")??;
    let reply: serde_json::Value = serde_json::from_str(reply.to_text()?)?;
    assert_eq!(reply["id"], 9);
    assert!(reply["error"].as_str().unwrap_or_default().starts_with("Invalid request"));

    client.disconnect().await?;
    assert!(client.chain_id().await.is_err());

    server_handle.abort();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_state_survives_node_restart() -> Result<(), Box<dyn std::error::Error>> {
    let storage = Arc::new(MemoryStorage::new());

    let ledger = Ledger::start(LedgerConfig::default(), Some(storage.clone())).await?;
    let (config, server_handle) = start_node(ledger).await?;
    let (_, contract) = contract_over_ws(&config).await?;
    contract.create_todo("durable").await?.wait().await?;
    contract.toggle_completed(1).await?.wait().await?;
    let address = contract.address().clone();
    server_handle.abort();

    let restarted = Ledger::start(LedgerConfig::default(), Some(storage)).await?;
    let (config, server_handle) = start_node(restarted).await?;
    let client = LedgerClient::connect(config).await?;
    assert_eq!(
        client.query(&address, Query::Todos { id: 1 }).await?,
        QueryOutput::Todo(TodoRecord { id: 1, content: "durable".into(), completed: true })
    );

    let hash = client
        .send_transaction(&Address::random(), &address, Call::CreateTodo { content: "after restart".into() })
        .await?;
    assert_eq!(client.wait_for_receipt(&hash).await?.output, Some(2));

    server_handle.abort();
    Ok(())
}
