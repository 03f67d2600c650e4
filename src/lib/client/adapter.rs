//! In-memory todo list kept in step with a deployed contract.
//!
//! The list is always rebuilt from the ledger: after a mutation is confirmed
//! the adapter re-reads every slot from 1 to the current count rather than
//! patching its copy.

use std::fmt;
use std::str::FromStr;

use crate::client::contract::{PendingTransaction, TodoListContract};
use crate::core::{Address, ClientError, Receipt, TodoRecord};

#[cfg(feature = "tracing")]
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    pub fn matches(&self, todo: &TodoRecord) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !todo.completed,
            Filter::Completed => todo.completed,
        }
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Filter::All),
            "active" => Ok(Filter::Active),
            "completed" => Ok(Filter::Completed),
            other => Err(format!("unknown filter {other:?}, expected all, active or completed")),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Filter::All => "all",
            Filter::Active => "active",
            Filter::Completed => "completed",
        })
    }
}

#[derive(Debug, Default)]
pub struct TodoApp {
    contract: Option<TodoListContract>,
    todos: Vec<TodoRecord>,
    error: Option<String>,
}

impl TodoApp {
    /// A disconnected app; every remote operation fails with [`ClientError::NotConnected`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contract(contract: TodoListContract) -> Self {
        Self {
            contract: Some(contract),
            ..Self::default()
        }
    }

    /// Binds to a contract and loads its records.
    pub async fn connect(&mut self, contract: TodoListContract) -> Result<(), ClientError> {
        #[cfg(feature = "tracing")]
        info!(contract = %contract.address(), signer = ?contract.signer(), "Connected to todo list");
        self.contract = Some(contract);
        self.error = None;
        self.refresh().await
    }

    pub fn disconnect(&mut self) {
        self.contract = None;
        self.todos.clear();
        self.error = None;
    }

    pub fn is_connected(&self) -> bool {
        self.contract.is_some()
    }

    pub fn account(&self) -> Option<&Address> {
        self.contract.as_ref().and_then(TodoListContract::signer)
    }

    pub fn todos(&self) -> &[TodoRecord] {
        &self.todos
    }

    pub fn filtered(&self, filter: Filter) -> Vec<&TodoRecord> {
        self.todos.iter().filter(|todo| filter.matches(todo)).collect()
    }

    /// Live records currently held.
    pub fn total(&self) -> usize {
        self.todos.len()
    }

    /// Message of the last failed operation, cleared by the next successful refresh.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Re-reads every record. On failure the previous list is kept.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        let result = match &self.contract {
            Some(contract) => Self::fetch_all(contract).await,
            None => Err(ClientError::NotConnected),
        };

        match result {
            Ok(todos) => {
                self.todos = todos;
                self.error = None;
                Ok(())
            }
            Err(e) => Err(self.record_failure(e)),
        }
    }

    pub async fn add_todo(&mut self, content: &str) -> Result<Receipt, ClientError> {
        let result = match &self.contract {
            Some(contract) => Self::confirm(contract.create_todo(content).await).await,
            None => Err(ClientError::NotConnected),
        };
        self.after_mutation(result).await
    }

    pub async fn toggle_todo(&mut self, id: u64) -> Result<Receipt, ClientError> {
        let result = match &self.contract {
            Some(contract) => Self::confirm(contract.toggle_completed(id).await).await,
            None => Err(ClientError::NotConnected),
        };
        self.after_mutation(result).await
    }

    pub async fn delete_todo(&mut self, id: u64) -> Result<Receipt, ClientError> {
        let result = match &self.contract {
            Some(contract) => Self::confirm(contract.delete_todo(id).await).await,
            None => Err(ClientError::NotConnected),
        };
        self.after_mutation(result).await
    }

    async fn fetch_all(contract: &TodoListContract) -> Result<Vec<TodoRecord>, ClientError> {
        let count = contract.todo_count().await?;
        let mut todos = Vec::new();
        for id in 1..=count {
            let todo = contract.todos(id).await?;
            if !todo.is_zero() {
                todos.push(todo);
            }
        }
        Ok(todos)
    }

    async fn confirm(
        pending: Result<PendingTransaction, ClientError>,
    ) -> Result<Receipt, ClientError> {
        pending?.wait().await
    }

    /// A failed mutation leaves the list alone. A confirmed one triggers a full refresh whose
    /// failure is recorded but does not undo the reported success.
    async fn after_mutation(&mut self, result: Result<Receipt, ClientError>) -> Result<Receipt, ClientError> {
        let receipt = result.map_err(|e| self.record_failure(e))?;
        if let Err(_e) = self.refresh().await {
            #[cfg(feature = "tracing")]
            warn!(error = %_e, tx_hash = %receipt.tx_hash, "Refresh after confirmed transaction failed");
        }
        Ok(receipt)
    }

    fn record_failure(&mut self, error: ClientError) -> ClientError {
        #[cfg(feature = "tracing")]
        warn!(error = %error, "Todo operation failed");
        self.error = Some(error.to_string());
        error
    }
}
