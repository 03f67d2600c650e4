//! A decentralized to-do list.
//!
//! A [`crate::core::TodoList`] contract is hosted by a [`crate::core::Ledger`], which orders
//! every write through a single sequencer and journals it to [`storage`]. The
//! ledger is reachable in process or through a [`adapters::LedgerNode`]
//! WebSocket endpoint; either way clients talk to it through the
//! [`transport::Transport`] trait. [`client::TodoApp`] keeps the list a user
//! sees in step with the contract.

pub mod adapters;
pub mod client;
pub mod config;
pub mod core;
pub mod deployment;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod tests;
