pub mod error;
pub mod message;
pub mod contract;
pub mod ledger;
pub mod rpc;

pub use error::*;
pub use message::*;
pub use contract::*;
pub use ledger::*;
pub use rpc::*;
