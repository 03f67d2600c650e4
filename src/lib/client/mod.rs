pub mod adapter;
pub mod client;
pub mod contract;

pub use adapter::*;
pub use client::*;
pub use contract::*;
