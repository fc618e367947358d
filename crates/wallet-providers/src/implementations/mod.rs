//! Reference chain adapters.
//!
//! This module contains concrete implementations of the `ChainAdapter` trait
//! for two common explorer APIs:
//!
//! - **Blockbook**: UTXO chains (Bitcoin and forks) via the Blockbook v2 REST API
//! - **Etherscan**: account-model EVM chains via the Etherscan-compatible API
//!
//! Other chains plug in by implementing `ChainAdapter` outside this crate.

pub mod blockbook;
pub mod etherscan;

mod fields;

pub use blockbook::BlockbookAdapter;
pub use etherscan::EtherscanAdapter;
