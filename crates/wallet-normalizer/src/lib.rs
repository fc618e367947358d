//! Converts raw provider payloads into canonical
//! [`Transaction`](wallet_types::Transaction) records.
//!
//! The generic value-flow rules live in [`flow`]; [`TransactionNormalizer`]
//! drives them with the per-field hooks of a
//! [`ChainAdapter`](wallet_types::ChainAdapter).

pub mod flow;
pub mod normalizer;

pub use flow::{account_flow, utxo_flow, Flow};
pub use normalizer::{merge_unique, sort_newest_first, NormalizeContext, TransactionNormalizer};
