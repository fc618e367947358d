//! Shared types for the wallet provider gateway.
//!
//! Everything the other crates agree on lives here: the error taxonomy, the
//! abstract operation names, the canonical transaction and balance records,
//! the request descriptor handed to the transport layer, and the
//! `ChainAdapter` contract implemented by per-chain strategies.

pub mod adapter;
pub mod balance;
pub mod errors;
pub mod events;
pub mod operations;
pub mod provider;
pub mod request;
pub mod signer;
pub mod transaction;
pub mod units;

pub use adapter::*;
pub use balance::*;
pub use errors::*;
pub use events::*;
pub use operations::*;
pub use provider::*;
pub use request::*;
pub use signer::*;
pub use transaction::*;
