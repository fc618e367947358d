//! Providers and the registry that routes wallet operations to them.
//!
//! A wallet is configured with one default provider and any number of
//! per-operation overrides. Each [`Provider`] exposes the same uniform
//! operations (balance, history, broadcast, tokens, staking, push updates)
//! and delegates the chain-specific parts to a
//! [`ChainAdapter`](wallet_types::ChainAdapter).

pub mod implementations;
pub mod pagination;
pub mod provider;
pub mod registry;
pub mod socket;

pub use pagination::{PaginationCursor, Throttle};
pub use provider::{Provider, ProviderOptions, DEFAULT_PAGE_SIZE};
pub use registry::ProviderRegistry;
pub use socket::SocketHandle;
