//! Configuration for the wallet gateway.
//!
//! A configuration file lists wallets, each with the adapter that speaks its
//! chain, the address to watch and the providers to talk to. Files may be
//! TOML, JSON or YAML and may reference environment variables as `${VAR}`.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::*;
