//! Wallet facade over the provider layer.
//!
//! A [`Wallet`] owns the registry of providers serving one address, an
//! optional signer holding its keys, and the push subscription for it.
//! [`WalletBuilder`] assembles wallets from configuration entries.

pub mod builder;
pub mod wallet;

pub use builder::WalletBuilder;
pub use wallet::Wallet;
