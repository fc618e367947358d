//! The hook contract every chain-specific adapter implements.
//!
//! Adapters are pure strategy objects: they build request descriptors and
//! pull fields out of raw upstream payloads, nothing more. They hold no
//! shared mutable state, so one instance can serve any number of providers.
//!
//! Beyond the required hooks, a chain may offer optional capabilities
//! (latest height, cursor pagination, tokens, staking, push updates). The
//! core feature-detects these through the `Option` accessors at the bottom
//! of [`ChainAdapter`] instead of assuming they exist.

use crate::balance::{BalanceInfo, StakingInfo};
use crate::errors::Result;
use crate::events::WalletEvent;
use crate::operations::Operation;
use crate::request::{RequestDescriptor, TransportOptions};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Which slice of an address's history to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
	pub offset: u64,
	pub limit: u64,
	/// 1-based page number.
	pub page: u64,
	/// Continuation token for providers that paginate by cursor.
	pub cursor: Option<String>,
}

impl Default for PageRequest {
	fn default() -> Self {
		Self {
			offset: 0,
			limit: 50,
			page: 1,
			cursor: None,
		}
	}
}

impl PageRequest {
	pub fn first(limit: u64) -> Self {
		Self {
			limit,
			..Default::default()
		}
	}
}

/// One input or output of a UTXO transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoEntry {
	/// `None` for scripts without a standard address (OP_RETURN, coinbase).
	pub address: Option<String>,
	pub value: Decimal,
}

impl UtxoEntry {
	pub fn new(address: impl Into<String>, value: Decimal) -> Self {
		Self {
			address: Some(address.into()),
			value,
		}
	}
}

/// The value-flow facts of a raw transaction, in display units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferShape {
	Utxo {
		inputs: Vec<UtxoEntry>,
		outputs: Vec<UtxoEntry>,
	},
	Account {
		sender: String,
		recipient: String,
		value: Decimal,
	},
}

/// Per-chain strategy consumed by providers and the normalizer.
pub trait ChainAdapter: Send + Sync + fmt::Debug {
	/// Ticker of the parent coin, also the default wallet id and fee asset.
	fn ticker(&self) -> &str;

	/// Asset ids this wallet reports. Items for any other asset are treated
	/// as spam and dropped. An empty list allows everything.
	fn allowed_assets(&self) -> Vec<String> {
		Vec::new()
	}

	/// Transport options the adapter wants for an operation, such as
	/// statuses that mean "no data yet".
	fn transport_options(&self, _operation: Operation) -> TransportOptions {
		TransportOptions::default()
	}

	fn build_info_request(&self, base_url: &str, address: &str) -> Result<RequestDescriptor>;

	fn parse_info_response(&self, raw: &Value) -> Result<BalanceInfo>;

	fn build_transactions_request(
		&self,
		base_url: &str,
		address: &str,
		page: &PageRequest,
	) -> Result<RequestDescriptor>;

	/// Extracts the node holding the raw item list from a history response.
	fn parse_transactions_response(&self, raw: &Value) -> Result<Value>;

	fn build_send_request(&self, base_url: &str, raw_tx: &str) -> Result<RequestDescriptor>;

	/// Returns the hash of the broadcast transaction.
	fn parse_send_response(&self, raw: &Value) -> Result<String>;

	/// Spots a 200 response that is really an error (e.g. an embedded
	/// `status: "error"` field) and returns its message.
	fn detect_upstream_error(&self, _raw: &Value) -> Option<String> {
		None
	}

	fn tx_hash(&self, raw: &Value) -> Result<String>;

	fn tx_shape(&self, raw: &Value) -> Result<TransferShape>;

	fn tx_datetime(&self, raw: &Value) -> Result<DateTime<Utc>>;

	fn tx_fee(&self, raw: &Value) -> Result<Decimal>;

	/// Block height of the item, `None` while unconfirmed or on chains
	/// without heights.
	fn tx_height(&self, _raw: &Value) -> Option<u64> {
		None
	}

	fn tx_fee_asset(&self, _raw: &Value) -> String {
		self.ticker().to_string()
	}

	fn tx_wallet_id(&self, _raw: &Value) -> String {
		self.ticker().to_string()
	}

	fn tx_memo(&self, _raw: &Value) -> Option<String> {
		None
	}

	fn tx_nonce(&self, _raw: &Value) -> Option<u64> {
		None
	}

	/// `false` for contract-internal events, zero-value noise and other
	/// items that must not become transactions.
	fn is_transfer(&self, _raw: &Value) -> bool {
		true
	}

	/// Overrides the computed direction. Only honoured together with
	/// [`tx_value`](Self::tx_value).
	fn tx_direction(&self, _raw: &Value, _self_address: &str) -> Option<bool> {
		None
	}

	fn tx_other_side_address(&self, _raw: &Value, _self_address: &str) -> Option<String> {
		None
	}

	fn tx_value(&self, _raw: &Value, _self_address: &str) -> Option<Decimal> {
		None
	}

	fn tx_confirmations(&self, _raw: &Value, _latest_height: Option<u64>) -> Option<u64> {
		None
	}

	/// Confirmations reported on chains without a height concept.
	fn final_confirmations(&self) -> u64 {
		1
	}

	fn address_matches(&self, a: &str, b: &str) -> bool {
		a == b
	}

	fn height(&self) -> Option<&dyn HeightCapability> {
		None
	}

	fn pagination(&self) -> Option<&dyn CursorPagination> {
		None
	}

	fn tokens(&self) -> Option<&dyn TokenCapability> {
		None
	}

	fn staking(&self) -> Option<&dyn StakingCapability> {
		None
	}

	fn socket(&self) -> Option<&dyn SocketCapability> {
		None
	}
}

/// Latest block height, needed to turn item heights into confirmations.
pub trait HeightCapability: Send + Sync {
	fn build_height_request(&self, base_url: &str) -> Result<RequestDescriptor>;

	fn parse_height_response(&self, raw: &Value) -> Result<u64>;
}

/// Continuation-token pagination.
pub trait CursorPagination: Send + Sync {
	/// Token for the page after `raw`, `None` when there is no next page.
	fn next_cursor(&self, raw: &Value) -> Option<String>;
}

/// Token balances and token transfer history.
pub trait TokenCapability: Send + Sync {
	fn build_token_balance_request(
		&self,
		base_url: &str,
		address: &str,
		contract: &str,
	) -> Result<RequestDescriptor>;

	fn parse_token_balance_response(&self, raw: &Value, contract: &str) -> Result<Decimal>;

	/// History request for one token; the response is parsed with
	/// [`ChainAdapter::parse_transactions_response`] and the regular
	/// transaction hooks.
	fn build_token_transactions_request(
		&self,
		base_url: &str,
		address: &str,
		contract: &str,
		page: &PageRequest,
	) -> Result<RequestDescriptor>;
}

/// Staked amount, pending rewards and funds being unbonded.
pub trait StakingCapability: Send + Sync {
	fn build_staking_request(&self, base_url: &str, address: &str) -> Result<RequestDescriptor>;

	fn parse_staking_response(&self, raw: &Value) -> Result<StakingInfo>;
}

/// Push updates for an address.
pub trait SocketCapability: Send + Sync {
	fn poll_interval(&self) -> Duration;

	fn build_subscription_request(&self, base_url: &str, address: &str)
		-> Result<RequestDescriptor>;

	/// Current state of the address as events; the provider forwards only
	/// events it has not delivered before.
	fn parse_socket_events(&self, raw: &Value, wallet_id: &str) -> Result<Vec<WalletEvent>>;
}
