//! Canonical chain-agnostic transaction record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A normalized transaction as seen from one wallet address.
///
/// Produced by the normalizer and handed to callers, who own it afterwards.
/// Serializes as a flat camelCase mapping with decimals rendered as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
	/// Provider-defined hash; unique per (chain, asset).
	pub txid: String,
	/// Asset/account the transaction belongs to (coin ticker or token contract).
	pub wallet_id: String,
	/// `true` when the queried address received value.
	pub direction: bool,
	/// Best-effort counterparty, the queried address itself when unknown.
	pub other_side_address: String,
	/// Magnitude in display units. Outgoing amounts are fee-adjusted and
	/// self-transfers carry the fee only.
	pub amount: Decimal,
	pub fee: Decimal,
	pub fee_asset_id: String,
	pub datetime: DateTime<Utc>,
	pub confirmations: u64,
	pub memo: Option<String>,
	pub nonce: Option<u64>,
}

impl Transaction {
	pub fn is_incoming(&self) -> bool {
		self.direction
	}

	pub fn is_outgoing(&self) -> bool {
		!self.direction
	}
}
