//! Adapter-driven normalization of raw history payloads.

use crate::flow::{account_flow, utxo_flow, Flow};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};
use wallet_types::{ChainAdapter, Result, Transaction, TransferShape, WalletError};

/// Per-call facts the normalizer needs besides the raw items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeContext {
	pub self_address: String,
	pub latest_height: Option<u64>,
}

impl NormalizeContext {
	pub fn new(self_address: impl Into<String>) -> Self {
		Self {
			self_address: self_address.into(),
			latest_height: None,
		}
	}

	pub fn with_latest_height(mut self, height: Option<u64>) -> Self {
		self.latest_height = height;
		self
	}
}

/// Builds canonical transactions out of raw items using an adapter's hooks.
///
/// Stateless apart from the borrowed adapter; normalizing the same payload
/// twice yields equal output.
#[derive(Debug, Clone, Copy)]
pub struct TransactionNormalizer<'a> {
	adapter: &'a dyn ChainAdapter,
}

impl<'a> TransactionNormalizer<'a> {
	pub fn new(adapter: &'a dyn ChainAdapter) -> Self {
		Self { adapter }
	}

	/// Normalizes a JSON array of raw items.
	///
	/// Items the adapter does not consider transfers, or that belong to an
	/// asset outside its allowed list, are skipped. An item that fails to
	/// parse is dropped with a warning; the others still come through.
	pub fn normalize_many(&self, raw: &Value, ctx: &NormalizeContext) -> Result<Vec<Transaction>> {
		let items = raw.as_array().ok_or_else(|| {
			WalletError::upstream_data(format!(
				"Expected a list of transactions, got {}",
				json_kind(raw)
			))
		})?;

		let allowed = self.adapter.allowed_assets();
		let mut transactions = Vec::with_capacity(items.len());

		for (index, item) in items.iter().enumerate() {
			if !self.adapter.is_transfer(item) {
				debug!("Skipping item {} of {}: not a transfer", index, self.adapter.ticker());
				continue;
			}

			if !allowed.is_empty() {
				let wallet_id = self.adapter.tx_wallet_id(item);
				if !allowed.iter().any(|asset| asset == &wallet_id) {
					debug!("Skipping item {} for unlisted asset {}", index, wallet_id);
					continue;
				}
			}

			match self.normalize_one(item, ctx) {
				Ok(tx) => transactions.push(tx),
				Err(e) => warn!(
					"Dropping malformed {} transaction at index {}: {}",
					self.adapter.ticker(),
					index,
					e.message
				),
			}
		}

		Ok(transactions)
	}

	/// Normalizes a single raw item without any filtering.
	pub fn normalize_one(&self, item: &Value, ctx: &NormalizeContext) -> Result<Transaction> {
		let adapter = self.adapter;
		let self_address = ctx.self_address.as_str();

		let txid = adapter.tx_hash(item)?;
		let fee = adapter.tx_fee(item)?;
		let datetime = adapter.tx_datetime(item)?;

		// Direction and value only override the flow as a pair.
		let overridden = adapter
			.tx_direction(item, self_address)
			.zip(adapter.tx_value(item, self_address));
		let other_side = adapter.tx_other_side_address(item, self_address);

		let flow = match (overridden, &other_side) {
			(Some((direction, amount)), Some(_)) => Flow {
				direction,
				amount,
				counterparty: None,
			},
			_ => self.flow(item, fee, self_address)?,
		};
		let (direction, amount) = overridden.unwrap_or((flow.direction, flow.amount));

		let other_side_address = other_side
			.or(flow.counterparty)
			.filter(|address| !address.is_empty())
			.unwrap_or_else(|| self_address.to_string());

		Ok(Transaction {
			txid,
			wallet_id: adapter.tx_wallet_id(item),
			direction,
			other_side_address,
			amount,
			fee,
			fee_asset_id: adapter.tx_fee_asset(item),
			datetime,
			confirmations: self.confirmations(item, ctx.latest_height),
			memo: adapter.tx_memo(item),
			nonce: adapter.tx_nonce(item),
		})
	}

	fn flow(&self, item: &Value, fee: Decimal, self_address: &str) -> Result<Flow> {
		let matches = |a: &str, b: &str| self.adapter.address_matches(a, b);

		Ok(match self.adapter.tx_shape(item)? {
			TransferShape::Utxo { inputs, outputs } => {
				utxo_flow(&inputs, &outputs, fee, self_address, matches)
			}
			TransferShape::Account {
				sender,
				recipient,
				value,
			} => account_flow(&sender, &recipient, value, fee, self_address, matches),
		})
	}

	fn confirmations(&self, item: &Value, latest_height: Option<u64>) -> u64 {
		if let Some(confirmations) = self.adapter.tx_confirmations(item, latest_height) {
			return confirmations;
		}

		match (self.adapter.tx_height(item), latest_height) {
			(Some(height), Some(latest)) => latest.saturating_sub(height),
			(None, _) if self.adapter.height().is_some() => 0,
			_ => self.adapter.final_confirmations(),
		}
	}
}

/// Orders transactions newest first; equal timestamps fall back to txid so
/// the order is stable across calls.
pub fn sort_newest_first(transactions: &mut [Transaction]) {
	transactions.sort_by(|a, b| {
		b.datetime
			.cmp(&a.datetime)
			.then_with(|| a.txid.cmp(&b.txid))
	});
}

/// Appends the transactions of `incoming` whose txid is not already in
/// `existing`.
pub fn merge_unique(
	mut existing: Vec<Transaction>,
	incoming: Vec<Transaction>,
) -> Vec<Transaction> {
	let mut seen: HashSet<String> = existing.iter().map(|tx| tx.txid.clone()).collect();

	for tx in incoming {
		if seen.insert(tx.txid.clone()) {
			existing.push(tx);
		}
	}

	existing
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{DateTime, TimeZone, Utc};
	use serde_json::json;
	use std::str::FromStr;
	use wallet_types::units::parse_decimal;
	use wallet_types::{
		BalanceInfo, ErrorKind, HeightCapability, PageRequest, RequestDescriptor, UtxoEntry,
	};

	fn field<'v>(raw: &'v Value, name: &str) -> Result<&'v str> {
		raw.get(name)
			.and_then(Value::as_str)
			.ok_or_else(|| WalletError::upstream_data(format!("missing {}", name)))
	}

	fn entries(raw: &Value, name: &str) -> Result<Vec<UtxoEntry>> {
		raw.get(name)
			.and_then(Value::as_array)
			.ok_or_else(|| WalletError::upstream_data(format!("missing {}", name)))?
			.iter()
			.map(|e| {
				Ok(UtxoEntry {
					address: e.get("addr").and_then(Value::as_str).map(str::to_string),
					value: parse_decimal(field(e, "value")?)?,
				})
			})
			.collect()
	}

	/// Reads `{hash, time, fee, height?, vin: [{addr, value}], vout: [...]}`.
	#[derive(Debug, Default)]
	struct UtxoTestAdapter {
		with_heights: bool,
	}

	impl HeightCapability for UtxoTestAdapter {
		fn build_height_request(&self, base_url: &str) -> Result<RequestDescriptor> {
			Ok(RequestDescriptor::get(wallet_types::Operation::Node, base_url))
		}

		fn parse_height_response(&self, raw: &Value) -> Result<u64> {
			raw.as_u64().ok_or_else(|| WalletError::upstream_data("height"))
		}
	}

	impl ChainAdapter for UtxoTestAdapter {
		fn ticker(&self) -> &str {
			"BTC"
		}

		fn build_info_request(&self, base_url: &str, _address: &str) -> Result<RequestDescriptor> {
			Ok(RequestDescriptor::get(wallet_types::Operation::Balance, base_url))
		}

		fn parse_info_response(&self, _raw: &Value) -> Result<BalanceInfo> {
			Ok(BalanceInfo::zero())
		}

		fn build_transactions_request(
			&self,
			base_url: &str,
			_address: &str,
			_page: &PageRequest,
		) -> Result<RequestDescriptor> {
			Ok(RequestDescriptor::get(wallet_types::Operation::History, base_url))
		}

		fn parse_transactions_response(&self, raw: &Value) -> Result<Value> {
			Ok(raw.clone())
		}

		fn build_send_request(&self, base_url: &str, _raw_tx: &str) -> Result<RequestDescriptor> {
			Ok(RequestDescriptor::post(
				wallet_types::Operation::Send,
				base_url,
				Value::Null,
			))
		}

		fn parse_send_response(&self, raw: &Value) -> Result<String> {
			Ok(field(raw, "result")?.to_string())
		}

		fn tx_hash(&self, raw: &Value) -> Result<String> {
			Ok(field(raw, "hash")?.to_string())
		}

		fn tx_shape(&self, raw: &Value) -> Result<TransferShape> {
			Ok(TransferShape::Utxo {
				inputs: entries(raw, "vin")?,
				outputs: entries(raw, "vout")?,
			})
		}

		fn tx_datetime(&self, raw: &Value) -> Result<DateTime<Utc>> {
			let secs = raw
				.get("time")
				.and_then(Value::as_i64)
				.ok_or_else(|| WalletError::upstream_data("missing time"))?;
			Utc.timestamp_opt(secs, 0)
				.single()
				.ok_or_else(|| WalletError::upstream_data("bad time"))
		}

		fn tx_fee(&self, raw: &Value) -> Result<Decimal> {
			parse_decimal(field(raw, "fee")?)
		}

		fn tx_height(&self, raw: &Value) -> Option<u64> {
			raw.get("height").and_then(Value::as_u64)
		}

		fn is_transfer(&self, raw: &Value) -> bool {
			raw.get("internal").and_then(Value::as_bool) != Some(true)
		}

		fn height(&self) -> Option<&dyn HeightCapability> {
			if self.with_heights {
				Some(self as &dyn HeightCapability)
			} else {
				None
			}
		}
	}

	/// Account-model adapter with token filtering and overrides.
	#[derive(Debug)]
	struct AccountTestAdapter;

	impl ChainAdapter for AccountTestAdapter {
		fn ticker(&self) -> &str {
			"ETH"
		}

		fn allowed_assets(&self) -> Vec<String> {
			vec!["ETH".to_string(), "0xusdt".to_string()]
		}

		fn build_info_request(&self, base_url: &str, _address: &str) -> Result<RequestDescriptor> {
			Ok(RequestDescriptor::get(wallet_types::Operation::Balance, base_url))
		}

		fn parse_info_response(&self, _raw: &Value) -> Result<BalanceInfo> {
			Ok(BalanceInfo::zero())
		}

		fn build_transactions_request(
			&self,
			base_url: &str,
			_address: &str,
			_page: &PageRequest,
		) -> Result<RequestDescriptor> {
			Ok(RequestDescriptor::get(wallet_types::Operation::History, base_url))
		}

		fn parse_transactions_response(&self, raw: &Value) -> Result<Value> {
			Ok(raw.clone())
		}

		fn build_send_request(&self, base_url: &str, _raw_tx: &str) -> Result<RequestDescriptor> {
			Ok(RequestDescriptor::post(
				wallet_types::Operation::Send,
				base_url,
				Value::Null,
			))
		}

		fn parse_send_response(&self, raw: &Value) -> Result<String> {
			Ok(field(raw, "result")?.to_string())
		}

		fn tx_hash(&self, raw: &Value) -> Result<String> {
			Ok(field(raw, "hash")?.to_string())
		}

		fn tx_shape(&self, raw: &Value) -> Result<TransferShape> {
			Ok(TransferShape::Account {
				sender: field(raw, "from")?.to_string(),
				recipient: field(raw, "to")?.to_string(),
				value: parse_decimal(field(raw, "value")?)?,
			})
		}

		fn tx_datetime(&self, _raw: &Value) -> Result<DateTime<Utc>> {
			Ok(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
		}

		fn tx_fee(&self, raw: &Value) -> Result<Decimal> {
			parse_decimal(field(raw, "fee")?)
		}

		fn tx_wallet_id(&self, raw: &Value) -> String {
			raw.get("asset")
				.and_then(Value::as_str)
				.unwrap_or("ETH")
				.to_string()
		}

		fn tx_nonce(&self, raw: &Value) -> Option<u64> {
			raw.get("nonce").and_then(Value::as_u64)
		}

		fn tx_confirmations(&self, raw: &Value, _latest_height: Option<u64>) -> Option<u64> {
			raw.get("confirmations").and_then(Value::as_u64)
		}

		fn tx_direction(&self, raw: &Value, _self_address: &str) -> Option<bool> {
			raw.get("stakingReward").and_then(Value::as_bool).map(|_| true)
		}

		fn tx_value(&self, raw: &Value, _self_address: &str) -> Option<Decimal> {
			raw.get("reward")
				.and_then(Value::as_str)
				.and_then(|r| Decimal::from_str(r).ok())
		}

		fn final_confirmations(&self) -> u64 {
			12
		}

		fn address_matches(&self, a: &str, b: &str) -> bool {
			a.eq_ignore_ascii_case(b)
		}
	}

	fn utxo_item(hash: &str, time: i64, vin: Value, vout: Value) -> Value {
		json!({ "hash": hash, "time": time, "fee": "10", "vin": vin, "vout": vout })
	}

	#[test]
	fn test_outgoing_example() {
		let adapter = UtxoTestAdapter::default();
		let normalizer = TransactionNormalizer::new(&adapter);
		let item = utxo_item(
			"t1",
			1_700_000_000,
			json!([{ "addr": "A", "value": "100" }]),
			json!([{ "addr": "B", "value": "90" }]),
		);

		let tx = normalizer
			.normalize_one(&item, &NormalizeContext::new("A"))
			.unwrap();
		assert!(!tx.direction);
		assert_eq!(tx.amount, Decimal::from(90));
		assert_eq!(tx.other_side_address, "B");
		assert_eq!(tx.fee, Decimal::from(10));
		assert_eq!(tx.fee_asset_id, "BTC");
		assert_eq!(tx.wallet_id, "BTC");
		assert_eq!(tx.confirmations, 1);
	}

	#[test]
	fn test_self_transfer_is_outgoing_fee_only() {
		let adapter = UtxoTestAdapter::default();
		let normalizer = TransactionNormalizer::new(&adapter);
		let item = utxo_item(
			"t1",
			1_700_000_000,
			json!([{ "addr": "A", "value": "100" }]),
			json!([{ "addr": "A", "value": "90" }]),
		);

		let tx = normalizer
			.normalize_one(&item, &NormalizeContext::new("A"))
			.unwrap();
		assert!(!tx.direction);
		assert_eq!(tx.amount, tx.fee);
		assert_eq!(tx.other_side_address, "A");
	}

	#[test]
	fn test_malformed_item_is_dropped() {
		let adapter = UtxoTestAdapter::default();
		let normalizer = TransactionNormalizer::new(&adapter);
		let good = |hash: &str| {
			utxo_item(
				hash,
				1_700_000_000,
				json!([{ "addr": "B", "value": "5" }]),
				json!([{ "addr": "A", "value": "4" }]),
			)
		};
		let payload = json!([
			good("t1"),
			good("t2"),
			{ "hash": "t3", "time": "yesterday" },
			good("t4"),
			good("t5"),
		]);

		let txs = normalizer
			.normalize_many(&payload, &NormalizeContext::new("A"))
			.unwrap();
		let ids: Vec<_> = txs.iter().map(|tx| tx.txid.as_str()).collect();
		assert_eq!(ids, vec!["t1", "t2", "t4", "t5"]);
		assert!(txs.iter().all(|tx| tx.direction));
	}

	#[test]
	fn test_non_array_payload_is_upstream_error() {
		let adapter = UtxoTestAdapter::default();
		let normalizer = TransactionNormalizer::new(&adapter);

		let err = normalizer
			.normalize_many(&json!({ "message": "rate limited" }), &NormalizeContext::new("A"))
			.unwrap_err();
		assert_eq!(err.kind, ErrorKind::UpstreamDataError);
		assert!(err.message.contains("an object"));
	}

	#[test]
	fn test_non_transfers_are_filtered() {
		let adapter = UtxoTestAdapter::default();
		let normalizer = TransactionNormalizer::new(&adapter);
		let mut internal = utxo_item("t2", 1, json!([]), json!([]));
		internal["internal"] = json!(true);
		let payload = json!([
			utxo_item(
				"t1",
				1,
				json!([{ "addr": "B", "value": "1" }]),
				json!([{ "addr": "A", "value": "1" }])
			),
			internal,
		]);

		let txs = normalizer
			.normalize_many(&payload, &NormalizeContext::new("A"))
			.unwrap();
		assert_eq!(txs.len(), 1);
		assert_eq!(txs[0].txid, "t1");
	}

	#[test]
	fn test_confirmations_from_heights() {
		let adapter = UtxoTestAdapter { with_heights: true };
		let normalizer = TransactionNormalizer::new(&adapter);
		let ctx = NormalizeContext::new("A").with_latest_height(Some(110));

		let mut mined = utxo_item(
			"t1",
			1,
			json!([{ "addr": "B", "value": "1" }]),
			json!([{ "addr": "A", "value": "1" }]),
		);
		mined["height"] = json!(100);
		let pending = utxo_item(
			"t2",
			2,
			json!([{ "addr": "B", "value": "1" }]),
			json!([{ "addr": "A", "value": "1" }]),
		);
		let mut future = mined.clone();
		future["hash"] = json!("t3");
		future["height"] = json!(200);

		let txs = normalizer
			.normalize_many(&json!([mined, pending, future]), &ctx)
			.unwrap();
		assert_eq!(txs[0].confirmations, 10);
		assert_eq!(txs[1].confirmations, 0);
		assert_eq!(txs[2].confirmations, 0);
	}

	#[test]
	fn test_account_filtering_and_overrides() {
		let adapter = AccountTestAdapter;
		let normalizer = TransactionNormalizer::new(&adapter);
		let payload = json!([
			{ "hash": "e1", "from": "0xB", "to": "0xa", "value": "2", "fee": "0.01", "nonce": 7 },
			{ "hash": "e2", "from": "0xa", "to": "0xA", "value": "2", "fee": "0.01" },
			{
				"hash": "e3", "from": "0xa", "to": "0xc", "value": "1", "fee": "0.01",
				"asset": "0xspam"
			},
			{
				"hash": "e4", "from": "0xv", "to": "0xv", "value": "0", "fee": "0",
				"stakingReward": true, "reward": "0.5", "confirmations": 3
			},
			{
				"hash": "e5", "from": "0xa", "to": "", "value": "1", "fee": "0.01",
				"asset": "0xusdt"
			},
		]);

		let txs = normalizer
			.normalize_many(&payload, &NormalizeContext::new("0xa"))
			.unwrap();
		assert_eq!(txs.len(), 4);

		assert!(txs[0].direction);
		assert_eq!(txs[0].other_side_address, "0xB");
		assert_eq!(txs[0].nonce, Some(7));
		assert_eq!(txs[0].confirmations, 12);

		assert!(!txs[1].direction);
		assert_eq!(txs[1].amount, Decimal::from_str("0.01").unwrap());

		assert_eq!(txs[2].txid, "e4");
		assert!(txs[2].direction);
		assert_eq!(txs[2].amount, Decimal::from_str("0.5").unwrap());
		assert_eq!(txs[2].confirmations, 3);
		assert_eq!(txs[2].other_side_address, "0xv");

		assert_eq!(txs[3].wallet_id, "0xusdt");
		assert_eq!(txs[3].other_side_address, "0xa");
	}

	#[test]
	fn test_direction_override_without_value_keeps_flow() {
		let adapter = AccountTestAdapter;
		let normalizer = TransactionNormalizer::new(&adapter);
		let ctx = NormalizeContext::new("0xa");
		let plain =
			json!({ "hash": "e6", "from": "0xa", "to": "0xc", "value": "1", "fee": "0.01" });
		let mut flagged = plain.clone();
		flagged["stakingReward"] = json!(true);

		let expected = normalizer.normalize_one(&plain, &ctx).unwrap();
		let tx = normalizer.normalize_one(&flagged, &ctx).unwrap();
		assert!(!tx.direction);
		assert_eq!(tx.direction, expected.direction);
		assert_eq!(tx.amount, expected.amount);
	}

	#[test]
	fn test_normalization_is_idempotent() {
		let adapter = UtxoTestAdapter { with_heights: true };
		let normalizer = TransactionNormalizer::new(&adapter);
		let ctx = NormalizeContext::new("A").with_latest_height(Some(5));
		let payload = json!([
			utxo_item(
				"t1",
				1,
				json!([{ "addr": "A", "value": "3" }]),
				json!([{ "addr": "C", "value": "2" }]),
			),
			utxo_item(
				"t2",
				2,
				json!([{ "addr": "C", "value": "3" }]),
				json!([{ "addr": "A", "value": "2" }]),
			),
		]);

		let first = normalizer.normalize_many(&payload, &ctx).unwrap();
		let second = normalizer.normalize_many(&payload, &ctx).unwrap();
		assert_eq!(first, second);
	}

	#[test]
	fn test_sort_and_merge() {
		let adapter = UtxoTestAdapter::default();
		let normalizer = TransactionNormalizer::new(&adapter);
		let ctx = NormalizeContext::new("A");
		let item = |hash: &str, time: i64| {
			utxo_item(
				hash,
				time,
				json!([{ "addr": "B", "value": "1" }]),
				json!([{ "addr": "A", "value": "1" }]),
			)
		};

		let page_one = normalizer
			.normalize_many(&json!([item("a", 10), item("b", 30)]), &ctx)
			.unwrap();
		let page_two = normalizer
			.normalize_many(&json!([item("b", 30), item("c", 20)]), &ctx)
			.unwrap();

		let mut merged = merge_unique(page_one, page_two);
		assert_eq!(merged.len(), 3);

		sort_newest_first(&mut merged);
		let ids: Vec<_> = merged.iter().map(|tx| tx.txid.as_str()).collect();
		assert_eq!(ids, vec!["b", "c", "a"]);
	}
}
