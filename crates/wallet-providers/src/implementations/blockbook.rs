//! Blockbook v2 adapter for UTXO chains.
//!
//! Amounts are reported in base units (satoshi) as strings. Unknown
//! addresses answer 404 on some deployments, which maps to an empty result.

use super::fields::{object, opt_u64_field, str_field};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Duration;
use wallet_types::units::from_base_units;
use wallet_types::{
	BalanceInfo, ChainAdapter, HeightCapability, Operation, PageRequest, RequestDescriptor, Result,
	SocketCapability, TransferShape, TransportOptions, UtxoEntry, WalletError, WalletEvent,
};

const DEFAULT_DECIMALS: u32 = 8;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const SUBSCRIPTION_PAGE_SIZE: u64 = 25;

#[derive(Debug, Clone)]
pub struct BlockbookAdapter {
	ticker: String,
	decimals: u32,
	poll_interval: Duration,
}

impl BlockbookAdapter {
	pub fn new(ticker: impl Into<String>) -> Self {
		Self {
			ticker: ticker.into(),
			decimals: DEFAULT_DECIMALS,
			poll_interval: DEFAULT_POLL_INTERVAL,
		}
	}

	pub fn with_decimals(mut self, decimals: u32) -> Self {
		self.decimals = decimals;
		self
	}

	pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
		self.poll_interval = poll_interval;
		self
	}

	fn amount(&self, raw: &str) -> Result<Decimal> {
		from_base_units(raw, self.decimals)
	}

	fn address_request(
		&self,
		operation: Operation,
		base_url: &str,
		address: &str,
	) -> RequestDescriptor {
		RequestDescriptor::get(operation, format!("{}/api/v2/address/{}", base_url, address))
	}

	fn entries(&self, raw: &Value, side: &str) -> Result<Vec<UtxoEntry>> {
		let Some(entries) = raw.get(side) else {
			return Ok(Vec::new());
		};
		let entries = entries
			.as_array()
			.ok_or_else(|| WalletError::upstream_data(format!("'{}' is not a list", side)))?;

		entries
			.iter()
			.map(|entry| {
				let value = match entry.get("value").and_then(Value::as_str) {
					Some(value) => self.amount(value)?,
					None => Decimal::ZERO,
				};
				let is_address = entry.get("isAddress").and_then(Value::as_bool) != Some(false);
				let address = entry
					.get("addresses")
					.and_then(Value::as_array)
					.and_then(|addresses| addresses.first())
					.and_then(Value::as_str)
					.filter(|_| is_address)
					.map(str::to_string);

				Ok(UtxoEntry { address, value })
			})
			.collect()
	}
}

impl ChainAdapter for BlockbookAdapter {
	fn ticker(&self) -> &str {
		&self.ticker
	}

	fn transport_options(&self, operation: Operation) -> TransportOptions {
		let mut options = TransportOptions::default();
		if matches!(
			operation,
			Operation::Balance | Operation::History | Operation::Socket
		) {
			options.empty_on_status = vec![404];
		}
		options
	}

	fn build_info_request(&self, base_url: &str, address: &str) -> Result<RequestDescriptor> {
		Ok(self
			.address_request(Operation::Balance, base_url, address)
			.with_param("details", "basic"))
	}

	fn parse_info_response(&self, raw: &Value) -> Result<BalanceInfo> {
		let balance = self.amount(str_field(raw, "balance")?)?;
		let mut info = BalanceInfo::new(balance);

		if let Some(unconfirmed) = raw.get("unconfirmedBalance").and_then(Value::as_str) {
			info = info.with_unconfirmed(self.amount(unconfirmed)?);
		}

		Ok(info)
	}

	fn build_transactions_request(
		&self,
		base_url: &str,
		address: &str,
		page: &PageRequest,
	) -> Result<RequestDescriptor> {
		Ok(self
			.address_request(Operation::History, base_url, address)
			.with_param("details", "txs")
			.with_param("page", page.page)
			.with_param("pageSize", page.limit))
	}

	fn parse_transactions_response(&self, raw: &Value) -> Result<Value> {
		let body = object(raw, "address history")?;
		Ok(body
			.get("transactions")
			.cloned()
			.unwrap_or_else(|| Value::Array(Vec::new())))
	}

	fn build_send_request(&self, base_url: &str, raw_tx: &str) -> Result<RequestDescriptor> {
		if raw_tx.trim().is_empty() {
			return Err(WalletError::invariant("Refusing to broadcast an empty transaction")
				.with_operation(Operation::Send));
		}
		Ok(RequestDescriptor::get(
			Operation::Send,
			format!("{}/api/v2/sendtx/{}", base_url, raw_tx.trim()),
		))
	}

	fn parse_send_response(&self, raw: &Value) -> Result<String> {
		Ok(str_field(raw, "result")?.to_string())
	}

	fn detect_upstream_error(&self, raw: &Value) -> Option<String> {
		match raw.get("error")? {
			Value::String(message) => Some(message.clone()),
			Value::Object(error) => Some(
				error
					.get("message")
					.and_then(Value::as_str)
					.unwrap_or("unknown error")
					.to_string(),
			),
			_ => None,
		}
	}

	fn tx_hash(&self, raw: &Value) -> Result<String> {
		Ok(str_field(raw, "txid")?.to_string())
	}

	fn tx_shape(&self, raw: &Value) -> Result<TransferShape> {
		Ok(TransferShape::Utxo {
			inputs: self.entries(raw, "vin")?,
			outputs: self.entries(raw, "vout")?,
		})
	}

	fn tx_datetime(&self, raw: &Value) -> Result<DateTime<Utc>> {
		let seconds = raw
			.get("blockTime")
			.and_then(Value::as_i64)
			.ok_or_else(|| WalletError::upstream_data("Missing 'blockTime'"))?;
		Utc.timestamp_opt(seconds, 0)
			.single()
			.ok_or_else(|| WalletError::upstream_data(format!("Invalid block time {}", seconds)))
	}

	fn tx_fee(&self, raw: &Value) -> Result<Decimal> {
		match raw.get("fees").and_then(Value::as_str) {
			Some(fees) => self.amount(fees),
			None => Ok(Decimal::ZERO),
		}
	}

	/// Mempool transactions report a height of 0 or -1.
	fn tx_height(&self, raw: &Value) -> Option<u64> {
		opt_u64_field(raw, "blockHeight").filter(|height| *height > 0)
	}

	fn height(&self) -> Option<&dyn HeightCapability> {
		Some(self)
	}

	fn socket(&self) -> Option<&dyn SocketCapability> {
		Some(self)
	}
}

impl HeightCapability for BlockbookAdapter {
	fn build_height_request(&self, base_url: &str) -> Result<RequestDescriptor> {
		Ok(RequestDescriptor::get(Operation::Node, format!("{}/api/v2", base_url)))
	}

	fn parse_height_response(&self, raw: &Value) -> Result<u64> {
		raw.get("blockbook")
			.and_then(|status| opt_u64_field(status, "bestHeight"))
			.or_else(|| raw.get("backend").and_then(|b| opt_u64_field(b, "blocks")))
			.ok_or_else(|| WalletError::upstream_data("Status response carries no block height"))
	}
}

impl SocketCapability for BlockbookAdapter {
	fn poll_interval(&self) -> Duration {
		self.poll_interval
	}

	fn build_subscription_request(
		&self,
		base_url: &str,
		address: &str,
	) -> Result<RequestDescriptor> {
		Ok(self
			.address_request(Operation::Socket, base_url, address)
			.with_param("details", "txids")
			.with_param("pageSize", SUBSCRIPTION_PAGE_SIZE))
	}

	fn parse_socket_events(&self, raw: &Value, wallet_id: &str) -> Result<Vec<WalletEvent>> {
		let mut events = vec![WalletEvent::BalanceChanged {
			wallet_id: wallet_id.to_string(),
			balance: self.parse_info_response(raw)?,
		}];

		let txids = raw
			.get("txids")
			.and_then(Value::as_array)
			.map(Vec::as_slice)
			.unwrap_or_default();

		// Oldest first, so subscribers see transactions in arrival order.
		events.extend(txids.iter().rev().filter_map(Value::as_str).map(|txid| {
			WalletEvent::TransactionSeen {
				wallet_id: wallet_id.to_string(),
				txid: txid.to_string(),
			}
		}));

		Ok(events)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provider::Provider;
	use serde_json::json;
	use std::str::FromStr;
	use std::sync::Arc;
	use wallet_normalizer::{NormalizeContext, TransactionNormalizer};
	use wallet_transport::ReqwestTransport;
	use wallet_types::ProviderConfig;
	use wiremock::matchers::{method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	const ME: &str = "bc1qme";

	fn history_fixture() -> Value {
		json!({
			"page": 1,
			"totalPages": 1,
			"itemsOnPage": 50,
			"address": ME,
			"balance": "150000",
			"transactions": [
				{
					"txid": "aa01",
					"vin": [{ "addresses": ["bc1qthem"], "isAddress": true, "value": "200000" }],
					"vout": [
						{ "addresses": [ME], "isAddress": true, "value": "150000" },
						{ "addresses": ["bc1qthem"], "isAddress": true, "value": "49000" }
					],
					"blockHeight": 800000,
					"confirmations": 11,
					"blockTime": 1700000000,
					"fees": "1000"
				},
				{
					"txid": "aa02",
					"vin": [{ "addresses": [ME], "isAddress": true, "value": "150000" }],
					"vout": [
						{ "addresses": [ME], "isAddress": true, "value": "149000" },
						{ "isAddress": false, "value": "0" }
					],
					"blockHeight": -1,
					"confirmations": 0,
					"blockTime": 1700000600,
					"fees": "1000"
				}
			]
		})
	}

	#[test]
	fn test_parse_info() {
		let adapter = BlockbookAdapter::new("BTC");
		let info = adapter
			.parse_info_response(&json!({
				"address": ME,
				"balance": "123456789",
				"unconfirmedBalance": "-1000",
				"txs": 3
			}))
			.unwrap();
		assert_eq!(info.balance, Decimal::from_str("1.23456789").unwrap());
		assert_eq!(info.unconfirmed_balance, Some(Decimal::from_str("-0.00001").unwrap()));
	}

	#[test]
	fn test_history_request_shape() {
		let adapter = BlockbookAdapter::new("BTC");
		let descriptor = adapter
			.build_transactions_request("https://btc.example", ME, &PageRequest {
				page: 3,
				limit: 20,
				..Default::default()
			})
			.unwrap();
		assert_eq!(descriptor.url, format!("https://btc.example/api/v2/address/{}", ME));
		assert_eq!(descriptor.params.get("page").map(String::as_str), Some("3"));
		assert_eq!(descriptor.params.get("pageSize").map(String::as_str), Some("20"));
		assert_eq!(descriptor.operation, Operation::History);
	}

	#[test]
	fn test_normalize_history() {
		let adapter = BlockbookAdapter::new("BTC");
		let items = adapter.parse_transactions_response(&history_fixture()).unwrap();
		let ctx = NormalizeContext::new(ME).with_latest_height(Some(800010));

		let txs = TransactionNormalizer::new(&adapter)
			.normalize_many(&items, &ctx)
			.unwrap();
		assert_eq!(txs.len(), 2);

		let received = &txs[0];
		assert!(received.direction);
		assert_eq!(received.amount, Decimal::from_str("0.0015").unwrap());
		assert_eq!(received.other_side_address, "bc1qthem");
		assert_eq!(received.confirmations, 10);
		assert_eq!(received.fee, Decimal::from_str("0.00001").unwrap());

		let consolidation = &txs[1];
		assert!(!consolidation.direction);
		assert_eq!(consolidation.amount, Decimal::ZERO);
		assert_eq!(consolidation.confirmations, 0);
		assert_eq!(consolidation.other_side_address, ME);
	}

	#[test]
	fn test_address_without_history() {
		let adapter = BlockbookAdapter::new("BTC");
		let items = adapter
			.parse_transactions_response(&json!({ "address": ME, "balance": "0", "txs": 0 }))
			.unwrap();
		assert_eq!(items, json!([]));
	}

	#[test]
	fn test_embedded_error() {
		let adapter = BlockbookAdapter::new("BTC");
		assert_eq!(
			adapter.detect_upstream_error(&json!({ "error": "Invalid address" })),
			Some("Invalid address".to_string())
		);
		assert_eq!(adapter.detect_upstream_error(&json!({ "result": "ab" })), None);
	}

	#[test]
	fn test_best_height() {
		let adapter = BlockbookAdapter::new("BTC");
		let height = adapter
			.parse_height_response(&json!({
				"blockbook": { "coin": "Bitcoin", "bestHeight": 812345 },
				"backend": { "blocks": 812344 }
			}))
			.unwrap();
		assert_eq!(height, 812345);
	}

	#[test]
	fn test_socket_events() {
		let adapter = BlockbookAdapter::new("BTC");
		let events = adapter
			.parse_socket_events(
				&json!({ "balance": "100", "txids": ["new", "old"] }),
				"BTC",
			)
			.unwrap();
		assert_eq!(events.len(), 3);
		assert!(matches!(events[0], WalletEvent::BalanceChanged { .. }));
		assert_eq!(
			events[1],
			WalletEvent::TransactionSeen {
				wallet_id: "BTC".to_string(),
				txid: "old".to_string()
			}
		);
	}

	#[test]
	fn test_empty_broadcast_is_rejected() {
		let adapter = BlockbookAdapter::new("BTC");
		assert!(adapter.build_send_request("https://btc.example", "  ").is_err());
	}

	#[tokio::test]
	async fn test_provider_against_live_http() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path(format!("/api/v2/address/{}", ME)))
			.and(query_param("details", "txs"))
			.respond_with(ResponseTemplate::new(200).set_body_json(history_fixture()))
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/api/v2"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(json!({ "blockbook": { "bestHeight": 800010 } })),
			)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/api/v2/address/bc1qnobody"))
			.respond_with(ResponseTemplate::new(404))
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/api/v2/sendtx/0100abcd"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "aa03" })))
			.mount(&server)
			.await;

		let provider = Provider::new(
			ProviderConfig::new(server.uri()),
			Arc::new(BlockbookAdapter::new("BTC")),
			Arc::new(ReqwestTransport::new().unwrap()),
		);

		let txs = provider.get_transactions(ME).await.unwrap();
		assert_eq!(txs.len(), 2);
		assert_eq!(txs[0].confirmations, 10);

		let balance = provider.get_info("bc1qnobody").await.unwrap();
		assert_eq!(balance, BalanceInfo::zero());

		assert_eq!(provider.send_transaction("0100abcd").await.unwrap(), "aa03");
	}
}
