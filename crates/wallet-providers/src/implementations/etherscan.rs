//! Etherscan-compatible adapter for account-model EVM chains.
//!
//! Every call goes to `{base}/api` with `module`/`action` query parameters.
//! The API answers 200 even on failure and signals errors through
//! `status: "0"`, except that an empty history is also reported that way.

use super::fields::{opt_u64_field, str_field, u64_field};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;
use wallet_types::units::from_base_units;
use wallet_types::{
	BalanceInfo, ChainAdapter, HeightCapability, Operation, PageRequest, RequestDescriptor, Result,
	TokenCapability, TransferShape, WalletError,
};

const NATIVE_DECIMALS: u32 = 18;
const DEFAULT_TOKEN_DECIMALS: u32 = 18;
const END_BLOCK: u64 = 99_999_999;

/// Messages that come with `status: "0"` but mean "nothing here".
const EMPTY_MESSAGES: [&str; 2] = ["No transactions found", "No token transfers found"];

#[derive(Debug, Clone)]
pub struct EtherscanAdapter {
	ticker: String,
	api_key: Option<String>,
	/// Known token contracts (lowercase) and their decimals.
	tokens: BTreeMap<String, u32>,
}

impl EtherscanAdapter {
	pub fn new(ticker: impl Into<String>) -> Self {
		Self {
			ticker: ticker.into(),
			api_key: None,
			tokens: BTreeMap::new(),
		}
	}

	pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
		self.api_key = Some(api_key.into());
		self
	}

	/// Registers a token contract. Transfers of unregistered tokens are
	/// treated as spam and dropped from history.
	pub fn with_token(mut self, contract: &str, decimals: u32) -> Self {
		self.tokens.insert(contract.to_lowercase(), decimals);
		self
	}

	fn call(
		&self,
		operation: Operation,
		base_url: &str,
		module: &str,
		action: &str,
	) -> RequestDescriptor {
		let descriptor = RequestDescriptor::get(operation, format!("{}/api", base_url))
			.with_param("module", module)
			.with_param("action", action);

		match &self.api_key {
			Some(key) => descriptor.with_param("apikey", key),
			None => descriptor,
		}
	}

	fn token_decimals(&self, contract: &str) -> u32 {
		self.tokens
			.get(&contract.to_lowercase())
			.copied()
			.unwrap_or(DEFAULT_TOKEN_DECIMALS)
	}

	fn is_token_item(raw: &Value) -> bool {
		raw.get("tokenDecimal").is_some()
	}

	fn result<'v>(raw: &'v Value) -> Result<&'v Value> {
		raw.get("result")
			.ok_or_else(|| WalletError::upstream_data("Response has no 'result'"))
	}
}

impl ChainAdapter for EtherscanAdapter {
	fn ticker(&self) -> &str {
		&self.ticker
	}

	fn allowed_assets(&self) -> Vec<String> {
		std::iter::once(self.ticker.clone())
			.chain(self.tokens.keys().cloned())
			.collect()
	}

	fn build_info_request(&self, base_url: &str, address: &str) -> Result<RequestDescriptor> {
		Ok(self
			.call(Operation::Balance, base_url, "account", "balance")
			.with_param("address", address)
			.with_param("tag", "latest"))
	}

	fn parse_info_response(&self, raw: &Value) -> Result<BalanceInfo> {
		let wei = str_field(raw, "result")?;
		Ok(BalanceInfo::new(from_base_units(wei, NATIVE_DECIMALS)?))
	}

	fn build_transactions_request(
		&self,
		base_url: &str,
		address: &str,
		page: &PageRequest,
	) -> Result<RequestDescriptor> {
		Ok(self
			.call(Operation::History, base_url, "account", "txlist")
			.with_param("address", address)
			.with_param("startblock", 0)
			.with_param("endblock", END_BLOCK)
			.with_param("page", page.page)
			.with_param("offset", page.limit)
			.with_param("sort", "desc"))
	}

	fn parse_transactions_response(&self, raw: &Value) -> Result<Value> {
		match Self::result(raw)? {
			list @ Value::Array(_) => Ok(list.clone()),
			other => Err(WalletError::upstream_data(format!(
				"Expected a transaction list, got {}",
				other
			))),
		}
	}

	fn build_send_request(&self, base_url: &str, raw_tx: &str) -> Result<RequestDescriptor> {
		let raw_tx = raw_tx.trim();
		let hex = if raw_tx.starts_with("0x") {
			raw_tx.to_string()
		} else {
			format!("0x{}", raw_tx)
		};

		Ok(self
			.call(Operation::Send, base_url, "proxy", "eth_sendRawTransaction")
			.with_param("hex", hex))
	}

	fn parse_send_response(&self, raw: &Value) -> Result<String> {
		Ok(str_field(raw, "result")?.to_string())
	}

	fn detect_upstream_error(&self, raw: &Value) -> Option<String> {
		if let Some(error) = raw.get("error") {
			return Some(
				error
					.get("message")
					.and_then(Value::as_str)
					.map(str::to_string)
					.unwrap_or_else(|| error.to_string()),
			);
		}

		if raw.get("status").and_then(Value::as_str) != Some("0") {
			return None;
		}

		let message = raw.get("message").and_then(Value::as_str).unwrap_or("NOTOK");
		if EMPTY_MESSAGES.iter().any(|m| message.starts_with(m)) {
			return None;
		}

		match raw.get("result").and_then(Value::as_str) {
			Some(detail) => Some(format!("{}: {}", message, detail)),
			None => Some(message.to_string()),
		}
	}

	fn tx_hash(&self, raw: &Value) -> Result<String> {
		Ok(str_field(raw, "hash")?.to_string())
	}

	fn tx_shape(&self, raw: &Value) -> Result<TransferShape> {
		let decimals = if Self::is_token_item(raw) {
			let decimals = u64_field(raw, "tokenDecimal")?;
			u32::try_from(decimals).map_err(|_| {
				WalletError::upstream_data(format!("Token decimals {} out of range", decimals))
			})?
		} else {
			NATIVE_DECIMALS
		};

		let to = str_field(raw, "to")?;
		let recipient = if to.is_empty() {
			// Contract creation: the value goes to the new contract.
			raw.get("contractAddress")
				.and_then(Value::as_str)
				.unwrap_or_default()
		} else {
			to
		};

		Ok(TransferShape::Account {
			sender: str_field(raw, "from")?.to_string(),
			recipient: recipient.to_string(),
			value: from_base_units(str_field(raw, "value")?, decimals)?,
		})
	}

	fn tx_datetime(&self, raw: &Value) -> Result<DateTime<Utc>> {
		let seconds = u64_field(raw, "timeStamp")?;
		i64::try_from(seconds)
			.ok()
			.and_then(|s| Utc.timestamp_opt(s, 0).single())
			.ok_or_else(|| WalletError::upstream_data(format!("Invalid timestamp {}", seconds)))
	}

	/// `gasUsed * gasPrice`, in the parent coin.
	fn tx_fee(&self, raw: &Value) -> Result<Decimal> {
		let gas_used = u128::from(u64_field(raw, "gasUsed")?);
		let gas_price: u128 = str_field(raw, "gasPrice")?
			.parse()
			.map_err(|e| WalletError::upstream_data(format!("Invalid gasPrice: {}", e)))?;

		let wei = gas_used
			.checked_mul(gas_price)
			.ok_or_else(|| WalletError::upstream_data("Fee overflows"))?;
		from_base_units(&wei.to_string(), NATIVE_DECIMALS)
	}

	fn tx_height(&self, raw: &Value) -> Option<u64> {
		opt_u64_field(raw, "blockNumber")
	}

	fn tx_wallet_id(&self, raw: &Value) -> String {
		if Self::is_token_item(raw) {
			if let Some(contract) = raw.get("contractAddress").and_then(Value::as_str) {
				return contract.to_lowercase();
			}
		}
		self.ticker.clone()
	}

	fn tx_nonce(&self, raw: &Value) -> Option<u64> {
		opt_u64_field(raw, "nonce")
	}

	/// Reverted transactions moved no value.
	fn is_transfer(&self, raw: &Value) -> bool {
		raw.get("isError").and_then(Value::as_str) != Some("1")
	}

	fn tx_confirmations(&self, raw: &Value, _latest_height: Option<u64>) -> Option<u64> {
		opt_u64_field(raw, "confirmations")
	}

	fn address_matches(&self, a: &str, b: &str) -> bool {
		a.eq_ignore_ascii_case(b)
	}

	fn height(&self) -> Option<&dyn HeightCapability> {
		Some(self)
	}

	fn tokens(&self) -> Option<&dyn TokenCapability> {
		Some(self)
	}
}

impl HeightCapability for EtherscanAdapter {
	fn build_height_request(&self, base_url: &str) -> Result<RequestDescriptor> {
		Ok(self.call(Operation::Node, base_url, "proxy", "eth_blockNumber"))
	}

	fn parse_height_response(&self, raw: &Value) -> Result<u64> {
		let hex = str_field(raw, "result")?;
		u64::from_str_radix(hex.trim_start_matches("0x"), 16)
			.map_err(|e| {
				WalletError::upstream_data(format!("Invalid block number '{}': {}", hex, e))
			})
	}
}

impl TokenCapability for EtherscanAdapter {
	fn build_token_balance_request(
		&self,
		base_url: &str,
		address: &str,
		contract: &str,
	) -> Result<RequestDescriptor> {
		Ok(self
			.call(Operation::Token, base_url, "account", "tokenbalance")
			.with_param("contractaddress", contract)
			.with_param("address", address)
			.with_param("tag", "latest"))
	}

	fn parse_token_balance_response(&self, raw: &Value, contract: &str) -> Result<Decimal> {
		let units = Self::result(raw)?
			.as_str()
			.ok_or_else(|| WalletError::upstream_data("Token balance is not a string"))?;
		from_base_units(units, self.token_decimals(contract))
	}

	fn build_token_transactions_request(
		&self,
		base_url: &str,
		address: &str,
		contract: &str,
		page: &PageRequest,
	) -> Result<RequestDescriptor> {
		Ok(self
			.call(Operation::TokenHistory, base_url, "account", "tokentx")
			.with_param("contractaddress", contract)
			.with_param("address", address)
			.with_param("page", page.page)
			.with_param("offset", page.limit)
			.with_param("sort", "desc"))
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
	use wallet_transport::testing::MockTransport;
	use wallet_types::{ErrorKind, ProviderConfig};

	const ME: &str = "0xAbC0000000000000000000000000000000000001";
	const USDT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

	fn native(hash: &str, from: &str, to: &str, value: &str) -> Value {
		json!({
			"blockNumber": "19000000",
			"timeStamp": "1700000000",
			"hash": hash,
			"nonce": "4",
			"from": from,
			"to": to,
			"value": value,
			"gas": "21000",
			"gasPrice": "20000000000",
			"gasUsed": "21000",
			"isError": "0",
			"contractAddress": "",
			"confirmations": "12"
		})
	}

	fn adapter() -> EtherscanAdapter {
		EtherscanAdapter::new("ETH").with_token(USDT, 6)
	}

	#[test]
	fn test_balance() {
		let info = adapter()
			.parse_info_response(&json!({
				"status": "1",
				"message": "OK",
				"result": "1500000000000000000"
			}))
			.unwrap();
		assert_eq!(info.balance, Decimal::from_str("1.5").unwrap());
	}

	#[test]
	fn test_requests_carry_api_key() {
		let adapter = adapter().with_api_key("KEY");
		let descriptor = adapter
			.build_transactions_request("https://api.example", ME, &PageRequest::first(25))
			.unwrap();
		assert_eq!(descriptor.url, "https://api.example/api");
		assert_eq!(descriptor.params.get("action").map(String::as_str), Some("txlist"));
		assert_eq!(descriptor.params.get("offset").map(String::as_str), Some("25"));
		assert_eq!(descriptor.params.get("apikey").map(String::as_str), Some("KEY"));
	}

	#[test]
	fn test_status_zero_handling() {
		let adapter = adapter();
		assert_eq!(
			adapter.detect_upstream_error(&json!({
				"status": "0",
				"message": "No transactions found",
				"result": []
			})),
			None
		);
		assert_eq!(
			adapter.detect_upstream_error(&json!({
				"status": "0",
				"message": "NOTOK",
				"result": "Max rate limit reached"
			})),
			Some("NOTOK: Max rate limit reached".to_string())
		);
		assert_eq!(
			adapter.detect_upstream_error(&json!({
				"jsonrpc": "2.0",
				"error": { "code": -32000, "message": "nonce too low" }
			})),
			Some("nonce too low".to_string())
		);
	}

	#[test]
	fn test_normalize_native_history() {
		let adapter = adapter();
		let mut reverted = native("0x03", ME, "0xdead", "5");
		reverted["isError"] = json!("1");
		let payload = json!({
			"status": "1",
			"message": "OK",
			"result": [
				native("0x01", "0xSENDER", &ME.to_lowercase(), "2000000000000000000"),
				native("0x02", ME, "0xRECIPIENT", "500000000000000000"),
				reverted,
				native("0x04", ME, ME, "1"),
			]
		});

		let items = adapter.parse_transactions_response(&payload).unwrap();
		let txs = TransactionNormalizer::new(&adapter)
			.normalize_many(&items, &NormalizeContext::new(ME))
			.unwrap();
		assert_eq!(txs.len(), 3);

		let fee = Decimal::from_str("0.00042").unwrap();

		assert!(txs[0].direction);
		assert_eq!(txs[0].amount, Decimal::from(2));
		assert_eq!(txs[0].other_side_address, "0xSENDER");
		assert_eq!(txs[0].fee, fee);
		assert_eq!(txs[0].confirmations, 12);
		assert_eq!(txs[0].nonce, Some(4));
		assert_eq!(txs[0].wallet_id, "ETH");

		assert!(!txs[1].direction);
		assert_eq!(txs[1].amount, Decimal::from_str("0.5").unwrap());
		assert_eq!(txs[1].other_side_address, "0xRECIPIENT");

		assert!(!txs[2].direction);
		assert_eq!(txs[2].amount, fee);
	}

	#[test]
	fn test_token_transfers_are_filtered_by_contract() {
		let adapter = adapter();
		let token = |contract: &str| {
			let mut item = native("0x10", "0xSENDER", ME, "2500000");
			item["contractAddress"] = json!(contract);
			item["tokenDecimal"] = json!("6");
			item
		};
		let items = json!([token(USDT), token("0xspam")]);

		let txs = TransactionNormalizer::new(&adapter)
			.normalize_many(&items, &NormalizeContext::new(ME))
			.unwrap();
		assert_eq!(txs.len(), 1);
		assert_eq!(txs[0].wallet_id, USDT.to_lowercase());
		assert_eq!(txs[0].amount, Decimal::from_str("2.5").unwrap());
		assert_eq!(txs[0].fee_asset_id, "ETH");
	}

	#[test]
	fn test_oversized_token_decimals_are_rejected() {
		let mut item = native("0x11", "0xSENDER", ME, "1");
		item["contractAddress"] = json!(USDT);
		item["tokenDecimal"] = json!("4294967302");

		let err = adapter().tx_shape(&item).unwrap_err();
		assert_eq!(err.kind, ErrorKind::UpstreamDataError);
		assert!(err.message.contains("4294967302"));
	}

	#[test]
	fn test_block_number() {
		let height = adapter()
			.parse_height_response(&json!({ "jsonrpc": "2.0", "id": 83, "result": "0x121eac0" }))
			.unwrap();
		assert_eq!(height, 19_000_000);
	}

	#[test]
	fn test_send_prefixes_hex() {
		let descriptor = adapter().build_send_request("https://api.example", "f86b").unwrap();
		assert_eq!(descriptor.params.get("hex").map(String::as_str), Some("0xf86b"));
		assert_eq!(descriptor.operation, Operation::Send);
	}

	#[tokio::test]
	async fn test_provider_token_balances_and_errors() {
		let transport = Arc::new(
			MockTransport::new()
				.respond_with_param(
					"/api",
					"action",
					"tokenbalance",
					200,
					json!({ "status": "1", "message": "OK", "result": "12345678" }),
				)
				.respond_with_param(
					"/api",
					"action",
					"balance",
					200,
					json!({ "status": "0", "message": "NOTOK", "result": "Invalid API Key" }),
				),
		);
		let provider = Provider::new(
			ProviderConfig::new("https://api.example"),
			Arc::new(adapter()),
			transport,
		);

		let balances = provider
			.get_token_balances(ME, &[USDT.to_string()])
			.await
			.unwrap();
		assert_eq!(balances[USDT], Decimal::from_str("12.345678").unwrap());

		let err = provider.get_info(ME).await.unwrap_err();
		assert_eq!(err.kind, ErrorKind::UpstreamDataError);
		assert!(err.message.contains("Invalid API Key"));
		assert_eq!(err.operation, Some(Operation::Balance));
	}
}
