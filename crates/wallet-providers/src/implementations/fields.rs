//! Field access on raw explorer payloads.

use serde_json::Value;
use wallet_types::{Result, WalletError};

pub(crate) fn str_field<'v>(raw: &'v Value, name: &str) -> Result<&'v str> {
	raw.get(name)
		.and_then(Value::as_str)
		.ok_or_else(|| {
			WalletError::upstream_data(format!("Missing or non-string field '{}'", name))
		})
}

/// Numeric field that explorers send either as a JSON number or as a
/// decimal string.
pub(crate) fn u64_field(raw: &Value, name: &str) -> Result<u64> {
	opt_u64_field(raw, name)
		.ok_or_else(|| {
			WalletError::upstream_data(format!("Missing or non-numeric field '{}'", name))
		})
}

pub(crate) fn opt_u64_field(raw: &Value, name: &str) -> Option<u64> {
	match raw.get(name)? {
		Value::Number(n) => n.as_u64(),
		Value::String(s) => s.trim().parse().ok(),
		_ => None,
	}
}

pub(crate) fn object<'v>(raw: &'v Value, what: &str) -> Result<&'v serde_json::Map<String, Value>> {
	raw.as_object()
		.ok_or_else(|| WalletError::upstream_data(format!("Expected an object for {}", what)))
}
