//! Error taxonomy shared by every layer of the gateway.
//!
//! Failures are not distinguished by type but by [`ErrorKind`], a small set of
//! categories callers switch on. Each [`WalletError`] also records which
//! operation was running, the upstream URL involved and the provider instance
//! that raised it, so failures can be logged or reported without leaking
//! transport internals.

use crate::operations::Operation;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WalletError>;

/// Discriminated failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
	/// Upstream network or HTTP failure, including timeouts.
	RequestFailure,
	/// The upstream answered but the payload is semantically an error or malformed.
	UpstreamDataError,
	/// The wallet cannot cover the amount plus fee.
	InsufficientFunds,
	/// Missing key material or address.
	WalletStateError,
	/// Misconfiguration or a broken internal guarantee.
	InternalInvariantError,
}

impl ErrorKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorKind::RequestFailure => "RequestFailure",
			ErrorKind::UpstreamDataError => "UpstreamDataError",
			ErrorKind::InsufficientFunds => "InsufficientFunds",
			ErrorKind::WalletStateError => "WalletStateError",
			ErrorKind::InternalInvariantError => "InternalInvariantError",
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A failure with its context attached.
///
/// Cloneable so that every waiter on a coalesced request can receive the same
/// failure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind} during {}: {message}{}", describe_operation(.operation), describe_url(.url))]
pub struct WalletError {
	pub kind: ErrorKind,
	#[serde(rename = "operationKind")]
	pub operation: Option<Operation>,
	pub message: String,
	#[serde(rename = "causingUrl", skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(skip)]
	pub owner: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<u16>,
}

fn describe_operation(operation: &Option<Operation>) -> &'static str {
	match operation {
		Some(op) => op.as_str(),
		None => "unknown operation",
	}
}

fn describe_url(url: &Option<String>) -> String {
	match url {
		Some(url) => format!(" ({})", url),
		None => String::new(),
	}
}

impl WalletError {
	pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			operation: None,
			message: message.into(),
			url: None,
			owner: None,
			status: None,
		}
	}

	pub fn request_failure(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::RequestFailure, message)
	}

	pub fn upstream_data(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::UpstreamDataError, message)
	}

	pub fn insufficient_funds(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::InsufficientFunds, message)
	}

	pub fn wallet_state(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::WalletStateError, message)
	}

	pub fn invariant(message: impl Into<String>) -> Self {
		Self::new(ErrorKind::InternalInvariantError, message)
	}

	/// Sets the operation unless one is already recorded; the innermost
	/// layer knows best what was running.
	pub fn with_operation(mut self, operation: Operation) -> Self {
		self.operation.get_or_insert(operation);
		self
	}

	pub fn with_url(mut self, url: impl Into<String>) -> Self {
		if self.url.is_none() {
			self.url = Some(url.into());
		}
		self
	}

	pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
		if self.owner.is_none() {
			self.owner = Some(owner.into());
		}
		self
	}

	pub fn with_status(mut self, status: u16) -> Self {
		self.status = Some(status);
		self
	}

	pub fn is(&self, kind: ErrorKind) -> bool {
		self.kind == kind
	}
}

impl From<serde_json::Error> for WalletError {
	fn from(error: serde_json::Error) -> Self {
		WalletError::upstream_data(format!("Malformed upstream payload: {}", error))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_display_includes_context() {
		let err = WalletError::request_failure("HTTP 502")
			.with_operation(Operation::History)
			.with_url("https://explorer.example/api");
		assert_eq!(
			err.to_string(),
			"RequestFailure during history: HTTP 502 (https://explorer.example/api)"
		);

		let bare = WalletError::invariant("no default provider");
		assert_eq!(
			bare.to_string(),
			"InternalInvariantError during unknown operation: no default provider"
		);
	}

	#[test]
	fn test_context_is_not_overwritten() {
		let err = WalletError::upstream_data("bad field")
			.with_operation(Operation::Balance)
			.with_operation(Operation::History)
			.with_owner("first")
			.with_owner("second");
		assert_eq!(err.operation, Some(Operation::Balance));
		assert_eq!(err.owner.as_deref(), Some("first"));
	}

	#[test]
	fn test_serialized_error_surface() {
		let err = WalletError::request_failure("timeout")
			.with_operation(Operation::TokenHistory)
			.with_url("https://node.example")
			.with_owner("provider-1");
		let json = serde_json::to_value(&err).unwrap();
		assert_eq!(json["kind"], "RequestFailure");
		assert_eq!(json["operationKind"], "token-history");
		assert_eq!(json["message"], "timeout");
		assert_eq!(json["causingUrl"], "https://node.example");
		assert!(json.get("owner").is_none());
		assert!(json.get("status").is_none());
	}

	#[test]
	fn test_json_error_maps_to_upstream_data() {
		let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
		let err: WalletError = parse_err.into();
		assert!(err.is(ErrorKind::UpstreamDataError));
	}
}
