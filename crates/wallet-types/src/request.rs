//! Request descriptors handed from adapters to the transport layer.

use crate::operations::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// HTTP verb of a logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
	Get,
	Post,
}

impl HttpMethod {
	pub fn as_str(&self) -> &'static str {
		match self {
			HttpMethod::Get => "GET",
			HttpMethod::Post => "POST",
		}
	}
}

/// Retry settings an adapter or operator attaches to a request.
///
/// Retries use exponential backoff starting at `initial_interval_ms`, capped
/// at `max_interval_ms` per wait and `max_elapsed_ms` overall.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	pub max_retries: u32,
	pub initial_interval_ms: u64,
	pub max_interval_ms: u64,
	pub max_elapsed_ms: Option<u64>,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 3,
			initial_interval_ms: 500,
			max_interval_ms: 5_000,
			max_elapsed_ms: Some(30_000),
		}
	}
}

/// Transport-level options applied to every request of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
	pub headers: BTreeMap<String, String>,
	pub timeout_ms: Option<u64>,
	/// HTTP statuses that mean "nothing here yet" and resolve to an empty
	/// successful response instead of a failure.
	pub empty_on_status: Vec<u16>,
	pub retry: Option<RetryPolicy>,
}

impl TransportOptions {
	pub fn timeout(&self) -> Option<Duration> {
		self.timeout_ms.map(Duration::from_millis)
	}

	pub fn treats_as_empty(&self, status: u16) -> bool {
		self.empty_on_status.contains(&status)
	}

	/// Layers `other` on top of `self`: headers are merged, scalar settings
	/// from `other` win when present.
	pub fn merged_with(&self, other: &TransportOptions) -> TransportOptions {
		let mut headers = self.headers.clone();
		headers.extend(other.headers.clone());

		let mut empty_on_status = self.empty_on_status.clone();
		for status in &other.empty_on_status {
			if !empty_on_status.contains(status) {
				empty_on_status.push(*status);
			}
		}

		TransportOptions {
			headers,
			timeout_ms: other.timeout_ms.or(self.timeout_ms),
			empty_on_status,
			retry: other.retry.clone().or_else(|| self.retry.clone()),
		}
	}
}

/// Fully describes one logical call.
///
/// The descriptor is the unit the executor retries and the key material the
/// coalescer de-duplicates on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
	pub url: String,
	pub method: HttpMethod,
	/// Query parameters, kept sorted so equal requests produce equal keys.
	pub params: BTreeMap<String, String>,
	pub body: Option<Value>,
	pub operation: Operation,
	pub transport: TransportOptions,
}

impl RequestDescriptor {
	pub fn get(operation: Operation, url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			method: HttpMethod::Get,
			params: BTreeMap::new(),
			body: None,
			operation,
			transport: TransportOptions::default(),
		}
	}

	pub fn post(operation: Operation, url: impl Into<String>, body: Value) -> Self {
		Self {
			url: url.into(),
			method: HttpMethod::Post,
			params: BTreeMap::new(),
			body: Some(body),
			operation,
			transport: TransportOptions::default(),
		}
	}

	pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		self.params.insert(key.into(), value.to_string());
		self
	}

	pub fn with_transport(mut self, transport: TransportOptions) -> Self {
		self.transport = transport;
		self
	}

	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.transport.retry = Some(retry);
		self
	}

	/// Key identifying requests that may share one in-flight call.
	pub fn coalescing_key(&self) -> CoalescingKey {
		let params = self
			.params
			.iter()
			.map(|(k, v)| format!("{}={}", k, v))
			.collect::<Vec<_>>()
			.join("&");
		let body = self
			.body
			.as_ref()
			.map(|b| b.to_string())
			.unwrap_or_default();

		CoalescingKey(format!(
			"{}|{}|{}|{}|{}",
			self.operation,
			self.method.as_str(),
			self.url,
			params,
			body
		))
	}
}

/// Opaque key under which concurrent identical requests are merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoalescingKey(String);

impl fmt::Display for CoalescingKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Decoded upstream answer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
	pub status: u16,
	pub body: Value,
	/// Set when a status flagged as "empty is success" was mapped to an
	/// empty result.
	pub empty: bool,
}

impl RawResponse {
	pub fn new(status: u16, body: Value) -> Self {
		Self {
			status,
			body,
			empty: false,
		}
	}

	pub fn empty(status: u16) -> Self {
		Self {
			status,
			body: Value::Null,
			empty: true,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.empty
	}
}
