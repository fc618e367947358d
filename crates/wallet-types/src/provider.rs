//! Provider configuration consumed at wallet construction time.

use crate::operations::Operation;
use crate::request::TransportOptions;
use serde::{Deserialize, Serialize};

/// One configured remote endpoint.
///
/// An empty `used_for` list makes the provider the wallet's default; a
/// non-empty list makes it an override for exactly those operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
	#[serde(alias = "baseUrl")]
	pub base_url: String,
	#[serde(default, alias = "usedFor", alias = "operationNames")]
	pub used_for: Vec<Operation>,
	#[serde(default, alias = "transportOptions")]
	pub transport: TransportOptions,
}

impl ProviderConfig {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
			used_for: Vec::new(),
			transport: TransportOptions::default(),
		}
	}

	pub fn used_for(mut self, operations: impl IntoIterator<Item = Operation>) -> Self {
		self.used_for.extend(operations);
		self
	}

	pub fn with_transport(mut self, transport: TransportOptions) -> Self {
		self.transport = transport;
		self
	}

	pub fn is_default(&self) -> bool {
		self.used_for.is_empty()
	}

	/// Base URL without a trailing slash, ready for path concatenation.
	pub fn base(&self) -> &str {
		self.base_url.trim_end_matches('/')
	}
}
