//! Abstract operation names that providers are bound to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An abstract wallet operation.
///
/// Providers are registered for one or more operations; the registry resolves
/// each operation to the provider that serves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
	Node,
	Balance,
	History,
	Token,
	TokenHistory,
	Send,
	NftSend,
	Socket,
}

impl Operation {
	pub const ALL: [Operation; 8] = [
		Operation::Node,
		Operation::Balance,
		Operation::History,
		Operation::Token,
		Operation::TokenHistory,
		Operation::Send,
		Operation::NftSend,
		Operation::Socket,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Operation::Node => "node",
			Operation::Balance => "balance",
			Operation::History => "history",
			Operation::Token => "token",
			Operation::TokenHistory => "token-history",
			Operation::Send => "send",
			Operation::NftSend => "nft-send",
			Operation::Socket => "socket",
		}
	}

	/// Reads are idempotent and safe to share between concurrent callers.
	/// Broadcasts are not.
	pub fn is_read_only(&self) -> bool {
		!matches!(self, Operation::Send | Operation::NftSend)
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Operation {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Operation::ALL
			.iter()
			.copied()
			.find(|op| op.as_str() == s)
			.ok_or_else(|| format!("Unknown operation: {}", s))
	}
}
