//! Signing contract. Key material never leaves the signer.

use crate::errors::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A transfer the wallet wants signed and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
	pub to: String,
	pub amount: Decimal,
	/// Network fee, always paid in the parent coin.
	pub fee: Decimal,
	/// Token contract; `None` transfers the parent coin.
	#[serde(default)]
	pub asset: Option<String>,
	#[serde(default)]
	pub memo: Option<String>,
}

impl TransferRequest {
	pub fn coin(to: impl Into<String>, amount: Decimal, fee: Decimal) -> Self {
		Self {
			to: to.into(),
			amount,
			fee,
			asset: None,
			memo: None,
		}
	}

	pub fn token(
		to: impl Into<String>,
		contract: impl Into<String>,
		amount: Decimal,
		fee: Decimal,
	) -> Self {
		Self {
			to: to.into(),
			amount,
			fee,
			asset: Some(contract.into()),
			memo: None,
		}
	}
}

/// Produces raw signed transactions for one address.
///
/// Implemented by the per-chain signing libraries.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
	fn address(&self) -> &str;

	/// Returns the serialized signed transaction, ready for broadcast.
	async fn sign(&self, request: &TransferRequest) -> Result<String>;
}
