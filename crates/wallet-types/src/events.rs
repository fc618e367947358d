//! Events published to a wallet's subscriber channel.

use crate::balance::BalanceInfo;
use serde::{Deserialize, Serialize};

/// Push notification delivered over the channel handed to a socket
/// subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WalletEvent {
	#[serde(rename_all = "camelCase")]
	BalanceChanged {
		wallet_id: String,
		balance: BalanceInfo,
	},
	#[serde(rename_all = "camelCase")]
	TransactionSeen { wallet_id: String, txid: String },
}

impl WalletEvent {
	pub fn wallet_id(&self) -> &str {
		match self {
			WalletEvent::BalanceChanged { wallet_id, .. } => wallet_id,
			WalletEvent::TransactionSeen { wallet_id, .. } => wallet_id,
		}
	}
}
