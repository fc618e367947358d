//! Balance records returned by the balance and token operations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Balance of one address in display units.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceInfo {
	pub balance: Decimal,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub unconfirmed_balance: Option<Decimal>,
	/// Token balances keyed by contract address.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub token_balances: BTreeMap<String, Decimal>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub staking: Option<StakingInfo>,
}

impl BalanceInfo {
	pub fn new(balance: Decimal) -> Self {
		Self {
			balance,
			..Default::default()
		}
	}

	/// The balance reported for an address the upstream knows nothing about.
	pub fn zero() -> Self {
		Self::default()
	}

	pub fn with_unconfirmed(mut self, unconfirmed: Decimal) -> Self {
		self.unconfirmed_balance = Some(unconfirmed);
		self
	}

	pub fn token(&self, contract: &str) -> Decimal {
		self.token_balances
			.get(contract)
			.copied()
			.unwrap_or(Decimal::ZERO)
	}
}

/// Staking position aggregated by chains that support it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingInfo {
	pub staked: Decimal,
	pub rewards: Decimal,
	pub unstaking: Decimal,
}

impl StakingInfo {
	pub fn total(&self) -> Decimal {
		self.staked + self.rewards + self.unstaking
	}
}
