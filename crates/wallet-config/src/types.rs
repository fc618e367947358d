//! Configuration types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use wallet_types::ProviderConfig;

/// Root of a configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
	#[serde(default)]
	pub logging: LoggingConfig,
	/// Wallets keyed by a short name used on the command line.
	#[serde(default)]
	pub wallets: BTreeMap<String, WalletEntry>,
}

impl WalletConfig {
	pub fn wallet(&self, name: &str) -> Option<&WalletEntry> {
		self.wallets.get(name)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
	#[serde(default = "default_log_level")]
	pub level: String,
	#[serde(default)]
	pub json: bool,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: default_log_level(),
			json: false,
		}
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

/// Which reference adapter speaks to the wallet's providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
	Blockbook,
	Etherscan,
}

/// One watched address and the providers that serve it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
	pub adapter: AdapterKind,
	pub ticker: String,
	pub address: String,
	/// Decimals of the native coin. Adapters pick a default when unset.
	#[serde(default)]
	pub decimals: Option<u32>,
	/// Explorer API key, appended to every request by adapters that use one.
	#[serde(default)]
	pub api_key: Option<String>,
	/// Token contracts mapped to their decimals.
	#[serde(default)]
	pub tokens: BTreeMap<String, u32>,
	/// Seconds during which a repeated first-page history request is served
	/// from the last result. Zero disables the throttle.
	#[serde(default)]
	pub history_cooldown_secs: u64,
	#[serde(default)]
	pub page_size: Option<u64>,
	#[serde(default)]
	pub poll_interval_secs: Option<u64>,
	pub providers: Vec<ProviderConfig>,
}

impl WalletEntry {
	pub fn history_cooldown(&self) -> Duration {
		Duration::from_secs(self.history_cooldown_secs)
	}

	pub fn poll_interval(&self) -> Option<Duration> {
		self.poll_interval_secs.map(Duration::from_secs)
	}

	pub fn default_provider(&self) -> Option<&ProviderConfig> {
		self.providers.iter().find(|p| p.is_default())
	}
}
