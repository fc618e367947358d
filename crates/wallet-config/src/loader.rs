//! Configuration loader supporting TOML, JSON and YAML files.

use crate::types::WalletConfig;
use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

const ENV_PREFIX: &str = "WALLET_";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub struct ConfigLoader;

impl ConfigLoader {
	/// Loads configuration from a file, picking the format from its
	/// extension.
	///
	/// `${VAR}` placeholders are substituted from the environment before
	/// parsing, `WALLET_*` overrides are applied afterwards, and the result
	/// is validated.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<WalletConfig> {
		let path = path.as_ref();
		let contents = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		let contents = Self::substitute_env_vars(&contents, |name| std::env::var(name).ok())
			.with_context(|| format!("Failed to resolve variables in {}", path.display()))?;

		let mut config = match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => Self::from_toml(&contents),
			Some("json") => Self::from_json(&contents),
			Some("yaml") | Some("yml") => Self::from_yaml(&contents),
			_ => bail!("Unsupported config file format: {}", path.display()),
		}?;

		Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
		Self::validate(&config)?;

		info!(
			"Loaded {} wallet(s) from {}",
			config.wallets.len(),
			path.display()
		);
		Ok(config)
	}

	pub fn from_toml(contents: &str) -> Result<WalletConfig> {
		toml::from_str(contents).context("Failed to parse TOML config")
	}

	pub fn from_json(contents: &str) -> Result<WalletConfig> {
		serde_json::from_str(contents).context("Failed to parse JSON config")
	}

	pub fn from_yaml(contents: &str) -> Result<WalletConfig> {
		serde_yaml::from_str(contents).context("Failed to parse YAML config")
	}

	/// Replaces every `${VAR}` with the value `lookup` returns for `VAR`.
	///
	/// A placeholder without a value is an error.
	pub fn substitute_env_vars<F>(contents: &str, lookup: F) -> Result<String>
	where
		F: Fn(&str) -> Option<String>,
	{
		let re = Regex::new(r"\$\{([^}]+)\}")?;
		let mut result = String::with_capacity(contents.len());
		let mut last = 0;

		for cap in re.captures_iter(contents) {
			let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
				continue;
			};
			let value = lookup(name.as_str())
				.ok_or_else(|| anyhow!("Environment variable not found: {}", name.as_str()))?;

			result.push_str(&contents[last..whole.start()]);
			result.push_str(&value);
			last = whole.end();
		}

		result.push_str(&contents[last..]);
		Ok(result)
	}

	/// Applies `WALLET_LOG_LEVEL` and `WALLET_LOG_JSON`.
	pub fn apply_env_overrides<F>(config: &mut WalletConfig, lookup: F) -> Result<()>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(level) = lookup(&format!("{}LOG_LEVEL", ENV_PREFIX)) {
			debug!("Overriding log level from environment: {}", level);
			config.logging.level = level;
		}

		if let Some(json) = lookup(&format!("{}LOG_JSON", ENV_PREFIX)) {
			config.logging.json = json
				.parse()
				.with_context(|| format!("{}LOG_JSON must be true or false", ENV_PREFIX))?;
		}

		Ok(())
	}

	/// Checks the configuration for mistakes that would only surface at
	/// request time.
	pub fn validate(config: &WalletConfig) -> Result<()> {
		if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
			bail!("Unknown log level: {}", config.logging.level);
		}

		if config.wallets.is_empty() {
			bail!("No wallets configured");
		}

		for (name, wallet) in &config.wallets {
			if wallet.ticker.trim().is_empty() {
				bail!("Wallet '{}' has an empty ticker", name);
			}
			if wallet.address.trim().is_empty() {
				bail!("Wallet '{}' has an empty address", name);
			}
			if wallet.providers.is_empty() {
				bail!("Wallet '{}' has no providers", name);
			}

			let defaults = wallet.providers.iter().filter(|p| p.is_default()).count();
			if defaults != 1 {
				bail!(
					"Wallet '{}' must have exactly one default provider, found {}",
					name,
					defaults
				);
			}

			let mut claimed = HashSet::new();
			for provider in &wallet.providers {
				let url = provider.base_url.as_str();
				if !(url.starts_with("http://") || url.starts_with("https://")) {
					bail!("Wallet '{}' provider URL must be http(s): {}", name, url);
				}

				for operation in &provider.used_for {
					if !claimed.insert(*operation) {
						bail!(
							"Wallet '{}' has more than one provider for '{}'",
							name,
							operation
						);
					}
				}
			}

			if wallet.page_size == Some(0) {
				bail!("Wallet '{}' page_size must be greater than zero", name);
			}
		}

		Ok(())
	}
}
