use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use wallet_config::{ConfigLoader, WalletConfig, WalletEntry};
use wallet_core::{Wallet, WalletBuilder};
use wallet_monitoring::{init_tracing, trace_operation, TracingConfig};
use wallet_normalizer::{merge_unique, sort_newest_first};
use wallet_transport::ReqwestTransport;
use wallet_types::WalletError;

mod cli;

use cli::{Cli, Command};

const EVENT_BUFFER: usize = 64;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();

	if let Err(e) = run(cli).await {
		match e.downcast_ref::<WalletError>() {
			Some(wallet_error) => eprintln!(
				"{}",
				serde_json::to_string_pretty(&json!({ "error": wallet_error }))
					.unwrap_or_else(|_| wallet_error.to_string())
			),
			None => eprintln!("Error: {:#}", e),
		}
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> Result<()> {
	let config = ConfigLoader::from_file(&cli.config).context("Failed to load configuration")?;
	setup_tracing(&config, cli.log_level.as_deref())?;

	if cli.command == Command::Validate {
		return validate(&config);
	}

	let (name, entry) = select_wallet(&config, cli.wallet.as_deref())?;
	let transport = Arc::new(ReqwestTransport::new()?);
	let wallet = WalletBuilder::new(name, entry.clone())
		.with_transport(transport)
		.build()?;

	match cli.command {
		Command::Balance => {
			let balance = trace_operation(name, "balance", wallet.balance()).await?;
			print_json(&balance)
		}
		Command::History { pages } => {
			let history = trace_operation(name, "history", history(&wallet, pages)).await?;
			print_json(&history)
		}
		Command::Tokens => {
			let balances = trace_operation(name, "tokens", wallet.token_balances()).await?;
			print_json(&balances)
		}
		Command::Height => {
			let height = trace_operation(name, "height", wallet.node_height()).await?;
			print_json(&json!({ "height": height }))
		}
		Command::Broadcast { hex } => {
			let txid = trace_operation(name, "broadcast", wallet.broadcast(&hex)).await?;
			print_json(&json!({ "txid": txid }))
		}
		Command::Watch => watch(&wallet).await,
		Command::Validate => validate(&config),
	}
}

fn setup_tracing(config: &WalletConfig, override_level: Option<&str>) -> Result<()> {
	let level = override_level.unwrap_or(&config.logging.level);
	let tracing_config = TracingConfig::new()
		.with_level_str(level)
		.map_err(|e| anyhow!(e))?
		.with_json_format(config.logging.json);

	init_tracing(tracing_config).map_err(|e| anyhow!(e))
}

/// Picks the wallet named on the command line, or the only configured one.
fn select_wallet<'c>(
	config: &'c WalletConfig,
	name: Option<&str>,
) -> Result<(&'c str, &'c WalletEntry)> {
	match name {
		Some(name) => config
			.wallets
			.get_key_value(name)
			.map(|(k, v)| (k.as_str(), v))
			.ok_or_else(|| anyhow!("Unknown wallet '{}', configured: {}", name, names(config))),
		None if config.wallets.len() == 1 => config
			.wallets
			.iter()
			.next()
			.map(|(k, v)| (k.as_str(), v))
			.ok_or_else(|| anyhow!("No wallets configured")),
		None => bail!(
			"Several wallets configured, pick one with --wallet: {}",
			names(config)
		),
	}
}

fn names(config: &WalletConfig) -> String {
	config.wallets.keys().cloned().collect::<Vec<_>>().join(", ")
}

async fn history(
	wallet: &Wallet,
	pages: u32,
) -> wallet_types::Result<Vec<wallet_types::Transaction>> {
	let mut transactions = wallet.history().await?;

	for _ in 1..pages {
		let page = wallet.load_more_history().await?;
		if page.is_empty() {
			break;
		}
		transactions = merge_unique(transactions, page);
	}

	sort_newest_first(&mut transactions);
	Ok(transactions)
}

async fn watch(wallet: &Wallet) -> Result<()> {
	let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
	wallet.watch(tx)?;
	info!("Watching {} ({}), press Ctrl+C to stop", wallet.name(), wallet.address());

	loop {
		tokio::select! {
			event = rx.recv() => match event {
				Some(event) => println!("{}", serde_json::to_string(&event)?),
				None => {
					warn!("Subscription for {} ended", wallet.name());
					break;
				}
			},
			result = signal::ctrl_c() => {
				result.context("Failed to listen for Ctrl+C")?;
				info!("Interrupted, stopping");
				break;
			}
		}
	}

	wallet.unwatch();
	Ok(())
}

fn validate(config: &WalletConfig) -> Result<()> {
	let wallets: Vec<_> = config
		.wallets
		.iter()
		.map(|(name, entry)| {
			json!({
				"wallet": name,
				"adapter": entry.adapter,
				"ticker": entry.ticker,
				"providers": entry.providers.iter().map(|p| json!({
					"baseUrl": p.base_url,
					"usedFor": p.used_for,
				})).collect::<Vec<_>>(),
			})
		})
		.collect();

	print_json(&json!({ "valid": true, "wallets": wallets }))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config() -> WalletConfig {
		ConfigLoader::from_toml(
			r#"
[wallets.btc]
adapter = "blockbook"
ticker = "BTC"
address = "bc1qself"
[[wallets.btc.providers]]
base_url = "https://btc1.example"

[wallets.ltc]
adapter = "blockbook"
ticker = "LTC"
address = "ltc1qself"
[[wallets.ltc.providers]]
base_url = "https://ltc1.example"
"#,
		)
		.unwrap()
	}

	#[test]
	fn test_select_wallet_by_name() {
		let config = config();
		let (name, entry) = select_wallet(&config, Some("ltc")).unwrap();
		assert_eq!(name, "ltc");
		assert_eq!(entry.ticker, "LTC");

		let err = select_wallet(&config, Some("doge")).unwrap_err();
		assert!(err.to_string().contains("btc, ltc"));
	}

	#[test]
	fn test_select_wallet_requires_name_when_ambiguous() {
		let mut config = config();
		assert!(select_wallet(&config, None).is_err());

		config.wallets.remove("ltc");
		let (name, _) = select_wallet(&config, None).unwrap();
		assert_eq!(name, "btc");
	}
}
