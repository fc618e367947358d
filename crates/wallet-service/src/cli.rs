//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "wallet-gateway")]
#[command(about = "Query and operate wallets across chain providers", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
	/// Path to configuration file
	#[arg(short, long, env = "WALLET_CONFIG", default_value = "config/wallets.toml")]
	pub config: PathBuf,

	/// Log level override (trace, debug, info, warn, error)
	#[arg(short, long)]
	pub log_level: Option<String>,

	/// Wallet to operate on; may be omitted when only one is configured
	#[arg(short, long, global = true)]
	pub wallet: Option<String>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
	/// Show the confirmed and unconfirmed balance
	Balance,

	/// Show transaction history, newest first
	History {
		/// Number of pages to fetch
		#[arg(short, long, default_value_t = 1)]
		pages: u32,
	},

	/// Show balances of the configured tokens
	Tokens,

	/// Show the latest block height seen by the node provider
	Height,

	/// Broadcast a signed raw transaction
	Broadcast {
		/// Serialized signed transaction
		hex: String,
	},

	/// Print balance and transaction updates until interrupted
	Watch,

	/// Validate the configuration file
	Validate,
}
