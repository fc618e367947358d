//! Builds wallets from configuration entries.

use crate::wallet::Wallet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wallet_config::{AdapterKind, WalletEntry};
use wallet_providers::implementations::{BlockbookAdapter, EtherscanAdapter};
use wallet_providers::{ProviderOptions, ProviderRegistry, DEFAULT_PAGE_SIZE};
use wallet_transport::{HttpTransport, ReqwestTransport};
use wallet_types::{ChainAdapter, Result, TransactionSigner, WalletError};

pub struct WalletBuilder {
	name: String,
	entry: WalletEntry,
	transport: Option<Arc<dyn HttpTransport>>,
	signer: Option<Arc<dyn TransactionSigner>>,
}

impl WalletBuilder {
	pub fn new(name: impl Into<String>, entry: WalletEntry) -> Self {
		Self {
			name: name.into(),
			entry,
			transport: None,
			signer: None,
		}
	}

	/// Shares one HTTP client between wallets. Defaults to a fresh
	/// [`ReqwestTransport`].
	pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
		self.transport = Some(transport);
		self
	}

	pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
		self.signer = Some(signer);
		self
	}

	pub fn build(self) -> Result<Wallet> {
		let transport = match self.transport {
			Some(transport) => transport,
			None => Arc::new(ReqwestTransport::new().map_err(|e| {
				WalletError::invariant(format!("Cannot create HTTP transport: {}", e))
			})?),
		};

		let adapter = Self::adapter(&self.name, &self.entry);
		let options = ProviderOptions {
			page_size: self.entry.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
			history_cooldown: self.entry.history_cooldown(),
		};

		let registry = ProviderRegistry::from_configs_with(
			adapter,
			self.entry.providers.clone(),
			transport,
			options,
		)?;

		let mut wallet = Wallet::new(&self.name, &self.entry.address, registry)?
			.with_tokens(self.entry.tokens.keys().cloned());
		if let Some(signer) = self.signer {
			wallet = wallet.with_signer(signer);
		}

		info!(
			"Built wallet '{}' ({} {:?}) with {} provider(s)",
			self.name,
			self.entry.ticker,
			self.entry.adapter,
			self.entry.providers.len()
		);
		Ok(wallet)
	}

	fn adapter(name: &str, entry: &WalletEntry) -> Arc<dyn ChainAdapter> {
		match entry.adapter {
			AdapterKind::Blockbook => {
				let mut adapter = BlockbookAdapter::new(&entry.ticker);
				if let Some(decimals) = entry.decimals {
					adapter = adapter.with_decimals(decimals);
				}
				if let Some(interval) = entry.poll_interval() {
					adapter = adapter.with_poll_interval(interval);
				}
				if !entry.tokens.is_empty() {
					warn!("Wallet '{}': blockbook adapter ignores configured tokens", name);
				}
				Arc::new(adapter)
			}
			AdapterKind::Etherscan => {
				let mut adapter = EtherscanAdapter::new(&entry.ticker);
				if let Some(key) = &entry.api_key {
					adapter = adapter.with_api_key(key);
				}
				for (contract, decimals) in &entry.tokens {
					debug!("Wallet '{}': tracking token {}", name, contract);
					adapter = adapter.with_token(contract, *decimals);
				}
				if entry.decimals.is_some_and(|d| d != 18) {
					warn!("Wallet '{}': etherscan adapter always uses 18 decimals", name);
				}
				Arc::new(adapter)
			}
		}
	}
}
