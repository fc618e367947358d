//! The wallet facade.
//!
//! Every operation resolves its provider through the registry, so a wallet
//! with a dedicated history indexer and a separate broadcast node behaves
//! exactly like one with a single default provider.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use wallet_providers::{Provider, ProviderRegistry};
use wallet_types::{
	BalanceInfo, Operation, Result, StakingInfo, Transaction, TransactionSigner, TransferRequest,
	WalletError, WalletEvent,
};

pub struct Wallet {
	name: String,
	address: String,
	registry: ProviderRegistry,
	signer: Option<Arc<dyn TransactionSigner>>,
	/// Token contracts reported by [`Wallet::token_balances`].
	tokens: Vec<String>,
}

impl Wallet {
	/// # Errors
	///
	/// Returns `WalletStateError` when `address` is empty.
	pub fn new(
		name: impl Into<String>,
		address: impl Into<String>,
		registry: ProviderRegistry,
	) -> Result<Self> {
		let address = address.into();
		if address.trim().is_empty() {
			return Err(WalletError::wallet_state("Wallet has no address"));
		}

		Ok(Self {
			name: name.into(),
			address,
			registry,
			signer: None,
			tokens: Vec::new(),
		})
	}

	pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
		self.signer = Some(signer);
		self
	}

	pub fn with_tokens(mut self, tokens: impl IntoIterator<Item = String>) -> Self {
		self.tokens = tokens.into_iter().collect();
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn address(&self) -> &str {
		&self.address
	}

	pub fn registry(&self) -> &ProviderRegistry {
		&self.registry
	}

	pub fn tokens(&self) -> &[String] {
		&self.tokens
	}

	fn provider(&self, operation: Operation) -> Result<Arc<Provider>> {
		self.registry.resolve(operation)
	}

	pub async fn balance(&self) -> Result<BalanceInfo> {
		self.provider(Operation::Balance)?
			.get_info(&self.address)
			.await
	}

	/// First page of history.
	pub async fn history(&self) -> Result<Vec<Transaction>> {
		self.provider(Operation::History)?
			.get_transactions(&self.address)
			.await
	}

	/// The next page after the last one returned. Empty once exhausted.
	pub async fn load_more_history(&self) -> Result<Vec<Transaction>> {
		self.provider(Operation::History)?
			.load_more_transactions(&self.address)
			.await
	}

	/// Balances of the configured token contracts.
	pub async fn token_balances(&self) -> Result<BTreeMap<String, Decimal>> {
		if self.tokens.is_empty() {
			return Ok(BTreeMap::new());
		}

		self.provider(Operation::Token)?
			.get_token_balances(&self.address, &self.tokens)
			.await
	}

	pub async fn token_history(&self, contract: &str) -> Result<Vec<Transaction>> {
		self.provider(Operation::TokenHistory)?
			.get_token_transactions(&self.address, contract)
			.await
	}

	pub async fn staking(&self) -> Result<StakingInfo> {
		self.provider(Operation::Balance)?
			.get_staking_info(&self.address)
			.await
	}

	pub async fn node_height(&self) -> Result<u64> {
		self.provider(Operation::Node)?.get_latest_height().await
	}

	/// Broadcasts an already signed transaction and returns its hash.
	pub async fn broadcast(&self, raw_tx: &str) -> Result<String> {
		self.provider(Operation::Send)?
			.send_transaction(raw_tx)
			.await
	}

	/// Checks funds, signs and broadcasts a transfer.
	///
	/// # Errors
	///
	/// - `WalletStateError` when no signer is attached or it signs for
	///   another address
	/// - `InsufficientFunds` when the balance cannot cover amount plus fee;
	///   nothing is signed or sent in that case
	pub async fn transfer(&self, request: &TransferRequest) -> Result<String> {
		let signer = self.signer.as_ref().ok_or_else(|| {
			WalletError::wallet_state(format!("Wallet '{}' has no signer", self.name))
				.with_operation(Operation::Send)
		})?;

		let balance_provider = self.provider(Operation::Balance)?;
		if !balance_provider
			.adapter()
			.address_matches(signer.address(), &self.address)
		{
			return Err(WalletError::wallet_state(format!(
				"Signer address {} does not match wallet address {}",
				signer.address(),
				self.address
			))
			.with_operation(Operation::Send));
		}

		self.ensure_funds(request).await?;

		let raw_tx = signer.sign(request).await?;
		let txid = self.broadcast(&raw_tx).await?;

		info!(
			"Sent {} {} from {} to {}: {}",
			request.amount,
			request.asset.as_deref().unwrap_or(&self.name),
			self.address,
			request.to,
			txid
		);
		Ok(txid)
	}

	async fn ensure_funds(&self, request: &TransferRequest) -> Result<()> {
		let coin = self.balance().await?.balance;

		match &request.asset {
			None => {
				let remaining = coin - request.amount - request.fee;
				if remaining < Decimal::ZERO {
					return Err(insufficient(format!(
						"Balance {} cannot cover {} plus fee {}",
						coin, request.amount, request.fee
					)));
				}
			}
			Some(contract) => {
				if coin < request.fee {
					return Err(insufficient(format!(
						"Balance {} cannot cover fee {}",
						coin, request.fee
					)));
				}

				let token = self
					.provider(Operation::Token)?
					.get_token_balances(&self.address, std::slice::from_ref(contract))
					.await?
					.get(contract)
					.copied()
					.unwrap_or(Decimal::ZERO);
				if token < request.amount {
					return Err(insufficient(format!(
						"Token balance {} of {} cannot cover {}",
						token, contract, request.amount
					)));
				}
			}
		}

		Ok(())
	}

	/// Starts forwarding balance and transaction updates to `events`,
	/// replacing any earlier subscription.
	pub fn watch(&self, events: mpsc::Sender<WalletEvent>) -> Result<()> {
		self.provider(Operation::Socket)?
			.connect_socket(&self.address, events)
	}

	/// Stops the subscription. Returns whether one was running.
	pub fn unwatch(&self) -> bool {
		match self.provider(Operation::Socket) {
			Ok(provider) => provider.disconnect_socket(&self.address),
			Err(e) => {
				warn!("Cannot unwatch {}: {}", self.name, e);
				false
			}
		}
	}

	pub fn is_watching(&self) -> bool {
		self.provider(Operation::Socket)
			.is_ok_and(|provider| provider.has_socket(&self.address))
	}
}

fn insufficient(message: String) -> WalletError {
	WalletError::insufficient_funds(message).with_operation(Operation::Send)
}

impl fmt::Debug for Wallet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Wallet")
			.field("name", &self.name)
			.field("address", &self.address)
			.field("providers", &self.registry.providers().len())
			.field("has_signer", &self.signer.is_some())
			.finish()
	}
}
