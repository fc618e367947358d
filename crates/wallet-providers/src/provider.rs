//! A configured remote endpoint exposing the uniform wallet operations.
//!
//! A [`Provider`] pairs one [`ProviderConfig`] with the wallet's
//! [`ChainAdapter`]. The adapter decides what to ask and how to read the
//! answer; the provider owns everything stateful around it: the coalescing
//! executor, history cursors, the history throttle and open subscriptions.

use crate::pagination::{PaginationCursor, Throttle};
use crate::socket::{self, SocketHandle, SocketTask};
use dashmap::DashMap;
use futures::future::try_join_all;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;
use wallet_normalizer::{NormalizeContext, TransactionNormalizer};
use wallet_transport::{HttpTransport, RequestCoalescer, RequestExecutor};
use wallet_types::{
	BalanceInfo, ChainAdapter, Operation, PageRequest, ProviderConfig, RawResponse,
	RequestDescriptor, Result, StakingInfo, Transaction, WalletError, WalletEvent,
};

/// Page size used when the caller does not pick one.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Tunables shared by every provider of a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOptions {
	pub page_size: u64,
	/// How long a fetched first history page is served without asking the
	/// upstream again. Zero disables the throttle.
	pub history_cooldown: Duration,
}

impl Default for ProviderOptions {
	fn default() -> Self {
		Self {
			page_size: DEFAULT_PAGE_SIZE,
			history_cooldown: Duration::ZERO,
		}
	}
}

/// One provider instance.
///
/// Every error it returns carries its instance id as owner, so failures from
/// two providers of the same wallet can be told apart.
pub struct Provider {
	id: String,
	config: ProviderConfig,
	adapter: Arc<dyn ChainAdapter>,
	coalescer: RequestCoalescer,
	options: ProviderOptions,
	cursors: DashMap<String, PaginationCursor>,
	/// First history page together with the cursor positioned after it.
	history: Throttle<(Vec<Transaction>, PaginationCursor)>,
	sockets: DashMap<String, SocketHandle>,
}

impl Provider {
	pub fn new(
		config: ProviderConfig,
		adapter: Arc<dyn ChainAdapter>,
		transport: Arc<dyn HttpTransport>,
	) -> Self {
		Self::with_options(config, adapter, transport, ProviderOptions::default())
	}

	pub fn with_options(
		config: ProviderConfig,
		adapter: Arc<dyn ChainAdapter>,
		transport: Arc<dyn HttpTransport>,
		options: ProviderOptions,
	) -> Self {
		let id = format!("{}-{}", adapter.ticker().to_lowercase(), Uuid::new_v4());
		let executor = Arc::new(RequestExecutor::new(transport, id.clone()));

		debug!("Created provider {} for {}", id, config.base());

		Self {
			id,
			history: Throttle::new(options.history_cooldown),
			config,
			adapter,
			coalescer: RequestCoalescer::new(executor),
			options,
			cursors: DashMap::new(),
			sockets: DashMap::new(),
		}
	}

	/// Instance id stamped on this provider's errors.
	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn config(&self) -> &ProviderConfig {
		&self.config
	}

	pub fn adapter(&self) -> &Arc<dyn ChainAdapter> {
		&self.adapter
	}

	pub fn base_url(&self) -> &str {
		self.config.base()
	}

	pub async fn get_info(&self, address: &str) -> Result<BalanceInfo> {
		let descriptor = self
			.adapter
			.build_info_request(self.base_url(), address)
			.map_err(self.stamp(Operation::Balance))?;

		let url = descriptor.url.clone();
		let response = self.fetch(descriptor).await?;
		if response.is_empty() {
			return Ok(BalanceInfo::zero());
		}

		self.adapter
			.parse_info_response(&response.body)
			.map_err(self.stamp_at(Operation::Balance, &url))
	}

	pub async fn get_latest_height(&self) -> Result<u64> {
		let height = self
			.adapter
			.height()
			.ok_or_else(|| self.unsupported("latest height", Operation::Node))?;

		let descriptor = height
			.build_height_request(self.base_url())
			.map_err(self.stamp(Operation::Node))?;

		let url = descriptor.url.clone();
		let response = self.fetch(descriptor).await?;
		if response.is_empty() {
			return Err(self.stamp_at(Operation::Node, &url)(WalletError::upstream_data(
				"Empty response to a height request",
			)));
		}

		height
			.parse_height_response(&response.body)
			.map_err(self.stamp_at(Operation::Node, &url))
	}

	/// First page of history, newest first as the upstream orders it.
	///
	/// Resets the address's cursor so [`load_more_transactions`] continues
	/// from here. Within the history cooldown the previous first page is
	/// returned without a request.
	///
	/// [`load_more_transactions`]: Provider::load_more_transactions
	pub async fn get_transactions(&self, address: &str) -> Result<Vec<Transaction>> {
		if let Some((cached, cursor)) = self.history.get(address) {
			debug!("Serving throttled history for {}", address);
			self.cursors.insert(address.to_string(), cursor);
			return Ok(cached);
		}

		let mut cursor = PaginationCursor::new(self.options.page_size);
		let transactions = self.fetch_page(address, &mut cursor).await?;

		self.history
			.record(address, (transactions.clone(), cursor.clone()));
		self.cursors.insert(address.to_string(), cursor);

		Ok(transactions)
	}

	/// The page after the last one fetched for `address`, empty once the
	/// history is exhausted.
	pub async fn load_more_transactions(&self, address: &str) -> Result<Vec<Transaction>> {
		let mut cursor = self
			.cursors
			.get(address)
			.map(|c| c.value().clone())
			.unwrap_or_else(|| PaginationCursor::new(self.options.page_size));

		if cursor.is_exhausted() {
			debug!("History of {} is exhausted", address);
			return Ok(Vec::new());
		}

		let transactions = self.fetch_page(address, &mut cursor).await?;
		self.cursors.insert(address.to_string(), cursor);

		Ok(transactions)
	}

	/// Broadcasts a signed transaction and returns its hash.
	pub async fn send_transaction(&self, raw_tx: &str) -> Result<String> {
		let descriptor = self
			.adapter
			.build_send_request(self.base_url(), raw_tx)
			.map_err(self.stamp(Operation::Send))?;
		let operation = descriptor.operation;

		let url = descriptor.url.clone();
		let response = self.fetch(descriptor).await?;
		if response.is_empty() {
			return Err(self.stamp_at(operation, &url)(WalletError::upstream_data(
				"Empty response to a broadcast",
			)));
		}

		let txid = self
			.adapter
			.parse_send_response(&response.body)
			.map_err(self.stamp_at(operation, &url))?;

		// The next history call should see the new transaction.
		self.history.clear();
		info!("Broadcast {} transaction {}", self.adapter.ticker(), txid);

		Ok(txid)
	}

	/// Balances of the given token contracts, fetched concurrently.
	pub async fn get_token_balances(
		&self,
		address: &str,
		contracts: &[String],
	) -> Result<BTreeMap<String, Decimal>> {
		let tokens = self
			.adapter
			.tokens()
			.ok_or_else(|| self.unsupported("tokens", Operation::Token))?;

		let requests = contracts.iter().map(|contract| async move {
			let descriptor = tokens
				.build_token_balance_request(self.base_url(), address, contract)
				.map_err(self.stamp(Operation::Token))?;

			let url = descriptor.url.clone();
			let response = self.fetch(descriptor).await?;
			let balance = if response.is_empty() {
				Decimal::ZERO
			} else {
				tokens
					.parse_token_balance_response(&response.body, contract)
					.map_err(self.stamp_at(Operation::Token, &url))?
			};

			Ok::<_, WalletError>((contract.clone(), balance))
		});

		Ok(try_join_all(requests).await?.into_iter().collect())
	}

	pub async fn get_token_transactions(
		&self,
		address: &str,
		contract: &str,
	) -> Result<Vec<Transaction>> {
		let tokens = self
			.adapter
			.tokens()
			.ok_or_else(|| self.unsupported("tokens", Operation::TokenHistory))?;

		let descriptor = tokens
			.build_token_transactions_request(
				self.base_url(),
				address,
				contract,
				&PageRequest::first(self.options.page_size),
			)
			.map_err(self.stamp(Operation::TokenHistory))?;

		let url = descriptor.url.clone();
		let response = self.fetch(descriptor).await?;
		if response.is_empty() {
			return Ok(Vec::new());
		}

		let items = self
			.adapter
			.parse_transactions_response(&response.body)
			.map_err(self.stamp_at(Operation::TokenHistory, &url))?;

		self.normalize(&items, address, Operation::TokenHistory, &url)
			.await
	}

	pub async fn get_staking_info(&self, address: &str) -> Result<StakingInfo> {
		let staking = self
			.adapter
			.staking()
			.ok_or_else(|| self.unsupported("staking", Operation::Balance))?;

		let descriptor = staking
			.build_staking_request(self.base_url(), address)
			.map_err(self.stamp(Operation::Balance))?;

		let url = descriptor.url.clone();
		let response = self.fetch(descriptor).await?;
		if response.is_empty() {
			return Ok(StakingInfo::default());
		}

		staking
			.parse_staking_response(&response.body)
			.map_err(self.stamp_at(Operation::Balance, &url))
	}

	/// Starts forwarding updates for `address` to `events`.
	///
	/// An existing subscription for the address is torn down first, so a
	/// reconnect never delivers events twice.
	pub fn connect_socket(&self, address: &str, events: mpsc::Sender<WalletEvent>) -> Result<()> {
		let capability = self
			.adapter
			.socket()
			.ok_or_else(|| self.unsupported("socket", Operation::Socket))?;

		let descriptor = capability
			.build_subscription_request(self.base_url(), address)
			.map_err(self.stamp(Operation::Socket))?;

		self.disconnect_socket(address);

		let handle = socket::spawn(SocketTask {
			adapter: self.adapter.clone(),
			coalescer: self.coalescer.clone(),
			descriptor: self.prepare(descriptor),
			wallet_id: self.adapter.ticker().to_string(),
			poll_interval: capability.poll_interval(),
			events,
		});
		self.sockets.insert(address.to_string(), handle);

		Ok(())
	}

	/// Stops the subscription for `address`. Returns whether one was open.
	pub fn disconnect_socket(&self, address: &str) -> bool {
		match self.sockets.remove(address) {
			Some((_, handle)) => {
				handle.close();
				true
			}
			None => false,
		}
	}

	pub fn has_socket(&self, address: &str) -> bool {
		self.sockets
			.get(address)
			.is_some_and(|handle| !handle.is_finished())
	}

	async fn fetch_page(
		&self,
		address: &str,
		cursor: &mut PaginationCursor,
	) -> Result<Vec<Transaction>> {
		let Some(page) = cursor.next_request() else {
			return Ok(Vec::new());
		};

		let descriptor = self
			.adapter
			.build_transactions_request(self.base_url(), address, &page)
			.map_err(self.stamp(Operation::History))?;

		let url = descriptor.url.clone();
		let response = self.fetch(descriptor).await?;
		let pagination = self.adapter.pagination();

		if response.is_empty() {
			cursor.advance(0, None, pagination.is_some());
			return Ok(Vec::new());
		}

		let items = self
			.adapter
			.parse_transactions_response(&response.body)
			.map_err(self.stamp_at(Operation::History, &url))?;
		let received = items.as_array().map(Vec::len).unwrap_or(0);
		let next_cursor = pagination.and_then(|p| p.next_cursor(&response.body));

		let transactions = self
			.normalize(&items, address, Operation::History, &url)
			.await?;
		cursor.advance(received, next_cursor, pagination.is_some());

		debug!(
			"Fetched {} {} transactions for {} (page {})",
			transactions.len(),
			self.adapter.ticker(),
			address,
			page.page
		);

		Ok(transactions)
	}

	async fn normalize(
		&self,
		items: &serde_json::Value,
		address: &str,
		operation: Operation,
		url: &str,
	) -> Result<Vec<Transaction>> {
		let has_items = items.as_array().is_some_and(|list| !list.is_empty());
		let latest_height = match self.adapter.height() {
			Some(_) if has_items => Some(self.get_latest_height().await?),
			_ => None,
		};

		let ctx = NormalizeContext::new(address).with_latest_height(latest_height);
		TransactionNormalizer::new(self.adapter.as_ref())
			.normalize_many(items, &ctx)
			.map_err(self.stamp_at(operation, url))
	}

	/// Executes a descriptor with this provider's transport options, then
	/// checks the body for errors reported with a success status.
	async fn fetch(&self, descriptor: RequestDescriptor) -> Result<RawResponse> {
		let descriptor = self.prepare(descriptor);
		let operation = descriptor.operation;
		let url = descriptor.url.clone();

		let response = self.coalescer.execute(descriptor).await?;

		if !response.is_empty() {
			if let Some(message) = self.adapter.detect_upstream_error(&response.body) {
				return Err(WalletError::upstream_data(message)
					.with_status(response.status)
					.with_operation(operation)
					.with_url(url)
					.with_owner(self.id.as_str()));
			}
		}

		Ok(response)
	}

	/// Adapter defaults, then whatever the adapter put on the descriptor,
	/// then the operator's configuration.
	fn prepare(&self, mut descriptor: RequestDescriptor) -> RequestDescriptor {
		descriptor.transport = self
			.adapter
			.transport_options(descriptor.operation)
			.merged_with(&descriptor.transport)
			.merged_with(&self.config.transport);
		descriptor
	}

	/// Tags errors raised before a request URL exists.
	fn stamp(&self, operation: Operation) -> impl Fn(WalletError) -> WalletError + '_ {
		self.stamp_at(operation, self.base_url())
	}

	fn stamp_at<'a>(
		&'a self,
		operation: Operation,
		url: &'a str,
	) -> impl Fn(WalletError) -> WalletError + 'a {
		move |e| {
			e.with_operation(operation)
				.with_url(url)
				.with_owner(self.id.as_str())
		}
	}

	fn unsupported(&self, capability: &str, operation: Operation) -> WalletError {
		self.stamp(operation)(WalletError::invariant(format!(
			"{} adapter does not support {}",
			self.adapter.ticker(),
			capability
		)))
	}
}

impl Drop for Provider {
	fn drop(&mut self) {
		for handle in self.sockets.iter() {
			handle.close();
		}
	}
}

impl std::fmt::Debug for Provider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Provider")
			.field("id", &self.id)
			.field("base_url", &self.config.base_url)
			.field("used_for", &self.config.used_for)
			.finish()
	}
}
