//! Registry routing wallet operations to providers.
//!
//! A wallet has at most one default provider and at most one override per
//! operation. Resolution prefers the override, falls back to the default, and
//! fails loudly when neither exists.
//!
//! # Thread Safety
//!
//! Registration needs `&mut self` and happens while the wallet is built.
//! Afterwards the registry is only read, and the providers it hands out are
//! wrapped in `Arc` for sharing across tasks.

use crate::provider::{Provider, ProviderOptions};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use wallet_transport::HttpTransport;
use wallet_types::{ChainAdapter, Operation, ProviderConfig, Result, WalletError};

/// Maps operation names to providers.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
	default: Option<Arc<Provider>>,
	overrides: HashMap<Operation, Arc<Provider>>,
	providers: Vec<Arc<Provider>>,
}

impl ProviderRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a provider as the default or as an override for the
	/// operations listed in its config.
	///
	/// # Errors
	///
	/// Returns `InternalInvariantError` if a default is already registered,
	/// or if any listed operation already has an override. Nothing is
	/// registered in that case.
	pub fn register(&mut self, provider: Arc<Provider>) -> Result<()> {
		let used_for = provider.config().used_for.clone();

		if used_for.is_empty() {
			if let Some(existing) = &self.default {
				return Err(WalletError::invariant(format!(
					"Default provider already registered ({}), cannot add {}",
					existing.base_url(),
					provider.base_url()
				)));
			}

			info!("Registering default provider {}", provider.base_url());
			self.default = Some(provider.clone());
		} else {
			for operation in &used_for {
				if self.overrides.contains_key(operation) {
					return Err(WalletError::invariant(format!(
						"Provider for operation '{}' already registered, cannot add {}",
						operation,
						provider.base_url()
					))
					.with_operation(*operation));
				}
			}

			for operation in used_for {
				info!(
					"Registering {} provider {}",
					operation,
					provider.base_url()
				);
				self.overrides.insert(operation, provider.clone());
			}
		}

		self.providers.push(provider);
		Ok(())
	}

	/// Returns the provider serving `operation`, if any.
	pub fn get(&self, operation: Operation) -> Option<Arc<Provider>> {
		self.overrides
			.get(&operation)
			.or(self.default.as_ref())
			.cloned()
	}

	/// Returns the provider serving `operation`.
	///
	/// # Errors
	///
	/// Returns `InternalInvariantError` when there is neither an override for
	/// the operation nor a default provider. That is a configuration bug, not
	/// an upstream failure.
	pub fn resolve(&self, operation: Operation) -> Result<Arc<Provider>> {
		self.get(operation).ok_or_else(|| {
			WalletError::invariant(format!(
				"No provider configured for '{}' and no default provider",
				operation
			))
			.with_operation(operation)
		})
	}

	pub fn default_provider(&self) -> Option<&Arc<Provider>> {
		self.default.as_ref()
	}

	/// All registered providers, in registration order.
	pub fn providers(&self) -> &[Arc<Provider>] {
		&self.providers
	}

	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}

	/// Builds a registry with one provider per config, all sharing the
	/// adapter and the transport.
	pub fn from_configs(
		adapter: Arc<dyn ChainAdapter>,
		configs: Vec<ProviderConfig>,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Self> {
		Self::from_configs_with(adapter, configs, transport, ProviderOptions::default())
	}

	pub fn from_configs_with(
		adapter: Arc<dyn ChainAdapter>,
		configs: Vec<ProviderConfig>,
		transport: Arc<dyn HttpTransport>,
		options: ProviderOptions,
	) -> Result<Self> {
		let mut registry = Self::new();

		for config in configs {
			debug!(
				"Creating {} provider at {}",
				adapter.ticker(),
				config.base_url
			);
			let provider = Provider::with_options(
				config,
				adapter.clone(),
				transport.clone(),
				options.clone(),
			);
			registry.register(Arc::new(provider))?;
		}

		Ok(registry)
	}
}
