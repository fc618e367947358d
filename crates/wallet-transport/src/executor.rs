//! Executes one logical request and maps the outcome onto the error taxonomy.

use crate::retry;
use crate::transport::{HttpTransport, TransportError, TransportResponse};
use backoff::backoff::Backoff;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use wallet_types::{RawResponse, RequestDescriptor, Result, RetryPolicy, WalletError};

const MAX_LOGGED_BODY: usize = 256;

/// Runs descriptors against an [`HttpTransport`].
///
/// Requests are attempted once unless the descriptor carries a
/// [`RetryPolicy`]. Every error leaving the executor is tagged with the
/// operation, the URL and the owning provider instance.
#[derive(Clone)]
pub struct RequestExecutor {
	transport: Arc<dyn HttpTransport>,
	owner: String,
}

impl RequestExecutor {
	pub fn new(transport: Arc<dyn HttpTransport>, owner: impl Into<String>) -> Self {
		Self {
			transport,
			owner: owner.into(),
		}
	}

	/// Identifier of the provider instance this executor works for.
	pub fn owner(&self) -> &str {
		&self.owner
	}

	pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<RawResponse> {
		let result = match &descriptor.transport.retry {
			Some(policy) => self.execute_with_retry(descriptor, policy).await,
			None => self.attempt(descriptor).await,
		};

		result.map_err(|e| {
			e.with_operation(descriptor.operation)
				.with_url(descriptor.url.as_str())
				.with_owner(self.owner.as_str())
		})
	}

	async fn execute_with_retry(
		&self,
		descriptor: &RequestDescriptor,
		policy: &RetryPolicy,
	) -> Result<RawResponse> {
		let mut backoff = retry::backoff_for(policy);
		let mut attempts = 0;

		loop {
			match self.attempt(descriptor).await {
				Ok(response) => return Ok(response),
				Err(e) => {
					if !retry::is_retryable(&e) {
						return Err(e);
					}

					attempts += 1;

					if attempts > policy.max_retries {
						warn!(
							"{} request to {} failed after {} attempts, giving up: {}",
							descriptor.operation, descriptor.url, attempts, e.message
						);
						return Err(e);
					}

					if let Some(delay) = backoff.next_backoff() {
						warn!(
							"{} request to {} failed, attempt {}/{}, retrying in {:?}: {}",
							descriptor.operation,
							descriptor.url,
							attempts,
							policy.max_retries,
							delay,
							e.message
						);
						tokio::time::sleep(delay).await;
					} else {
						warn!(
							"{} request to {} failed, backoff exhausted after {} attempts: {}",
							descriptor.operation, descriptor.url, attempts, e.message
						);
						return Err(e);
					}
				}
			}
		}
	}

	async fn attempt(&self, descriptor: &RequestDescriptor) -> Result<RawResponse> {
		let response = self.send(descriptor).await.map_err(|e| {
			WalletError::request_failure(format!("{} request failed: {}", descriptor.operation, e))
		})?;

		let status = response.status;

		if descriptor.transport.treats_as_empty(status) {
			debug!(
				"{} returned {} for {}, treating as empty",
				descriptor.url, status, descriptor.operation
			);
			return Ok(RawResponse::empty(status));
		}

		if !(200..300).contains(&status) {
			return Err(WalletError::request_failure(format!(
				"HTTP {}: {}",
				status,
				truncate(&response.body)
			))
			.with_status(status));
		}

		let body = if response.body.trim().is_empty() {
			Value::Null
		} else {
			serde_json::from_str(&response.body)
				.map_err(|e| WalletError::from(e).with_status(status))?
		};

		Ok(RawResponse::new(status, body))
	}

	/// One transport call, bounded by the descriptor's timeout whatever the
	/// transport does on its own.
	async fn send(
		&self,
		descriptor: &RequestDescriptor,
	) -> std::result::Result<TransportResponse, TransportError> {
		match descriptor.transport.timeout() {
			Some(timeout) => tokio::time::timeout(timeout, self.transport.send(descriptor))
				.await
				.map_err(|_| TransportError::Timeout)?,
			None => self.transport.send(descriptor).await,
		}
	}
}

impl std::fmt::Debug for RequestExecutor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RequestExecutor")
			.field("owner", &self.owner)
			.finish()
	}
}

fn truncate(body: &str) -> &str {
	match body.char_indices().nth(MAX_LOGGED_BODY) {
		Some((idx, _)) => &body[..idx],
		None => body,
	}
}
