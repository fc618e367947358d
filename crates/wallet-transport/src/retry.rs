//! Backoff settings for adapter-supplied retry policies.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::time::Duration;
use wallet_types::{ErrorKind, RetryPolicy, WalletError};

/// Builds a fresh exponential backoff from a policy.
pub fn backoff_for(policy: &RetryPolicy) -> ExponentialBackoff {
	let initial = Duration::from_millis(policy.initial_interval_ms);
	let mut backoff = ExponentialBackoff {
		current_interval: initial,
		initial_interval: initial,
		max_interval: Duration::from_millis(policy.max_interval_ms.max(policy.initial_interval_ms)),
		max_elapsed_time: policy.max_elapsed_ms.map(Duration::from_millis),
		..Default::default()
	};
	backoff.reset();
	backoff
}

/// Only transport failures, throttling and server errors are worth another
/// attempt. Client errors and bad payloads will not change on retry.
pub fn is_retryable(error: &WalletError) -> bool {
	if error.kind != ErrorKind::RequestFailure {
		return false;
	}
	match error.status {
		None => true,
		Some(status) => status == 429 || status >= 500,
	}
}
