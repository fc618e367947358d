//! Single-flight layer over the executor.
//!
//! Concurrent callers asking for an identical read share one upstream call
//! and all receive its outcome, success or failure. The in-flight entry is
//! removed once the call settles, so later calls always go to the network;
//! nothing is cached.

use crate::executor::RequestExecutor;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tracing::debug;
use wallet_types::{CoalescingKey, RawResponse, RequestDescriptor, Result};

type InFlight = Shared<BoxFuture<'static, Result<RawResponse>>>;

/// Merges identical concurrent requests of one provider instance.
#[derive(Clone)]
pub struct RequestCoalescer {
	executor: Arc<RequestExecutor>,
	in_flight: Arc<DashMap<CoalescingKey, InFlight>>,
}

impl RequestCoalescer {
	pub fn new(executor: Arc<RequestExecutor>) -> Self {
		Self {
			executor,
			in_flight: Arc::new(DashMap::new()),
		}
	}

	pub fn executor(&self) -> &Arc<RequestExecutor> {
		&self.executor
	}

	/// Number of distinct requests currently on the wire.
	pub fn in_flight(&self) -> usize {
		self.in_flight.len()
	}

	/// Executes the descriptor, joining an identical call already in flight.
	///
	/// Writes are never merged: two broadcasts are two broadcasts.
	pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<RawResponse> {
		if !descriptor.operation.is_read_only() {
			return self.executor.execute(&descriptor).await;
		}

		let key = descriptor.coalescing_key();

		let shared = match self.in_flight.entry(key.clone()) {
			Entry::Occupied(entry) => {
				debug!("Joining in-flight request {}", key);
				entry.get().clone()
			}
			Entry::Vacant(entry) => {
				let executor = self.executor.clone();
				let in_flight = self.in_flight.clone();
				let cleanup_key = key.clone();

				let future = async move {
					let result = executor.execute(&descriptor).await;
					in_flight.remove(&cleanup_key);
					result
				}
				.boxed()
				.shared();

				entry.insert(future.clone());
				future
			}
		};

		shared.await
	}
}

impl std::fmt::Debug for RequestCoalescer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RequestCoalescer")
			.field("executor", &self.executor)
			.field("in_flight", &self.in_flight.len())
			.finish()
	}
}
