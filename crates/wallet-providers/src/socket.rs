//! Push updates for a watched address.
//!
//! The subscription is a background task that polls the adapter's
//! subscription endpoint and forwards state changes to the caller's channel.
//! The first poll establishes a baseline; afterwards only a changed balance
//! or a transaction not seen before produces an event.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use wallet_transport::RequestCoalescer;
use wallet_types::{BalanceInfo, ChainAdapter, RequestDescriptor, WalletEvent};

/// Owns a running subscription task.
#[derive(Debug)]
pub struct SocketHandle {
	shutdown_tx: mpsc::UnboundedSender<()>,
	task: JoinHandle<()>,
}

impl SocketHandle {
	/// Signals the task to stop and aborts it in case it is mid-request.
	pub fn close(&self) {
		let _ = self.shutdown_tx.send(());
		self.task.abort();
	}

	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}
}

pub(crate) struct SocketTask {
	pub adapter: Arc<dyn ChainAdapter>,
	pub coalescer: RequestCoalescer,
	pub descriptor: RequestDescriptor,
	pub wallet_id: String,
	pub poll_interval: Duration,
	pub events: mpsc::Sender<WalletEvent>,
}

pub(crate) fn spawn(task: SocketTask) -> SocketHandle {
	let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
	let task = tokio::spawn(run(task, shutdown_rx));
	SocketHandle { shutdown_tx, task }
}

async fn run(task: SocketTask, mut shutdown_rx: mpsc::UnboundedReceiver<()>) {
	let mut ticker = interval(task.poll_interval.max(Duration::from_millis(1)));
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
	let mut seen = SeenState::default();

	info!("Watching {} at {}", task.wallet_id, task.descriptor.url);

	loop {
		tokio::select! {
			_ = ticker.tick() => {
				let Some(events) = poll(&task).await else {
					continue;
				};

				for event in seen.fresh(events) {
					if task.events.send(event).await.is_err() {
						debug!("Subscriber for {} went away", task.wallet_id);
						return;
					}
				}
			}
			_ = shutdown_rx.recv() => {
				info!("Stopped watching {}", task.wallet_id);
				return;
			}
		}
	}
}

async fn poll(task: &SocketTask) -> Option<Vec<WalletEvent>> {
	let socket = task.adapter.socket()?;

	let response = match task.coalescer.execute(task.descriptor.clone()).await {
		Ok(response) => response,
		Err(e) => {
			warn!("Socket poll for {} failed: {}", task.wallet_id, e);
			return None;
		}
	};

	if response.is_empty() {
		return Some(Vec::new());
	}

	if let Some(message) = task.adapter.detect_upstream_error(&response.body) {
		warn!("Socket poll for {} returned an error: {}", task.wallet_id, message);
		return None;
	}

	match socket.parse_socket_events(&response.body, &task.wallet_id) {
		Ok(events) => Some(events),
		Err(e) => {
			warn!("Could not parse socket update for {}: {}", task.wallet_id, e);
			None
		}
	}
}

#[derive(Debug, Default)]
struct SeenState {
	primed: bool,
	balance: Option<BalanceInfo>,
	txids: HashSet<String>,
}

impl SeenState {
	/// Records `events` and returns the ones that are news.
	fn fresh(&mut self, events: Vec<WalletEvent>) -> Vec<WalletEvent> {
		let mut fresh = Vec::new();

		for event in events {
			let is_new = match &event {
				WalletEvent::BalanceChanged { balance, .. } => {
					let changed = self.balance.as_ref() != Some(balance);
					self.balance = Some(balance.clone());
					changed
				}
				WalletEvent::TransactionSeen { txid, .. } => self.txids.insert(txid.clone()),
			};

			if is_new && self.primed {
				fresh.push(event);
			}
		}

		self.primed = true;
		fresh
	}
}
