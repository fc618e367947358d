//! Scripted transport for tests.
//!
//! Routes match on a URL fragment and, optionally, on query parameters. A
//! route answers with its scripted responses in order and keeps repeating
//! the last one once the script is exhausted. Every request is recorded so
//! tests can assert on call counts.

use crate::transport::{HttpTransport, TransportError, TransportResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use wallet_types::RequestDescriptor;

type Scripted = Result<TransportResponse, TransportError>;

#[derive(Debug)]
struct Route {
	fragment: String,
	params: Vec<(String, String)>,
	script: VecDeque<Scripted>,
}

impl Route {
	fn matches(&self, request: &RequestDescriptor) -> bool {
		request.url.contains(&self.fragment)
			&& self
				.params
				.iter()
				.all(|(k, v)| request.params.get(k) == Some(v))
	}

	fn next(&mut self) -> Scripted {
		if self.script.len() > 1 {
			self.script
				.pop_front()
				.unwrap_or_else(|| Err(TransportError::Other("empty script".to_string())))
		} else {
			self.script
				.front()
				.cloned()
				.unwrap_or_else(|| Err(TransportError::Other("empty script".to_string())))
		}
	}
}

#[derive(Debug, Default)]
pub struct MockTransport {
	routes: Mutex<Vec<Route>>,
	calls: Mutex<Vec<RequestDescriptor>>,
	delay: Option<Duration>,
}

impl MockTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Answers requests whose URL contains `fragment` with a JSON body.
	pub fn respond(self, fragment: &str, status: u16, body: Value) -> Self {
		self.respond_raw(fragment, status, &body.to_string())
	}

	pub fn respond_raw(self, fragment: &str, status: u16, body: &str) -> Self {
		self.respond_seq(fragment, vec![Ok(TransportResponse::new(status, body))])
	}

	/// Like [`respond`](Self::respond), restricted to requests carrying the
	/// query parameter `key=value`. Parameter routes win over plain ones.
	pub fn respond_with_param(
		self,
		fragment: &str,
		key: &str,
		value: &str,
		status: u16,
		body: Value,
	) -> Self {
		self.push(Route {
			fragment: fragment.to_string(),
			params: vec![(key.to_string(), value.to_string())],
			script: VecDeque::from([Ok(TransportResponse::new(status, body.to_string()))]),
		})
	}

	pub fn respond_seq(self, fragment: &str, script: Vec<Scripted>) -> Self {
		self.push(Route {
			fragment: fragment.to_string(),
			params: Vec::new(),
			script: script.into(),
		})
	}

	pub fn fail(self, fragment: &str, error: TransportError) -> Self {
		self.respond_seq(fragment, vec![Err(error)])
	}

	/// Delays every answer, so concurrent callers overlap.
	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);
		self
	}

	/// Replaces the script of every route matching `fragment` at runtime.
	pub fn set_response(&self, fragment: &str, status: u16, body: Value) {
		if let Ok(mut routes) = self.routes.lock() {
			for route in routes.iter_mut().filter(|r| r.fragment == fragment) {
				route.script =
					VecDeque::from([Ok(TransportResponse::new(status, body.to_string()))]);
			}
		}
	}

	pub fn calls(&self) -> Vec<RequestDescriptor> {
		self.calls.lock().map(|c| c.clone()).unwrap_or_default()
	}

	pub fn call_count(&self, fragment: &str) -> usize {
		self.calls()
			.iter()
			.filter(|c| c.url.contains(fragment))
			.count()
	}

	fn push(self, route: Route) -> Self {
		if let Ok(mut routes) = self.routes.lock() {
			routes.push(route);
		}
		self
	}

	fn answer(&self, request: &RequestDescriptor) -> Scripted {
		let mut routes = self
			.routes
			.lock()
			.map_err(|_| TransportError::Other("mock routes poisoned".to_string()))?;

		let best = routes
			.iter_mut()
			.filter(|r| r.matches(request))
			.max_by_key(|r| r.params.len());

		match best {
			Some(route) => route.next(),
			None => Err(TransportError::Other(format!(
				"no mock route for {}",
				request.url
			))),
		}
	}
}

#[async_trait]
impl HttpTransport for MockTransport {
	async fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, TransportError> {
		if let Ok(mut calls) = self.calls.lock() {
			calls.push(request.clone());
		}

		if let Some(delay) = self.delay {
			tokio::time::sleep(delay).await;
		}

		self.answer(request)
	}
}
