//! HTTP transport seam.
//!
//! The executor only talks to [`HttpTransport`], so tests can swap the
//! network for a scripted implementation. [`ReqwestTransport`] is the one
//! used in production.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use wallet_types::{HttpMethod, RequestDescriptor};

/// Status and undecoded body of an upstream answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
	pub status: u16,
	pub body: String,
}

impl TransportResponse {
	pub fn new(status: u16, body: impl Into<String>) -> Self {
		Self {
			status,
			body: body.into(),
		}
	}

	pub fn ok(body: impl Into<String>) -> Self {
		Self::new(200, body)
	}
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
	#[error("Request timed out")]
	Timeout,

	#[error("Connection error: {0}")]
	Connect(String),

	#[error("Invalid request: {0}")]
	InvalidRequest(String),

	#[error("Transport error: {0}")]
	Other(String),
}

impl From<reqwest::Error> for TransportError {
	fn from(error: reqwest::Error) -> Self {
		if error.is_timeout() {
			TransportError::Timeout
		} else if error.is_connect() {
			TransportError::Connect(error.to_string())
		} else if error.is_builder() {
			TransportError::InvalidRequest(error.to_string())
		} else {
			TransportError::Other(error.to_string())
		}
	}
}

/// Performs exactly one network call for a descriptor. No retries, no
/// status interpretation.
#[async_trait]
pub trait HttpTransport: Send + Sync {
	async fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
	client: reqwest::Client,
}

impl ReqwestTransport {
	const USER_AGENT: &'static str = concat!("wallet-gateway/", env!("CARGO_PKG_VERSION"));

	pub fn new() -> Result<Self, TransportError> {
		let client = reqwest::Client::builder()
			.user_agent(Self::USER_AGENT)
			.connect_timeout(Duration::from_secs(10))
			.build()
			.map_err(|e| TransportError::Other(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self { client })
	}

	pub fn with_client(client: reqwest::Client) -> Self {
		Self { client }
	}
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
	async fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, TransportError> {
		let mut builder = match request.method {
			HttpMethod::Get => self.client.get(&request.url),
			HttpMethod::Post => self.client.post(&request.url),
		};

		if !request.params.is_empty() {
			builder = builder.query(&request.params);
		}

		for (key, value) in &request.transport.headers {
			builder = builder.header(key, value);
		}

		if let Some(timeout) = request.transport.timeout() {
			builder = builder.timeout(timeout);
		}

		if let Some(body) = &request.body {
			builder = builder.json(body);
		}

		debug!(
			"{} {} ({})",
			request.method.as_str(),
			request.url,
			request.operation
		);

		let response = builder.send().await?;
		let status = response.status().as_u16();
		let body = response.text().await?;

		Ok(TransportResponse { status, body })
	}
}
