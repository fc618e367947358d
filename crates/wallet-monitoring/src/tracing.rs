use ::tracing::{info, info_span, Instrument, Level};
use std::future::Future;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
	pub level: Level,
	pub with_thread_ids: bool,
	pub with_file_and_line: bool,
	pub with_target: bool,
	pub json_format: bool,
	/// Honour `RUST_LOG` when set instead of `level`.
	pub respect_env: bool,
}

impl Default for TracingConfig {
	fn default() -> Self {
		Self {
			level: Level::INFO,
			with_thread_ids: false,
			with_file_and_line: false,
			with_target: true,
			json_format: false,
			respect_env: true,
		}
	}
}

impl TracingConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_level(mut self, level: Level) -> Self {
		self.level = level;
		self
	}

	/// Parses `trace`, `debug`, `info`, `warn` or `error`, case-insensitively.
	pub fn with_level_str(
		self,
		level: &str,
	) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
		let level: Level = level
			.parse()
			.map_err(|e| format!("Invalid log level '{}': {}", level, e))?;
		Ok(self.with_level(level))
	}

	pub fn with_json_format(mut self, json: bool) -> Self {
		self.json_format = json;
		self
	}

	pub fn with_respect_env(mut self, respect_env: bool) -> Self {
		self.respect_env = respect_env;
		self
	}

	pub fn debug() -> Self {
		Self {
			with_thread_ids: true,
			with_file_and_line: true,
			..Self::default()
		}
		.with_level(Level::DEBUG)
	}

	pub fn production() -> Self {
		Self {
			level: Level::INFO,
			with_thread_ids: false,
			with_file_and_line: false,
			with_target: false,
			json_format: true,
			respect_env: true,
		}
	}

	fn filter(&self) -> EnvFilter {
		let fallback = || EnvFilter::new(self.level.as_str().to_lowercase());
		if self.respect_env {
			EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback())
		} else {
			fallback()
		}
	}
}

/// Initialize tracing with the given configuration
///
/// Events go to stderr so stdout stays free for command output. Fails if a
/// global subscriber is already installed.
pub fn init_tracing(config: TracingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	let subscriber = tracing_subscriber::registry().with(config.filter());

	if config.json_format {
		let json_layer = tracing_subscriber::fmt::layer()
			.json()
			.with_writer(std::io::stderr)
			.with_thread_ids(config.with_thread_ids)
			.with_file(config.with_file_and_line)
			.with_line_number(config.with_file_and_line)
			.with_target(config.with_target);

		subscriber
			.with(json_layer)
			.try_init()
			.map_err(|e| format!("Failed to initialize tracing: {}", e))?;
	} else {
		let fmt_layer = tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.with_thread_ids(config.with_thread_ids)
			.with_file(config.with_file_and_line)
			.with_line_number(config.with_file_and_line)
			.with_target(config.with_target);

		subscriber
			.with(fmt_layer)
			.try_init()
			.map_err(|e| format!("Failed to initialize tracing: {}", e))?;
	}

	info!("Tracing initialized with level: {}", config.level);
	Ok(())
}

/// Runs `fut` inside a span named after the wallet and operation and logs
/// how long it took.
pub async fn trace_operation<F, T>(wallet: &str, operation: &str, fut: F) -> T
where
	F: Future<Output = T>,
{
	let span = info_span!("wallet_operation", wallet = %wallet, operation = %operation);
	let start = Instant::now();

	let result = fut.instrument(span).await;

	info!(
		"Completed {} for {} in {:?}",
		operation,
		wallet,
		start.elapsed()
	);
	result
}
