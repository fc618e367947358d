//! Observability for the wallet gateway.
//!
//! # Components
//!
//! - `tracing`: subscriber setup and timing of top-level operations
//!
//! Library crates only emit `tracing` events; binaries call
//! [`tracing::init_tracing`] once at startup to decide where they go.

pub mod tracing;

pub use crate::tracing::{init_tracing, trace_operation, TracingConfig};
