//! Request execution for the wallet provider gateway.
//!
//! This crate turns [`RequestDescriptor`](wallet_types::RequestDescriptor)s
//! into decoded upstream responses and maps every failure onto the shared
//! error taxonomy.
//!
//! # Architecture
//!
//! - `transport`: the `HttpTransport` seam and its reqwest implementation
//! - `executor`: applies transport options, the "empty is success" status
//!   policy and optional retries
//! - `retry`: exponential backoff settings derived from a `RetryPolicy`
//! - `coalescer`: single-flight layer that merges concurrent identical reads

pub mod coalescer;
pub mod executor;
pub mod retry;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use coalescer::RequestCoalescer;
pub use executor::RequestExecutor;
pub use transport::{HttpTransport, ReqwestTransport, TransportError, TransportResponse};
