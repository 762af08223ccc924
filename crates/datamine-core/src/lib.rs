//! Datamine Core - transport and console plumbing for dataset provisioning
//!
//! This crate provides the blocking HTTP fetcher, its error type, and the
//! logging/progress helpers shared by the store and the CLI.

pub mod error;
pub mod logging;
pub mod progress;
pub mod stream;

// Re-exports for convenience
pub use error::StreamError;
pub use logging::{IndicatifLogger, Verbosity, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use stream::{Fetch, HttpConfig, HttpFetcher, SHARED_RUNTIME, TimeoutReader, copy_blocks};
