//! Telemetry module for logging and runtime counters.
//!
//! Provides:
//! - Logging configuration and initialization
//! - Process-wide forwarding statistics and worker heartbeats

mod logging;
mod stats;

pub use logging::{init_logging, LogConfig};
pub use stats::{now_unix, Direction, Telemetry};
