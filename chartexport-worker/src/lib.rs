//! Chart export worker supervision
//!
//! This crate owns one external rendering process per [`Worker`]: it spawns
//! the process, waits for its readiness handshake, forwards conversion jobs
//! to it over loopback HTTP, bounds every job with a [`Watchdog`], classifies
//! failures into [`WorkerError`] and tears the process down again.

pub mod error;
pub mod monitor;
pub mod process;
pub mod protocol;
pub mod state;
pub mod watchdog;
pub mod worker;

// Re-export main types
pub use error::{WorkerError, WorkerResult};
pub use monitor::Monitor;
pub use process::WorkerProcess;
pub use protocol::{ResponseKind, PING_PAYLOAD, READY_SENTINEL};
pub use state::{StateCell, WorkerState};
pub use watchdog::Watchdog;
pub use worker::Worker;

// Re-export configuration for callers that only depend on this crate
pub use chartexport_config::WorkerConfig;
