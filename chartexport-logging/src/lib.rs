//! Logging initialisation for the chart export supervisor
//!
//! Everything logs through `tracing`; this crate only decides where the
//! events go and how they are rendered.

pub mod init;

pub use init::{build_env_filter, init_logging, init_simple_tracing};
