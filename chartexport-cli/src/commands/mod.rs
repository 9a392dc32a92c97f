//! CLI command implementations

pub mod config;
pub mod convert;
pub mod ping;

pub use config::*;
pub use convert::*;
pub use ping::*;
