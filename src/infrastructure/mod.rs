//! Infrastructure layer module
//!
//! Process-level concerns that are not ports of the domain:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)

pub mod config;
pub mod logging;
