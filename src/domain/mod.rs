//! Domain layer for the Cartographer run orchestrator
//!
//! Core models, port traits and the error taxonomy. Nothing here talks to a
//! database or a provider directly.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
