//! Cartographer - unattended exploration run orchestrator
//!
//! Cartographer advances long-running exploration runs one unit of work per
//! scheduler tick. A run generates exploration steps in phase 1, optionally
//! stops early once recent steps converge, picks a winning step, and then
//! runs grounding rounds in phase 2 until it completes.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, port traits and the error taxonomy
//! - **Service Layer** (`services`): Run state machine, dispatcher, sequencer,
//!   convergence detector, selector and tick scheduler
//! - **Adapters** (`adapters`): SQLite repositories and generation routines
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use cartographer::cli::{load_config, AppContext};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = AppContext::open(load_config(None)?).await?;
//!     let report = ctx.scheduler().process_due_runs().await?;
//!     println!("{}", serde_json::to_string(&report.to_response())?);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{Artifact, Config, NewRun, Run, RunEvent, RunPhase, RunStatus};
pub use domain::ports::{ArtifactRepository, Generator, RunEventRepository, RunRepository};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{InvocationResponse, RunOutcome, RunStateMachine, TickScheduler};
