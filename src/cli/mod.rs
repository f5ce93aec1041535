//! Command-line interface for Cartographer.

pub mod commands;
pub mod context;
pub mod id_resolver;
pub mod output;
pub mod types;

pub use context::{load_config, AppContext};
pub use types::{Cli, Commands};

use crate::services::InvocationResponse;

/// Report a failed command and exit non-zero.
///
/// In JSON mode the error is printed to stdout as a failed invocation response.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let response = InvocationResponse::failure(format!("{err:#}"));
        println!("{}", serde_json::to_string_pretty(&response).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
