//! CLI module for vdm
//!
//! Provides command-line interface for:
//! - init: Create and bootstrap the repository store
//! - history: List committed revisions
//! - show: Show one revision
//! - youngest: Show the youngest revision

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{history, init, run, run_command, show, youngest};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
