//! CLI argument definitions using clap
//!
//! Commands:
//! - vdm init --config <path>
//! - vdm history --config <path>
//! - vdm show <number> --config <path>
//! - vdm youngest --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// vdm - versioned domain model repository tool
#[derive(Parser, Debug)]
#[command(name = "vdm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialise a new repository store
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./vdm.json")]
        config: PathBuf,
    },

    /// List committed revisions, youngest first
    History {
        /// Path to configuration file
        #[arg(long, default_value = "./vdm.json")]
        config: PathBuf,
    },

    /// Show one committed revision
    Show {
        /// Revision number
        number: u64,

        /// Path to configuration file
        #[arg(long, default_value = "./vdm.json")]
        config: PathBuf,
    },

    /// Show the youngest committed revision
    Youngest {
        /// Path to configuration file
        #[arg(long, default_value = "./vdm.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
