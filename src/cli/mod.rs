//! CLI module for Mathmatika
//!
//! Provides command-line interface parsing and handling for the mathmatika-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod commands;
pub mod output;

use crate::research::Strategy;
use crate::utils::config::default_config_path;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mathmatika - research orchestration server
///
/// Web-grounded research synthesis with basic, deep and multi-agent
/// strategies, streamed tutoring chat and document-grounded Q&A.
#[derive(Parser, Debug)]
#[command(
    name = "mathmatika-server",
    version,
    about = "Mathmatika - research orchestration server",
    long_about = "Web-grounded research synthesis with basic, deep and multi-agent strategies,\n\
                  streamed tutoring chat and document-grounded Q&A.\n\n\
                  Run without arguments to start the server.",
    after_help = "EXAMPLES:\n    \
                  mathmatika-server                                  # Start the server\n    \
                  mathmatika-server ask \"what is a Banach space?\"    # Stream a chat answer\n    \
                  mathmatika-server research \"L'Hopital's rule\" -s deep\n    \
                  mathmatika-server --config my.toml config --validate"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value_os_t = default_config_path(), global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Stream an answer from a running server
    ///
    /// Press Ctrl-C to cancel the exchange; no further output is printed.
    Ask {
        /// Question or message
        message: String,

        /// Answer from an uploaded document index instead of chatting
        #[arg(short, long)]
        index: Option<String>,

        /// Server base URL (defaults to the configured bind address)
        #[arg(long)]
        server: Option<String>,
    },

    /// Run a single-shot research strategy on a running server
    Research {
        /// Research question
        query: String,

        /// Strategy to run (basic, deep, multi-agent)
        #[arg(short, long, default_value = "basic")]
        strategy: Strategy,

        /// Server base URL (defaults to the configured bind address)
        #[arg(long)]
        server: Option<String>,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
