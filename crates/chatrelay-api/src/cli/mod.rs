//! CLI command definitions for the `chatrelay` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod history;
pub mod reset;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Relay a chat platform to a conversational AI backend.
#[derive(Parser)]
#[command(name = "chatrelay", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Data directory holding config.toml, prompt sources, and the snapshot.
    #[arg(long, global = true, env = "CHATRELAY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter implied by `-v` / `--quiet`, used when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "info",
            1 => "info,chatrelay_core=debug,chatrelay_infra=debug,chatrelay=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start relaying messages (console platform on stdin/stdout).
    Run {
        /// Export tracing spans through OpenTelemetry (stdout exporter).
        #[arg(long)]
        otel: bool,

        /// Display name for messages typed into the console.
        #[arg(long, default_value = "you")]
        user: String,
    },

    /// Show a channel's recent turns from the saved snapshot.
    History {
        /// Channel identifier ("direct" for direct messages).
        channel: String,

        /// Number of turns to show.
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },

    /// Clear a channel's saved history.
    Reset {
        /// Channel identifier ("direct" for direct messages).
        channel: String,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}
