//! Command-line interface for colloquy
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Live meeting transcription service
#[derive(Parser, Debug)]
#[command(name = "colloquy", version, about = "Live meeting transcription service")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the session and subscriber endpoint (default)
    Serve {
        /// Bind address override
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Port override
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,

        /// Read audio from a WAV file instead of stdin
        #[arg(long, value_name = "PATH")]
        audio_file: Option<PathBuf>,
    },

    /// Validate configuration and API key environment
    Check,
}
