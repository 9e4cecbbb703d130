//! Command-line interface for voxcheck
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Voice authenticity checking from the terminal
#[derive(Parser, Debug)]
#[command(
    name = "voxcheck",
    version,
    about = "Check a voice sample for signs of synthesis"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress progress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug logging, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device (e.g., pipewire, hw:0)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Recording duration (default: 4s). Examples: 10, 30s, 1m
    #[arg(long, short = 'd', value_name = "DURATION", default_value = "4s", value_parser = parse_duration_secs)]
    pub duration: u64,

    /// Check a WAV file instead of recording ("-" reads from stdin)
    #[arg(long, value_name = "PATH")]
    pub wav: Option<PathBuf>,

    /// Print the report as a single JSON line
    #[arg(long)]
    pub json: bool,
}

/// Parse a recording duration string into seconds.
///
/// Supports any duration format accepted by `humantime`: bare numbers
/// (seconds), single-unit (`30s`, `5m`), and compound (`1m30s`).
fn parse_duration_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    // Bare number → seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs())
        .map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration inspection actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}
