//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Env var holding scripted transmissions for `--simulate`, `;`-separated.
pub const SIM_FRAMES_ENV: &str = "WEIGH_SIM_FRAMES";

#[derive(Parser, Debug)]
#[command(name = "weigh", version, about = "Weighing station acquisition CLI")]
pub struct Cli {
    /// Path to the station config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/weigh.toml")]
    pub config: PathBuf,

    /// Print events, results and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging] level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Use scripted simulated ports instead of real serial ports
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Replace every configured port with a simulated one. Each transmission listed in WEIGH_SIM_FRAMES (separated by ';') is delivered by one poll, on every active device."
    )]
    pub simulate: bool,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print every stable weight change until Ctrl-C
    Monitor {
        /// Stop after this many milliseconds
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
    },
    /// Run one two-phase weighing (gross/tare) on a channel
    Capture {
        /// Device name to weigh on
        #[arg(long, value_name = "NAME")]
        channel: String,
        /// Give up if both readings have not arrived within this many milliseconds
        #[arg(long, value_name = "MS", default_value_t = 120_000)]
        timeout_ms: u64,
    },
    /// List serial ports present on this machine
    Ports,
    /// Load and validate the config, then print the device table
    CheckConfig,
}
