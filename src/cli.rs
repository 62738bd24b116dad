//! CLI argument parsing with clap derive.

use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_SLEEP_SECS;

/// Lightweight HTTP beacon agent for adversary-emulation exercises
#[derive(Debug, Parser)]
#[command(name = "caracal", version)]
pub struct Cli {
    /// Controller base URL
    #[arg(long, env = "CARACAL_SERVER", default_value = "https://localhost:8888")]
    pub server: String,

    /// Group/tag label reported on every beacon
    #[arg(long, env = "CARACAL_GROUP", default_value = "red")]
    pub group: String,

    /// Seconds between beacons (controller may override at runtime)
    #[arg(long, default_value_t = DEFAULT_SLEEP_SECS)]
    pub sleep: u64,

    /// Append the diagnostic log to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
