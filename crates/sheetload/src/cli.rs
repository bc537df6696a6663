use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use loaderconfig::FastPathMode;

#[derive(Parser, Debug)]
#[command(
    name = "sheetload",
    author,
    version,
    about = "Preload sprite sheets through the asynchronous atlas loader"
)]
pub struct Cli {
    /// Read loader settings from this TOML file instead of the discovered one.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load manifests and their paired images, then print a summary.
    Preload(PreloadArgs),
    /// Inspect or create the loader configuration file.
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct PreloadArgs {
    /// Manifest files, or directories scanned for files with the manifest suffix.
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Print the summary as JSON.
    #[arg(long)]
    pub json: bool,

    /// Submit the whole set this many times, waiting for each pass to settle.
    #[arg(long, value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub passes: u32,

    /// Length of one simulated host frame in milliseconds.
    #[arg(long, value_name = "MILLISECONDS", default_value_t = 16)]
    pub frame_ms: u64,

    /// Give up on a pass that has not settled after this long (e.g. `10s`, `500ms`).
    #[arg(long, value_name = "DURATION", default_value = "30s", value_parser = parse_timeout)]
    pub timeout: Duration,

    /// Override the configured fast-path mode: `exclusive`, `duplicate`, or `disabled`.
    #[arg(long, value_name = "MODE", value_parser = parse_fast_path)]
    pub fast_path: Option<FastPathMode>,
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print where the configuration file is looked up.
    Where,
    /// Write the default configuration to the configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_fast_path(value: &str) -> Result<FastPathMode, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("fast-path mode must not be empty".to_string());
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "exclusive" | "skip-decode" => Ok(FastPathMode::Exclusive),
        "duplicate" | "double" => Ok(FastPathMode::Duplicate),
        "disabled" | "off" | "none" => Ok(FastPathMode::Disabled),
        other => Err(format!(
            "unknown fast-path mode '{other}'; expected exclusive, duplicate, or disabled"
        )),
    }
}

pub fn parse_timeout(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("timeout must not be empty".to_string());
    }

    let timeout = match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Duration::from_secs_f64(seconds),
        Ok(_) => return Err(format!("invalid timeout '{trimmed}'")),
        Err(_) => humantime::parse_duration(trimmed)
            .map_err(|err| format!("invalid timeout '{trimmed}': {err}"))?,
    };

    if timeout.is_zero() {
        return Err("timeout must be greater than zero".to_string());
    }
    Ok(timeout)
}
