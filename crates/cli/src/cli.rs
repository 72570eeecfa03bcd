//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::SessionProfile;
use std::path::PathBuf;

/// CARLA Recorder - drive a CARLA session and record its sensors to disk
#[derive(Parser, Debug)]
#[command(
    name = "carla-recorder",
    author,
    version,
    about = "Record a CARLA driving session to disk",
    long_about = "Connects to CARLA, spawns an ego vehicle with nearby traffic, attaches an \n\
                  RGB/depth/segmentation/DVS/radar rig, records every frame to disk, \n\
                  optionally forces a crash and assembles a GIF of the last frames."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CARLA_RECORDER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "CARLA_RECORDER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record a session
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective session configuration
    Info(InfoArgs),
}

/// Where the session configuration comes from
#[derive(Parser, Debug, Clone)]
pub struct SourceArgs {
    /// Path to configuration file (TOML or JSON); built-in profile if omitted
    #[arg(short, long, env = "CARLA_RECORDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Built-in profile used when no configuration file is given
    #[arg(long, value_enum, default_value = "full", env = "CARLA_RECORDER_PROFILE")]
    pub profile: Profile,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Override CARLA server host from configuration
    #[arg(long, env = "CARLA_HOST")]
    pub host: Option<String>,

    /// Override CARLA server port from configuration
    #[arg(long, env = "CARLA_PORT")]
    pub port: Option<u16>,

    /// Override recording duration in seconds
    #[arg(long, env = "CARLA_RECORDER_DURATION")]
    pub duration: Option<f64>,

    /// Override output root directory
    #[arg(short, long, env = "CARLA_RECORDER_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Seed for traffic placement (random if omitted)
    #[arg(long, env = "CARLA_RECORDER_SEED")]
    pub seed: Option<u64>,

    /// Skip the crash sequence
    #[arg(long)]
    pub no_crash: bool,

    /// Run against the in-process mock simulator
    #[arg(long, env = "CARLA_RECORDER_MOCK")]
    pub mock: bool,

    /// Validate configuration and exit without running the session
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus metrics port (disabled if omitted)
    #[arg(long, env = "CARLA_RECORDER_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "session.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show detailed sensor information
    #[arg(long)]
    pub sensors: bool,

    /// Print the effective configuration as TOML
    #[arg(long, conflicts_with = "json")]
    pub toml: bool,
}

/// Built-in session profile
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum Profile {
    /// RGB/depth/segmentation/DVS with plain autopilot
    Basic,
    /// Adds radar, traffic-manager tuning, crash and GIF
    #[default]
    Full,
}

impl From<Profile> for SessionProfile {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Basic => SessionProfile::Basic,
            Profile::Full => SessionProfile::Full,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
