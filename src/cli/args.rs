//! CLI argument definitions.

use super::validators::{parse_non_negative_secs, parse_time, parse_timeout_secs};
use crate::config::WaveformFormat;
use crate::time::Timestamp;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Event-window extraction from a continuous seismic archive.
#[derive(Debug, Parser)]
#[command(name = "quakecut")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: platform config directory).
    #[arg(long, global = true, env = "QUAKECUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v: debug, -vv: trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print results as JSON envelopes on stdout.
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Cut event windows out of the archive.
    Extract(ExtractArgs),
    /// Report gaps and overlaps per channel.
    Gaps(GapsArgs),
    /// Inspect or convert segment indexes.
    Index {
        /// Index action to perform.
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

/// Index subcommand actions.
#[derive(Debug, Subcommand)]
pub enum IndexAction {
    /// Copy a JSON index into a new SQLite archive.
    Import {
        /// JSON array of segment records.
        source: PathBuf,
        /// SQLite file to create.
        destination: PathBuf,
    },
    /// Summarise an index.
    Stats {
        /// Index file (.db, .sqlite or .json).
        index: PathBuf,
    },
}

/// Arguments for `extract`.
#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Segment index (.db, .sqlite or .json).
    #[arg(long, env = "QUAKECUT_INDEX")]
    pub index: PathBuf,

    /// Event catalogue CSV.
    #[arg(long, required_unless_present = "event_id", conflicts_with_all = ["event_id", "time"])]
    pub catalog: Option<PathBuf>,

    /// Events to extract from the catalogue (default: all).
    #[arg(long = "event", requires = "catalog")]
    pub events: Vec<String>,

    /// Identifier of a single event given on the command line.
    #[arg(long, requires = "time")]
    pub event_id: Option<String>,

    /// Reference time of the single event (RFC 3339 or epoch seconds).
    #[arg(long, value_parser = parse_time, requires = "event_id")]
    pub time: Option<Timestamp>,

    /// Stations to extract (default: all).
    #[arg(long = "station")]
    pub stations: Vec<String>,

    /// Primary station metadata (FDSN text); restricts stations and
    /// locates the deployment for reference augmentation.
    #[arg(long)]
    pub stations_file: Option<PathBuf>,

    /// Components or `_`/`?` patterns (default: from config).
    #[arg(long = "component")]
    pub components: Vec<String>,

    /// Output root directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format (mseed, wav).
    #[arg(short, long)]
    pub format: Option<WaveformFormat>,

    /// Channel units processed concurrently.
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..=64))]
    pub workers: Option<u16>,

    /// Time budget per unit in seconds.
    #[arg(long, value_parser = parse_timeout_secs)]
    pub timeout: Option<f64>,

    /// Sample value for missing data.
    #[arg(long, allow_negative_numbers = true)]
    pub fill: Option<f64>,

    /// Also fetch traces of nearby permanent stations.
    #[arg(long, requires = "stations_file")]
    pub reference: bool,

    /// Suppress the progress bar.
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for `gaps`.
#[derive(Debug, Args)]
pub struct GapsArgs {
    /// Segment index (.db, .sqlite or .json).
    #[arg(long, env = "QUAKECUT_INDEX")]
    pub index: PathBuf,

    /// Stations to analyze (default: all).
    #[arg(long = "station")]
    pub stations: Vec<String>,

    /// Largest mismatch in seconds still treated as contiguous.
    #[arg(long, value_parser = parse_non_negative_secs)]
    pub tolerance: Option<f64>,

    /// Write the report as CSV instead of printing it.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
