//! CLI argument parsing.

mod args;
mod validators;

pub use args::{Cli, Command, ConfigAction, ExtractArgs, GapsArgs, IndexAction};
pub use validators::{parse_non_negative_secs, parse_positive_secs, parse_time, parse_timeout_secs};
