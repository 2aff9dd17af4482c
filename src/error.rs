//! Error types for quakecut.
//!
//! [`Error`] is returned for failures that stop an operation outright.
//! [`Failure`] describes why a single channel or reference station did not
//! produce data; a batch keeps going when one of those occurs.

use serde::Serialize;
use std::path::PathBuf;

/// Result type alias for quakecut operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for quakecut.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize config")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// Index file extension not recognised.
    #[error("unsupported index format for '{path}' (expected .db, .sqlite or .json)")]
    UnsupportedIndexFormat {
        /// Path to the index file.
        path: PathBuf,
    },

    /// Index file does not exist.
    #[error("index file does not exist: {path}")]
    IndexNotFound {
        /// Path to the missing index.
        path: PathBuf,
    },

    /// SQLite index operation failed.
    #[error("SQLite index error on '{path}'")]
    Sqlite {
        /// Path to the database.
        path: PathBuf,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to read or parse a JSON index.
    #[error("failed to parse JSON index '{path}'")]
    JsonIndex {
        /// Path to the JSON file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A segment record violates `start_time < end_time`.
    #[error("invalid segment '{content_id}': start {start} is not before end {end}")]
    InvalidSegment {
        /// Content tag of the record.
        content_id: String,
        /// Record start.
        start: String,
        /// Record end.
        end: String,
    },

    /// Time string could not be parsed.
    #[error("invalid time '{value}': {reason}")]
    InvalidTime {
        /// Offending input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Waveform file is not valid miniSEED.
    #[error("invalid miniSEED in '{path}': {reason}")]
    MseedDecode {
        /// Path to the file (or a URL for remote data).
        path: PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// Failed to write WAV file.
    #[error("failed to write WAV file '{path}'")]
    WavWriteFailed {
        /// Path to the WAV file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: hound::Error,
    },

    /// Series cannot be written in the requested format.
    #[error("cannot write '{path}': {reason}")]
    UnwritableSeries {
        /// Destination path.
        path: PathBuf,
        /// Why the series does not fit the format.
        reason: String,
    },

    /// Failed to create output directory.
    #[error("failed to create output directory '{path}'")]
    OutputDirCreateFailed {
        /// Path to the output directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to clear a previous event directory.
    #[error("failed to remove existing output directory '{path}'")]
    OutputDirRemoveFailed {
        /// Path to the output directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the event catalogue.
    #[error("failed to parse catalogue '{path}'")]
    CatalogParseFailed {
        /// Path to the catalogue.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Catalogue content is malformed.
    #[error("invalid catalogue: {message}")]
    InvalidCatalog {
        /// Description of the format error.
        message: String,
    },

    /// Requested event is not in the catalogue.
    #[error("event '{id}' not found in catalogue")]
    EventNotFound {
        /// Requested event id.
        id: String,
    },

    /// Failed to parse a station metadata file.
    #[error("invalid station metadata in '{path}': {message}")]
    InvalidStationFile {
        /// Path to the file.
        path: PathBuf,
        /// Description of the format error.
        message: String,
    },

    /// Failed to write CSV output.
    #[error("failed to write CSV output '{path}'")]
    CsvWrite {
        /// Path to the CSV file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },

    /// HTTP client could not be built.
    #[error("failed to create HTTP client")]
    HttpClient {
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// Internal error (for unexpected failures).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Stable identifier used in JSON error envelopes.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::ConfigDirNotFound
            | Self::ConfigRead { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigWrite { .. }
            | Self::ConfigSerialize { .. } => "config",
            Self::ConfigValidation { .. } => "config_validation",
            Self::UnsupportedIndexFormat { .. } | Self::IndexNotFound { .. } => "index_open",
            Self::Sqlite { .. } | Self::JsonIndex { .. } | Self::InvalidSegment { .. } => "index",
            Self::InvalidTime { .. } => "invalid_time",
            Self::MseedDecode { .. } => "mseed_decode",
            Self::WavWriteFailed { .. } | Self::UnwritableSeries { .. } | Self::CsvWrite { .. } => {
                "write"
            }
            Self::OutputDirCreateFailed { .. } | Self::OutputDirRemoveFailed { .. } => "output_dir",
            Self::CatalogParseFailed { .. } | Self::InvalidCatalog { .. } => "catalog",
            Self::EventNotFound { .. } => "event_not_found",
            Self::InvalidStationFile { .. } => "station_file",
            Self::HttpClient { .. } => "http_client",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Why one channel or reference station produced no trace.
///
/// These are reported next to successful results and never abort a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    /// Nothing matched, or nothing that matched could be loaded.
    #[error("no data for window: {reason}")]
    NoData {
        /// What was missing.
        reason: String,
    },

    /// Segments could not be combined into one series.
    #[error("merge failed: {reason}")]
    Merge {
        /// Why the series are incompatible.
        reason: String,
    },

    /// The assembled series could not be persisted.
    #[error("write failed: {reason}")]
    Write {
        /// Underlying error text.
        reason: String,
    },

    /// The remote service failed for this station.
    #[error("remote service failed: {reason}")]
    Remote {
        /// Underlying error text.
        reason: String,
    },

    /// The unit did not finish within its time budget.
    #[error("timed out after {after_secs}s")]
    Timeout {
        /// Budget that was exceeded.
        after_secs: u64,
    },

    /// The run was cancelled before this unit started.
    #[error("cancelled")]
    Cancelled,
}

impl Failure {
    /// Shorthand for [`Failure::NoData`].
    pub fn no_data(reason: impl Into<String>) -> Self {
        Self::NoData {
            reason: reason.into(),
        }
    }

    /// Short machine-readable name of the failure kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NoData { .. } => "no_data",
            Self::Merge { .. } => "merge",
            Self::Write { .. } => "write",
            Self::Remote { .. } => "remote",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_names() {
        assert_eq!(Failure::no_data("x").kind(), "no_data");
        assert_eq!(Failure::Cancelled.kind(), "cancelled");
        assert_eq!(Failure::Timeout { after_secs: 3 }.kind(), "timeout");
    }

    #[test]
    fn test_failure_serializes_with_kind_tag() {
        let json = serde_json::to_string(&Failure::Merge {
            reason: "rates differ".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"merge","reason":"rates differ"}"#);
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            Failure::Timeout { after_secs: 30 }.to_string(),
            "timed out after 30s"
        );
    }
}
