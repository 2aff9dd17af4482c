//! Application-wide constants.
//!
//! All magic numbers and strings are defined here to ensure consistency
//! and make changes easy to track.

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "quakecut";

/// Microseconds per second, the resolution of [`crate::time::Timestamp`].
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Segment matching defaults.
pub mod matching {
    /// Seconds before the reference time where the match window opens.
    pub const DEFAULT_LEAD_SECS: f64 = 600.0;

    /// Seconds after the reference time where the match window closes.
    pub const DEFAULT_LAG_SECS: f64 = 1800.0;
}

/// Final trim window defaults.
pub mod trim {
    /// Seconds kept before the reference time.
    pub const DEFAULT_LEAD_SECS: f64 = 300.0;

    /// Seconds kept after the reference time.
    pub const DEFAULT_LAG_SECS: f64 = 900.0;

    /// Value written where no recorded sample exists.
    pub const DEFAULT_FILL_VALUE: f64 = 0.0;
}

/// Gap analysis defaults.
pub mod gaps {
    /// Largest start/end mismatch (seconds) still treated as contiguous.
    pub const DEFAULT_TOLERANCE_SECS: f64 = 1.0;
}

/// Extraction run defaults.
pub mod extraction {
    /// Default number of concurrent channel units.
    pub const DEFAULT_WORKERS: usize = 4;

    /// Upper bound on concurrent units to keep file handle usage sane.
    pub const MAX_WORKERS: usize = 64;

    /// Default per-unit timeout in seconds.
    pub const DEFAULT_UNIT_TIMEOUT_SECS: u64 = 120;

    /// Longest accepted per-unit timeout in seconds (one day).
    pub const MAX_UNIT_TIMEOUT_SECS: u32 = 86_400;

    /// Default output root for event directories.
    pub const DEFAULT_OUTPUT_DIR: &str = "events";

    /// Components extracted when none are given.
    pub const DEFAULT_COMPONENTS: &[&str] = &["EHZ", "EHN", "EHE"];

    /// Subdirectory for reference-network traces.
    pub const REFERENCE_SUBDIR: &str = "ref_data";

    /// File name of the persisted reference inventory.
    pub const REFERENCE_INVENTORY_FILE: &str = "reference_stations.txt";
}

/// Remote reference service defaults.
pub mod reference {
    /// Base URL of the FDSN web services.
    pub const DEFAULT_SERVICE_URL: &str = "https://service.iris.edu";

    /// Networks searched for reference stations.
    pub const DEFAULT_NETWORKS: &[&str] = &["AU"];

    /// Channel selector sent to the dataselect service.
    pub const DEFAULT_CHANNELS: &str = "BH?";

    /// Degrees added around the deployment's bounding box.
    pub const DEFAULT_MARGIN_DEGREES: f64 = 1.0;

    /// Per-request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Connect timeout in seconds.
    pub const CONNECT_TIMEOUT_SECS: u64 = 15;

    /// Retries for transient failures (never for "no data").
    pub const DEFAULT_RETRIES: u32 = 2;

    /// Base delay between retries in milliseconds, doubled per attempt.
    pub const RETRY_BASE_DELAY_MS: u64 = 500;
}

/// miniSEED layout constants.
pub mod mseed {
    /// Length of the fixed section of the data header.
    pub const FIXED_HEADER_LEN: usize = 48;

    /// Record length produced by the writer (2^9).
    pub const WRITE_RECORD_LEN: usize = 512;

    /// Record length exponent matching [`WRITE_RECORD_LEN`].
    pub const WRITE_RECORD_EXP: u8 = 9;

    /// Offset of the first data byte in written records.
    pub const WRITE_DATA_OFFSET: usize = 64;

    /// Blockette type carrying encoding and record length.
    pub const BLOCKETTE_1000: u16 = 1000;

    /// Size of a Steim frame in bytes.
    pub const STEIM_FRAME_LEN: usize = 64;
}

/// Output file extensions by format.
pub mod output_extensions {
    /// miniSEED output extension.
    pub const MSEED: &str = "mseed";
    /// WAV output extension.
    pub const WAV: &str = "wav";
}

/// Relative tolerance when comparing sample rates of merged series.
pub const SAMPLE_RATE_TOLERANCE: f64 = 1e-6;

/// UTF-8 Byte Order Mark, stripped from catalogue files.
pub const UTF8_BOM: &[u8; 3] = b"\xEF\xBB\xBF";
