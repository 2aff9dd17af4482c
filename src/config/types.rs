//! Configuration type definitions.

use crate::constants::{extraction, gaps, matching, reference, trim};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Window used to select candidate segments.
    pub matching: MatchingConfig,

    /// Window the assembled traces are cut to.
    pub trim: TrimConfig,

    /// Gap analysis settings.
    pub gaps: GapsConfig,

    /// Extraction run settings.
    pub extraction: ExtractionConfig,

    /// Reference network augmentation.
    pub reference: ReferenceConfig,
}

/// Segment matching window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Seconds before the reference time.
    pub lead_secs: f64,

    /// Seconds after the reference time.
    pub lag_secs: f64,

    /// How long after the window start a segment may begin and still match.
    /// Defaults to the window length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance_secs: Option<f64>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            lead_secs: matching::DEFAULT_LEAD_SECS,
            lag_secs: matching::DEFAULT_LAG_SECS,
            tolerance_secs: None,
        }
    }
}

/// Final trim window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Seconds kept before the reference time.
    pub lead_secs: f64,

    /// Seconds kept after the reference time.
    pub lag_secs: f64,

    /// Sample value written where nothing was recorded.
    pub fill_value: f64,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            lead_secs: trim::DEFAULT_LEAD_SECS,
            lag_secs: trim::DEFAULT_LAG_SECS,
            fill_value: trim::DEFAULT_FILL_VALUE,
        }
    }
}

/// Gap analysis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapsConfig {
    /// Largest start/end mismatch in seconds still treated as contiguous.
    pub tolerance_secs: f64,
}

impl Default for GapsConfig {
    fn default() -> Self {
        Self {
            tolerance_secs: gaps::DEFAULT_TOLERANCE_SECS,
        }
    }
}

/// Extraction run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Channel units processed concurrently.
    pub workers: usize,

    /// Time budget for one unit, in seconds.
    pub unit_timeout_secs: u64,

    /// Output file format.
    pub format: WaveformFormat,

    /// Components (or `_`/`?` patterns) extracted when none are given.
    pub components: Vec<String>,

    /// Root directory for per-event output.
    pub output_dir: PathBuf,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            workers: extraction::DEFAULT_WORKERS,
            unit_timeout_secs: extraction::DEFAULT_UNIT_TIMEOUT_SECS,
            format: WaveformFormat::default(),
            components: extraction::DEFAULT_COMPONENTS
                .iter()
                .map(ToString::to_string)
                .collect(),
            output_dir: PathBuf::from(extraction::DEFAULT_OUTPUT_DIR),
        }
    }
}

/// Reference network augmentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Fetch reference stations on every extraction.
    pub enabled: bool,

    /// Base URL of the FDSN web services.
    pub service_url: String,

    /// Networks searched for reference stations.
    pub networks: Vec<String>,

    /// Channel selector for waveform requests.
    pub channels: String,

    /// Degrees added around the deployment's bounding box.
    pub margin_degrees: f64,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Retries for transient failures.
    pub retries: u32,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_url: reference::DEFAULT_SERVICE_URL.to_string(),
            networks: reference::DEFAULT_NETWORKS
                .iter()
                .map(ToString::to_string)
                .collect(),
            channels: reference::DEFAULT_CHANNELS.to_string(),
            margin_degrees: reference::DEFAULT_MARGIN_DEGREES,
            timeout_secs: reference::DEFAULT_TIMEOUT_SECS,
            retries: reference::DEFAULT_RETRIES,
        }
    }
}

/// Supported waveform output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveformFormat {
    /// miniSEED 2 records.
    #[default]
    Mseed,
    /// 32-bit float WAV.
    Wav,
}

impl std::fmt::Display for WaveformFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mseed => write!(f, "mseed"),
            Self::Wav => write!(f, "wav"),
        }
    }
}

impl std::str::FromStr for WaveformFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mseed" | "miniseed" => Ok(Self::Mseed),
            "wav" => Ok(Self::Wav),
            other => Err(format!("unknown waveform format: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_format_from_str() {
        assert_eq!("mseed".parse::<WaveformFormat>().ok(), Some(WaveformFormat::Mseed));
        assert_eq!(
            "MiniSEED".parse::<WaveformFormat>().ok(),
            Some(WaveformFormat::Mseed)
        );
        assert_eq!("wav".parse::<WaveformFormat>().ok(), Some(WaveformFormat::Wav));
        assert!("sac".parse::<WaveformFormat>().is_err());
    }

    #[test]
    fn test_waveform_format_display() {
        assert_eq!(WaveformFormat::Mseed.to_string(), "mseed");
        assert_eq!(WaveformFormat::Wav.to_string(), "wav");
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.matching.lead_secs, 600.0);
        assert_eq!(config.matching.tolerance_secs, None);
        assert_eq!(config.trim.lag_secs, 900.0);
        assert_eq!(config.gaps.tolerance_secs, 1.0);
        assert_eq!(config.extraction.workers, 4);
        assert_eq!(config.extraction.components, vec!["EHZ", "EHN", "EHE"]);
        assert!(!config.reference.enabled);
        assert_eq!(config.reference.networks, vec!["AU"]);
    }
}
