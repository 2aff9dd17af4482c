//! JSON envelope types for CLI output.
//!
//! With `--json` every command prints one envelope per result on stdout,
//! so quakecut can feed scripts and other tools.

use crate::error::Failure;
use crate::gaps::ChannelReport;
use crate::index::IndexStats;
use crate::pipeline::{ChannelOutcome, ExtractionReport, SkippedSegment};
use crate::reference::{BoundingBox, ReferenceReport, StationOutcome};
use crate::time::Timestamp;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Current spec version for JSON envelope.
pub const SPEC_VERSION: &str = "1.0";

/// JSON envelope wrapping all CLI output events.
#[derive(Debug, Serialize)]
pub struct JsonEnvelope<T> {
    /// API specification version.
    pub spec_version: String,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
    /// Event type.
    pub event: EventType,
    /// Event-specific payload.
    pub payload: T,
}

impl<T: Serialize> JsonEnvelope<T> {
    /// Create a new envelope with the current timestamp.
    pub fn new(event: EventType, payload: T) -> Self {
        Self {
            spec_version: SPEC_VERSION.to_string(),
            timestamp: Utc::now(),
            event,
            payload,
        }
    }
}

/// Event types for JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Final result.
    Result,
    /// Error occurred.
    Error,
    /// Operation cancelled.
    Cancelled,
}

/// Result type discriminator for result payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    /// Event extraction.
    Extraction,
    /// Gap and overlap report.
    GapReport,
    /// Index summary.
    IndexStats,
    /// JSON to SQLite import.
    IndexImport,
    /// Configuration display.
    Config,
}

/// Error severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// The command could not complete.
    Fatal,
    /// The command continued with issues.
    Warning,
}

/// Error payload for error events.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    /// Error code (`snake_case` identifier).
    pub code: String,
    /// Error severity.
    pub severity: ErrorSeverity,
    /// Human-readable error message.
    pub message: String,
}

/// Status of one channel or reference station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Output was written.
    Written,
    /// No output; see the failure.
    Failed,
    /// Stopped by cancellation.
    Cancelled,
}

impl UnitStatus {
    fn of<T>(result: &Result<T, Failure>) -> Self {
        match result {
            Ok(_) => Self::Written,
            Err(Failure::Cancelled) => Self::Cancelled,
            Err(_) => Self::Failed,
        }
    }
}

/// Payload for `extract`.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionPayload {
    /// Result type discriminator.
    pub result_type: ResultType,
    /// One entry per processed event.
    pub events: Vec<EventSummary>,
}

/// Summary of one event's extraction.
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    /// Event identifier.
    pub event_id: String,
    /// Output directory.
    pub event_dir: PathBuf,
    /// Reference time.
    pub reference_time: Timestamp,
    /// Start of the trim window.
    pub window_start: Timestamp,
    /// End of the trim window.
    pub window_end: Timestamp,
    /// Segments returned by the index.
    pub matched_segments: usize,
    /// Channels written.
    pub written: usize,
    /// Channels failed.
    pub failed: usize,
    /// Channels cancelled.
    pub cancelled: usize,
    /// Per-channel detail.
    pub channels: Vec<ChannelSummary>,
    /// Reference augmentation, when it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceSummary>,
}

impl EventSummary {
    /// Summarise an extraction report.
    pub fn new(report: &ExtractionReport, reference: Option<&ReferenceReport>) -> Self {
        Self {
            event_id: report.event_id.clone(),
            event_dir: report.event_dir.clone(),
            reference_time: report.trim_window.reference,
            window_start: report.trim_window.start(),
            window_end: report.trim_window.end(),
            matched_segments: report.matched_segments,
            written: report.written(),
            failed: report.failed(),
            cancelled: report.cancelled(),
            channels: report
                .channels
                .iter()
                .map(|(key, outcome)| ChannelSummary::new(key.to_string(), outcome))
                .collect(),
            reference: reference.map(ReferenceSummary::new),
        }
    }
}

/// One channel's result.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummary {
    /// `NET.STA.LOC.CHA`.
    pub channel: String,
    /// Outcome.
    pub status: UnitStatus,
    /// Written file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Samples written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
    /// Samples holding the fill value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled: Option<usize>,
    /// Why nothing was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    /// Segments that could not be loaded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedSegment>,
}

impl ChannelSummary {
    /// Summarise one channel outcome.
    pub fn new(channel: String, outcome: &ChannelOutcome) -> Self {
        let trace = outcome.result.as_ref().ok();
        Self {
            channel,
            status: UnitStatus::of(&outcome.result),
            path: trace.map(|t| t.path.clone()),
            samples: trace.map(|t| t.series.samples.len()),
            filled: trace.map(|t| t.filled),
            failure: outcome.result.as_ref().err().cloned(),
            skipped: outcome.skipped.clone(),
        }
    }
}

/// Reference augmentation result.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceSummary {
    /// Box searched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    /// Inventory file written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<PathBuf>,
    /// Networks whose listing failed.
    pub listing_failures: Vec<NetworkFailure>,
    /// Per-station results.
    pub stations: Vec<ReferenceStationSummary>,
}

impl ReferenceSummary {
    /// Summarise a reference report.
    pub fn new(report: &ReferenceReport) -> Self {
        Self {
            bbox: report.bbox,
            inventory: report.inventory.clone(),
            listing_failures: report
                .listing_failures
                .iter()
                .map(|(network, failure)| NetworkFailure {
                    network: network.clone(),
                    failure: failure.clone(),
                })
                .collect(),
            stations: report.stations.iter().map(ReferenceStationSummary::new).collect(),
        }
    }
}

/// A failed station listing.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkFailure {
    /// Network code.
    pub network: String,
    /// What went wrong.
    pub failure: Failure,
}

/// One reference station's result.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceStationSummary {
    /// Network code.
    pub network: String,
    /// Station code.
    pub station: String,
    /// Outcome.
    pub status: UnitStatus,
    /// Written files.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<PathBuf>,
    /// Why nothing was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl ReferenceStationSummary {
    fn new(outcome: &StationOutcome) -> Self {
        Self {
            network: outcome.network.clone(),
            station: outcome.station.clone(),
            status: UnitStatus::of(&outcome.result),
            paths: outcome
                .result
                .as_ref()
                .map(|traces| traces.iter().map(|t| t.path.clone()).collect())
                .unwrap_or_default(),
            failure: outcome.result.as_ref().err().cloned(),
        }
    }
}

/// Payload for `gaps`.
#[derive(Debug, Clone, Serialize)]
pub struct GapReportPayload {
    /// Result type discriminator.
    pub result_type: ResultType,
    /// Tolerance used.
    pub tolerance_secs: f64,
    /// Per-channel gaps, overlaps and intervals.
    pub channels: Vec<ChannelReport>,
}

/// Payload for `index stats`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatsPayload {
    /// Result type discriminator.
    pub result_type: ResultType,
    /// Index file.
    pub path: PathBuf,
    /// Summary.
    #[serde(flatten)]
    pub stats: IndexStats,
}

/// Payload for `index import`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexImportPayload {
    /// Result type discriminator.
    pub result_type: ResultType,
    /// JSON source.
    pub source: PathBuf,
    /// SQLite destination.
    pub destination: PathBuf,
    /// Records written.
    pub imported: usize,
}

/// Payload for config show result.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPayload {
    /// Result type discriminator.
    pub result_type: ResultType,
    /// Path to the config file.
    pub config_path: PathBuf,
    /// The configuration contents (as JSON value for flexibility).
    pub config: serde_json::Value,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::index::ChannelKey;
    use crate::pipeline::AssembledTrace;
    use crate::waveform::{SampleEncoding, TimeSeries};

    #[test]
    fn test_envelope_shape() {
        let envelope = JsonEnvelope::new(
            EventType::Error,
            ErrorPayload {
                code: "index_not_found".to_string(),
                severity: ErrorSeverity::Fatal,
                message: "missing".to_string(),
            },
        );
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["spec_version"], "1.0");
        assert_eq!(value["event"], "error");
        assert_eq!(value["payload"]["severity"], "fatal");
    }

    #[test]
    fn test_channel_summary_written_and_failed() {
        let trace = AssembledTrace {
            path: PathBuf::from("events/ev/X5.S1..EHZ.mseed"),
            series: TimeSeries {
                key: ChannelKey::new("X5", "S1", "", "EHZ"),
                start: Timestamp::from_secs(0),
                sample_rate: 1.0,
                samples: vec![0.0; 200],
                encoding: SampleEncoding::Int32,
            },
            filled: 5,
            merged: 2,
        };
        let written = ChannelSummary::new(
            "X5.S1..EHZ".to_string(),
            &ChannelOutcome {
                result: Ok(trace),
                skipped: Vec::new(),
            },
        );
        let value = serde_json::to_value(&written).unwrap();
        assert_eq!(value["status"], "written");
        assert_eq!(value["samples"], 200);
        assert_eq!(value["filled"], 5);
        assert!(value.get("failure").is_none());

        let failed = ChannelSummary::new(
            "X5.S2..EHZ".to_string(),
            &ChannelOutcome::failed(Failure::no_data("nothing")),
        );
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["failure"]["kind"], "no_data");

        let cancelled = ChannelSummary::new(
            "X5.S3..EHZ".to_string(),
            &ChannelOutcome::failed(Failure::Cancelled),
        );
        assert_eq!(cancelled.status, UnitStatus::Cancelled);
    }
}
