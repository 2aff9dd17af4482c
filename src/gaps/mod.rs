//! Gap and overlap analysis of archived recordings.

mod analyzer;
mod report;

pub use analyzer::{ChannelReport, GapAnalyzer, ScanResult, TimeSpan, recording_intervals};
pub use report::{write_gap_report, write_gap_report_file};

use crate::error::Result;
use crate::index::{SegmentIndex, StationFilter};
use tracing::debug;

/// Analyze every selected station of an index.
pub fn analyze_index(
    index: &dyn SegmentIndex,
    stations: &StationFilter,
    tolerance_secs: f64,
    recording_span: Option<TimeSpan>,
) -> Result<Vec<ChannelReport>> {
    let analyzer = GapAnalyzer::new(tolerance_secs);
    let mut reports = Vec::new();

    for station in index.stations()? {
        if !stations.matches(&station) {
            continue;
        }
        let segments = index.station_segments(&station)?;
        debug!("Analyzing {} segment(s) for {station}", segments.len());
        reports.extend(analyzer.analyze_station(segments, recording_span));
    }

    Ok(reports)
}
