//! Per-channel gap and overlap detection.

use crate::index::{ChannelKey, SegmentRecord};
use crate::time::Timestamp;
use serde::Serialize;
use std::collections::BTreeMap;

/// A closed time span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSpan {
    /// Span start.
    pub start: Timestamp,
    /// Span end.
    pub end: Timestamp,
}

impl TimeSpan {
    /// Build a span.
    pub const fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end.secs_since(self.start)
    }
}

/// Gaps, overlaps and covered intervals of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    /// Channel identity.
    pub key: ChannelKey,
    /// Missing spans between consecutive segments.
    pub gaps: Vec<TimeSpan>,
    /// Spans claimed by two consecutive segments.
    pub overlaps: Vec<TimeSpan>,
    /// Covered spans, bounded by the recording span and the gaps.
    pub intervals: Vec<TimeSpan>,
}

/// Gaps and overlaps found by one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Detected gaps, in time order.
    pub gaps: Vec<TimeSpan>,
    /// Detected overlaps, in time order.
    pub overlaps: Vec<TimeSpan>,
}

/// Classifies transitions between consecutive segments of a channel.
#[derive(Debug, Clone, Copy)]
pub struct GapAnalyzer {
    tolerance_micros: i64,
}

impl GapAnalyzer {
    /// Create an analyzer; differences within `tolerance_secs` are contiguous.
    pub fn new(tolerance_secs: f64) -> Self {
        Self {
            tolerance_micros: Timestamp::from_secs_f64(tolerance_secs.abs()).as_micros(),
        }
    }

    /// Scan one channel's segments, which must be ordered by start time.
    ///
    /// The first segment only seeds the previous end time. After every
    /// segment the previous end becomes that segment's end, whichever
    /// branch was taken.
    pub fn scan(&self, segments: &[SegmentRecord]) -> ScanResult {
        let mut result = ScanResult::default();
        let mut previous_end: Option<Timestamp> = None;

        for segment in segments {
            if let Some(prev_end) = previous_end {
                let diff = segment.start_time - prev_end;
                if diff > self.tolerance_micros {
                    result.gaps.push(TimeSpan::new(prev_end, segment.start_time));
                } else if diff < -self.tolerance_micros {
                    result
                        .overlaps
                        .push(TimeSpan::new(segment.start_time, prev_end));
                }
            }
            previous_end = Some(segment.end_time);
        }

        result
    }

    /// Analyze every channel of one station.
    ///
    /// Segments are grouped by channel and sorted. Without an explicit
    /// `recording_span` each channel's span runs from its first start to its
    /// latest end.
    pub fn analyze_station(
        &self,
        segments: Vec<SegmentRecord>,
        recording_span: Option<TimeSpan>,
    ) -> Vec<ChannelReport> {
        let mut channels: BTreeMap<ChannelKey, Vec<SegmentRecord>> = BTreeMap::new();
        for segment in segments {
            channels.entry(segment.channel_key()).or_default().push(segment);
        }

        channels
            .into_iter()
            .map(|(key, mut segs)| {
                segs.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
                let scan = self.scan(&segs);
                let span = recording_span.unwrap_or_else(|| channel_span(&segs));
                let intervals = recording_intervals(span, &scan.gaps);
                ChannelReport {
                    key,
                    gaps: scan.gaps,
                    overlaps: scan.overlaps,
                    intervals,
                }
            })
            .collect()
    }
}

/// Split a recording span at the gaps.
///
/// Interval `i` starts at the span start (first) or the previous gap's end,
/// and ends at gap `i`'s start or the span end (last). Zero gaps yield the
/// whole span.
pub fn recording_intervals(span: TimeSpan, gaps: &[TimeSpan]) -> Vec<TimeSpan> {
    let mut intervals = Vec::with_capacity(gaps.len() + 1);
    let mut lower = span.start;
    for gap in gaps {
        intervals.push(TimeSpan::new(lower, gap.start));
        lower = gap.end;
    }
    intervals.push(TimeSpan::new(lower, span.end));
    intervals
}

fn channel_span(segments: &[SegmentRecord]) -> TimeSpan {
    let start = segments
        .iter()
        .map(|s| s.start_time)
        .min()
        .unwrap_or_default();
    let end = segments.iter().map(|s| s.end_time).max().unwrap_or_default();
    TimeSpan::new(start, end)
}
