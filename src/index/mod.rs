//! Waveform segment index.
//!
//! One query contract ([`SegmentIndex`]) with two storage backends: the
//! archive's SQLite database and a flat JSON file. Callers open an index
//! with [`open_index`] and never branch on the storage format.

mod json;
mod matcher;
mod record;
mod sqlite;

pub use json::JsonIndex;
pub use matcher::{
    ComponentFilter, ComponentPattern, StationFilter, interval_matches, segment_matches,
    tolerance_micros,
};
pub use record::{ChannelKey, SegmentRecord, sanitize_filename};
pub use sqlite::SqliteIndex;

use crate::error::{Error, Result};
use crate::time::{QueryWindow, Timestamp};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Read-only query interface over stored segment records.
pub trait SegmentIndex {
    /// Records matching the station/component filters whose interval is
    /// open at the window start or opens within the tolerance after it.
    ///
    /// `tolerance_secs` defaults to the window length. No ordering is
    /// guaranteed; an empty result is not an error.
    fn find_segments(
        &self,
        stations: &StationFilter,
        components: &ComponentFilter,
        window: &QueryWindow,
        tolerance_secs: Option<f64>,
    ) -> Result<Vec<SegmentRecord>>;

    /// Every record of one station, unordered.
    fn station_segments(&self, station: &str) -> Result<Vec<SegmentRecord>>;

    /// Distinct station codes, sorted.
    fn stations(&self) -> Result<Vec<String>>;

    /// Number of records.
    fn len(&self) -> Result<usize>;

    /// Whether the index holds no records.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Summary counts and overall time span.
    fn stats(&self) -> Result<IndexStats> {
        let stations = self.stations()?;
        let mut components = BTreeSet::new();
        let mut segments = 0;
        let mut earliest: Option<Timestamp> = None;
        let mut latest: Option<Timestamp> = None;

        for station in &stations {
            for record in self.station_segments(station)? {
                segments += 1;
                earliest = Some(earliest.map_or(record.start_time, |e| e.min(record.start_time)));
                latest = Some(latest.map_or(record.end_time, |l| l.max(record.end_time)));
                components.insert(record.component);
            }
        }

        Ok(IndexStats {
            segments,
            station_count: stations.len(),
            components: components.into_iter().collect(),
            earliest,
            latest,
        })
    }
}

/// Summary of an index's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Number of segment records.
    pub segments: usize,
    /// Number of distinct stations.
    pub station_count: usize,
    /// Distinct component codes.
    pub components: Vec<String>,
    /// Earliest segment start.
    pub earliest: Option<Timestamp>,
    /// Latest segment end.
    pub latest: Option<Timestamp>,
}

/// Open an index, choosing the backend from the file extension.
pub fn open_index(path: &Path) -> Result<Box<dyn SegmentIndex>> {
    if !path.exists() {
        return Err(Error::IndexNotFound {
            path: path.to_path_buf(),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("db" | "sqlite" | "sqlite3") => Ok(Box::new(SqliteIndex::open(path)?)),
        Some("json") => Ok(Box::new(JsonIndex::load(path)?)),
        _ => Err(Error::UnsupportedIndexFormat {
            path: path.to_path_buf(),
        }),
    }
}
