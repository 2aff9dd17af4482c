//! Flat-file (JSON) segment index held in memory.

use super::{ComponentFilter, SegmentIndex, SegmentRecord, StationFilter, segment_matches};
use crate::error::{Error, Result};
use crate::time::QueryWindow;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Segment records loaded from a JSON array, grouped by station.
#[derive(Debug, Clone, Default)]
pub struct JsonIndex {
    by_station: BTreeMap<String, Vec<SegmentRecord>>,
}

impl JsonIndex {
    /// Load a JSON array of segment records.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let records: Vec<SegmentRecord> = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::JsonIndex {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!("Loaded {} segment records from {}", records.len(), path.display());
        Self::from_records(records)
    }

    /// Build an index from records, rejecting any with `start_time >= end_time`.
    pub fn from_records(records: Vec<SegmentRecord>) -> Result<Self> {
        let mut by_station: BTreeMap<String, Vec<SegmentRecord>> = BTreeMap::new();
        for record in records {
            record.validate()?;
            by_station
                .entry(record.station.clone())
                .or_default()
                .push(record);
        }
        Ok(Self { by_station })
    }

    /// Consume the index, yielding all records.
    pub fn into_records(self) -> impl Iterator<Item = SegmentRecord> {
        self.by_station.into_values().flatten()
    }
}

impl SegmentIndex for JsonIndex {
    fn find_segments(
        &self,
        stations: &StationFilter,
        components: &ComponentFilter,
        window: &QueryWindow,
        tolerance_secs: Option<f64>,
    ) -> Result<Vec<SegmentRecord>> {
        Ok(self
            .by_station
            .iter()
            .filter(|(station, _)| stations.matches(station))
            .flat_map(|(_, records)| records)
            .filter(|r| segment_matches(r, stations, components, window, tolerance_secs))
            .cloned()
            .collect())
    }

    fn station_segments(&self, station: &str) -> Result<Vec<SegmentRecord>> {
        Ok(self.by_station.get(station).cloned().unwrap_or_default())
    }

    fn stations(&self) -> Result<Vec<String>> {
        Ok(self.by_station.keys().cloned().collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.by_station.values().map(Vec::len).sum())
    }
}
