//! Event catalogue parsing.
//!
//! A catalogue is a CSV file with one earthquake per row:
//! `event_id,time,latitude,longitude,depth_km,magnitude`. Only `event_id`
//! and `time` are required. Uses the `csv` crate, so quoted fields and a
//! leading UTF-8 BOM are handled.

use crate::error::{Error, Result};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct EventRow {
    event_id: String,
    time: String,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    depth_km: Option<f64>,
    #[serde(default)]
    magnitude: Option<f64>,
}

/// One catalogue event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Identifier; also names the event's output directory.
    pub id: String,
    /// Origin time, used as the reference time of the query window.
    pub time: Timestamp,
    /// Epicentre latitude in degrees.
    pub latitude: Option<f64>,
    /// Epicentre longitude in degrees.
    pub longitude: Option<f64>,
    /// Hypocentre depth in kilometres.
    pub depth_km: Option<f64>,
    /// Magnitude.
    pub magnitude: Option<f64>,
}

impl Event {
    /// An event with only an id and a time.
    pub fn new(id: impl Into<String>, time: Timestamp) -> Self {
        Self {
            id: id.into(),
            time,
            latitude: None,
            longitude: None,
            depth_km: None,
            magnitude: None,
        }
    }
}

/// Parse a catalogue file.
///
/// Returns `Ok(vec![])` for an empty or header-only file. Event ids must be
/// unique.
pub fn parse_catalog(path: &Path) -> Result<Vec<Event>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::CatalogParseFailed {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;

    let mut events = Vec::new();
    let mut seen = HashSet::new();

    for (line_num, result) in reader.deserialize::<EventRow>().enumerate() {
        let line = line_num + 2;
        let row = result.map_err(|e| Error::InvalidCatalog {
            message: format!("line {line}: {e}"),
        })?;

        if row.event_id.is_empty() {
            return Err(Error::InvalidCatalog {
                message: format!("line {line}: empty event_id"),
            });
        }
        if !seen.insert(row.event_id.clone()) {
            return Err(Error::InvalidCatalog {
                message: format!("line {line}: duplicate event_id '{}'", row.event_id),
            });
        }
        let time = Timestamp::parse(&row.time).map_err(|e| Error::InvalidCatalog {
            message: format!("line {line}: {e}"),
        })?;

        events.push(Event {
            id: row.event_id,
            time,
            latitude: row.latitude,
            longitude: row.longitude,
            depth_km: row.depth_km,
            magnitude: row.magnitude,
        });
    }

    Ok(events)
}

/// Keep only the events named in `ids`, in catalogue order.
///
/// An empty `ids` keeps everything.
pub fn select_events(events: Vec<Event>, ids: &[String]) -> Result<Vec<Event>> {
    if ids.is_empty() {
        return Ok(events);
    }
    if let Some(missing) = ids.iter().find(|id| !events.iter().any(|e| &e.id == *id)) {
        return Err(Error::EventNotFound { id: missing.clone() });
    }
    Ok(events.into_iter().filter(|e| ids.contains(&e.id)).collect())
}
