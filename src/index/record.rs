//! Segment records and channel identity.

use crate::error::{Error, Result};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One physically stored continuous waveform segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// Station code.
    pub station: String,
    /// Channel code (band, instrument, orientation), e.g. `EHZ`.
    pub component: String,
    /// Location code, often empty.
    #[serde(default)]
    pub location: String,
    /// First instant covered by the segment.
    pub start_time: Timestamp,
    /// Last instant covered by the segment.
    pub end_time: Timestamp,
    /// Network code as recorded in the file.
    pub network_original: String,
    /// Network code applied when the segment is loaded.
    pub network_relabel: String,
    /// Location of the waveform file.
    pub storage_path: PathBuf,
    /// Opaque tag for logging and traceability.
    #[serde(default)]
    pub content_id: String,
}

impl SegmentRecord {
    /// Check `start_time < end_time`.
    pub fn validate(&self) -> Result<()> {
        if self.start_time < self.end_time {
            Ok(())
        } else {
            Err(Error::InvalidSegment {
                content_id: self.content_id.clone(),
                start: self.start_time.to_string(),
                end: self.end_time.to_string(),
            })
        }
    }

    /// The key this segment merges under once relabelled.
    pub fn channel_key(&self) -> ChannelKey {
        ChannelKey::new(
            &self.network_relabel,
            &self.station,
            &self.location,
            &self.component,
        )
    }

    /// Ordering used wherever results must be deterministic.
    pub fn sort_key(&self) -> (Timestamp, Timestamp, &std::path::Path) {
        (self.start_time, self.end_time, self.storage_path.as_path())
    }
}

/// `(network, station, location, component)` identity of one data stream.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelKey {
    /// Network code.
    pub network: String,
    /// Station code.
    pub station: String,
    /// Location code.
    pub location: String,
    /// Channel code.
    pub component: String,
}

impl ChannelKey {
    /// Build a key from its four codes.
    pub fn new(network: &str, station: &str, location: &str, component: &str) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
            component: component.to_string(),
        }
    }

    /// File-system friendly `NET.STA.LOC.CHA` identifier.
    pub fn file_stem(&self) -> String {
        sanitize_filename(&self.to_string())
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.component
        )
    }
}

/// Sanitize a string for use as a filename/directory name.
///
/// Characters that are invalid in filenames on some platform are written as
/// `%XX`, and `%` itself as `%25`, so distinct names never map to the same
/// path. A name made only of dots is escaped whole so it cannot leave the
/// parent directory.
pub fn sanitize_filename(name: &str) -> String {
    if name.is_empty() {
        return "%".to_string();
    }
    if name.chars().all(|c| c == '.') {
        return "%2E".repeat(name.len());
    }

    let mut sanitized = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '%') {
            sanitized.push_str(&format!("%{:02X}", u32::from(c)));
        } else {
            sanitized.push(c);
        }
    }
    sanitized
}
