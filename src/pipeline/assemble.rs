//! Per-channel assembly: load, merge, trim/pad and persist.

use crate::error::{Error, Failure, Result};
use crate::index::{ChannelKey, SegmentRecord};
use crate::time::QueryWindow;
use crate::waveform::{MergeError, TimeSeries, WaveformReader, WaveformWriter, merge};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A channel written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTrace {
    /// Output file.
    pub path: PathBuf,
    /// Samples covering exactly the trim window.
    pub series: TimeSeries,
    /// How many samples hold the fill value.
    pub filled: usize,
    /// Number of series that went into the merge.
    pub merged: usize,
}

/// A segment that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSegment {
    /// File that failed to load.
    pub storage_path: PathBuf,
    /// Traceability tag of the segment.
    pub content_id: String,
    /// Why loading failed.
    pub reason: String,
}

/// Result of one channel unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOutcome {
    /// Written trace or the reason there is none.
    pub result: std::result::Result<AssembledTrace, Failure>,
    /// Segments skipped on the way.
    pub skipped: Vec<SkippedSegment>,
}

impl ChannelOutcome {
    /// An outcome that failed before any segment was touched.
    pub const fn failed(failure: Failure) -> Self {
        Self {
            result: Err(failure),
            skipped: Vec::new(),
        }
    }
}

/// Trim window and output settings shared by every unit of a run.
#[derive(Debug, Clone)]
pub struct AssemblySpec {
    /// Window the output covers.
    pub trim: QueryWindow,
    /// Value for samples with no recorded data.
    pub fill_value: f64,
    /// Directory the trace file goes to.
    pub output_dir: PathBuf,
}

impl AssemblySpec {
    /// Output path for a channel.
    pub fn path_for(&self, key: &ChannelKey, writer: &dyn WaveformWriter) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", key.file_stem(), writer.extension()))
    }
}

/// Load every segment of one channel and assemble the result.
///
/// Segments must already be in load order. Unloadable segments are
/// skipped; when nothing loads the channel has no data. `token` is checked
/// between loads and before writing.
pub fn assemble_segments(
    key: &ChannelKey,
    segments: &[SegmentRecord],
    reader: &dyn WaveformReader,
    writer: &dyn WaveformWriter,
    spec: &AssemblySpec,
    token: &CancellationToken,
) -> ChannelOutcome {
    let mut skipped = Vec::new();
    let mut loaded = Vec::new();

    for segment in segments {
        if token.is_cancelled() {
            return ChannelOutcome {
                result: Err(Failure::Cancelled),
                skipped,
            };
        }
        match reader.read(&segment.storage_path) {
            Ok(series) => {
                debug!(
                    "Loaded {} series from {} [{}]",
                    series.len(),
                    segment.storage_path.display(),
                    segment.content_id
                );
                loaded.extend(series.into_iter().map(|mut s| {
                    s.key.network.clone_from(&segment.network_relabel);
                    s
                }));
            }
            Err(e) => {
                warn!(
                    "Skipping segment {} [{}]: {e}",
                    segment.storage_path.display(),
                    segment.content_id
                );
                skipped.push(SkippedSegment {
                    storage_path: segment.storage_path.clone(),
                    content_id: segment.content_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if loaded.is_empty() {
        let reason = if skipped.is_empty() {
            format!("no segments for {key}")
        } else {
            format!("none of {} segment(s) for {key} could be loaded", skipped.len())
        };
        return ChannelOutcome {
            result: Err(Failure::no_data(reason)),
            skipped,
        };
    }

    let result = assemble_series(key, loaded, writer, spec, token);
    ChannelOutcome { result, skipped }
}

/// Merge, trim/pad and write already-loaded series of one channel.
pub fn assemble_series(
    key: &ChannelKey,
    series: Vec<TimeSeries>,
    writer: &dyn WaveformWriter,
    spec: &AssemblySpec,
    token: &CancellationToken,
) -> std::result::Result<AssembledTrace, Failure> {
    let (start, end) = (spec.trim.start(), spec.trim.end());
    let clipped: Vec<TimeSeries> = series.into_iter().map(|s| s.clip(start, end)).collect();
    let merged_count = clipped.iter().filter(|s| !s.samples.is_empty()).count();

    let merged = merge(clipped, spec.fill_value).map_err(|e| match e {
        MergeError::Empty => Failure::no_data(format!("no samples for {key} in window")),
        other => Failure::Merge {
            reason: other.to_string(),
        },
    })?;
    let trimmed = merged.trim_pad(start, end, spec.fill_value);

    if token.is_cancelled() {
        return Err(Failure::Cancelled);
    }

    let path = spec.path_for(key, writer);
    writer
        .write(&path, &trimmed.series)
        .map_err(|e| Failure::Write {
            reason: e.to_string(),
        })?;
    debug!(
        "Wrote {} ({} samples, {} filled)",
        path.display(),
        trimmed.series.samples.len(),
        trimmed.filled
    );

    Ok(AssembledTrace {
        path,
        series: trimmed.series,
        filled: trimmed.filled,
        merged: merged_count,
    })
}

/// Remove and recreate an output directory.
///
/// The run owns the directory exclusively; anything left from a previous
/// run is deleted first.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| Error::OutputDirRemoveFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::create_dir_all(dir).map_err(|e| Error::OutputDirCreateFailed {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Seconds in a duration, rounded up, for failure reports.
pub fn whole_secs(duration: std::time::Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
