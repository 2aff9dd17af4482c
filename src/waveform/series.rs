//! Regularly sampled time series, merging and trim/pad.

use crate::constants::SAMPLE_RATE_TOLERANCE;
use crate::index::ChannelKey;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Sample encoding a series was decoded from (and prefers to be written as).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    /// 16-bit integers.
    Int16,
    /// 32-bit integers.
    Int32,
    /// IEEE 32-bit floats.
    Float32,
    /// IEEE 64-bit floats.
    Float64,
    /// Steim-1 compressed integers.
    Steim1,
    /// Steim-2 compressed integers.
    Steim2,
}

impl SampleEncoding {
    /// Whether samples are integers.
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int16 | Self::Int32 | Self::Steim1 | Self::Steim2)
    }

    /// Encoding able to hold samples of both `self` and `other`.
    pub const fn widen(self, other: Self) -> Self {
        match (self, other) {
            _ if self.is_integer() && other.is_integer() => Self::Int32,
            (Self::Float32, Self::Float32) => Self::Float32,
            _ => Self::Float64,
        }
    }
}

/// One channel's samples on a regular grid.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    /// Channel identity.
    pub key: ChannelKey,
    /// Time of the first sample.
    pub start: Timestamp,
    /// Samples per second.
    pub sample_rate: f64,
    /// Sample values.
    pub samples: Vec<f64>,
    /// Source encoding.
    pub encoding: SampleEncoding,
}

impl TimeSeries {
    /// Sample spacing in microseconds.
    pub fn interval_micros(&self) -> f64 {
        1e6 / self.sample_rate
    }

    /// Time of sample `index`.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn time_of(&self, index: usize) -> Timestamp {
        self.start + (index as f64 * self.interval_micros()).round() as i64
    }

    /// First instant after the last sample's interval.
    pub fn end(&self) -> Timestamp {
        self.time_of(self.samples.len())
    }

    /// Whether `other` has the same sample rate within tolerance.
    pub fn same_rate(&self, other: &Self) -> bool {
        rates_match(self.sample_rate, other.sample_rate)
    }

    /// Drop samples more than one sample interval outside `[start, end)`.
    ///
    /// Never pads; the kept samples stay on the original grid.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn clip(mut self, start: Timestamp, end: Timestamp) -> Self {
        let dt = self.interval_micros();
        let len = self.samples.len();
        let first = (((start - self.start) as f64 / dt).floor() - 1.0).clamp(0.0, len as f64) as usize;
        let last = (((end - self.start) as f64 / dt).ceil() + 1.0).clamp(0.0, len as f64) as usize;

        if first >= last {
            self.samples.clear();
            return self;
        }
        self.start = self.time_of(first);
        self.samples.truncate(last);
        self.samples.drain(..first);
        self
    }

    /// Trim/pad to `[start, end)`; see [`Merged::trim_pad`].
    pub fn trim_pad(self, start: Timestamp, end: Timestamp, fill_value: f64) -> Trimmed {
        Merged::from(self).trim_pad(start, end, fill_value)
    }
}

/// Whether two sample rates agree within the relative tolerance.
pub fn rates_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= SAMPLE_RATE_TOLERANCE * a.abs().max(b.abs())
}

/// Why series could not be merged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MergeError {
    /// No samples to merge.
    #[error("no samples to merge")]
    Empty,

    /// Series disagree on channel identity.
    #[error("channel mismatch: {expected} vs {found}")]
    ChannelMismatch {
        /// Key of the first series.
        expected: String,
        /// Conflicting key.
        found: String,
    },

    /// Series disagree on sample rate.
    #[error("sample rate mismatch: {expected} Hz vs {found} Hz")]
    SampleRate {
        /// Rate of the first series.
        expected: f64,
        /// Conflicting rate.
        found: f64,
    },

    /// Sample rate is not a positive finite number.
    #[error("invalid sample rate {rate}")]
    InvalidRate {
        /// Offending rate.
        rate: f64,
    },
}

/// A merged series with a per-sample coverage mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    /// Merged samples; uncovered samples hold the fill value.
    pub series: TimeSeries,
    /// Whether each sample came from recorded data.
    pub covered: Vec<bool>,
}

impl From<TimeSeries> for Merged {
    fn from(series: TimeSeries) -> Self {
        let covered = vec![true; series.samples.len()];
        Self { series, covered }
    }
}

/// Result of a trim/pad.
#[derive(Debug, Clone, PartialEq)]
pub struct Trimmed {
    /// Series covering exactly the requested window.
    pub series: TimeSeries,
    /// Number of samples holding the fill value.
    pub filled: usize,
}

impl Merged {
    /// Number of uncovered samples.
    pub fn uncovered(&self) -> usize {
        self.covered.iter().filter(|c| !**c).count()
    }

    /// Clip to `[start, end)` and fill anything not recorded.
    ///
    /// The output holds exactly `round((end - start) * rate)` samples on the
    /// merged series' sample grid, starting at the grid point nearest `start`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn trim_pad(self, start: Timestamp, end: Timestamp, fill_value: f64) -> Trimmed {
        let source = self.series;
        let dt = source.interval_micros();
        let count = if end > start {
            (end.secs_since(start) * source.sample_rate).round() as usize
        } else {
            0
        };
        let offset = ((start - source.start) as f64 / dt).round() as i64;

        let mut samples = Vec::with_capacity(count);
        let mut filled = 0;
        for i in 0..count {
            let src = offset + i as i64;
            let value = usize::try_from(src)
                .ok()
                .filter(|&s| s < source.samples.len() && self.covered[s])
                .map(|s| source.samples[s]);
            if let Some(v) = value {
                samples.push(v);
            } else {
                samples.push(fill_value);
                filled += 1;
            }
        }

        let new_start = source.start + (offset as f64 * dt).round() as i64;
        Trimmed {
            series: TimeSeries {
                key: source.key,
                start: new_start,
                sample_rate: source.sample_rate,
                samples,
                encoding: source.encoding,
            },
            filled,
        }
    }
}

/// Merge same-channel series into one continuous series.
///
/// Series are ordered by start time and placed on the first series' sample
/// grid. Where two series cover the same sample the earlier one wins;
/// samples nobody covers take `fill_value`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn merge(mut series: Vec<TimeSeries>, fill_value: f64) -> Result<Merged, MergeError> {
    series.retain(|s| !s.samples.is_empty());
    series.sort_by_key(|s| s.start);

    let Some(first) = series.first() else {
        return Err(MergeError::Empty);
    };
    if !(first.sample_rate.is_finite() && first.sample_rate > 0.0) {
        return Err(MergeError::InvalidRate {
            rate: first.sample_rate,
        });
    }

    let key = first.key.clone();
    let origin = first.start;
    let rate = first.sample_rate;
    let dt = first.interval_micros();
    let mut encoding = first.encoding;

    let mut placements = Vec::with_capacity(series.len());
    let mut total = 0usize;
    for s in &series {
        if s.key != key {
            return Err(MergeError::ChannelMismatch {
                expected: key.to_string(),
                found: s.key.to_string(),
            });
        }
        if !first.same_rate(s) {
            return Err(MergeError::SampleRate {
                expected: rate,
                found: s.sample_rate,
            });
        }
        encoding = encoding.widen(s.encoding);
        // Sorted by start, so offsets are never negative.
        let offset = ((s.start - origin) as f64 / dt).round().max(0.0) as usize;
        total = total.max(offset + s.samples.len());
        placements.push(offset);
    }

    let mut samples = vec![fill_value; total];
    let mut covered = vec![false; total];
    for (s, offset) in series.iter().zip(placements) {
        for (i, value) in s.samples.iter().enumerate() {
            let at = offset + i;
            if !covered[at] {
                samples[at] = *value;
                covered[at] = true;
            }
        }
    }

    Ok(Merged {
        series: TimeSeries {
            key,
            start: origin,
            sample_rate: rate,
            samples,
            encoding,
        },
        covered,
    })
}
