//! Absolute instants and query windows.

use crate::constants::MICROS_PER_SEC;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// A UTC instant with microsecond resolution.
///
/// Serialized as (fractional) epoch seconds, the form archive indexes use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Construct from microseconds since the Unix epoch.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Construct from whole epoch seconds.
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * MICROS_PER_SEC)
    }

    /// Construct from fractional epoch seconds, rounded to the nearest microsecond.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * 1e6).round() as i64)
    }

    /// Microseconds since the Unix epoch.
    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// Fractional seconds since the Unix epoch.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e6
    }

    /// Seconds from `earlier` to `self` (negative if `self` is earlier).
    #[allow(clippy::cast_precision_loss)]
    pub fn secs_since(self, earlier: Self) -> f64 {
        (self.0 - earlier.0) as f64 / 1e6
    }

    /// Convert to a chrono timestamp.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.0)
    }

    /// Build from a chrono timestamp.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_micros())
    }

    /// Parse RFC 3339, a naive ISO-8601 timestamp (UTC assumed) or epoch seconds.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if let Ok(secs) = trimmed.parse::<f64>() {
            if !secs.is_finite() {
                return Err(Error::InvalidTime {
                    value: value.to_string(),
                    reason: "epoch seconds must be finite".to_string(),
                });
            }
            return Ok(Self::from_secs_f64(secs));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::from_datetime(dt.with_timezone(&Utc)));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
                return Ok(Self::from_datetime(naive.and_utc()));
            }
        }
        Err(Error::InvalidTime {
            value: value.to_string(),
            reason: "expected RFC 3339, YYYY-MM-DDTHH:MM:SS or epoch seconds".to_string(),
        })
    }

    /// Shift by a number of seconds.
    pub fn offset_secs(self, secs: f64) -> Self {
        self + Self::from_secs_f64(secs).0
    }
}

impl Add<i64> for Timestamp {
    type Output = Self;

    fn add(self, micros: i64) -> Self {
        Self(self.0 + micros)
    }
}

impl Sub<i64> for Timestamp {
    type Output = Self;

    fn sub(self, micros: i64) -> Self {
        Self(self.0 - micros)
    }
}

impl Sub for Timestamp {
    type Output = i64;

    fn sub(self, rhs: Self) -> i64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => write!(f, "{}us", self.0),
        }
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.0 % MICROS_PER_SEC == 0 {
            serializer.serialize_i64(self.0 / MICROS_PER_SEC)
        } else {
            serializer.serialize_f64(self.as_secs_f64())
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(secs) => Ok(Self::from_secs(secs)),
            Raw::Float(secs) => Ok(Self::from_secs_f64(secs)),
            Raw::Text(text) => Self::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

/// A window `[reference - lead, reference + lag)` around a reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryWindow {
    /// Reference instant, usually an earthquake origin time.
    pub reference: Timestamp,
    /// Seconds before the reference.
    pub lead: f64,
    /// Seconds after the reference.
    pub lag: f64,
}

impl QueryWindow {
    /// Create a window around `reference`.
    pub const fn new(reference: Timestamp, lead: f64, lag: f64) -> Self {
        Self {
            reference,
            lead,
            lag,
        }
    }

    /// A window spanning `[start, end)` with the reference at `start`.
    pub fn spanning(start: Timestamp, end: Timestamp) -> Self {
        Self::new(start, 0.0, end.secs_since(start))
    }

    /// First instant inside the window.
    pub fn start(&self) -> Timestamp {
        self.reference.offset_secs(-self.lead)
    }

    /// First instant after the window.
    pub fn end(&self) -> Timestamp {
        self.reference.offset_secs(self.lag)
    }

    /// Window length in seconds.
    pub fn length_secs(&self) -> f64 {
        self.lead + self.lag
    }

    /// Whether `other` lies entirely inside this window.
    pub fn contains_window(&self, other: &Self) -> bool {
        self.start() <= other.start() && other.end() <= self.end()
    }
}
