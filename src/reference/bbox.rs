//! Geographic bounding boxes.

use super::Station;
use serde::Serialize;

/// Latitude/longitude rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    /// Southern edge.
    pub min_latitude: f64,
    /// Northern edge.
    pub max_latitude: f64,
    /// Western edge.
    pub min_longitude: f64,
    /// Eastern edge.
    pub max_longitude: f64,
}

impl BoundingBox {
    /// Smallest box containing every station, or `None` for no stations.
    pub fn around<'a, I>(stations: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Station>,
    {
        stations.into_iter().fold(None, |acc, s| {
            Some(match acc {
                None => Self {
                    min_latitude: s.latitude,
                    max_latitude: s.latitude,
                    min_longitude: s.longitude,
                    max_longitude: s.longitude,
                },
                Some(b) => Self {
                    min_latitude: b.min_latitude.min(s.latitude),
                    max_latitude: b.max_latitude.max(s.latitude),
                    min_longitude: b.min_longitude.min(s.longitude),
                    max_longitude: b.max_longitude.max(s.longitude),
                },
            })
        })
    }

    /// Grow every edge by `margin` degrees, clamped to valid coordinates.
    pub fn expand(self, margin: f64) -> Self {
        Self {
            min_latitude: (self.min_latitude - margin).max(-90.0),
            max_latitude: (self.max_latitude + margin).min(90.0),
            min_longitude: (self.min_longitude - margin).max(-180.0),
            max_longitude: (self.max_longitude + margin).min(180.0),
        }
    }

    /// Whether a point lies inside (edges included).
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&latitude)
            && (self.min_longitude..=self.max_longitude).contains(&longitude)
    }
}
