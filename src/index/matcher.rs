//! Pure matching between query windows and stored segments.
//!
//! A segment is eligible for a query instant `t` when it is already open at
//! `t` (`start <= t <= end`) or opens shortly after it
//! (`t <= start < t + tolerance`). Archived segments rarely line up with
//! query boundaries, so both cases are needed.

use super::SegmentRecord;
use crate::time::{QueryWindow, Timestamp};
use std::collections::BTreeSet;

/// Whether `[start, end]` contains `t` or starts within `tolerance_micros` after it.
pub fn interval_matches(start: Timestamp, end: Timestamp, t: Timestamp, tolerance_micros: i64) -> bool {
    let open_at_query = start <= t && t <= end;
    let opens_soon_after = t <= start && start < t + tolerance_micros;
    open_at_query || opens_soon_after
}

/// Resolve the match tolerance: explicit seconds, or the window length.
pub fn tolerance_micros(window: &QueryWindow, tolerance_secs: Option<f64>) -> i64 {
    let secs = tolerance_secs.unwrap_or_else(|| window.length_secs());
    Timestamp::from_secs_f64(secs.max(0.0)).as_micros()
}

/// Full predicate: time, station membership and component filter.
pub fn segment_matches(
    record: &SegmentRecord,
    stations: &StationFilter,
    components: &ComponentFilter,
    window: &QueryWindow,
    tolerance_secs: Option<f64>,
) -> bool {
    stations.matches(&record.station)
        && components.matches(&record.component)
        && interval_matches(
            record.start_time,
            record.end_time,
            window.start(),
            tolerance_micros(window, tolerance_secs),
        )
}

/// Set of station codes; empty means every station.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationFilter {
    codes: BTreeSet<String>,
}

impl StationFilter {
    /// Accept every station.
    pub fn all() -> Self {
        Self::default()
    }

    /// Accept exactly the given stations.
    pub fn only<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `station` passes.
    pub fn matches(&self, station: &str) -> bool {
        self.codes.is_empty() || self.codes.contains(station)
    }

    /// Explicit codes (empty when unrestricted).
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    /// Whether the filter accepts everything.
    pub fn is_unrestricted(&self) -> bool {
        self.codes.is_empty()
    }
}

/// A single component selector.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComponentPattern {
    /// Exact channel code.
    Exact(String),
    /// Legacy pattern: `_` or `?` matches any one character.
    Wildcard(String),
}

impl ComponentPattern {
    /// Classify a selector string.
    pub fn parse(text: &str) -> Self {
        if text.contains(['_', '?']) {
            Self::Wildcard(text.to_string())
        } else {
            Self::Exact(text.to_string())
        }
    }

    /// Whether `component` is selected.
    pub fn matches(&self, component: &str) -> bool {
        match self {
            Self::Exact(code) => code == component,
            Self::Wildcard(pattern) => {
                pattern.chars().count() == component.chars().count()
                    && pattern
                        .chars()
                        .zip(component.chars())
                        .all(|(p, c)| p == '_' || p == '?' || p == c)
            }
        }
    }

    /// The selector text.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(s) | Self::Wildcard(s) => s,
        }
    }
}

/// Component filter: exact codes and/or wildcard patterns. Empty means all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentFilter {
    patterns: BTreeSet<ComponentPattern>,
}

impl ComponentFilter {
    /// Accept every component.
    pub fn all() -> Self {
        Self::default()
    }

    /// Build from selector strings such as `EHZ` or `__Z`.
    pub fn from_selectors<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: selectors
                .into_iter()
                .map(|s| ComponentPattern::parse(s.as_ref().trim()))
                .collect(),
        }
    }

    /// Whether `component` passes.
    pub fn matches(&self, component: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(component))
    }

    /// Selectors in canonical order.
    pub fn patterns(&self) -> impl Iterator<Item = &ComponentPattern> {
        self.patterns.iter()
    }

    /// Exact codes only, if there are no wildcard selectors.
    pub fn exact_codes(&self) -> Option<Vec<&str>> {
        self.patterns
            .iter()
            .map(|p| match p {
                ComponentPattern::Exact(code) => Some(code.as_str()),
                ComponentPattern::Wildcard(_) => None,
            })
            .collect()
    }

    /// Whether the filter accepts everything.
    pub fn is_unrestricted(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: i64 = 1_800_000_000;

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    #[test]
    fn test_segment_open_at_query_matches() {
        assert!(interval_matches(ts(0), ts(100), ts(50), TOL));
        assert!(interval_matches(ts(0), ts(100), ts(0), TOL));
        assert!(interval_matches(ts(0), ts(100), ts(100), TOL));
    }

    #[test]
    fn test_segment_starting_within_tolerance_matches() {
        assert!(interval_matches(ts(1000), ts(5000), ts(0), TOL));
        assert!(interval_matches(ts(1799), ts(5000), ts(0), TOL));
    }

    #[test]
    fn test_segment_starting_after_tolerance_never_matches() {
        assert!(!interval_matches(ts(1800), ts(5000), ts(0), TOL));
        assert!(!interval_matches(ts(1801), ts(5000), ts(0), TOL));
    }

    #[test]
    fn test_segment_ending_before_query_does_not_match() {
        assert!(!interval_matches(ts(0), ts(99), ts(100), TOL));
    }

    #[test]
    fn test_default_tolerance_is_window_length() {
        let window = QueryWindow::new(ts(1000), 600.0, 1800.0);
        assert_eq!(tolerance_micros(&window, None), 2_400_000_000);
        assert_eq!(tolerance_micros(&window, Some(900.0)), 900_000_000);
    }

    #[test]
    fn test_component_wildcards() {
        let filter = ComponentFilter::from_selectors(["__Z"]);
        assert!(filter.matches("EHZ"));
        assert!(filter.matches("BHZ"));
        assert!(!filter.matches("EHN"));
        assert!(!filter.matches("HZ"));

        let filter = ComponentFilter::from_selectors(["BH?"]);
        assert!(filter.matches("BHE"));
        assert!(!filter.matches("EHE"));
    }

    #[test]
    fn test_component_exact_set() {
        let filter = ComponentFilter::from_selectors(["EHZ", "EHN"]);
        assert!(filter.matches("EHN"));
        assert!(!filter.matches("EHE"));
        assert_eq!(filter.exact_codes(), Some(vec!["EHN", "EHZ"]));
        assert_eq!(ComponentFilter::from_selectors(["E_Z"]).exact_codes(), None);
    }

    #[test]
    fn test_empty_filters_accept_everything() {
        assert!(ComponentFilter::all().matches("XYZ"));
        assert!(StationFilter::all().matches("ANY"));
        assert!(!StationFilter::only(["A"]).matches("B"));
    }
}
