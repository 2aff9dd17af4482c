//! CLI argument validators.
//!
//! Shared validation functions for CLI argument parsing.

use crate::constants::extraction::MAX_UNIT_TIMEOUT_SECS;
use crate::time::Timestamp;

/// Parse a float that must be finite and at least `min`.
fn parse_float_at_least(s: &str, min: f64, name: &str, strict: bool) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    let in_range = if strict { value > min } else { value >= min };
    if !value.is_finite() || !in_range {
        let bound = if strict { "greater than" } else { "at least" };
        return Err(format!("{name} must be {bound} {min}, got {value}"));
    }

    Ok(value)
}

/// Parse a duration in seconds that must be positive.
pub fn parse_positive_secs(s: &str) -> Result<f64, String> {
    parse_float_at_least(s, 0.0, "seconds", true)
}

/// Parse a per-unit timeout: positive and no longer than a day.
pub fn parse_timeout_secs(s: &str) -> Result<f64, String> {
    let value = parse_positive_secs(s)?;
    let max = f64::from(MAX_UNIT_TIMEOUT_SECS);
    if value > max {
        return Err(format!("timeout must be at most {max} seconds, got {value}"));
    }
    Ok(value)
}

/// Parse a duration in seconds that may be zero.
pub fn parse_non_negative_secs(s: &str) -> Result<f64, String> {
    parse_float_at_least(s, 0.0, "seconds", false)
}

/// Parse an RFC 3339 time, a naive UTC time or epoch seconds.
pub fn parse_time(s: &str) -> Result<Timestamp, String> {
    Timestamp::parse(s).map_err(|e| e.to_string())
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positive_secs() {
        assert_eq!(parse_positive_secs("1.5").ok(), Some(1.5));
        assert!(parse_positive_secs("0").is_err());
        assert!(parse_positive_secs("-3").is_err());
        assert!(parse_positive_secs("inf").is_err());
        assert!(parse_positive_secs("abc").is_err());
    }

    #[test]
    fn test_parse_timeout_secs_is_bounded() {
        assert_eq!(parse_timeout_secs("0.25").ok(), Some(0.25));
        assert_eq!(parse_timeout_secs("86400").ok(), Some(86_400.0));
        assert!(parse_timeout_secs("86400.5").is_err());
        assert!(parse_timeout_secs("1e20").is_err());
        assert!(parse_timeout_secs("0").is_err());
    }

    #[test]
    fn test_parse_non_negative_secs() {
        assert_eq!(parse_non_negative_secs("0").ok(), Some(0.0));
        assert!(parse_non_negative_secs("-0.1").is_err());
        assert!(parse_non_negative_secs("NaN").is_err());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("60").ok(), Some(Timestamp::from_secs(60)));
        assert_eq!(
            parse_time("1970-01-01T00:01:00Z").ok(),
            Some(Timestamp::from_secs(60))
        );
        assert!(parse_time("yesterday").is_err());
    }
}
