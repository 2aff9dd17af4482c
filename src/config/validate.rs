//! Configuration validation.

use crate::config::Config;
use crate::constants::extraction::{MAX_UNIT_TIMEOUT_SECS, MAX_WORKERS};
use crate::error::{Error, Result};

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_windows(config)?;
    validate_extraction(config)?;
    validate_reference(config)?;
    Ok(())
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!(
            "{name} must be a non-negative number, got {value}"
        )))
    }
}

/// The trim window must sit inside the match window.
fn validate_windows(config: &Config) -> Result<()> {
    let matching = &config.matching;
    let trim = &config.trim;

    non_negative("matching.lead_secs", matching.lead_secs)?;
    non_negative("matching.lag_secs", matching.lag_secs)?;
    non_negative("trim.lead_secs", trim.lead_secs)?;
    non_negative("trim.lag_secs", trim.lag_secs)?;
    non_negative("gaps.tolerance_secs", config.gaps.tolerance_secs)?;
    if let Some(tolerance) = matching.tolerance_secs {
        non_negative("matching.tolerance_secs", tolerance)?;
    }

    if matching.lead_secs + matching.lag_secs <= 0.0 {
        return Err(invalid("match window must have a positive length"));
    }
    if trim.lead_secs + trim.lag_secs <= 0.0 {
        return Err(invalid("trim window must have a positive length"));
    }
    if trim.lead_secs > matching.lead_secs {
        return Err(invalid(format!(
            "trim.lead_secs ({}) exceeds matching.lead_secs ({})",
            trim.lead_secs, matching.lead_secs
        )));
    }
    if trim.lag_secs > matching.lag_secs {
        return Err(invalid(format!(
            "trim.lag_secs ({}) exceeds matching.lag_secs ({})",
            trim.lag_secs, matching.lag_secs
        )));
    }
    if !trim.fill_value.is_finite() {
        return Err(invalid("trim.fill_value must be finite"));
    }

    Ok(())
}

fn validate_extraction(config: &Config) -> Result<()> {
    let extraction = &config.extraction;

    if !(1..=MAX_WORKERS).contains(&extraction.workers) {
        return Err(invalid(format!(
            "extraction.workers must be between 1 and {MAX_WORKERS}, got {}",
            extraction.workers
        )));
    }
    if !(1..=u64::from(MAX_UNIT_TIMEOUT_SECS)).contains(&extraction.unit_timeout_secs) {
        return Err(invalid(format!(
            "extraction.unit_timeout_secs must be between 1 and {MAX_UNIT_TIMEOUT_SECS}, got {}",
            extraction.unit_timeout_secs
        )));
    }
    if extraction.components.iter().any(String::is_empty) {
        return Err(invalid("extraction.components must not contain empty codes"));
    }

    Ok(())
}

fn validate_reference(config: &Config) -> Result<()> {
    let reference = &config.reference;

    non_negative("reference.margin_degrees", reference.margin_degrees)?;
    if reference.timeout_secs == 0 {
        return Err(invalid("reference.timeout_secs must be at least 1"));
    }
    if reference.enabled && reference.networks.is_empty() {
        return Err(invalid("reference.networks must not be empty when enabled"));
    }
    if reference.enabled && reference.service_url.trim().is_empty() {
        return Err(invalid("reference.service_url must be set when enabled"));
    }

    Ok(())
}
