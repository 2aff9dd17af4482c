//! Emitters for `--json` mode and plain-text summaries.

use crate::output::json_envelope::{
    ErrorPayload, ErrorSeverity, EventSummary, EventType, JsonEnvelope,
};
use serde::Serialize;

/// Print a result envelope on stdout.
pub fn emit_json_result<T: Serialize>(payload: &T) {
    emit(EventType::Result, payload);
}

/// Print an error envelope on stdout.
pub fn emit_json_error(code: &str, message: &str) {
    emit(
        EventType::Error,
        &ErrorPayload {
            code: code.to_string(),
            severity: ErrorSeverity::Fatal,
            message: message.to_string(),
        },
    );
}

/// Print a cancellation envelope carrying what finished before the stop.
pub fn emit_json_cancelled<T: Serialize>(payload: &T) {
    emit(EventType::Cancelled, payload);
}

fn emit<T: Serialize>(event: EventType, payload: &T) {
    let envelope = JsonEnvelope::new(event, payload);
    match serde_json::to_string(&envelope) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            // Log to stderr so it doesn't corrupt JSON output stream
            eprintln!("error: failed to serialize JSON result: {e}");
        }
    }
}

/// Plain-text summary of one event.
pub fn format_event_summary(summary: &EventSummary) -> String {
    let mut text = format!(
        "{}: {} written, {} failed, {} cancelled -> {}",
        summary.event_id,
        summary.written,
        summary.failed,
        summary.cancelled,
        summary.event_dir.display()
    );
    for channel in &summary.channels {
        if let Some(failure) = &channel.failure {
            text.push_str(&format!("\n  {}: {failure}", channel.channel));
        }
    }
    if let Some(reference) = &summary.reference {
        let written = reference
            .stations
            .iter()
            .filter(|s| s.failure.is_none())
            .count();
        text.push_str(&format!(
            "\n  reference: {written} of {} station(s) written",
            reference.stations.len()
        ));
        for failed in &reference.listing_failures {
            text.push_str(&format!("\n  reference {}: {}", failed.network, failed.failure));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Failure;
    use crate::output::json_envelope::{ChannelSummary, UnitStatus};
    use crate::time::Timestamp;
    use std::path::PathBuf;

    #[test]
    fn test_summary_lists_failures() {
        let summary = EventSummary {
            event_id: "ev1".to_string(),
            event_dir: PathBuf::from("events/ev1"),
            reference_time: Timestamp::from_secs(100),
            window_start: Timestamp::from_secs(0),
            window_end: Timestamp::from_secs(200),
            matched_segments: 2,
            written: 1,
            failed: 1,
            cancelled: 0,
            channels: vec![ChannelSummary {
                channel: "X5.S2..EHZ".to_string(),
                status: UnitStatus::Failed,
                path: None,
                samples: None,
                filled: None,
                failure: Some(Failure::no_data("no segments")),
                skipped: Vec::new(),
            }],
            reference: None,
        };
        let text = format_event_summary(&summary);
        assert!(text.starts_with("ev1: 1 written, 1 failed, 0 cancelled -> events/ev1"));
        assert!(text.contains("X5.S2..EHZ: no data for window: no segments"));
    }
}
