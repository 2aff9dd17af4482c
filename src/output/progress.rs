//! Progress bar utilities for channel extraction.

use indicatif::{ProgressBar, ProgressStyle};

/// Create a progress bar for the channel units of one event.
///
/// The length is unknown until the index has been queried; the pipeline
/// sets it once the channels are grouped.
pub fn create_channel_progress(event_id: &str, enabled: bool) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "[{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos}}/{{len}} channels - {event_id}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░ "),
    );
    Some(pb)
}

/// Finish a progress bar with a message.
pub fn finish_progress(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.finish_with_message(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_has_no_bar() {
        assert!(create_channel_progress("ev1", false).is_none());
        let pb = create_channel_progress("ev1", true);
        assert_eq!(pb.as_ref().and_then(ProgressBar::length), Some(0));
        finish_progress(pb, "done");
    }
}
