//! CLI output: JSON envelopes, progress bars and summaries.

pub mod json_envelope;
mod progress;
mod reporter;

pub use progress::{create_channel_progress, finish_progress};
pub use reporter::{emit_json_cancelled, emit_json_error, emit_json_result, format_event_summary};
