//! Event extraction over a segment index.

use super::assemble::{
    AssemblySpec, ChannelOutcome, assemble_segments, prepare_output_dir, whole_secs,
};
use crate::config::{Config, WaveformFormat};
use crate::error::{Failure, Result};
use crate::index::{
    ChannelKey, ComponentFilter, ComponentPattern, SegmentIndex, SegmentRecord, StationFilter,
    sanitize_filename,
};
use crate::time::{QueryWindow, Timestamp};
use crate::waveform::{MseedReader, WaveformReader, WaveformWriter};
use futures_util::StreamExt;
use futures_util::stream;
use indicatif::ProgressBar;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Settings for extraction runs.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Seconds before the reference time for segment matching.
    pub match_lead_secs: f64,
    /// Seconds after the reference time for segment matching.
    pub match_lag_secs: f64,
    /// Matching tolerance; `None` means the match window length.
    pub match_tolerance_secs: Option<f64>,
    /// Seconds before the reference time kept in the output.
    pub trim_lead_secs: f64,
    /// Seconds after the reference time kept in the output.
    pub trim_lag_secs: f64,
    /// Value written where nothing was recorded.
    pub fill_value: f64,
    /// Channel units run concurrently.
    pub workers: usize,
    /// Time budget for one channel unit.
    pub unit_timeout: Duration,
    /// Output file format.
    pub format: WaveformFormat,
    /// Root under which event directories are created.
    pub output_dir: PathBuf,
}

impl ExtractOptions {
    /// Options taken from a loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            match_lead_secs: config.matching.lead_secs,
            match_lag_secs: config.matching.lag_secs,
            match_tolerance_secs: config.matching.tolerance_secs,
            trim_lead_secs: config.trim.lead_secs,
            trim_lag_secs: config.trim.lag_secs,
            fill_value: config.trim.fill_value,
            workers: config.extraction.workers,
            unit_timeout: Duration::from_secs(config.extraction.unit_timeout_secs),
            format: config.extraction.format,
            output_dir: config.extraction.output_dir.clone(),
        }
    }

    /// Window used to select segments.
    pub fn match_window(&self, reference: Timestamp) -> QueryWindow {
        QueryWindow::new(reference, self.match_lead_secs, self.match_lag_secs)
    }

    /// Window the output is cut to.
    pub fn trim_window(&self, reference: Timestamp) -> QueryWindow {
        QueryWindow::new(reference, self.trim_lead_secs, self.trim_lag_secs)
    }
}

/// What to extract for one event.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Event identifier; names the output directory.
    pub event_id: String,
    /// Reference (origin) time.
    pub reference: Timestamp,
    /// Stations to extract.
    pub stations: StationFilter,
    /// Components to extract.
    pub components: ComponentFilter,
}

/// Everything one extraction run produced.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    /// Event identifier.
    pub event_id: String,
    /// Directory holding the written traces.
    pub event_dir: PathBuf,
    /// Window used for segment matching.
    pub match_window: QueryWindow,
    /// Window the traces cover.
    pub trim_window: QueryWindow,
    /// Number of segments the index returned.
    pub matched_segments: usize,
    /// One entry per channel.
    pub channels: BTreeMap<ChannelKey, ChannelOutcome>,
}

impl ExtractionReport {
    /// Channels written successfully.
    pub fn written(&self) -> usize {
        self.channels.values().filter(|c| c.result.is_ok()).count()
    }

    /// Channels cancelled before completion.
    pub fn cancelled(&self) -> usize {
        self.count_failures(|f| matches!(f, Failure::Cancelled))
    }

    /// Channels that failed for any reason other than cancellation.
    pub fn failed(&self) -> usize {
        self.count_failures(|f| !matches!(f, Failure::Cancelled))
    }

    fn count_failures(&self, pred: impl Fn(&Failure) -> bool) -> usize {
        self.channels
            .values()
            .filter(|c| c.result.as_ref().is_err_and(&pred))
            .count()
    }
}

/// Extracts per-channel traces around a reference time.
pub struct ExtractionPipeline {
    reader: Arc<dyn WaveformReader>,
    writer: Arc<dyn WaveformWriter>,
    options: ExtractOptions,
}

impl ExtractionPipeline {
    /// Pipeline reading miniSEED and writing the configured format.
    pub fn new(options: ExtractOptions) -> Self {
        Self {
            reader: Arc::new(MseedReader),
            writer: Arc::new(options.format),
            options,
        }
    }

    /// Replace the waveform reader.
    #[must_use]
    pub fn with_reader(mut self, reader: Arc<dyn WaveformReader>) -> Self {
        self.reader = reader;
        self
    }

    /// Replace the waveform writer.
    #[must_use]
    pub fn with_writer(mut self, writer: Arc<dyn WaveformWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Run options.
    pub const fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Writer used for output files.
    pub fn writer(&self) -> Arc<dyn WaveformWriter> {
        Arc::clone(&self.writer)
    }

    /// Extract every matching channel for one event.
    ///
    /// Only index and output-directory failures are errors. Every channel
    /// ends up in the report, written or with a [`Failure`]; requested
    /// station/component pairs with no matching segments get a no-data
    /// entry. Once `cancel` fires, units that have not started are marked
    /// cancelled and running ones stop at their next checkpoint.
    pub async fn extract(
        &self,
        index: &dyn SegmentIndex,
        request: &ExtractionRequest,
        cancel: &CancellationToken,
        progress: Option<&ProgressBar>,
    ) -> Result<ExtractionReport> {
        let options = &self.options;
        let match_window = options.match_window(request.reference);
        let trim_window = options.trim_window(request.reference);

        let segments = index.find_segments(
            &request.stations,
            &request.components,
            &match_window,
            options.match_tolerance_secs,
        )?;
        let matched_segments = segments.len();
        info!(
            "Event {}: {matched_segments} segment(s) match {} to {}",
            request.event_id,
            match_window.start(),
            match_window.end()
        );

        let event_dir = options.output_dir.join(sanitize_filename(&request.event_id));
        prepare_output_dir(&event_dir)?;

        let groups = group_by_channel(segments);
        let mut channels = unmatched_requests(request, &groups);

        let spec = Arc::new(AssemblySpec {
            trim: trim_window,
            fill_value: options.fill_value,
            output_dir: event_dir.clone(),
        });

        if let Some(pb) = progress {
            pb.set_length(groups.len() as u64);
        }

        let units = groups.into_iter().map(|(key, segments)| {
            let spec = Arc::clone(&spec);
            let reader = Arc::clone(&self.reader);
            let writer = Arc::clone(&self.writer);
            let timeout = options.unit_timeout;
            async move {
                let outcome = run_unit(&key, segments, reader, writer, spec, timeout, cancel).await;
                (key, outcome)
            }
        });

        let mut results = stream::iter(units).buffer_unordered(options.workers.max(1));
        while let Some((key, outcome)) = results.next().await {
            match &outcome.result {
                Ok(trace) => debug!("{key}: wrote {}", trace.path.display()),
                Err(Failure::Cancelled) => debug!("{key}: cancelled"),
                Err(failure) => warn!("{key}: {failure}"),
            }
            if let Some(pb) = progress {
                pb.inc(1);
            }
            channels.insert(key, outcome);
        }

        let report = ExtractionReport {
            event_id: request.event_id.clone(),
            event_dir,
            match_window,
            trim_window,
            matched_segments,
            channels,
        };
        info!(
            "Event {}: {} written, {} failed, {} cancelled",
            report.event_id,
            report.written(),
            report.failed(),
            report.cancelled()
        );
        Ok(report)
    }
}

/// Hand-off between a unit worker and its timeout; whichever side moves
/// first out of `Running` decides the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitState {
    Running,
    Committed,
    Abandoned,
}

/// Run one channel unit on the blocking pool under a time budget.
///
/// A unit that times out never leaves a trace file behind: a worker that
/// finishes writing after the deadline removes its file again.
async fn run_unit(
    key: &ChannelKey,
    segments: Vec<SegmentRecord>,
    reader: Arc<dyn WaveformReader>,
    writer: Arc<dyn WaveformWriter>,
    spec: Arc<AssemblySpec>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> ChannelOutcome {
    if cancel.is_cancelled() {
        return ChannelOutcome::failed(Failure::Cancelled);
    }

    let token = cancel.child_token();
    let unit_token = token.clone();
    let unit_key = key.clone();
    let state = Arc::new(Mutex::new(UnitState::Running));
    let unit_state = Arc::clone(&state);
    let mut task = tokio::task::spawn_blocking(move || {
        let mut outcome = assemble_segments(
            &unit_key,
            &segments,
            reader.as_ref(),
            writer.as_ref(),
            &spec,
            &unit_token,
        );
        let abandoned = {
            let mut state = unit_state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == UnitState::Running {
                *state = UnitState::Committed;
            }
            *state == UnitState::Abandoned
        };
        if abandoned {
            if let Ok(trace) = &outcome.result {
                if let Err(e) = std::fs::remove_file(&trace.path) {
                    warn!("{unit_key}: could not remove late trace {}: {e}", trace.path.display());
                }
            }
            outcome.result = Err(Failure::Cancelled);
        }
        outcome
    });

    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_error)) => worker_failed(&join_error),
        Err(_) => {
            let committed = {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if *state == UnitState::Running {
                    *state = UnitState::Abandoned;
                }
                *state == UnitState::Committed
            };
            if committed {
                // Finished at the deadline; the worker is only returning.
                return match task.await {
                    Ok(outcome) => outcome,
                    Err(join_error) => worker_failed(&join_error),
                };
            }
            // Stop the detached worker at its next checkpoint.
            token.cancel();
            ChannelOutcome::failed(Failure::Timeout {
                after_secs: whole_secs(timeout),
            })
        }
    }
}

fn worker_failed(join_error: &tokio::task::JoinError) -> ChannelOutcome {
    ChannelOutcome::failed(Failure::Write {
        reason: format!("worker failed: {join_error}"),
    })
}

/// Group segments by channel, each group in deterministic load order.
pub fn group_by_channel(segments: Vec<SegmentRecord>) -> BTreeMap<ChannelKey, Vec<SegmentRecord>> {
    let mut groups: BTreeMap<ChannelKey, Vec<SegmentRecord>> = BTreeMap::new();
    for segment in segments {
        groups.entry(segment.channel_key()).or_default().push(segment);
    }
    for segments in groups.values_mut() {
        segments.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }
    groups
}

/// No-data entries for requested station/component pairs nothing matched.
///
/// Only explicit station lists can be checked. The network is taken from
/// another channel of the station when one matched; location is empty and
/// wildcard patterns appear verbatim as the component.
fn unmatched_requests(
    request: &ExtractionRequest,
    groups: &BTreeMap<ChannelKey, Vec<SegmentRecord>>,
) -> BTreeMap<ChannelKey, ChannelOutcome> {
    let mut missing = BTreeMap::new();
    if request.stations.is_unrestricted() {
        return missing;
    }

    let patterns: Vec<ComponentPattern> = if request.components.is_unrestricted() {
        vec![ComponentPattern::parse("???")]
    } else {
        request.components.patterns().cloned().collect()
    };

    for station in request.stations.codes() {
        let network = groups
            .keys()
            .find(|k| k.station == station)
            .map(|k| k.network.as_str())
            .unwrap_or_default();
        for pattern in &patterns {
            let found = groups
                .keys()
                .any(|k| k.station == station && pattern.matches(&k.component));
            if !found {
                let key = ChannelKey::new(network, station, "", pattern.as_str());
                let failure = Failure::no_data(format!(
                    "no segments for {station} {} in window",
                    pattern.as_str()
                ));
                missing.insert(key, ChannelOutcome::failed(failure));
            }
        }
    }
    missing
}
