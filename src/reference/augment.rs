//! Reference-network augmentation of an extraction.

use super::service::{RemoteError, StationService};
use super::station::write_station_file;
use super::{BoundingBox, Station};
use crate::config::Config;
use crate::constants::extraction::REFERENCE_INVENTORY_FILE;
use crate::error::{Failure, Result};
use crate::index::ChannelKey;
use crate::pipeline::{AssembledTrace, AssemblySpec, assemble_series, prepare_output_dir, whole_secs};
use crate::time::QueryWindow;
use crate::waveform::{TimeSeries, WaveformWriter};
use futures_util::StreamExt;
use futures_util::stream;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Settings for one augmentation pass.
#[derive(Debug, Clone)]
pub struct ReferenceOptions {
    /// Networks searched for reference stations.
    pub networks: Vec<String>,
    /// Channel selector sent with waveform requests.
    pub channels: String,
    /// Degrees added around the deployment's bounding box.
    pub margin_degrees: f64,
    /// Stations fetched concurrently.
    pub workers: usize,
    /// Time budget for one station, including retries.
    pub unit_timeout: Duration,
    /// Value for samples with no data.
    pub fill_value: f64,
}

impl ReferenceOptions {
    /// Options taken from a loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            networks: config.reference.networks.clone(),
            channels: config.reference.channels.clone(),
            margin_degrees: config.reference.margin_degrees,
            workers: config.extraction.workers,
            unit_timeout: Duration::from_secs(config.extraction.unit_timeout_secs),
            fill_value: config.trim.fill_value,
        }
    }
}

/// Outcome for one reference station.
#[derive(Debug, Clone, PartialEq)]
pub struct StationOutcome {
    /// Network code.
    pub network: String,
    /// Station code.
    pub station: String,
    /// Channels written, or why there are none.
    pub result: std::result::Result<Vec<AssembledTrace>, Failure>,
}

/// Everything one augmentation pass produced.
#[derive(Debug, Clone, Default)]
pub struct ReferenceReport {
    /// Box searched, after the margin.
    pub bbox: Option<BoundingBox>,
    /// Station listings that failed, per network.
    pub listing_failures: Vec<(String, Failure)>,
    /// Written inventory file, if any station was listed.
    pub inventory: Option<PathBuf>,
    /// One entry per listed station.
    pub stations: Vec<StationOutcome>,
}

impl ReferenceReport {
    /// Stations with at least one written channel.
    pub fn written(&self) -> usize {
        self.stations.iter().filter(|s| s.result.is_ok()).count()
    }

    /// Stations without output.
    pub fn failed(&self) -> usize {
        self.stations.len() - self.written()
    }
}

/// Fetches traces of permanent stations around a deployment.
pub struct ReferenceAugmenter {
    service: Arc<dyn StationService>,
    writer: Arc<dyn WaveformWriter>,
    options: ReferenceOptions,
}

impl ReferenceAugmenter {
    /// Create an augmenter.
    pub fn new(
        service: Arc<dyn StationService>,
        writer: Arc<dyn WaveformWriter>,
        options: ReferenceOptions,
    ) -> Self {
        Self {
            service,
            writer,
            options,
        }
    }

    /// Fetch reference stations inside `deployment` (grown by the margin)
    /// over `window` and write their traces to `output_dir`.
    ///
    /// Stations in `exclude` (the primary deployment) are skipped. A failing
    /// listing or station is recorded and the rest carry on; only an
    /// unusable `output_dir` is an error.
    pub async fn augment(
        &self,
        deployment: BoundingBox,
        window: &QueryWindow,
        exclude: &BTreeSet<String>,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ReferenceReport> {
        let bbox = deployment.expand(self.options.margin_degrees);
        prepare_output_dir(output_dir)?;

        let mut report = ReferenceReport {
            bbox: Some(bbox),
            ..ReferenceReport::default()
        };

        let mut listed: BTreeMap<(String, String), Station> = BTreeMap::new();
        for network in &self.options.networks {
            if cancel.is_cancelled() {
                break;
            }
            match self.list_network(network, window, &bbox).await {
                Ok(stations) => {
                    debug!("{network}: {} station(s) listed", stations.len());
                    for station in stations {
                        if exclude.contains(&station.station)
                            || !bbox.contains(station.latitude, station.longitude)
                        {
                            continue;
                        }
                        listed
                            .entry((station.network.clone(), station.station.clone()))
                            .or_insert(station);
                    }
                }
                Err(failure) => {
                    warn!("Listing reference network {network} failed: {failure}");
                    report.listing_failures.push((network.clone(), failure));
                }
            }
        }

        let stations: Vec<Station> = listed.into_values().collect();
        if !stations.is_empty() {
            let path = output_dir.join(REFERENCE_INVENTORY_FILE);
            match write_station_file(&path, &stations) {
                Ok(()) => report.inventory = Some(path),
                Err(e) => warn!("Could not write reference inventory: {e}"),
            }
        }

        let spec = Arc::new(AssemblySpec {
            trim: *window,
            fill_value: self.options.fill_value,
            output_dir: output_dir.to_path_buf(),
        });

        let units = stations.into_iter().map(|station| {
            let spec = Arc::clone(&spec);
            async move {
                let result = self.run_station(&station, spec, cancel).await;
                StationOutcome {
                    network: station.network,
                    station: station.station,
                    result,
                }
            }
        });

        let mut results = stream::iter(units).buffer_unordered(self.options.workers.max(1));
        while let Some(outcome) = results.next().await {
            match &outcome.result {
                Ok(traces) => debug!(
                    "{}.{}: {} channel(s) written",
                    outcome.network,
                    outcome.station,
                    traces.len()
                ),
                Err(failure) => warn!("{}.{}: {failure}", outcome.network, outcome.station),
            }
            report.stations.push(outcome);
        }
        report
            .stations
            .sort_by(|a, b| (&a.network, &a.station).cmp(&(&b.network, &b.station)));

        info!(
            "Reference stations: {} written, {} failed",
            report.written(),
            report.failed()
        );
        Ok(report)
    }

    async fn list_network(
        &self,
        network: &str,
        window: &QueryWindow,
        bbox: &BoundingBox,
    ) -> std::result::Result<Vec<Station>, Failure> {
        let timeout = self.options.unit_timeout;
        match tokio::time::timeout(timeout, self.service.list_stations(network, window, bbox)).await {
            Ok(result) => result.map_err(remote_failure),
            Err(_) => Err(Failure::Timeout {
                after_secs: whole_secs(timeout),
            }),
        }
    }

    async fn run_station(
        &self,
        station: &Station,
        spec: Arc<AssemblySpec>,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<AssembledTrace>, Failure> {
        if cancel.is_cancelled() {
            return Err(Failure::Cancelled);
        }

        let timeout = self.options.unit_timeout;
        let fetch = self.service.get_waveform(
            &station.network,
            &station.station,
            &self.options.channels,
            "*",
            &spec.trim,
        );
        let series = tokio::select! {
            () = cancel.cancelled() => return Err(Failure::Cancelled),
            result = tokio::time::timeout(timeout, fetch) => match result {
                Ok(fetched) => fetched.map_err(remote_failure)?,
                Err(_) => return Err(Failure::Timeout { after_secs: whole_secs(timeout) }),
            },
        };

        let writer = Arc::clone(&self.writer);
        let token = cancel.child_token();
        tokio::task::spawn_blocking(move || assemble_station(series, writer.as_ref(), &spec, &token))
            .await
            .map_err(|e| Failure::Write {
                reason: format!("worker failed: {e}"),
            })?
    }
}

/// Merge and write every channel a station returned.
///
/// The station succeeds when at least one channel is written.
fn assemble_station(
    series: Vec<TimeSeries>,
    writer: &dyn WaveformWriter,
    spec: &AssemblySpec,
    token: &CancellationToken,
) -> std::result::Result<Vec<AssembledTrace>, Failure> {
    let mut by_channel: BTreeMap<ChannelKey, Vec<TimeSeries>> = BTreeMap::new();
    for s in series {
        by_channel.entry(s.key.clone()).or_default().push(s);
    }

    let mut traces = Vec::new();
    let mut first_failure = None;
    for (key, series) in by_channel {
        match assemble_series(&key, series, writer, spec, token) {
            Ok(trace) => traces.push(trace),
            Err(failure) => {
                warn!("{key}: {failure}");
                first_failure.get_or_insert(failure);
            }
        }
    }

    match first_failure {
        Some(failure) if traces.is_empty() => Err(failure),
        _ if traces.is_empty() => Err(Failure::no_data("service returned no channels")),
        _ => Ok(traces),
    }
}

fn remote_failure(error: RemoteError) -> Failure {
    match error {
        RemoteError::NoData => Failure::no_data("service has no data for the window"),
        other => Failure::Remote {
            reason: other.to_string(),
        },
    }
}
