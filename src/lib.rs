//! Quakecut - event-window extraction from continuous seismic archives.
//!
//! The crate finds archived waveform segments around an event time, merges
//! them per channel, trims or pads the result to an exact window and writes
//! one file per channel. Optionally it adds traces of nearby permanent
//! stations fetched from an FDSN data centre.

#![warn(missing_docs)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod gaps;
pub mod index;
pub mod output;
pub mod pipeline;
pub mod reference;
pub mod time;
pub mod waveform;

use catalog::{Event, parse_catalog, select_events};
use clap::Parser;
use cli::{Cli, Command, ConfigAction, ExtractArgs, GapsArgs, IndexAction};
use config::{Config, config_file_path, load_default_config, save_default_config};
use constants::extraction::REFERENCE_SUBDIR;
use index::{ComponentFilter, JsonIndex, SegmentIndex, SqliteIndex, StationFilter, open_index};
use output::json_envelope::{
    ConfigPayload, EventSummary, ExtractionPayload, GapReportPayload, IndexImportPayload,
    IndexStatsPayload, ResultType,
};
use pipeline::{ExtractOptions, ExtractionPipeline, ExtractionRequest};
use reference::{BoundingBox, FdsnClient, ReferenceAugmenter, ReferenceOptions, Station};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use error::{Error, Failure, Result};

/// Main entry point for quakecut CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let json = cli.json;
    let result = handle_command(cli);
    if let (Err(e), true) = (&result, json) {
        output::emit_json_error(e.code(), &e.to_string());
    }
    result
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter_str = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_command(cli: Cli) -> Result<()> {
    let explicit = cli.config.as_deref();
    match cli.command {
        Command::Config { action } => handle_config_command(action, explicit, cli.json),
        Command::Index { action } => handle_index_command(action, cli.json),
        Command::Gaps(args) => {
            let config = load_default_config(explicit)?;
            handle_gaps(&args, &config, cli.json)
        }
        Command::Extract(args) => {
            let config = load_default_config(explicit)?;
            let show_progress = !cli.json && !cli.quiet && !args.no_progress;
            handle_extract(&args, &config, cli.json, show_progress)
        }
    }
}

/// Cancel `token` on the first Ctrl+C; exit on the second.
fn install_interrupt_handler(token: CancellationToken) {
    let interrupted = AtomicBool::new(false);
    if let Err(e) = ctrlc::set_handler(move || {
        if interrupted.swap(true, Ordering::SeqCst) {
            std::process::exit(130); // 128 + SIGINT(2)
        }
        warn!("Interrupted; finishing running channels (Ctrl+C again to abort)");
        token.cancel();
    }) {
        warn!("Failed to install Ctrl+C handler: {e}");
    }
}

/// Reference augmentation bound to one deployment.
struct ReferenceRun {
    augmenter: ReferenceAugmenter,
    deployment: BoundingBox,
    primary: BTreeSet<String>,
}

fn handle_extract(
    args: &ExtractArgs,
    config: &Config,
    json: bool,
    show_progress: bool,
) -> Result<()> {
    let options = extract_options(args, config)?;
    let index = open_index(&args.index)?;
    let events = resolve_events(args)?;

    let primary = args
        .stations_file
        .as_deref()
        .map(reference::read_station_file)
        .transpose()?;
    let stations = station_filter(&args.stations, primary.as_deref());
    let components = if args.components.is_empty() {
        ComponentFilter::from_selectors(&config.extraction.components)
    } else {
        ComponentFilter::from_selectors(&args.components)
    };

    let reference = if args.reference || config.reference.enabled {
        reference_run(config, &options, primary.as_deref())?
    } else {
        None
    };

    info!(
        "Extracting {} event(s) from {} into {}",
        events.len(),
        args.index.display(),
        options.output_dir.display()
    );

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone());

    let pipeline = ExtractionPipeline::new(options);
    let runtime = tokio::runtime::Runtime::new().map_err(|e| Error::Internal {
        message: format!("failed to start async runtime: {e}"),
    })?;
    let summaries = runtime.block_on(run_events(
        &pipeline,
        index.as_ref(),
        &events,
        &stations,
        &components,
        reference.as_ref(),
        &cancel,
        show_progress,
    ))?;

    let payload = ExtractionPayload {
        result_type: ResultType::Extraction,
        events: summaries,
    };
    if json {
        if cancel.is_cancelled() {
            output::emit_json_cancelled(&payload);
        } else {
            output::emit_json_result(&payload);
        }
    } else {
        for summary in &payload.events {
            println!("{}", output::format_event_summary(summary));
        }
    }
    if cancel.is_cancelled() {
        warn!(
            "Extraction cancelled after {} of {} event(s)",
            payload.events.len(),
            events.len()
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_events(
    pipeline: &ExtractionPipeline,
    index: &dyn SegmentIndex,
    events: &[Event],
    stations: &StationFilter,
    components: &ComponentFilter,
    reference: Option<&ReferenceRun>,
    cancel: &CancellationToken,
    show_progress: bool,
) -> Result<Vec<EventSummary>> {
    let mut summaries = Vec::with_capacity(events.len());

    for event in events {
        if cancel.is_cancelled() {
            break;
        }
        let request = ExtractionRequest {
            event_id: event.id.clone(),
            reference: event.time,
            stations: stations.clone(),
            components: components.clone(),
        };

        let progress = output::create_channel_progress(&event.id, show_progress);
        let report = pipeline
            .extract(index, &request, cancel, progress.as_ref())
            .await?;
        output::finish_progress(progress, "done");

        let reference_report = match reference {
            Some(run) if !cancel.is_cancelled() => {
                let mut exclude = run.primary.clone();
                exclude.extend(report.channels.keys().map(|k| k.station.clone()));
                let dir = report.event_dir.join(REFERENCE_SUBDIR);
                Some(
                    run.augmenter
                        .augment(run.deployment, &report.trim_window, &exclude, &dir, cancel)
                        .await?,
                )
            }
            _ => None,
        };

        summaries.push(EventSummary::new(&report, reference_report.as_ref()));
    }

    Ok(summaries)
}

/// Merge CLI overrides into the configured extraction options.
fn extract_options(args: &ExtractArgs, config: &Config) -> Result<ExtractOptions> {
    let mut options = ExtractOptions::from_config(config);
    if let Some(dir) = &args.output {
        options.output_dir.clone_from(dir);
    }
    if let Some(format) = args.format {
        options.format = format;
    }
    if let Some(workers) = args.workers {
        options.workers = usize::from(workers);
    }
    if let Some(timeout) = args.timeout {
        options.unit_timeout =
            Duration::try_from_secs_f64(timeout).map_err(|e| Error::ConfigValidation {
                message: format!("invalid timeout {timeout}: {e}"),
            })?;
    }
    if let Some(fill) = args.fill {
        options.fill_value = fill;
    }
    Ok(options)
}

/// Events named by the catalogue or by `--event-id`/`--time`.
fn resolve_events(args: &ExtractArgs) -> Result<Vec<Event>> {
    match (&args.catalog, &args.event_id, args.time) {
        (Some(path), _, _) => {
            let events = parse_catalog(path)?;
            select_events(events, &args.events)
        }
        (None, Some(id), Some(time)) => Ok(vec![Event::new(id.clone(), time)]),
        _ => Err(Error::InvalidCatalog {
            message: "give --catalog or both --event-id and --time".to_string(),
        }),
    }
}

/// Explicit `--station` codes win over the station file; neither means all.
fn station_filter(codes: &[String], primary: Option<&[Station]>) -> StationFilter {
    if !codes.is_empty() {
        return StationFilter::only(codes);
    }
    match primary {
        Some(stations) if !stations.is_empty() => {
            StationFilter::only(stations.iter().map(|s| s.station.as_str()))
        }
        _ => StationFilter::all(),
    }
}

fn reference_run(
    config: &Config,
    options: &ExtractOptions,
    primary: Option<&[Station]>,
) -> Result<Option<ReferenceRun>> {
    let Some(stations) = primary else {
        warn!("Reference augmentation needs --stations-file; skipping");
        return Ok(None);
    };
    let Some(deployment) = BoundingBox::around(stations) else {
        warn!("Station file lists no stations; skipping reference augmentation");
        return Ok(None);
    };

    let client = FdsnClient::new(
        &config.reference.service_url,
        Duration::from_secs(config.reference.timeout_secs),
        config.reference.retries,
    )?;
    let mut reference_options = ReferenceOptions::from_config(config);
    reference_options.workers = options.workers;
    reference_options.unit_timeout = options.unit_timeout;
    reference_options.fill_value = options.fill_value;

    info!(
        "Reference augmentation from {} (networks: {})",
        config.reference.service_url,
        config.reference.networks.join(",")
    );
    Ok(Some(ReferenceRun {
        augmenter: ReferenceAugmenter::new(
            Arc::new(client),
            Arc::new(options.format),
            reference_options,
        ),
        deployment,
        primary: stations.iter().map(|s| s.station.clone()).collect(),
    }))
}

fn handle_gaps(args: &GapsArgs, config: &Config, json: bool) -> Result<()> {
    let index = open_index(&args.index)?;
    let tolerance = args.tolerance.unwrap_or(config.gaps.tolerance_secs);
    let stations = station_filter(&args.stations, None);
    let reports = gaps::analyze_index(index.as_ref(), &stations, tolerance, None)?;

    let gap_count: usize = reports.iter().map(|r| r.gaps.len()).sum();
    let overlap_count: usize = reports.iter().map(|r| r.overlaps.len()).sum();
    info!(
        "{} channel(s): {gap_count} gap(s), {overlap_count} overlap(s)",
        reports.len()
    );

    if let Some(path) = &args.output {
        gaps::write_gap_report_file(path, &reports)?;
        info!("Wrote gap report: {}", path.display());
    }

    if json {
        output::emit_json_result(&GapReportPayload {
            result_type: ResultType::GapReport,
            tolerance_secs: tolerance,
            channels: reports,
        });
    } else if args.output.is_none() {
        gaps::write_gap_report(std::io::stdout().lock(), &reports).map_err(|e| Error::CsvWrite {
            path: PathBuf::from("<stdout>"),
            source: e,
        })?;
    }
    Ok(())
}

fn handle_index_command(action: IndexAction, json: bool) -> Result<()> {
    match action {
        IndexAction::Import {
            source,
            destination,
        } => {
            let records: Vec<_> = JsonIndex::load(&source)?.into_records().collect();
            let mut archive = SqliteIndex::create(&destination)?;
            let imported = archive.insert(&records)?;
            info!(
                "Imported {imported} segment(s) from {} into {}",
                source.display(),
                destination.display()
            );
            if json {
                output::emit_json_result(&IndexImportPayload {
                    result_type: ResultType::IndexImport,
                    source,
                    destination,
                    imported,
                });
            } else {
                println!("Imported {imported} segment(s) into {}", destination.display());
            }
            Ok(())
        }
        IndexAction::Stats { index } => {
            let stats = open_index(&index)?.stats()?;
            if json {
                output::emit_json_result(&IndexStatsPayload {
                    result_type: ResultType::IndexStats,
                    path: index,
                    stats,
                });
            } else {
                println!("Index: {}", index.display());
                println!("  Segments: {}", stats.segments);
                println!("  Stations: {}", stats.station_count);
                println!("  Components: {}", stats.components.join(", "));
                if let (Some(earliest), Some(latest)) = (stats.earliest, stats.latest) {
                    println!("  Span: {earliest} to {latest}");
                }
            }
            Ok(())
        }
    }
}

fn handle_config_command(action: ConfigAction, explicit: Option<&Path>, json: bool) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = config_file_path(explicit)?;
            if path.exists() {
                println!("Configuration file already exists: {}", path.display());
            } else {
                let saved_path = save_default_config(&Config::default(), explicit)?;
                println!("Created configuration file: {}", saved_path.display());
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_default_config(explicit)?;
            if json {
                let value = serde_json::to_value(&config).map_err(|e| Error::Internal {
                    message: format!("failed to serialize config: {e}"),
                })?;
                output::emit_json_result(&ConfigPayload {
                    result_type: ResultType::Config,
                    config_path: config_file_path(explicit)?,
                    config: value,
                });
            } else {
                let text = toml::to_string_pretty(&config)
                    .map_err(|e| Error::ConfigSerialize { source: e })?;
                print!("{text}");
            }
            Ok(())
        }
        ConfigAction::Path => {
            let path = config_file_path(explicit)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::time::Timestamp;

    fn extract_args(extra: &[&str]) -> ExtractArgs {
        let mut argv = vec!["quakecut", "extract", "--index", "a.db"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Extract(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = extract_args(&[
            "--catalog", "e.csv", "--workers", "2", "--timeout", "1.5", "--fill", "-7", "--output",
            "out",
        ]);
        let options = extract_options(&args, &Config::default()).unwrap();
        assert_eq!(options.workers, 2);
        assert_eq!(options.unit_timeout, Duration::from_millis(1500));
        assert!((options.fill_value + 7.0).abs() < f64::EPSILON);
        assert_eq!(options.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_oversized_timeout_is_rejected() {
        let parsed = Cli::try_parse_from([
            "quakecut", "extract", "--index", "a.db", "--catalog", "e.csv", "--timeout", "1e20",
        ]);
        assert!(parsed.is_err());

        let mut args = extract_args(&["--catalog", "e.csv"]);
        args.timeout = Some(1e20);
        assert!(matches!(
            extract_options(&args, &Config::default()),
            Err(Error::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_single_event_from_flags() {
        let args = extract_args(&["--event-id", "ev1", "--time", "100"]);
        let events = resolve_events(&args).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "ev1");
        assert_eq!(events[0].time, Timestamp::from_secs(100));
    }

    #[test]
    fn test_station_filter_precedence() {
        let primary = vec![Station::new("X5", "S1", -20.0, 120.0)];
        assert!(station_filter(&[], None).is_unrestricted());
        assert!(station_filter(&[], Some(primary.as_slice())).matches("S1"));
        assert!(!station_filter(&[], Some(primary.as_slice())).matches("S2"));
        let explicit = station_filter(&["S2".to_string()], Some(primary.as_slice()));
        assert!(explicit.matches("S2"));
        assert!(!explicit.matches("S1"));
    }

    #[test]
    fn test_reference_without_stations_is_skipped() {
        let config = Config::default();
        let options = ExtractOptions::from_config(&config);
        assert!(reference_run(&config, &options, None).unwrap().is_none());
        let empty: Vec<Station> = Vec::new();
        assert!(reference_run(&config, &options, Some(empty.as_slice())).unwrap().is_none());
    }
}
