//! Extraction runs against small archives written with the crate's own
//! miniSEED writer.

#![allow(clippy::unwrap_used, clippy::float_cmp, clippy::cast_precision_loss)]

use quakecut::config::WaveformFormat;
use quakecut::error::{Failure, Result};
use quakecut::index::{
    ChannelKey, ComponentFilter, JsonIndex, SegmentRecord, SqliteIndex, StationFilter, open_index,
};
use quakecut::pipeline::{ExtractOptions, ExtractionPipeline, ExtractionRequest};
use quakecut::time::Timestamp;
use quakecut::waveform::{
    MseedReader, SampleEncoding, TimeSeries, WaveformReader, WaveformWriter, write_mseed_file,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Write a 1 Hz segment whose sample values are `start + i + 1`.
fn write_segment(dir: &Path, station: &str, component: &str, start: i64, len: usize) -> PathBuf {
    let path = dir.join(format!("{station}.{component}.{start}.mseed"));
    let series = TimeSeries {
        key: ChannelKey::new("XX", station, "", component),
        start: Timestamp::from_secs(start),
        sample_rate: 1.0,
        samples: (0..len).map(|i| (start + 1) as f64 + i as f64).collect(),
        encoding: SampleEncoding::Int32,
    };
    write_mseed_file(&path, &series).unwrap();
    path
}

fn record(path: &Path, station: &str, component: &str, start: i64, end: i64) -> SegmentRecord {
    SegmentRecord {
        station: station.to_string(),
        component: component.to_string(),
        location: String::new(),
        start_time: Timestamp::from_secs(start),
        end_time: Timestamp::from_secs(end),
        network_original: "XX".to_string(),
        network_relabel: "X5".to_string(),
        storage_path: path.to_path_buf(),
        content_id: format!("{station}-{component}-{start}"),
    }
}

/// The S1 archive: EHZ in two pieces with a 5 s hole, EHN in one piece.
fn archive(dir: &Path) -> Vec<SegmentRecord> {
    let s1 = write_segment(dir, "S1", "EHZ", 0, 100);
    let s2 = write_segment(dir, "S1", "EHZ", 105, 95);
    let n = write_segment(dir, "S1", "EHN", 0, 200);
    vec![
        record(&s1, "S1", "EHZ", 0, 100),
        record(&s2, "S1", "EHZ", 105, 200),
        record(&n, "S1", "EHN", 0, 200),
    ]
}

fn options(output_dir: &Path) -> ExtractOptions {
    ExtractOptions {
        match_lead_secs: 0.0,
        match_lag_secs: 200.0,
        match_tolerance_secs: None,
        trim_lead_secs: 0.0,
        trim_lag_secs: 200.0,
        fill_value: -1.0,
        workers: 2,
        unit_timeout: Duration::from_secs(30),
        format: WaveformFormat::Mseed,
        output_dir: output_dir.to_path_buf(),
    }
}

fn request(stations: &[&str], components: &[&str]) -> ExtractionRequest {
    ExtractionRequest {
        event_id: "ev1".to_string(),
        reference: Timestamp::from_secs(0),
        stations: StationFilter::only(stations.iter().copied()),
        components: ComponentFilter::from_selectors(components),
    }
}

#[tokio::test]
async fn test_gap_is_padded_with_fill_value() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let index = JsonIndex::from_records(archive(data.path())).unwrap();
    let pipeline = ExtractionPipeline::new(options(out.path()));

    let report = pipeline
        .extract(&index, &request(&["S1"], &["EHZ"]), &CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(report.matched_segments, 2);
    assert_eq!(report.written(), 1);
    let key = ChannelKey::new("X5", "S1", "", "EHZ");
    let trace = report.channels[&key].result.as_ref().unwrap();
    assert_eq!(trace.path, out.path().join("ev1").join("X5.S1..EHZ.mseed"));
    assert_eq!(trace.filled, 5);
    assert_eq!(trace.merged, 2);

    let written = MseedReader.read(&trace.path).unwrap();
    assert_eq!(written.len(), 1);
    let samples = &written[0].samples;
    assert_eq!(written[0].key, key);
    assert_eq!(written[0].start, Timestamp::from_secs(0));
    assert_eq!(samples.len(), 200);
    assert_eq!(samples[0], 1.0);
    assert_eq!(samples[99], 100.0);
    assert_eq!(samples[100..105], [-1.0; 5]);
    assert_eq!(samples[105], 106.0);
    assert_eq!(samples[199], 200.0);
}

#[tokio::test]
async fn test_wildcard_components_write_every_channel() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let index = JsonIndex::from_records(archive(data.path())).unwrap();
    let pipeline = ExtractionPipeline::new(options(out.path()));

    let report = pipeline
        .extract(&index, &request(&["S1"], &["EH?"]), &CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(report.written(), 2);
    assert!(out.path().join("ev1/X5.S1..EHN.mseed").exists());
    assert!(out.path().join("ev1/X5.S1..EHZ.mseed").exists());
}

#[tokio::test]
async fn test_station_without_segments_is_no_data() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let index = JsonIndex::from_records(archive(data.path())).unwrap();
    let pipeline = ExtractionPipeline::new(options(out.path()));

    let report = pipeline
        .extract(
            &index,
            &request(&["S1", "S2"], &["EHZ"]),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.written(), 1);
    assert_eq!(report.failed(), 1);
    let (key, outcome) = report
        .channels
        .iter()
        .find(|(key, _)| key.station == "S2")
        .unwrap();
    assert_eq!(key.component, "EHZ");
    assert_eq!(outcome.result.as_ref().unwrap_err().kind(), "no_data");
    let files = std::fs::read_dir(out.path().join("ev1")).unwrap().count();
    assert_eq!(files, 1);
}

#[tokio::test]
async fn test_event_outside_archive_writes_nothing() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let index = JsonIndex::from_records(archive(data.path())).unwrap();
    let pipeline = ExtractionPipeline::new(options(out.path()));

    let mut request = request(&["S1"], &["EHZ", "EHN"]);
    request.reference = Timestamp::from_secs(1_000_000);
    let report = pipeline
        .extract(&index, &request, &CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(report.matched_segments, 0);
    assert_eq!(report.written(), 0);
    assert_eq!(report.failed(), 2);
    assert!(
        report
            .channels
            .values()
            .all(|c| matches!(c.result, Err(Failure::NoData { .. })))
    );
    assert_eq!(std::fs::read_dir(out.path().join("ev1")).unwrap().count(), 0);
}

#[tokio::test]
async fn test_repeated_runs_are_byte_identical() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let index = JsonIndex::from_records(archive(data.path())).unwrap();
    let pipeline = ExtractionPipeline::new(options(out.path()));
    let request = request(&["S1"], &["EHZ", "EHN"]);
    let path = out.path().join("ev1/X5.S1..EHZ.mseed");

    pipeline
        .extract(&index, &request, &CancellationToken::new(), None)
        .await
        .unwrap();
    let first = std::fs::read(&path).unwrap();
    std::fs::write(out.path().join("ev1/stale.mseed"), b"left over").unwrap();

    pipeline
        .extract(&index, &request, &CancellationToken::new(), None)
        .await
        .unwrap();
    let second = std::fs::read(&path).unwrap();

    assert_eq!(first, second);
    assert!(!out.path().join("ev1/stale.mseed").exists());
}

#[tokio::test]
async fn test_sqlite_and_json_backends_agree() {
    let data = TempDir::new().unwrap();
    let records = archive(data.path());
    let db_path = data.path().join("archive.db");
    SqliteIndex::create(&db_path)
        .unwrap()
        .insert(&records)
        .unwrap();

    let json_out = TempDir::new().unwrap();
    let json_index = JsonIndex::from_records(records).unwrap();
    let json_report = ExtractionPipeline::new(options(json_out.path()))
        .extract(&json_index, &request(&["S1"], &["EH?"]), &CancellationToken::new(), None)
        .await
        .unwrap();

    let db_out = TempDir::new().unwrap();
    let db_index = open_index(&db_path).unwrap();
    let db_report = ExtractionPipeline::new(options(db_out.path()))
        .extract(
            db_index.as_ref(),
            &request(&["S1"], &["EH?"]),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(json_report.matched_segments, db_report.matched_segments);
    for name in ["X5.S1..EHZ.mseed", "X5.S1..EHN.mseed"] {
        let a = std::fs::read(json_out.path().join("ev1").join(name)).unwrap();
        let b = std::fs::read(db_out.path().join("ev1").join(name)).unwrap();
        assert_eq!(a, b, "{name} differs between backends");
    }
}

#[tokio::test]
async fn test_unreadable_segment_is_reported_and_skipped() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let good = write_segment(data.path(), "S1", "EHZ", 0, 200);
    let bad = data.path().join("broken.mseed");
    std::fs::write(&bad, b"not a miniseed record").unwrap();
    let index = JsonIndex::from_records(vec![
        record(&good, "S1", "EHZ", 0, 200),
        record(&bad, "S1", "EHZ", 50, 150),
    ])
    .unwrap();

    let report = ExtractionPipeline::new(options(out.path()))
        .extract(&index, &request(&["S1"], &["EHZ"]), &CancellationToken::new(), None)
        .await
        .unwrap();

    let outcome = &report.channels[&ChannelKey::new("X5", "S1", "", "EHZ")];
    assert_eq!(outcome.result.as_ref().unwrap().filled, 0);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].storage_path, bad);
    assert_eq!(outcome.skipped[0].content_id, "S1-EHZ-50");
}

#[tokio::test]
async fn test_cancelled_run_writes_nothing() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let index = JsonIndex::from_records(archive(data.path())).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = ExtractionPipeline::new(options(out.path()))
        .extract(&index, &request(&["S1"], &["EH?"]), &cancel, None)
        .await
        .unwrap();

    assert_eq!(report.written(), 0);
    assert_eq!(report.cancelled(), 2);
    assert_eq!(std::fs::read_dir(out.path().join("ev1")).unwrap().count(), 0);
}

/// Reader that takes longer than any sensible unit budget.
struct SlowReader;

impl WaveformReader for SlowReader {
    fn read(&self, path: &Path) -> Result<Vec<TimeSeries>> {
        std::thread::sleep(Duration::from_millis(300));
        MseedReader.read(path)
    }
}

#[tokio::test]
async fn test_slow_unit_times_out_without_blocking_others() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let index = JsonIndex::from_records(archive(data.path())).unwrap();
    let mut options = options(out.path());
    options.unit_timeout = Duration::from_millis(50);

    let report = ExtractionPipeline::new(options)
        .with_reader(Arc::new(SlowReader))
        .extract(&index, &request(&["S1"], &["EH?"]), &CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(report.channels.len(), 2);
    assert!(
        report
            .channels
            .values()
            .all(|c| matches!(c.result, Err(Failure::Timeout { .. })))
    );
}

/// Writer that stalls after the file is on disk.
struct StallingWriter;

impl WaveformWriter for StallingWriter {
    fn extension(&self) -> &'static str {
        WaveformFormat::Mseed.extension()
    }

    fn write(&self, path: &Path, series: &TimeSeries) -> Result<()> {
        WaveformFormat::Mseed.write(path, series)?;
        std::thread::sleep(Duration::from_millis(300));
        Ok(())
    }
}

#[tokio::test]
async fn test_timed_out_unit_leaves_no_file() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let index = JsonIndex::from_records(archive(data.path())).unwrap();
    let mut options = options(out.path());
    options.unit_timeout = Duration::from_millis(100);

    let report = ExtractionPipeline::new(options)
        .with_writer(Arc::new(StallingWriter))
        .extract(&index, &request(&["S1"], &["EHZ"]), &CancellationToken::new(), None)
        .await
        .unwrap();

    let outcome = &report.channels[&ChannelKey::new("X5", "S1", "", "EHZ")];
    assert!(matches!(outcome.result, Err(Failure::Timeout { .. })));

    // Give the detached worker time to finish its write.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!out.path().join("ev1/X5.S1..EHZ.mseed").exists());
}

#[tokio::test]
async fn test_similar_event_ids_get_separate_directories() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let index = JsonIndex::from_records(archive(data.path())).unwrap();
    let pipeline = ExtractionPipeline::new(options(out.path()));

    let mut first = request(&["S1"], &["EHZ"]);
    first.event_id = "ev/1".to_string();
    let mut second = request(&["S1"], &["EHZ"]);
    second.event_id = "ev_1".to_string();

    let first = pipeline
        .extract(&index, &first, &CancellationToken::new(), None)
        .await
        .unwrap();
    let second = pipeline
        .extract(&index, &second, &CancellationToken::new(), None)
        .await
        .unwrap();

    assert_ne!(first.event_dir, second.event_dir);
    for report in [&first, &second] {
        let trace = report.channels[&ChannelKey::new("X5", "S1", "", "EHZ")]
            .result
            .as_ref()
            .unwrap();
        assert!(trace.path.exists(), "{} was removed", trace.path.display());
    }
}

#[tokio::test]
async fn test_wav_output() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let index = JsonIndex::from_records(archive(data.path())).unwrap();
    let mut options = options(out.path());
    options.format = WaveformFormat::Wav;

    let report = ExtractionPipeline::new(options)
        .extract(&index, &request(&["S1"], &["EHZ"]), &CancellationToken::new(), None)
        .await
        .unwrap();

    let path = out.path().join("ev1/X5.S1..EHZ.wav");
    assert_eq!(report.written(), 1);
    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().sample_rate, 1);
    assert_eq!(reader.len(), 200);
}
