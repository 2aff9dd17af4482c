//! End-to-end tests of the `quakecut` binary.

#![allow(clippy::unwrap_used, clippy::cast_precision_loss)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use quakecut::index::{ChannelKey, SegmentRecord};
use quakecut::time::Timestamp;
use quakecut::waveform::{SampleEncoding, TimeSeries, write_mseed_file};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CONFIG: &str = r#"
[matching]
lead_secs = 0.0
lag_secs = 200.0

[trim]
lead_secs = 0.0
lag_secs = 200.0
fill_value = 0.0

[extraction]
workers = 2
components = ["EHZ"]
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// Archive with a gap in S1 EHZ, a JSON index, a catalogue and a config.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        let records: Vec<SegmentRecord> = [(0, 100), (105, 200)]
            .into_iter()
            .map(|(start, end)| {
                let path = root.join(format!("S1.EHZ.{start}.mseed"));
                let len = usize::try_from(end - start).unwrap();
                let series = TimeSeries {
                    key: ChannelKey::new("XX", "S1", "", "EHZ"),
                    start: Timestamp::from_secs(start),
                    sample_rate: 1.0,
                    samples: (0..len).map(|i| i as f64 + 1.0).collect(),
                    encoding: SampleEncoding::Int32,
                };
                write_mseed_file(&path, &series).unwrap();
                SegmentRecord {
                    station: "S1".to_string(),
                    component: "EHZ".to_string(),
                    location: String::new(),
                    start_time: Timestamp::from_secs(start),
                    end_time: Timestamp::from_secs(end),
                    network_original: "XX".to_string(),
                    network_relabel: "X5".to_string(),
                    storage_path: path,
                    content_id: format!("S1-{start}"),
                }
            })
            .collect();

        std::fs::write(
            root.join("index.json"),
            serde_json::to_string(&records).unwrap(),
        )
        .unwrap();
        std::fs::write(
            root.join("events.csv"),
            "event_id,time,magnitude\nev1,1970-01-01T00:00:00Z,3.1\nev2,1970-01-01T01:00:00Z,\n",
        )
        .unwrap();
        std::fs::write(root.join("config.toml"), CONFIG).unwrap();

        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn command(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("quakecut");
        cmd.env_remove("QUAKECUT_CONFIG")
            .env_remove("QUAKECUT_INDEX")
            .arg("--config")
            .arg(self.path("config.toml"));
        cmd
    }
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn test_config_path_honours_flag() {
    let fixture = Fixture::new();
    fixture
        .command()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_and_show() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("nested/config.toml");

    cargo_bin_cmd!("quakecut")
        .env_remove("QUAKECUT_CONFIG")
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(config.exists());

    let output = cargo_bin_cmd!("quakecut")
        .env_remove("QUAKECUT_CONFIG")
        .arg("--config")
        .arg(&config)
        .args(["config", "show", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let lines = json_lines(&output.stdout);
    assert_eq!(lines[0]["event"], "result");
    assert_eq!(lines[0]["payload"]["result_type"], "config");
    assert_eq!(lines[0]["payload"]["config"]["extraction"]["workers"], 4);
}

#[test]
fn test_extract_json_report() {
    let fixture = Fixture::new();
    let out = fixture.path("out");

    let output = fixture
        .command()
        .arg("extract")
        .arg("--index")
        .arg(fixture.path("index.json"))
        .arg("--catalog")
        .arg(fixture.path("events.csv"))
        .args(["--event", "ev1", "--station", "S1", "--json"])
        .arg("--output")
        .arg(&out)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let lines = json_lines(&output.stdout);
    assert_eq!(lines.len(), 1);
    let payload = &lines[0]["payload"];
    assert_eq!(payload["result_type"], "extraction");
    let event = &payload["events"][0];
    assert_eq!(event["event_id"], "ev1");
    assert_eq!(event["written"], 1);
    let channel = &event["channels"][0];
    assert_eq!(channel["channel"], "X5.S1..EHZ");
    assert_eq!(channel["status"], "written");
    assert_eq!(channel["samples"], 200);
    assert_eq!(channel["filled"], 5);

    assert!(out.join("ev1/X5.S1..EHZ.mseed").exists());
    assert!(!out.join("ev2").exists());
}

#[test]
fn test_extract_single_event_with_missing_station() {
    let fixture = Fixture::new();
    let out = fixture.path("out");

    fixture
        .command()
        .arg("extract")
        .arg("--index")
        .arg(fixture.path("index.json"))
        .args(["--event-id", "manual", "--time", "0"])
        .args(["--station", "S1", "--station", "S9", "--no-progress"])
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("manual: 1 written, 1 failed, 0 cancelled"))
        .stdout(predicate::str::contains("S9"));

    assert!(out.join("manual/X5.S1..EHZ.mseed").exists());
}

#[test]
fn test_extract_missing_index_fails() {
    let fixture = Fixture::new();
    fixture
        .command()
        .arg("extract")
        .arg("--index")
        .arg(fixture.path("missing.db"))
        .args(["--event-id", "ev", "--time", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("index file does not exist"));
}

#[test]
fn test_extract_unknown_event_fails() {
    let fixture = Fixture::new();
    fixture
        .command()
        .arg("extract")
        .arg("--index")
        .arg(fixture.path("index.json"))
        .arg("--catalog")
        .arg(fixture.path("events.csv"))
        .args(["--event", "nope", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"event_not_found\""));
}

#[test]
fn test_index_import_then_stats() {
    let fixture = Fixture::new();
    let db = fixture.path("archive.db");

    fixture
        .command()
        .args(["index", "import"])
        .arg(fixture.path("index.json"))
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 segment(s)"));

    let output = fixture
        .command()
        .args(["index", "stats", "--json"])
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());
    let lines = json_lines(&output.stdout);
    let payload = &lines[0]["payload"];
    assert_eq!(payload["result_type"], "index_stats");
    assert_eq!(payload["segments"], 2);
    assert_eq!(payload["station_count"], 1);
    assert_eq!(payload["components"][0], "EHZ");
}

#[test]
fn test_gaps_csv_on_stdout() {
    let fixture = Fixture::new();
    fixture
        .command()
        .arg("gaps")
        .arg("--index")
        .arg(fixture.path("index.json"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "network,station,location,component,kind,start,end,duration_secs",
        ))
        .stdout(predicate::str::contains("X5,S1,,EHZ,gap,"))
        .stdout(predicate::str::contains(",5.0").or(predicate::str::contains(",5\n")));
}

#[test]
fn test_gaps_report_file() {
    let fixture = Fixture::new();
    let report = fixture.path("gaps.csv");
    fixture
        .command()
        .arg("gaps")
        .arg("--index")
        .arg(fixture.path("index.json"))
        .args(["--tolerance", "10"])
        .arg("--output")
        .arg(&report)
        .assert()
        .success();

    let text = std::fs::read_to_string(Path::new(&report)).unwrap();
    assert!(!text.contains(",gap,"));
    assert!(text.contains(",recording,"));
}
