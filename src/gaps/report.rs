//! CSV gap report writer.

use super::{ChannelReport, TimeSpan};
use crate::error::{Error, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    network: &'a str,
    station: &'a str,
    location: &'a str,
    component: &'a str,
    kind: &'static str,
    start: String,
    end: String,
    duration_secs: f64,
}

/// Write one row per gap, overlap and recording interval.
pub fn write_gap_report<W: Write>(writer: W, reports: &[ChannelReport]) -> csv::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for report in reports {
        let rows = [
            ("gap", &report.gaps),
            ("overlap", &report.overlaps),
            ("recording", &report.intervals),
        ];
        for (kind, spans) in rows {
            for span in spans {
                csv.serialize(row(report, kind, span))?;
            }
        }
    }
    csv.flush()?;
    Ok(())
}

/// Write the report to a file.
pub fn write_gap_report_file(path: &Path, reports: &[ChannelReport]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_gap_report(std::io::BufWriter::new(file), reports).map_err(|e| Error::CsvWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

fn row<'a>(report: &'a ChannelReport, kind: &'static str, span: &TimeSpan) -> ReportRow<'a> {
    ReportRow {
        network: &report.key.network,
        station: &report.key.station,
        location: &report.key.location,
        component: &report.key.component,
        kind,
        start: span.start.to_string(),
        end: span.end.to_string(),
        duration_secs: span.duration_secs(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::index::ChannelKey;
    use crate::time::Timestamp;

    #[test]
    fn test_report_rows() {
        let span = |a, b| TimeSpan::new(Timestamp::from_secs(a), Timestamp::from_secs(b));
        let report = ChannelReport {
            key: ChannelKey::new("X5", "S1", "", "EHZ"),
            gaps: vec![span(100, 105)],
            overlaps: vec![],
            intervals: vec![span(0, 100), span(105, 200)],
        };

        let mut buf = Vec::new();
        write_gap_report(&mut buf, &[report]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "network,station,location,component,kind,start,end,duration_secs"
        );
        assert_eq!(
            lines[1],
            "X5,S1,,EHZ,gap,1970-01-01T00:01:40Z,1970-01-01T00:01:45Z,5.0"
        );
        assert_eq!(lines.len(), 4);
        assert!(lines[3].contains(",recording,"));
    }
}
