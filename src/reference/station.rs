//! Station metadata in FDSN text format.
//!
//! One station per line, `|` separated:
//! `Network|Station|Latitude|Longitude|Elevation|SiteName|StartTime|EndTime`.
//! Lines starting with `#` are comments (the header is one).

use crate::error::{Error, Result};
use crate::time::Timestamp;
use csv::StringRecord;
use serde::Serialize;
use std::io::{Read, Write};
use std::path::Path;

const HEADER: [&str; 8] = [
    "#Network",
    "Station",
    "Latitude",
    "Longitude",
    "Elevation",
    "SiteName",
    "StartTime",
    "EndTime",
];

/// One station of an inventory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    /// Network code.
    pub network: String,
    /// Station code.
    pub station: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Elevation in metres.
    pub elevation: Option<f64>,
    /// Free-text site description.
    pub site_name: String,
    /// Operation start.
    pub start_time: Option<Timestamp>,
    /// Operation end; open stations have none.
    pub end_time: Option<Timestamp>,
}

impl Station {
    /// A station with only codes and coordinates.
    pub fn new(network: &str, station: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            latitude,
            longitude,
            elevation: None,
            site_name: String::new(),
            start_time: None,
            end_time: None,
        }
    }
}

/// Parse FDSN station text from any reader.
pub fn read_stations<R: Read>(input: R) -> std::result::Result<Vec<Station>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut stations = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| e.to_string())?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let station = parse_row(&record).map_err(|e| format!("row {}: {e}", i + 1))?;
        stations.push(station);
    }
    Ok(stations)
}

fn parse_row(record: &StringRecord) -> std::result::Result<Station, String> {
    if record.len() < 4 {
        return Err(format!("expected at least 4 fields, got {}", record.len()));
    }
    let field = |i: usize| record.get(i).unwrap_or_default();
    let number = |i: usize, name: &str| {
        field(i)
            .parse::<f64>()
            .map_err(|_| format!("invalid {name} '{}'", field(i)))
    };
    let optional_time = |i: usize| match field(i) {
        "" => Ok(None),
        text => Timestamp::parse(text).map(Some).map_err(|e| e.to_string()),
    };

    let latitude = number(2, "latitude")?;
    let longitude = number(3, "longitude")?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("coordinates out of range: {latitude}, {longitude}"));
    }

    Ok(Station {
        network: field(0).to_string(),
        station: field(1).to_string(),
        latitude,
        longitude,
        elevation: field(4).parse().ok(),
        site_name: field(5).to_string(),
        start_time: optional_time(6)?,
        end_time: optional_time(7)?,
    })
}

/// Read a station file.
pub fn read_station_file(path: &Path) -> Result<Vec<Station>> {
    let file = std::fs::File::open(path)?;
    read_stations(file).map_err(|message| Error::InvalidStationFile {
        path: path.to_path_buf(),
        message,
    })
}

/// Write stations as FDSN text to any writer.
pub fn write_stations<W: Write>(output: W, stations: &[Station]) -> csv::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'|')
        .from_writer(output);

    writer.write_record(HEADER)?;
    for s in stations {
        writer.write_record([
            s.network.clone(),
            s.station.clone(),
            s.latitude.to_string(),
            s.longitude.to_string(),
            s.elevation.map(|e| e.to_string()).unwrap_or_default(),
            s.site_name.clone(),
            s.start_time.map(|t| t.to_string()).unwrap_or_default(),
            s.end_time.map(|t| t.to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a station file, replacing any existing one.
pub fn write_station_file(path: &Path, stations: &[Station]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_stations(file, stations).map_err(|e| Error::CsvWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
#Network | Station | Latitude | Longitude | Elevation | SiteName | StartTime | EndTime
AU|ARMA|-30.4198|151.628|1020.0|Armidale, New South Wales|1999-01-01T00:00:00|
AU|MUN|-31.9787|116.208|388.0|Mundaring|1994-05-01T00:00:00|2020-01-01T00:00:00
";

    #[test]
    fn test_read_fdsn_text() {
        let stations = read_stations(SAMPLE.as_bytes()).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].station, "ARMA");
        assert_eq!(stations[0].latitude, -30.4198);
        assert_eq!(stations[0].site_name, "Armidale, New South Wales");
        assert_eq!(stations[0].end_time, None);
        assert_eq!(stations[1].elevation, Some(388.0));
        assert!(stations[1].end_time.is_some());
    }

    #[test]
    fn test_write_then_read() {
        let stations = read_stations(SAMPLE.as_bytes()).unwrap();
        let mut buf = Vec::new();
        write_stations(&mut buf, &stations).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("#Network|Station|"));
        assert_eq!(read_stations(buf.as_slice()).unwrap(), stations);
    }

    #[test]
    fn test_bad_latitude_is_reported() {
        let err = read_stations("XX|S1|north|1.0\n".as_bytes()).unwrap_err();
        assert!(err.contains("latitude"));
        let err = read_stations("XX|S1|95.0|1.0\n".as_bytes()).unwrap_err();
        assert!(err.contains("out of range"));
    }
}
