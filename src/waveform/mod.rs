//! Waveform data: in-memory series, file formats and assembly.

pub mod mseed;
mod series;
mod wav;

pub use series::{MergeError, Merged, SampleEncoding, TimeSeries, Trimmed, merge, rates_match};
pub use wav::write_wav_file;

use crate::config::WaveformFormat;
use crate::constants::output_extensions;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Loads the series stored in one waveform file.
pub trait WaveformReader: Send + Sync {
    /// Every series in the file, in file order.
    fn read(&self, path: &Path) -> Result<Vec<TimeSeries>>;
}

/// Persists one assembled series.
pub trait WaveformWriter: Send + Sync {
    /// File extension (without dot) of written files.
    fn extension(&self) -> &'static str;

    /// Write `series` to `path`, replacing any existing file.
    fn write(&self, path: &Path, series: &TimeSeries) -> Result<()>;
}

/// Reader for miniSEED files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct MseedReader;

impl WaveformReader for MseedReader {
    fn read(&self, path: &Path) -> Result<Vec<TimeSeries>> {
        let bytes = std::fs::read(path)?;
        mseed::decode(&bytes).map_err(|reason| Error::MseedDecode {
            path: path.to_path_buf(),
            reason,
        })
    }
}

impl WaveformWriter for WaveformFormat {
    fn extension(&self) -> &'static str {
        match self {
            Self::Mseed => output_extensions::MSEED,
            Self::Wav => output_extensions::WAV,
        }
    }

    fn write(&self, path: &Path, series: &TimeSeries) -> Result<()> {
        match self {
            Self::Mseed => write_mseed_file(path, series),
            Self::Wav => write_wav_file(path, series),
        }
    }
}

/// Write a series as miniSEED.
pub fn write_mseed_file(path: &Path, series: &TimeSeries) -> Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    mseed::encode(series, &mut out).map_err(|reason| Error::UnwritableSeries {
        path: path.to_path_buf(),
        reason,
    })?;
    std::io::Write::flush(&mut out)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::index::ChannelKey;
    use crate::time::Timestamp;
    use tempfile::TempDir;

    #[test]
    fn test_mseed_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("X5.S1..EHZ.mseed");
        let series = TimeSeries {
            key: ChannelKey::new("X5", "S1", "", "EHZ"),
            start: Timestamp::from_secs(1_563_082_764),
            sample_rate: 250.0,
            samples: (0..1000).map(f64::from).collect(),
            encoding: SampleEncoding::Steim2,
        };
        WaveformFormat::Mseed.write(&path, &series).unwrap();

        let read = MseedReader.read(&path).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].samples, series.samples);
        assert_eq!(read[0].encoding, SampleEncoding::Int32);
    }

    #[test]
    fn test_reader_reports_decode_errors_with_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.mseed");
        std::fs::write(&path, vec![b'z'; 600]).unwrap();
        let err = MseedReader.read(&path).unwrap_err();
        assert!(matches!(err, Error::MseedDecode { .. }));
        assert!(err.to_string().contains("bad.mseed"));
    }

    #[test]
    fn test_extensions() {
        assert_eq!(WaveformFormat::Mseed.extension(), "mseed");
        assert_eq!(WaveformFormat::Wav.extension(), "wav");
    }
}
