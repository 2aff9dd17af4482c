//! WAV export of assembled traces.

use super::series::TimeSeries;
use crate::error::{Error, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

/// Write a series as mono 32-bit float WAV.
///
/// WAV headers carry an integral sample rate, so series with a fractional
/// rate are rejected.
pub fn write_wav_file(path: &Path, series: &TimeSeries) -> Result<()> {
    let sample_rate = wav_rate(series.sample_rate).ok_or_else(|| Error::UnwritableSeries {
        path: path.to_path_buf(),
        reason: format!("sample rate {} Hz is not a whole number", series.sample_rate),
    })?;

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let wav_err = |e| Error::WavWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut writer = WavWriter::create(path, spec).map_err(wav_err)?;
    for &sample in &series.samples {
        #[allow(clippy::cast_possible_truncation)]
        writer.write_sample(sample as f32).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;

    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn wav_rate(rate: f64) -> Option<u32> {
    (rate.is_finite() && rate >= 1.0 && rate.fract() == 0.0 && rate <= f64::from(u32::MAX))
        .then_some(rate as u32)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::index::ChannelKey;
    use crate::time::Timestamp;
    use crate::waveform::SampleEncoding;
    use tempfile::TempDir;

    fn series(rate: f64) -> TimeSeries {
        TimeSeries {
            key: ChannelKey::new("X5", "S1", "", "EHZ"),
            start: Timestamp::from_secs(0),
            sample_rate: rate,
            samples: vec![0.0, 1.5, -2.0],
            encoding: SampleEncoding::Int32,
        }
    }

    #[test]
    fn test_writes_float_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.wav");
        write_wav_file(&path, &series(100.0)).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 100);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.0, 1.5, -2.0]);
    }

    #[test]
    fn test_rejects_fractional_rate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.wav");
        let result = write_wav_file(&path, &series(0.5));
        assert!(matches!(result, Err(Error::UnwritableSeries { .. })));
    }
}
