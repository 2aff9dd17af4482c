//! miniSEED 2 reading and writing.
//!
//! The reader understands fixed-header data records with blockette 1000 in
//! either byte order, with INT16, INT32, FLOAT32, FLOAT64, Steim-1 and
//! Steim-2 payloads. The writer emits 512-byte big-endian records with
//! uncompressed INT32, FLOAT32 or FLOAT64 payloads.

use super::series::{SampleEncoding, TimeSeries, rates_match};
use crate::constants::mseed::{
    BLOCKETTE_1000, FIXED_HEADER_LEN, STEIM_FRAME_LEN, WRITE_DATA_OFFSET, WRITE_RECORD_EXP,
    WRITE_RECORD_LEN,
};
use crate::index::ChannelKey;
use crate::time::Timestamp;
use chrono::{Datelike, NaiveDate, Timelike};
use std::io::Write;
use tracing::{debug, trace};

/// Header fields of one data record.
#[derive(Debug, Clone, PartialEq)]
struct RecordHeader {
    key: ChannelKey,
    start: Timestamp,
    sample_count: usize,
    sample_rate: f64,
    encoding: u8,
    big_endian_data: bool,
    data_offset: usize,
    record_len: usize,
}

/// Decode every data record in `bytes` into continuous series.
///
/// Consecutive records of one channel are joined when the next record starts
/// within half a sample of where the previous one ended. Records without
/// samples (log records, zero rate) are skipped.
pub fn decode(bytes: &[u8]) -> Result<Vec<TimeSeries>, String> {
    let mut series: Vec<TimeSeries> = Vec::new();
    let mut offset = 0;

    while offset + FIXED_HEADER_LEN <= bytes.len() {
        let header = parse_header(&bytes[offset..]).map_err(|e| format!("record at byte {offset}: {e}"))?;
        let record = &bytes[offset..offset + header.record_len];
        offset += header.record_len;

        if header.sample_count == 0 || header.sample_rate <= 0.0 {
            trace!("Skipping record without samples for {}", header.key);
            continue;
        }

        let (samples, encoding) = decode_payload(&header, &record[header.data_offset..])
            .map_err(|e| format!("{} record at {}: {e}", header.key, header.start))?;

        let appended = series.last_mut().is_some_and(|last| {
            let continues = last.key == header.key
                && rates_match(last.sample_rate, header.sample_rate)
                && (header.start - last.end()).unsigned_abs() as f64 <= last.interval_micros() / 2.0;
            if continues {
                last.samples.extend_from_slice(&samples);
                last.encoding = last.encoding.widen(encoding);
            }
            continues
        });

        if !appended {
            series.push(TimeSeries {
                key: header.key,
                start: header.start,
                sample_rate: header.sample_rate,
                samples,
                encoding,
            });
        }
    }

    if offset < bytes.len() {
        debug!("Ignoring {} trailing bytes", bytes.len() - offset);
    }
    Ok(series)
}

fn parse_header(rec: &[u8]) -> Result<RecordHeader, String> {
    if !rec[..6].iter().all(|b| b.is_ascii_digit() || *b == b' ') {
        return Err("sequence number is not numeric".to_string());
    }
    if !matches!(rec[6], b'D' | b'R' | b'Q' | b'M') {
        return Err(format!("unsupported record type '{}'", rec[6] as char));
    }

    // Header byte order is whichever makes the start year plausible.
    let big = (1900..=2100).contains(&u16::from_be_bytes([rec[20], rec[21]]));
    let u16_at = |at: usize| {
        let b = [rec[at], rec[at + 1]];
        if big { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) }
    };
    let i16_at = |at: usize| u16_at(at).cast_signed();
    let i32_at = |at: usize| {
        let b = [rec[at], rec[at + 1], rec[at + 2], rec[at + 3]];
        if big { i32::from_be_bytes(b) } else { i32::from_le_bytes(b) }
    };

    let key = ChannelKey::new(
        ascii_field(&rec[18..20]).as_str(),
        ascii_field(&rec[8..13]).as_str(),
        ascii_field(&rec[13..15]).as_str(),
        ascii_field(&rec[15..18]).as_str(),
    );

    let mut start = btime(
        u16_at(20),
        u16_at(22),
        rec[24],
        rec[25],
        rec[26],
        u16_at(28),
    )?;

    let sample_count = usize::from(u16_at(30));
    let sample_rate = sample_rate_from(i16_at(32), i16_at(34));
    let activity_flags = rec[36];
    let blockette_count = rec[39];
    let time_correction = i32_at(40);
    let data_offset = usize::from(u16_at(44));
    let mut blockette = usize::from(u16_at(46));

    // Correction is in 0.0001 s units; bit 1 marks it as already applied.
    if activity_flags & 0x02 == 0 && time_correction != 0 {
        start = start + i64::from(time_correction) * 100;
    }

    let mut b1000 = None;
    for _ in 0..blockette_count.max(1) {
        if blockette == 0 || blockette + 8 > rec.len() {
            break;
        }
        if u16_at(blockette) == BLOCKETTE_1000 {
            b1000 = Some((rec[blockette + 4], rec[blockette + 5], rec[blockette + 6]));
            break;
        }
        let next = usize::from(u16_at(blockette + 2));
        if next <= blockette {
            break;
        }
        blockette = next;
    }

    let (encoding, word_order, exponent) = b1000.ok_or("missing blockette 1000")?;
    if !(7..=20).contains(&exponent) {
        return Err(format!("unsupported record length exponent {exponent}"));
    }
    let record_len = 1usize << exponent;
    if record_len > rec.len() {
        return Err(format!(
            "record length {record_len} exceeds remaining {} bytes",
            rec.len()
        ));
    }
    if data_offset > record_len || (sample_count > 0 && data_offset < FIXED_HEADER_LEN) {
        return Err(format!("data offset {data_offset} out of range"));
    }

    Ok(RecordHeader {
        key,
        start,
        sample_count,
        sample_rate,
        encoding,
        big_endian_data: word_order == 1,
        data_offset,
        record_len,
    })
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

fn btime(year: u16, day: u16, hour: u8, minute: u8, second: u8, fract: u16) -> Result<Timestamp, String> {
    let date = NaiveDate::from_yo_opt(i32::from(year), u32::from(day))
        .ok_or_else(|| format!("invalid start date {year}-{day:03}"))?;
    // Leap seconds are folded into the following second.
    let leap = u32::from(second == 60);
    let time = date
        .and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second) - leap)
        .ok_or_else(|| format!("invalid start time {hour:02}:{minute:02}:{second:02}"))?;
    Ok(Timestamp::from_datetime(time.and_utc())
        + i64::from(leap) * crate::constants::MICROS_PER_SEC
        + i64::from(fract) * 100)
}

/// Nominal sample rate from the header factor and multiplier.
pub fn sample_rate_from(factor: i16, multiplier: i16) -> f64 {
    let f = f64::from(factor);
    let m = f64::from(multiplier);
    match (factor.signum(), multiplier.signum()) {
        (0, _) | (_, 0) => 0.0,
        (1, 1) => f * m,
        (1, _) => -f / m,
        (_, 1) => -m / f,
        _ => 1.0 / (f * m),
    }
}

/// Factor and multiplier representing `rate`, if one exists.
#[allow(clippy::cast_possible_truncation)]
pub fn sample_rate_to(rate: f64) -> Option<(i16, i16)> {
    let max = f64::from(i16::MAX);
    if !(rate.is_finite() && rate > 0.0) {
        return None;
    }
    if rate.fract() == 0.0 && rate <= max {
        return Some((rate as i16, 1));
    }
    let period = 1.0 / rate;
    if (period - period.round()).abs() < 1e-9 && period.round() <= max {
        return Some((-(period.round() as i16), 1));
    }
    [10_000_i16, 1_000, 100, 10].into_iter().find_map(|mult| {
        let factor = (rate * f64::from(mult)).round();
        (factor >= 1.0 && factor <= max).then_some((factor as i16, -mult))
    })
}

fn decode_payload(header: &RecordHeader, data: &[u8]) -> Result<(Vec<f64>, SampleEncoding), String> {
    let n = header.sample_count;
    let big = header.big_endian_data;
    let need = |width: usize| {
        if data.len() < n * width {
            Err(format!("payload holds {} bytes, need {}", data.len(), n * width))
        } else {
            Ok(())
        }
    };

    match header.encoding {
        1 => {
            need(2)?;
            let values = data.chunks_exact(2).take(n).map(|c| {
                let b = [c[0], c[1]];
                f64::from(if big { i16::from_be_bytes(b) } else { i16::from_le_bytes(b) })
            });
            Ok((values.collect(), SampleEncoding::Int16))
        }
        3 => {
            need(4)?;
            let values = data.chunks_exact(4).take(n).map(|c| f64::from(read_i32(c, big)));
            Ok((values.collect(), SampleEncoding::Int32))
        }
        4 => {
            need(4)?;
            let values = data.chunks_exact(4).take(n).map(|c| {
                let b = [c[0], c[1], c[2], c[3]];
                f64::from(if big { f32::from_be_bytes(b) } else { f32::from_le_bytes(b) })
            });
            Ok((values.collect(), SampleEncoding::Float32))
        }
        5 => {
            need(8)?;
            let values = data.chunks_exact(8).take(n).map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                if big { f64::from_be_bytes(b) } else { f64::from_le_bytes(b) }
            });
            Ok((values.collect(), SampleEncoding::Float64))
        }
        10 => decode_steim(data, n, big, false)
            .map(|v| (v.into_iter().map(f64::from).collect(), SampleEncoding::Steim1)),
        11 => decode_steim(data, n, big, true)
            .map(|v| (v.into_iter().map(f64::from).collect(), SampleEncoding::Steim2)),
        other => Err(format!("unsupported data encoding {other}")),
    }
}

fn read_i32(c: &[u8], big: bool) -> i32 {
    let b = [c[0], c[1], c[2], c[3]];
    if big { i32::from_be_bytes(b) } else { i32::from_le_bytes(b) }
}

const fn sign_extend(value: u32, bits: u32) -> i32 {
    ((value << (32 - bits)).cast_signed()) >> (32 - bits)
}

/// Decode a Steim-1 or Steim-2 compressed payload.
#[allow(clippy::cast_possible_truncation)]
fn decode_steim(data: &[u8], count: usize, big: bool, steim2: bool) -> Result<Vec<i32>, String> {
    let mut diffs: Vec<i32> = Vec::with_capacity(count + 8);
    let mut first = None;
    let mut last = 0;

    for (frame_index, frame) in data.chunks_exact(STEIM_FRAME_LEN).enumerate() {
        let words: Vec<u32> = frame
            .chunks_exact(4)
            .map(|c| read_i32(c, big).cast_unsigned())
            .collect();
        let control = words[0];

        for (w, &word) in words.iter().enumerate().skip(1) {
            if frame_index == 0 && w <= 2 {
                if w == 1 {
                    first = Some(word.cast_signed());
                } else {
                    last = word.cast_signed();
                }
                continue;
            }

            let nibble = (control >> (30 - 2 * w)) & 0b11;
            match (nibble, steim2) {
                (0, _) => {}
                (1, _) => diffs.extend(word.to_be_bytes().map(|b| i32::from(b.cast_signed()))),
                (2, false) => {
                    diffs.push(i32::from(((word >> 16) as u16).cast_signed()));
                    diffs.push(i32::from((word as u16).cast_signed()));
                }
                (3, false) => diffs.push(word.cast_signed()),
                (2, true) => match word >> 30 {
                    1 => diffs.push(sign_extend(word & 0x3FFF_FFFF, 30)),
                    2 => diffs.extend([15, 0].map(|s| sign_extend((word >> s) & 0x7FFF, 15))),
                    3 => diffs.extend([20, 10, 0].map(|s| sign_extend((word >> s) & 0x3FF, 10))),
                    d => return Err(format!("invalid Steim-2 sub-code {d}")),
                },
                (3, true) => match word >> 30 {
                    0 => diffs.extend([24, 18, 12, 6, 0].map(|s| sign_extend((word >> s) & 0x3F, 6))),
                    1 => diffs.extend([25, 20, 15, 10, 5, 0].map(|s| sign_extend((word >> s) & 0x1F, 5))),
                    2 => diffs.extend([24, 20, 16, 12, 8, 4, 0].map(|s| sign_extend((word >> s) & 0xF, 4))),
                    d => return Err(format!("invalid Steim-2 sub-code {d}")),
                },
                _ => unreachable!("nibble is two bits"),
            }
        }
    }

    if count == 0 {
        return Ok(Vec::new());
    }
    let first = first.ok_or("Steim payload has no frames")?;
    if diffs.len() < count {
        return Err(format!(
            "Steim payload holds {} differences, need {count}",
            diffs.len()
        ));
    }

    let mut samples = Vec::with_capacity(count);
    samples.push(first);
    for diff in &diffs[1..count] {
        let prev = samples[samples.len() - 1];
        samples.push(prev.wrapping_add(*diff));
    }
    if samples[count - 1] != last {
        debug!(
            "Steim reverse integration constant {last} differs from last sample {}",
            samples[count - 1]
        );
    }
    Ok(samples)
}

/// Payload encoding chosen for writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteEncoding {
    Int32,
    Float32,
    Float64,
}

impl WriteEncoding {
    fn for_series(series: &TimeSeries) -> Self {
        let integral = series.samples.iter().all(|v| {
            v.is_finite() && v.fract() == 0.0 && *v >= f64::from(i32::MIN) && *v <= f64::from(i32::MAX)
        });
        match series.encoding {
            e if e.is_integer() && integral => Self::Int32,
            SampleEncoding::Float32 => Self::Float32,
            _ => Self::Float64,
        }
    }

    const fn code(self) -> u8 {
        match self {
            Self::Int32 => 3,
            Self::Float32 => 4,
            Self::Float64 => 5,
        }
    }

    const fn width(self) -> usize {
        match self {
            Self::Int32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

/// Write `series` as a sequence of 512-byte big-endian records.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn encode<W: Write>(series: &TimeSeries, out: &mut W) -> Result<usize, String> {
    let (factor, multiplier) = sample_rate_to(series.sample_rate)
        .ok_or_else(|| format!("sample rate {} cannot be expressed in miniSEED", series.sample_rate))?;
    let encoding = WriteEncoding::for_series(series);
    let per_record = (WRITE_RECORD_LEN - WRITE_DATA_OFFSET) / encoding.width();

    let mut records = 0;
    for (i, chunk) in series.samples.chunks(per_record).enumerate() {
        let start = series.time_of(i * per_record);
        let mut rec = vec![0u8; WRITE_RECORD_LEN];

        rec[..6].copy_from_slice(format!("{:06}", (i + 1) % 1_000_000).as_bytes());
        rec[6] = b'D';
        rec[7] = b' ';
        put_field(&mut rec[8..13], &series.key.station);
        put_field(&mut rec[13..15], &series.key.location);
        put_field(&mut rec[15..18], &series.key.component);
        put_field(&mut rec[18..20], &series.key.network);
        put_btime(&mut rec[20..30], start)?;
        rec[30..32].copy_from_slice(&(chunk.len() as u16).to_be_bytes());
        rec[32..34].copy_from_slice(&factor.to_be_bytes());
        rec[34..36].copy_from_slice(&multiplier.to_be_bytes());
        rec[39] = 1;
        rec[44..46].copy_from_slice(&(WRITE_DATA_OFFSET as u16).to_be_bytes());
        rec[46..48].copy_from_slice(&(FIXED_HEADER_LEN as u16).to_be_bytes());

        rec[48..50].copy_from_slice(&BLOCKETTE_1000.to_be_bytes());
        rec[52] = encoding.code();
        rec[53] = 1;
        rec[54] = WRITE_RECORD_EXP;

        let mut at = WRITE_DATA_OFFSET;
        for value in chunk {
            match encoding {
                WriteEncoding::Int32 => rec[at..at + 4].copy_from_slice(&(*value as i32).to_be_bytes()),
                WriteEncoding::Float32 => rec[at..at + 4].copy_from_slice(&(*value as f32).to_be_bytes()),
                WriteEncoding::Float64 => rec[at..at + 8].copy_from_slice(&value.to_be_bytes()),
            }
            at += encoding.width();
        }

        out.write_all(&rec).map_err(|e| e.to_string())?;
        records += 1;
    }
    Ok(records)
}

fn put_field(dest: &mut [u8], value: &str) {
    dest.fill(b' ');
    for (d, s) in dest.iter_mut().zip(value.bytes()) {
        *d = s;
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn put_btime(dest: &mut [u8], ts: Timestamp) -> Result<(), String> {
    let dt = ts
        .to_datetime()
        .ok_or_else(|| format!("time {} out of range", ts.as_micros()))?;
    let year = u16::try_from(dt.year()).map_err(|_| format!("year {} out of range", dt.year()))?;
    let fract = (dt.nanosecond() / 100_000) as u16;
    dest[0..2].copy_from_slice(&year.to_be_bytes());
    dest[2..4].copy_from_slice(&(dt.ordinal() as u16).to_be_bytes());
    dest[4] = dt.hour() as u8;
    dest[5] = dt.minute() as u8;
    dest[6] = dt.second() as u8;
    dest[7] = 0;
    dest[8..10].copy_from_slice(&fract.to_be_bytes());
    Ok(())
}
