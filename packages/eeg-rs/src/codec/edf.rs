// EDF-style binary codec
//
// Layout read by this decoder:
//   256-byte preamble (version, patient, recording, start date/time, signal count at 252)
//   signal headers, each field repeated once per signal before the next field starts:
//     label 16, transducer 80, unit 8, phys min 8, phys max 8, dig min 8, dig max 8,
//     prefiltering 80, reserved 32, samples per record 8
//   record duration 8
//   data records of 16-bit little-endian samples, signals in header order

use crate::config::ProcessingConfig;
use crate::error::{EegError, Result};
use crate::types::{Channel, Recording};
use chrono::{Local, NaiveDateTime};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub const PREAMBLE_BYTES: usize = 256;

const DATE_FORMAT: &str = "%d.%m.%y";
const TIME_FORMAT: &str = "%H.%M.%S";

#[derive(Debug, Clone)]
pub struct EdfHeader {
    pub version: String,      // 8 bytes
    pub patient_id: String,   // 80 bytes
    pub recording_id: String, // 80 bytes
    pub start_date: String,   // 8 bytes: dd.mm.yy
    pub start_time: String,   // 8 bytes: hh.mm.ss
    pub num_signals: usize,   // 4 bytes at offset 252
}

impl EdfHeader {
    pub fn start_datetime(&self) -> Option<NaiveDateTime> {
        parse_edf_datetime(&self.start_date, &self.start_time)
    }
}

#[derive(Debug, Clone)]
pub struct EdfSignalHeader {
    pub label: String,
    pub physical_minimum: f64,
    pub physical_maximum: f64,
    pub digital_minimum: f64,
    pub digital_maximum: f64,
    pub num_samples_per_record: usize,
}

impl EdfSignalHeader {
    pub fn sample_frequency(&self, record_duration: f64) -> f64 {
        self.num_samples_per_record as f64 / record_duration
    }

    pub fn has_corrupted_calibration(&self) -> bool {
        (self.digital_maximum - self.digital_minimum).abs() <= 0.1
            || (self.physical_maximum - self.physical_minimum).abs() <= 0.1
    }

    pub fn is_annotation(&self) -> bool {
        self.label.to_lowercase().contains("annotation")
    }

    pub fn calibration(&self) -> Calibration {
        Calibration::from_bounds(
            self.physical_minimum,
            self.physical_maximum,
            self.digital_minimum,
            self.digital_maximum,
        )
    }
}

/// Linear mapping from raw 16-bit words to physical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub scale: f64,
    pub offset: f64,
}

impl Calibration {
    pub const IDENTITY: Calibration = Calibration {
        scale: 1.0,
        offset: 0.0,
    };

    pub fn from_bounds(phys_min: f64, phys_max: f64, dig_min: f64, dig_max: f64) -> Self {
        let scale = (phys_max - phys_min) / (dig_max - dig_min);
        Self {
            scale,
            offset: phys_min - dig_min * scale,
        }
    }

    /// Statistical fallback used when the header calibration is unusable.
    ///
    /// Small ranges are taken as already physiological, a full 16-bit span is
    /// mapped onto ±100 units, anything else onto a ±50 unit band. The two
    /// rescaling tiers also centre the signal on its mean.
    pub fn auto_scale(raw: &[i16]) -> Self {
        let (Some(&min), Some(&max)) = (raw.iter().min(), raw.iter().max()) else {
            return Self::IDENTITY;
        };
        let range = max as f64 - min as f64;
        let mean = raw.iter().map(|&v| v as f64).sum::<f64>() / raw.len() as f64;

        if range < 100.0 {
            Self::IDENTITY
        } else if range > 30000.0 {
            let scale = 200.0 / 65536.0;
            Self {
                scale,
                offset: -mean * scale,
            }
        } else {
            let scale = 100.0 / range;
            Self {
                scale,
                offset: -mean * scale,
            }
        }
    }

    #[inline]
    pub fn apply(&self, raw: i16) -> f64 {
        raw as f64 * self.scale + self.offset
    }
}

pub fn parse_edf_datetime(date: &str, time: &str) -> Option<NaiveDateTime> {
    let joined = format!("{} {}", date.trim(), time.trim());
    NaiveDateTime::parse_from_str(&joined, &format!("{} {}", DATE_FORMAT, TIME_FORMAT)).ok()
}

fn read_fixed_string<R: Read>(reader: &mut R, size: usize, field: &str) -> Result<String> {
    let mut buffer = vec![0u8; size];
    reader
        .read_exact(&mut buffer)
        .map_err(|_| EegError::TruncatedHeader(format!("{} field ended early", field)))?;
    Ok(String::from_utf8_lossy(&buffer).trim().to_string())
}

fn skip_bytes<R: Read>(reader: &mut R, size: usize, field: &str) -> Result<()> {
    let skipped = std::io::copy(&mut reader.take(size as u64), &mut std::io::sink())?;
    if skipped as usize != size {
        return Err(EegError::TruncatedHeader(format!(
            "{} block ended early",
            field
        )));
    }
    Ok(())
}

fn parse_or<T: std::str::FromStr>(s: &str, default: T) -> T {
    s.trim().parse().unwrap_or(default)
}

/// Tracks how many bytes pass through, to locate the start of the data records
struct CountingReader<R> {
    inner: R,
    consumed: u64,
}

impl<R: Read> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, consumed: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed += n as u64;
        Ok(n)
    }
}

pub fn read_header(bytes: &[u8]) -> Result<EdfHeader> {
    if bytes.len() < PREAMBLE_BYTES {
        return Err(EegError::TruncatedHeader(format!(
            "expected {} header bytes, found {}",
            PREAMBLE_BYTES,
            bytes.len()
        )));
    }

    let field = |start: usize, end: usize| {
        String::from_utf8_lossy(&bytes[start..end]).trim().to_string()
    };

    let num_signals_str = field(252, 256);
    let num_signals = match num_signals_str.parse::<i64>() {
        Ok(n) if n > 0 => n as usize,
        _ => {
            return Err(EegError::InvalidSignalCount(format!(
                "'{}'",
                num_signals_str
            )))
        }
    };

    let header = EdfHeader {
        version: field(0, 8),
        patient_id: field(8, 88),
        recording_id: field(88, 168),
        start_date: field(168, 176),
        start_time: field(176, 184),
        num_signals,
    };

    log::debug!(
        "EDF header parsed: version='{}', num_signals={}, start='{} {}'",
        header.version,
        header.num_signals,
        header.start_date,
        header.start_time
    );

    Ok(header)
}

pub fn read_signal_headers<R: Read>(
    reader: &mut R,
    num_signals: usize,
) -> Result<Vec<EdfSignalHeader>> {
    let mut labels = Vec::with_capacity(num_signals);
    for _ in 0..num_signals {
        labels.push(read_fixed_string(reader, 16, "label")?);
    }

    skip_bytes(reader, 80 * num_signals, "transducer")?;
    skip_bytes(reader, 8 * num_signals, "physical dimension")?;

    let mut read_numbers = |field: &str, default: f64| -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(num_signals);
        for _ in 0..num_signals {
            values.push(parse_or(&read_fixed_string(reader, 8, field)?, default));
        }
        Ok(values)
    };
    let physical_minimums = read_numbers("physical minimum", -500.0)?;
    let physical_maximums = read_numbers("physical maximum", 500.0)?;
    let digital_minimums = read_numbers("digital minimum", -32768.0)?;
    let digital_maximums = read_numbers("digital maximum", 32767.0)?;

    skip_bytes(reader, 80 * num_signals, "prefiltering")?;
    skip_bytes(reader, 32 * num_signals, "reserved")?;

    let mut samples_per_record = Vec::with_capacity(num_signals);
    for _ in 0..num_signals {
        samples_per_record.push(parse_or(
            &read_fixed_string(reader, 8, "samples per record")?,
            1usize,
        ));
    }

    Ok((0..num_signals)
        .map(|i| EdfSignalHeader {
            label: labels[i].clone(),
            physical_minimum: physical_minimums[i],
            physical_maximum: physical_maximums[i],
            digital_minimum: digital_minimums[i],
            digital_maximum: digital_maximums[i],
            num_samples_per_record: samples_per_record[i],
        })
        .collect())
}

fn read_record_duration<R: Read>(reader: &mut R) -> Result<f64> {
    let s = read_fixed_string(reader, 8, "record duration")?;
    match s.parse::<f64>() {
        Ok(d) if d.is_finite() && d > 0.0 => Ok(d),
        _ => {
            log::debug!("Record duration '{}' unusable, assuming 1.0 s", s);
            Ok(1.0)
        }
    }
}

/// Number of whole records in `available` data bytes, capped at `max_records`
fn record_count(available: u64, bytes_per_record: usize, max_records: usize) -> usize {
    if bytes_per_record == 0 {
        return 0;
    }
    let whole = available / bytes_per_record as u64;
    usize::try_from(whole).map_or(max_records, |n| n.min(max_records))
}

/// Read raw 16-bit words per signal, one record at a time.
fn read_records<R: Read>(
    reader: &mut R,
    signal_headers: &[EdfSignalHeader],
    num_records: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Vec<i16>>> {
    let bytes_per_record: usize = signal_headers
        .iter()
        .map(|h| h.num_samples_per_record * 2)
        .sum();

    let mut raw: Vec<Vec<i16>> = signal_headers
        .iter()
        .map(|h| Vec::with_capacity(h.num_samples_per_record * num_records))
        .collect();

    let mut record_buf = vec![0u8; bytes_per_record];
    for record in 0..num_records {
        if cancel.is_cancelled() {
            log::info!("EDF decode cancelled at record {}", record);
            return Err(EegError::CancelledOperation);
        }
        reader
            .read_exact(&mut record_buf)
            .map_err(|e| EegError::TruncatedData(format!("record {}: {}", record, e)))?;

        let mut words = record_buf
            .chunks_exact(2)
            .map(|w| i16::from_le_bytes([w[0], w[1]]));
        for (signal, header) in signal_headers.iter().enumerate() {
            raw[signal].extend(words.by_ref().take(header.num_samples_per_record));
        }
    }

    log::debug!(
        "Read {} data records ({} bytes each)",
        num_records,
        bytes_per_record
    );

    Ok(raw)
}

/// Decode a complete binary file image into a Recording.
///
/// Nothing is returned unless the whole file decodes; cancellation is checked
/// once per data record.
pub fn decode(
    bytes: &[u8],
    config: &ProcessingConfig,
    cancel: &CancellationToken,
) -> Result<Recording> {
    decode_reader(Cursor::new(bytes), bytes.len() as u64, config, cancel)
}

/// Decode a binary file from disk, reading at most `config.max_records`
/// records rather than the whole file.
pub fn decode_file<P: AsRef<Path>>(
    path: P,
    config: &ProcessingConfig,
    cancel: &CancellationToken,
) -> Result<Recording> {
    let file = File::open(path.as_ref())?;
    let total_len = file.metadata()?.len();
    decode_reader(BufReader::new(file), total_len, config, cancel)
}

/// Decode from any reader holding `total_len` bytes.
///
/// Only the headers and the records kept under the record cap are read.
pub fn decode_reader<R: Read>(
    mut reader: R,
    total_len: u64,
    config: &ProcessingConfig,
    cancel: &CancellationToken,
) -> Result<Recording> {
    let mut preamble = Vec::with_capacity(PREAMBLE_BYTES);
    (&mut reader)
        .take(PREAMBLE_BYTES as u64)
        .read_to_end(&mut preamble)?;
    let header = read_header(&preamble)?;

    let mut counted = CountingReader::new(&mut reader);
    let signal_headers = read_signal_headers(&mut counted, header.num_signals)?;
    let record_duration = read_record_duration(&mut counted)?;
    let data_start = PREAMBLE_BYTES as u64 + counted.consumed;

    let bytes_per_record: usize = signal_headers
        .iter()
        .map(|h| h.num_samples_per_record * 2)
        .sum();
    let num_records = record_count(
        total_len.saturating_sub(data_start),
        bytes_per_record,
        config.max_records,
    );

    let raw = read_records(&mut reader, &signal_headers, num_records, cancel)?;

    let mut recording = Recording {
        patient_info: header.patient_id.clone(),
        recording_info: header.recording_id.clone(),
        start: header.start_datetime(),
        ..Default::default()
    };

    for (index, signal) in signal_headers
        .iter()
        .enumerate()
        .take(config.max_channels)
    {
        if signal.is_annotation() {
            log::debug!("Skipping annotation channel {} '{}'", index, signal.label);
            continue;
        }

        let label = if signal.label.is_empty() {
            format!("CH{}", index + 1)
        } else {
            signal.label.clone()
        };

        let calibration = if signal.has_corrupted_calibration() {
            log::warn!(
                "{}: phys {}..{}, dig {}..{}; using auto-scale",
                EegError::CorruptedCalibration {
                    index,
                    label: label.clone(),
                },
                signal.physical_minimum,
                signal.physical_maximum,
                signal.digital_minimum,
                signal.digital_maximum
            );
            Calibration::auto_scale(&raw[index])
        } else {
            signal.calibration()
        };

        recording.add_channel(Channel {
            label,
            unit: "µV".to_string(),
            physical_min: signal.physical_minimum,
            physical_max: signal.physical_maximum,
            digital_min: signal.digital_minimum,
            digital_max: signal.digital_maximum,
            sampling_rate: signal.sample_frequency(record_duration),
            data: raw[index].iter().map(|&v| calibration.apply(v)).collect(),
        });
    }

    if header.num_signals > config.max_channels {
        log::warn!(
            "File declares {} signals; only the first {} were considered",
            header.num_signals,
            config.max_channels
        );
    }

    log::info!(
        "Decoded EDF: {} channels, record duration {} s, {:.1} s total",
        recording.channel_count(),
        record_duration,
        recording.duration()
    );

    Ok(recording)
}

fn write_fixed_string(field: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    let copy_len = bytes.len().min(field.len());
    field[..copy_len].copy_from_slice(&bytes[..copy_len]);
}

/// Encode the fixed 256-byte preamble.
///
/// Signal headers and samples are not written; use the text codec for a
/// lossless round trip.
pub fn encode_header(recording: &Recording) -> Result<Vec<u8>> {
    if recording.is_empty() {
        return Err(EegError::EmptyRecording);
    }

    let start = recording
        .start
        .unwrap_or_else(|| Local::now().naive_local());

    let mut header = vec![b' '; PREAMBLE_BYTES];
    write_fixed_string(&mut header[0..8], "0");
    write_fixed_string(&mut header[8..88], &recording.patient_info);
    write_fixed_string(&mut header[88..168], &recording.recording_info);
    write_fixed_string(&mut header[168..176], &start.format(DATE_FORMAT).to_string());
    write_fixed_string(&mut header[176..184], &start.format(TIME_FORMAT).to_string());
    write_fixed_string(
        &mut header[252..256],
        &recording.channel_count().to_string(),
    );

    Ok(header)
}
