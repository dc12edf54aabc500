// Delimited text codec (CSV / TSV / semicolon separated)
//
// Format:
// - Blank lines and lines starting with '#' are ignored
// - First remaining line is the header; its first column names the time axis
// - Each following row is one time point: time, then one value per channel
// - No sampling rate is stored; decoded channels get the configured default

use crate::config::ProcessingConfig;
use crate::error::{EegError, Result};
use crate::types::{Channel, Recording, DEFAULT_SAMPLING_RATE};
use std::io::Write;
use tokio_util::sync::CancellationToken;

/// Delimiters tried against the header row, in priority order
pub const DELIMITERS: [char; 3] = [',', '\t', ';'];

/// First delimiter that splits the header into at least two fields
pub fn detect_delimiter(header: &str) -> Option<char> {
    DELIMITERS
        .iter()
        .copied()
        .find(|&d| header.split(d).count() >= 2)
}

pub fn decode(
    content: &str,
    config: &ProcessingConfig,
    cancel: &CancellationToken,
) -> Result<Recording> {
    let mut lines = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));

    let header_line = lines
        .next()
        .ok_or_else(|| EegError::UnsupportedFormat("Text file has no header row".to_string()))?;

    let delimiter = detect_delimiter(header_line).ok_or_else(|| {
        EegError::UnsupportedFormat(format!(
            "Header row '{}' has no recognised delimiter",
            header_line
        ))
    })?;

    let headers: Vec<&str> = header_line.split(delimiter).collect();
    let num_channels = headers.len() - 1;
    let mut channel_data: Vec<Vec<f64>> = vec![Vec::new(); num_channels];

    let mut skipped = 0usize;
    for (row, line) in lines.enumerate() {
        if cancel.is_cancelled() {
            return Err(EegError::CancelledOperation);
        }

        let values: Vec<&str> = line.split(delimiter).collect();
        if values.len() != headers.len() {
            log::warn!(
                "Row {} has {} fields, expected {}; skipping",
                row + 1,
                values.len(),
                headers.len()
            );
            skipped += 1;
            continue;
        }

        for (ch, value) in values[1..].iter().enumerate() {
            channel_data[ch].push(value.trim().parse::<f64>().unwrap_or(0.0));
        }
    }

    let mut recording = Recording {
        recording_info: "CSV Import".to_string(),
        ..Default::default()
    };

    for (i, data) in channel_data.into_iter().enumerate() {
        let label = headers[i + 1].trim();
        let label = if label.is_empty() {
            format!("Channel_{}", i + 1)
        } else {
            label.to_string()
        };
        recording.add_channel(
            Channel::new(label, config.text_sample_rate, data).with_unit("uV"),
        );
    }

    log::info!(
        "Decoded text: {} channels, {} samples each, {} rows skipped",
        recording.channel_count(),
        recording.channels.first().map_or(0, |c| c.data.len()),
        skipped
    );

    Ok(recording)
}

/// Label as a single header field: delimiters and line breaks become `_`.
fn header_label(label: &str) -> String {
    let cleaned = label.replace([',', '\t', ';', '\n', '\r'], "_");
    if cleaned != label {
        log::warn!("Channel label '{}' written as '{}'", label.escape_default(), cleaned);
    }
    cleaned
}

/// Write a recording as comma-separated text with a regenerated time column.
pub fn encode<W: Write>(recording: &Recording, writer: &mut W) -> Result<()> {
    if recording.is_empty() {
        return Err(EegError::EmptyRecording);
    }

    let sampling_rate = recording
        .channels
        .iter()
        .map(|c| c.sampling_rate)
        .find(|&rate| rate > 0.0)
        .unwrap_or(DEFAULT_SAMPLING_RATE);

    write!(writer, "Time(s)")?;
    for channel in &recording.channels {
        write!(writer, ",{}", header_label(&channel.label))?;
    }
    writeln!(writer)?;

    let max_samples = recording
        .channels
        .iter()
        .map(|c| c.data.len())
        .max()
        .unwrap_or(0);

    for sample in 0..max_samples {
        write!(writer, "{:.6}", sample as f64 / sampling_rate)?;
        for channel in &recording.channels {
            match channel.data.get(sample) {
                Some(value) => write!(writer, ",{:.6}", value)?,
                None => write!(writer, ",0")?,
            }
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}
