/// Recording codecs
///
/// Two on-disk formats are supported: the EDF-style 16-bit binary format and
/// generic delimited text. Format selection is by file extension, with a
/// binary-then-text fallback for unknown extensions on decode.
use crate::config::ProcessingConfig;
use crate::error::{EegError, Result};
use crate::types::Recording;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub mod edf;
pub mod text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    Edf,
    Text,
}

impl Format {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "edf" => Some(Self::Edf),
            "csv" | "txt" | "dat" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn supported_extensions() -> Vec<&'static str> {
        vec!["edf", "csv", "txt", "dat"]
    }
}

/// Decode an in-memory file image in the given format.
pub fn decode_bytes(
    bytes: &[u8],
    format: Format,
    config: &ProcessingConfig,
    cancel: &CancellationToken,
) -> Result<Recording> {
    match format {
        Format::Edf => edf::decode(bytes, config, cancel),
        Format::Text => text::decode(&String::from_utf8_lossy(bytes), config, cancel),
    }
}

fn read_text(path: &Path, config: &ProcessingConfig, cancel: &CancellationToken) -> Result<Recording> {
    decode_bytes(&std::fs::read(path)?, Format::Text, config, cancel)
}

/// Decode a file from disk.
///
/// Binary files are streamed up to the record cap. Files with an
/// unrecognised extension are tried as binary first, then as text; if
/// neither succeeds the result is `UnsupportedFormat`.
pub fn decode_file<P: AsRef<Path>>(
    path: P,
    config: &ProcessingConfig,
    cancel: &CancellationToken,
) -> Result<Recording> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(EegError::FileNotFound(path.display().to_string()));
    }

    let (mut recording, format) = match Format::from_path(path) {
        Some(Format::Edf) => (edf::decode_file(path, config, cancel)?, Format::Edf),
        Some(Format::Text) => (read_text(path, config, cancel)?, Format::Text),
        None => {
            log::debug!(
                "Unknown extension for {}, probing formats",
                path.display()
            );
            match edf::decode_file(path, config, cancel) {
                Ok(recording) => (recording, Format::Edf),
                Err(EegError::CancelledOperation) => return Err(EegError::CancelledOperation),
                Err(edf_err) => {
                    let recording = read_text(path, config, cancel).map_err(|text_err| {
                        EegError::UnsupportedFormat(format!(
                            "{} (as EDF: {}; as text: {})",
                            path.display(),
                            edf_err,
                            text_err
                        ))
                    })?;
                    (recording, Format::Text)
                }
            }
        }
    };

    if format == Format::Text {
        recording.patient_info = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
    }

    Ok(recording)
}

/// Encode a recording to disk. `.edf` writes the binary header only; every
/// other extension writes delimited text.
pub fn encode_file<P: AsRef<Path>>(path: P, recording: &Recording) -> Result<()> {
    let path = path.as_ref();
    match Format::from_path(path) {
        Some(Format::Edf) => {
            let header = edf::encode_header(recording)?;
            std::fs::write(path, header)?;
        }
        _ => {
            if recording.is_empty() {
                return Err(EegError::EmptyRecording);
            }
            let file = File::create(path)?;
            let mut writer = BufWriter::new(file);
            text::encode(recording, &mut writer)?;
        }
    }

    log::info!(
        "Wrote {} channels to {}",
        recording.channel_count(),
        path.display()
    );
    Ok(())
}
