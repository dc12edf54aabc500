use thiserror::Error;

#[derive(Error, Debug)]
pub enum EegError {
    #[error("Input file not found: {0}")]
    FileNotFound(String),

    #[error("Truncated header: {0}")]
    TruncatedHeader(String),

    #[error("Truncated data: {0}")]
    TruncatedData(String),

    #[error("Invalid signal count: {0}")]
    InvalidSignalCount(String),

    #[error("Corrupted calibration for signal {index} ({label})")]
    CorruptedCalibration { index: usize, label: String },

    #[error("Cannot encode an empty recording")]
    EmptyRecording,

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid channel index {index} (recording has {count} channels)")]
    InvalidChannelIndex { index: usize, count: usize },

    #[error("Invalid filter parameters: {0}")]
    InvalidFilterParameters(String),

    #[error("Invalid spectrogram parameters: {0}")]
    InvalidSpectrogramParameters(String),

    #[error("Not enough samples for spectrogram: {samples} samples, window {window}")]
    InsufficientDataForSpectrogram { samples: usize, window: usize },

    #[error("Operation cancelled")]
    CancelledOperation,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EegError>;
