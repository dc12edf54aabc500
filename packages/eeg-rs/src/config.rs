use crate::error::{EegError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Processing limits and defaults shared by the codecs and the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Sampling rate assigned to channels read from delimited text (Hz)
    #[serde(default = "default_text_sample_rate")]
    pub text_sample_rate: f64,

    /// Upper bound on data records read from a binary file
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Upper bound on signals considered from a binary file
    #[serde(default = "default_max_channels")]
    pub max_channels: usize,

    /// Notch frequency used when a caller does not give one (Hz)
    #[serde(default = "default_notch_frequency")]
    pub notch_frequency: f64,

    /// Spectrogram window length in samples
    #[serde(default = "default_spectrogram_window")]
    pub spectrogram_window: usize,

    /// Spectrogram hop in samples
    #[serde(default = "default_spectrogram_hop")]
    pub spectrogram_hop: usize,
}

fn default_text_sample_rate() -> f64 {
    250.0
}
fn default_max_records() -> usize {
    10_000
}
fn default_max_channels() -> usize {
    32
}
fn default_notch_frequency() -> f64 {
    50.0
}
fn default_spectrogram_window() -> usize {
    256
}
fn default_spectrogram_hop() -> usize {
    64
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            text_sample_rate: default_text_sample_rate(),
            max_records: default_max_records(),
            max_channels: default_max_channels(),
            notch_frequency: default_notch_frequency(),
            spectrogram_window: default_spectrogram_window(),
            spectrogram_hop: default_spectrogram_hop(),
        }
    }
}

impl ProcessingConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            text_sample_rate: env_or("EEG_TEXT_SAMPLE_RATE", defaults.text_sample_rate)?,
            max_records: env_or("EEG_MAX_RECORDS", defaults.max_records)?,
            max_channels: env_or("EEG_MAX_CHANNELS", defaults.max_channels)?,
            notch_frequency: env_or("EEG_NOTCH_FREQUENCY", defaults.notch_frequency)?,
            spectrogram_window: env_or("EEG_SPECTROGRAM_WINDOW", defaults.spectrogram_window)?,
            spectrogram_hop: env_or("EEG_SPECTROGRAM_HOP", defaults.spectrogram_hop)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file. Missing keys take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EegError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            EegError::InvalidConfig(format!("Failed to parse '{}': {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.text_sample_rate > 0.0) {
            return Err(EegError::InvalidConfig(
                "text_sample_rate must be positive".to_string(),
            ));
        }
        if self.max_channels == 0 {
            return Err(EegError::InvalidConfig(
                "max_channels must be at least 1".to_string(),
            ));
        }
        if self.spectrogram_window < 2 || self.spectrogram_hop == 0 {
            return Err(EegError::InvalidConfig(
                "spectrogram_window must be >= 2 and spectrogram_hop >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| EegError::InvalidConfig(format!("{} has invalid value '{}'", key, value))),
        Err(_) => Ok(default),
    }
}
