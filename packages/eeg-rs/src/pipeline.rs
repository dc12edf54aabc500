//! Preprocessing Pipeline
//!
//! Applies a fixed sequence of session operations to a set of channels:
//! 1. DC removal
//! 2. Notch filter (power line noise removal)
//! 3. Bandpass filter (frequency band selection)
//! 4. Gain, then offset
//! 5. Normalisation to [0, 1]
//! 6. Montage over the whole recording

use crate::error::Result;
use crate::session::EegSession;
use crate::signal_processing::montage::{MontageKind, MontageReport};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Channel indices to process; empty means every channel
    #[serde(default)]
    pub channels: Vec<usize>,

    #[serde(default)]
    pub remove_dc: bool,

    /// Notch frequency in Hz
    #[serde(default)]
    pub notch: Option<f64>,

    /// (low, high) cutoffs in Hz
    #[serde(default)]
    pub bandpass: Option<(f64, f64)>,

    #[serde(default)]
    pub gain: Option<f64>,

    #[serde(default)]
    pub offset: Option<f64>,

    #[serde(default)]
    pub normalize: bool,

    #[serde(default)]
    pub montage: Option<MontageKind>,
}

impl PipelineConfig {
    /// Powerline notch only
    pub fn minimal(powerline_freq: f64) -> Self {
        Self {
            notch: Some(powerline_freq),
            ..Default::default()
        }
    }

    /// DC removal, powerline notch and a 0.5-40 Hz bandpass
    pub fn standard_eeg(powerline_freq: f64) -> Self {
        Self {
            remove_dc: true,
            notch: Some(powerline_freq),
            bandpass: Some((0.5, 40.0)),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.remove_dc
            && self.notch.is_none()
            && self.bandpass.is_none()
            && self.gain.is_none()
            && self.offset.is_none()
            && !self.normalize
            && self.montage.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub channels_processed: usize,
    pub steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub montage: Option<MontageReport>,
    pub processing_time_ms: f64,
}

/// Run `config` against `session`, stopping at the first failing step.
///
/// Every selected index is checked before the first step, so a bad index
/// leaves the session untouched. Channel steps finish on every selected
/// channel before the next step starts; if a later step fails, earlier
/// changes are kept.
pub fn run(session: &mut EegSession, config: &PipelineConfig) -> Result<PipelineReport> {
    let start = Instant::now();

    let targets: Vec<usize> = if config.channels.is_empty() {
        (0..session.channel_count()).collect()
    } else {
        config.channels.clone()
    };

    for &ch in &targets {
        session.channel(ch)?;
    }

    let mut steps = Vec::new();

    if config.remove_dc {
        for &ch in &targets {
            session.remove_dc(ch)?;
        }
        steps.push("remove_dc".to_string());
    }
    if let Some(freq) = config.notch {
        for &ch in &targets {
            session.apply_notch(ch, Some(freq))?;
        }
        steps.push(format!("notch {} Hz", freq));
    }
    if let Some((low, high)) = config.bandpass {
        for &ch in &targets {
            session.apply_filter(ch, low, high)?;
        }
        steps.push(format!("bandpass {}-{} Hz", low, high));
    }
    if let Some(gain) = config.gain {
        for &ch in &targets {
            session.apply_gain(ch, gain)?;
        }
        steps.push(format!("gain x{}", gain));
    }
    if let Some(offset) = config.offset {
        for &ch in &targets {
            session.apply_offset(ch, offset)?;
        }
        steps.push(format!("offset {:+}", offset));
    }
    if config.normalize {
        for &ch in &targets {
            session.normalize_channel(ch)?;
        }
        steps.push("normalize".to_string());
    }

    let montage = match config.montage {
        Some(kind) => {
            steps.push(format!("montage {}", kind));
            Some(session.apply_montage(kind)?)
        }
        None => None,
    };

    let processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;
    log::info!(
        "Pipeline applied {} steps to {} channels in {:.1} ms",
        steps.len(),
        targets.len(),
        processing_time_ms
    );

    Ok(PipelineReport {
        channels_processed: targets.len(),
        steps,
        montage,
        processing_time_ms,
    })
}
