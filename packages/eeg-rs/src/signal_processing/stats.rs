//! Descriptive statistics over channel buffers

use crate::types::{Channel, TimeWindow};
use serde::{Deserialize, Serialize};

/// Arithmetic mean; 0 for an empty buffer
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation; 0 for fewer than two samples
pub fn standard_deviation(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

pub fn min_value(data: &[f64]) -> Option<f64> {
    data.iter().copied().reduce(f64::min)
}

pub fn max_value(data: &[f64]) -> Option<f64> {
    data.iter().copied().reduce(f64::max)
}

/// Slice of `data` covering `window` at `sampling_rate`.
///
/// The start is clamped into the buffer and the end sample is inclusive and
/// clamped to the last sample. Windows entirely past the end yield an empty
/// slice.
pub fn extract_time_window(data: &[f64], sampling_rate: f64, window: TimeWindow) -> &[f64] {
    if data.is_empty() || sampling_rate <= 0.0 {
        return &[];
    }
    let start = (window.start.max(0.0) * sampling_rate) as usize;
    let end = ((window.start + window.duration).max(0.0) * sampling_rate) as usize;
    if start >= data.len() || end < start {
        return &[];
    }
    let end = end.min(data.len() - 1);
    &data[start..=end]
}

/// Summary statistics for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub label: String,
    pub samples: usize,
    pub sampling_rate: f64,
    pub duration: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ChannelStats {
    pub fn from_channel(channel: &Channel) -> Self {
        Self {
            label: channel.label.clone(),
            samples: channel.data.len(),
            sampling_rate: channel.sampling_rate,
            duration: channel.duration(),
            mean: mean(&channel.data),
            std_dev: standard_deviation(&channel.data),
            min: min_value(&channel.data),
            max: max_value(&channel.data),
        }
    }
}
