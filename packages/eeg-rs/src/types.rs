use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Sampling rate assumed for channels built without one
pub const DEFAULT_SAMPLING_RATE: f64 = 250.0;

/// One sensor's time series plus its calibration bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub label: String,
    pub unit: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: f64,
    pub digital_max: f64,
    /// Samples per second (Hz)
    pub sampling_rate: f64,
    pub data: Vec<f64>,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            label: String::new(),
            unit: String::new(),
            physical_min: -1000.0,
            physical_max: 1000.0,
            digital_min: -32768.0,
            digital_max: 32767.0,
            sampling_rate: DEFAULT_SAMPLING_RATE,
            data: Vec::new(),
        }
    }
}

impl Channel {
    pub fn new(label: impl Into<String>, sampling_rate: f64, data: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            sampling_rate,
            data,
            ..Default::default()
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sampling_rate > 0.0 {
            self.data.len() as f64 / self.sampling_rate
        } else {
            0.0
        }
    }

    pub fn sample_count(&self) -> usize {
        self.data.len()
    }

    /// True when both physical and digital ranges are strictly increasing
    pub fn has_valid_calibration(&self) -> bool {
        self.physical_max > self.physical_min && self.digital_max > self.digital_min
    }
}

/// An ordered set of channels plus free-text metadata.
///
/// Channel order is significant: the index of a channel is its identity for
/// every per-channel operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub channels: Vec<Channel>,
    pub patient_info: String,
    pub recording_info: String,
    pub start: Option<NaiveDateTime>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&mut self, channel: Channel) -> usize {
        self.channels.push(channel);
        self.channels.len() - 1
    }

    pub fn remove_channel(&mut self, index: usize) -> Option<Channel> {
        if index < self.channels.len() {
            Some(self.channels.remove(index))
        } else {
            None
        }
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut Channel> {
        self.channels.get_mut(index)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.label.clone()).collect()
    }

    pub fn max_sampling_rate(&self) -> f64 {
        self.channels
            .iter()
            .map(|c| c.sampling_rate)
            .fold(0.0, f64::max)
    }

    /// Longest channel duration in seconds
    pub fn duration(&self) -> f64 {
        self.channels
            .iter()
            .map(Channel::duration)
            .fold(0.0, f64::max)
    }

    pub fn clear(&mut self) {
        self.channels.clear();
        self.patient_info.clear();
        self.recording_info.clear();
        self.start = None;
    }
}

/// Time window within a channel, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub duration: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_duration() {
        let ch = Channel::new("Fp1", 250.0, vec![0.0; 500]);
        assert_eq!(ch.sample_count(), 500);
        assert!((ch.duration() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_recording_derived_values() {
        let mut rec = Recording::new();
        assert!(rec.is_empty());
        assert_eq!(rec.max_sampling_rate(), 0.0);

        rec.add_channel(Channel::new("A", 250.0, vec![0.0; 250]));
        rec.add_channel(Channel::new("B", 500.0, vec![0.0; 1500]));

        assert_eq!(rec.channel_count(), 2);
        assert_eq!(rec.max_sampling_rate(), 500.0);
        assert!((rec.duration() - 3.0).abs() < 1e-12);
        assert_eq!(rec.labels(), vec!["A", "B"]);

        let removed = rec.remove_channel(0).unwrap();
        assert_eq!(removed.label, "A");
        assert!(rec.remove_channel(5).is_none());
        assert_eq!(rec.channel_count(), 1);
    }

    #[test]
    fn test_default_calibration_is_valid() {
        assert!(Channel::default().has_valid_calibration());

        let flat = Channel {
            physical_min: 10.0,
            physical_max: 10.0,
            ..Default::default()
        };
        assert!(!flat.has_valid_calibration());
    }
}
