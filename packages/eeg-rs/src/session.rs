//! `EegSession`: the recording plus every operation callers may run on it.
//!
//! All per-channel operations validate the channel index first; an invalid
//! index or invalid parameters leave every channel untouched. Observers are
//! notified after each successful in-place change.

use crate::codec;
use crate::config::ProcessingConfig;
use crate::error::{EegError, Result};
use crate::signal_processing::filters::{BandpassFilter, NotchFilter};
use crate::signal_processing::montage::{self, MontageKind, MontageReport};
use crate::signal_processing::spectral::{self, BandPower, Spectrogram};
use crate::signal_processing::stats::{self, ChannelStats};
use crate::signal_processing::transforms;
use crate::types::{Channel, Recording, TimeWindow};
use std::fmt;
use std::path::Path;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Sample data or metadata changed in place
    DataChanged,
    ChannelAdded(usize),
    ChannelRemoved(usize),
    /// Channel collection replaced; carries the new count
    ChannelCountChanged(usize),
}

pub type Observer = Box<dyn Fn(&SessionEvent)>;

pub struct EegSession {
    recording: Recording,
    config: ProcessingConfig,
    bandpass: BandpassFilter,
    observers: Vec<Observer>,
}

impl fmt::Debug for EegSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EegSession")
            .field("recording", &self.recording)
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for EegSession {
    fn default() -> Self {
        Self::new(ProcessingConfig::default())
    }
}

impl EegSession {
    pub fn new(config: ProcessingConfig) -> Self {
        Self::with_recording(Recording::new(), config)
    }

    pub fn with_recording(recording: Recording, config: ProcessingConfig) -> Self {
        Self {
            recording,
            config,
            bandpass: BandpassFilter::new(),
            observers: Vec::new(),
        }
    }

    /// Decode `path` into a new session
    pub fn open<P: AsRef<Path>>(
        path: P,
        config: ProcessingConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let recording = codec::decode_file(path, &config, cancel)?;
        Ok(Self::with_recording(recording, config))
    }

    /// Replace the current recording with the contents of `path`.
    ///
    /// On any error, including cancellation, the current recording is kept.
    pub fn decode<P: AsRef<Path>>(&mut self, path: P, cancel: &CancellationToken) -> Result<()> {
        let recording = codec::decode_file(path, &self.config, cancel)?;
        self.recording = recording;
        self.notify(SessionEvent::ChannelCountChanged(self.recording.channel_count()));
        self.notify(SessionEvent::DataChanged);
        Ok(())
    }

    /// Write the recording; the format follows the file extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        codec::encode_file(path, &self.recording)
    }

    pub fn encode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save(path)
    }

    pub fn recording(&self) -> &Recording {
        &self.recording
    }

    pub fn into_recording(self) -> Recording {
        self.recording
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn channel_count(&self) -> usize {
        self.recording.channel_count()
    }

    pub fn channel(&self, index: usize) -> Result<&Channel> {
        let count = self.recording.channel_count();
        self.recording
            .channel(index)
            .ok_or(EegError::InvalidChannelIndex { index, count })
    }

    fn channel_mut(&mut self, index: usize) -> Result<&mut Channel> {
        let count = self.recording.channel_count();
        self.recording
            .channel_mut(index)
            .ok_or(EegError::InvalidChannelIndex { index, count })
    }

    /// Register a callback run after every change
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: Fn(&SessionEvent) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    fn notify(&self, event: SessionEvent) {
        log::trace!("Session event {:?}", event);
        for observer in &self.observers {
            observer(&event);
        }
    }

    pub fn add_channel(&mut self, channel: Channel) -> usize {
        let index = self.recording.add_channel(channel);
        self.notify(SessionEvent::ChannelAdded(index));
        self.notify(SessionEvent::ChannelCountChanged(self.recording.channel_count()));
        index
    }

    pub fn remove_channel(&mut self, index: usize) -> Result<Channel> {
        let count = self.recording.channel_count();
        let removed = self
            .recording
            .remove_channel(index)
            .ok_or(EegError::InvalidChannelIndex { index, count })?;
        self.notify(SessionEvent::ChannelRemoved(index));
        self.notify(SessionEvent::ChannelCountChanged(self.recording.channel_count()));
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.recording.clear();
        self.notify(SessionEvent::ChannelCountChanged(0));
        self.notify(SessionEvent::DataChanged);
    }

    /// Multiply a channel by `gain`; the physical range scales with it
    pub fn apply_gain(&mut self, index: usize, gain: f64) -> Result<()> {
        let channel = self.channel_mut(index)?;
        transforms::apply_gain(&mut channel.data, gain);
        let (a, b) = (channel.physical_min * gain, channel.physical_max * gain);
        channel.physical_min = a.min(b);
        channel.physical_max = a.max(b);
        self.notify(SessionEvent::DataChanged);
        Ok(())
    }

    /// Add `offset` to a channel; the physical range shifts with it
    pub fn apply_offset(&mut self, index: usize, offset: f64) -> Result<()> {
        let channel = self.channel_mut(index)?;
        transforms::apply_offset(&mut channel.data, offset);
        channel.physical_min += offset;
        channel.physical_max += offset;
        self.notify(SessionEvent::DataChanged);
        Ok(())
    }

    /// Zero-phase Butterworth bandpass at the channel's own sampling rate
    pub fn apply_filter(&mut self, index: usize, low: f64, high: f64) -> Result<()> {
        let count = self.recording.channel_count();
        let channel = self
            .recording
            .channels
            .get_mut(index)
            .ok_or(EegError::InvalidChannelIndex { index, count })?;
        self.bandpass
            .apply(&mut channel.data, channel.sampling_rate, low, high)?;
        self.notify(SessionEvent::DataChanged);
        Ok(())
    }

    /// Notch at `freq` Hz, or the configured powerline frequency
    pub fn apply_notch(&mut self, index: usize, freq: Option<f64>) -> Result<()> {
        let freq = freq.unwrap_or(self.config.notch_frequency);
        let channel = self.channel_mut(index)?;
        NotchFilter::apply(&mut channel.data, channel.sampling_rate, freq)?;
        self.notify(SessionEvent::DataChanged);
        Ok(())
    }

    /// Rescale a channel to [0, 1]; constant channels are left as they are
    pub fn normalize_channel(&mut self, index: usize) -> Result<()> {
        let channel = self.channel_mut(index)?;
        if transforms::normalize(&mut channel.data, 0.0, 1.0) {
            channel.physical_min = 0.0;
            channel.physical_max = 1.0;
        }
        self.notify(SessionEvent::DataChanged);
        Ok(())
    }

    /// Subtract the channel mean; the physical range shifts by the same amount
    pub fn remove_dc(&mut self, index: usize) -> Result<()> {
        let channel = self.channel_mut(index)?;
        let mean = transforms::remove_dc(&mut channel.data);
        channel.physical_min -= mean;
        channel.physical_max -= mean;
        self.notify(SessionEvent::DataChanged);
        Ok(())
    }

    /// Re-reference all channels. The collection is replaced as a whole or,
    /// when the montage does not apply, left unchanged.
    pub fn apply_montage(&mut self, kind: MontageKind) -> Result<MontageReport> {
        let (output, report) = montage::apply(kind, &self.recording.channels);
        if let Some(channels) = output {
            let count_changed = channels.len() != self.recording.channel_count();
            self.recording.channels = channels;
            if count_changed {
                self.notify(SessionEvent::ChannelCountChanged(self.recording.channel_count()));
            }
            self.notify(SessionEvent::DataChanged);
        }
        log::info!(
            "{} montage: {} -> {} channels",
            kind,
            report.channels_in,
            report.channels_out
        );
        Ok(report)
    }

    pub fn means(&self) -> Vec<f64> {
        self.recording
            .channels
            .iter()
            .map(|c| stats::mean(&c.data))
            .collect()
    }

    pub fn std_devs(&self) -> Vec<f64> {
        self.recording
            .channels
            .iter()
            .map(|c| stats::standard_deviation(&c.data))
            .collect()
    }

    pub fn channel_stats(&self) -> Vec<ChannelStats> {
        self.recording
            .channels
            .iter()
            .map(ChannelStats::from_channel)
            .collect()
    }

    /// Samples of `index` between `start` and `start + duration` seconds
    pub fn time_series(&self, index: usize, start: f64, duration: f64) -> Result<Vec<f64>> {
        let channel = self.channel(index)?;
        let window = TimeWindow { start, duration };
        Ok(stats::extract_time_window(&channel.data, channel.sampling_rate, window).to_vec())
    }

    /// Magnitude spectrum of a channel, or of a time window within it
    pub fn power_spectrum(&self, index: usize, window: Option<TimeWindow>) -> Result<Vec<f64>> {
        let channel = self.channel(index)?;
        let data = match window {
            Some(w) => stats::extract_time_window(&channel.data, channel.sampling_rate, w),
            None => &channel.data,
        };
        Ok(spectral::power_spectrum(data, channel.sampling_rate))
    }

    /// Frequencies matching `power_spectrum` bins for a channel
    pub fn spectrum_frequencies(&self, index: usize, spectrum_len: usize) -> Result<Vec<f64>> {
        let channel = self.channel(index)?;
        Ok(spectral::spectrum_frequencies(
            spectrum_len,
            channel.sampling_rate,
        ))
    }

    pub fn band_power(&self, index: usize) -> Result<BandPower> {
        let channel = self.channel(index)?;
        Ok(spectral::band_power(&channel.data, channel.sampling_rate))
    }

    /// STFT of a channel. `None` window or hop takes the configured value.
    pub fn spectrogram(
        &self,
        index: usize,
        window: Option<usize>,
        hop: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<Spectrogram> {
        let channel = self.channel(index)?;
        spectral::spectrogram(
            &channel.data,
            channel.sampling_rate,
            window.unwrap_or(self.config.spectrogram_window),
            hop.unwrap_or(self.config.spectrogram_hop),
            cancel,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn session_with(channels: Vec<Channel>) -> EegSession {
        let mut recording = Recording::new();
        for channel in channels {
            recording.add_channel(channel);
        }
        EegSession::with_recording(recording, ProcessingConfig::default())
    }

    fn recorder(session: &mut EegSession) -> Rc<RefCell<Vec<SessionEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        session.subscribe(move |e| sink.borrow_mut().push(*e));
        events
    }

    #[test]
    fn test_invalid_index_rejected_without_mutation() {
        let mut session = session_with(vec![Channel::new("A", 250.0, vec![1.0, 2.0])]);
        let events = recorder(&mut session);

        let err = session.apply_gain(3, 2.0).unwrap_err();
        assert!(matches!(
            err,
            EegError::InvalidChannelIndex { index: 3, count: 1 }
        ));
        assert!(session.apply_offset(1, 1.0).is_err());
        assert!(session.apply_filter(1, 1.0, 40.0).is_err());
        assert!(session.apply_notch(1, None).is_err());
        assert!(session.normalize_channel(1).is_err());
        assert!(session.remove_dc(1).is_err());
        assert!(session.band_power(1).is_err());

        assert_eq!(session.recording().channels[0].data, vec![1.0, 2.0]);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_gain_offset_update_physical_range() {
        let mut session = session_with(vec![Channel::new("A", 250.0, vec![1.0, -1.0])]);
        session.apply_gain(0, 2.0).unwrap();
        session.apply_offset(0, 10.0).unwrap();

        let ch = session.channel(0).unwrap();
        assert_eq!(ch.data, vec![12.0, 8.0]);
        assert_eq!(ch.physical_min, -1990.0);
        assert_eq!(ch.physical_max, 2010.0);

        session.apply_gain(0, -1.0).unwrap();
        let ch = session.channel(0).unwrap();
        assert!(ch.physical_min < ch.physical_max);
    }

    #[test]
    fn test_normalize_and_dc_update_physical_range() {
        let mut session = session_with(vec![
            Channel::new("A", 250.0, vec![2.0, 4.0, 6.0]),
            Channel::new("B", 250.0, vec![5.0, 6.0, 7.0]),
        ]);
        session.normalize_channel(0).unwrap();
        let a = session.channel(0).unwrap();
        assert_eq!(a.data, vec![0.0, 0.5, 1.0]);
        assert_eq!((a.physical_min, a.physical_max), (0.0, 1.0));

        session.remove_dc(1).unwrap();
        let b = session.channel(1).unwrap();
        assert_eq!(b.data, vec![-1.0, 0.0, 1.0]);
        assert_eq!((b.physical_min, b.physical_max), (-1006.0, 994.0));
    }

    #[test]
    fn test_events_emitted() {
        let mut session = EegSession::default();
        let events = recorder(&mut session);

        session.add_channel(Channel::new("A", 250.0, vec![1.0; 4]));
        session.add_channel(Channel::new("B", 250.0, vec![2.0; 4]));
        session.apply_gain(1, 3.0).unwrap();
        session.remove_channel(0).unwrap();

        assert_eq!(
            *events.borrow(),
            vec![
                SessionEvent::ChannelAdded(0),
                SessionEvent::ChannelCountChanged(1),
                SessionEvent::ChannelAdded(1),
                SessionEvent::ChannelCountChanged(2),
                SessionEvent::DataChanged,
                SessionEvent::ChannelRemoved(0),
                SessionEvent::ChannelCountChanged(1),
            ]
        );
    }

    #[test]
    fn test_invalid_filter_parameters_leave_channel() {
        let data: Vec<f64> = (0..64).map(|i| (i as f64 * 0.3).sin()).collect();
        let mut session = session_with(vec![Channel::new("A", 250.0, data.clone())]);
        let events = recorder(&mut session);

        let err = session.apply_filter(0, 40.0, 10.0).unwrap_err();
        assert!(matches!(err, EegError::InvalidFilterParameters(_)));
        assert_eq!(session.channel(0).unwrap().data, data);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_notch_uses_configured_frequency() {
        let data: Vec<f64> = (0..500)
            .map(|i| (2.0 * std::f64::consts::PI * 50.0 * i as f64 / 250.0).sin())
            .collect();
        let mut session = session_with(vec![Channel::new("A", 250.0, data)]);
        session.apply_notch(0, None).unwrap();
        let tail = &session.channel(0).unwrap().data[100..];
        assert!(tail.iter().all(|x| x.abs() < 0.01));
    }

    #[test]
    fn test_bipolar_montage_changes_count() {
        let mut session = session_with(vec![
            Channel::new("Fp1", 250.0, vec![3.0]),
            Channel::new("F7", 250.0, vec![1.0]),
            Channel::new("T3", 250.0, vec![0.5]),
            Channel::new("Cz", 250.0, vec![0.0]),
        ]);
        let events = recorder(&mut session);

        let report = session.apply_montage(MontageKind::Bipolar).unwrap();
        assert_eq!(report.channels_out, 2);
        assert_eq!(session.channel_count(), 2);
        assert_eq!(session.recording().labels(), vec!["Fp1-F7", "F7-T3"]);
        assert_eq!(
            *events.borrow(),
            vec![
                SessionEvent::ChannelCountChanged(2),
                SessionEvent::DataChanged
            ]
        );
    }

    #[test]
    fn test_laplacian_too_few_channels_is_noop() {
        let mut session = session_with(vec![
            Channel::new("A", 250.0, vec![1.0]),
            Channel::new("B", 250.0, vec![2.0]),
        ]);
        let report = session.apply_montage(MontageKind::Laplacian).unwrap();
        assert!(!report.applied);
        assert_eq!(session.channel(0).unwrap().data, vec![1.0]);
    }

    #[test]
    fn test_derived_statistics() {
        let session = session_with(vec![
            Channel::new("A", 250.0, vec![1.0, 3.0]),
            Channel::new("B", 250.0, vec![]),
        ]);
        assert_eq!(session.means(), vec![2.0, 0.0]);
        assert_eq!(session.std_devs(), vec![1.0, 0.0]);
        assert_eq!(session.channel_stats()[1].samples, 0);
    }

    #[test]
    fn test_windowed_power_spectrum() {
        let data: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let session = session_with(vec![Channel::new("A", 250.0, data)]);

        let window = TimeWindow {
            start: 1.0,
            duration: 1.0,
        };
        // 251 samples (inclusive end) -> 126 bins
        assert_eq!(session.power_spectrum(0, Some(window)).unwrap().len(), 126);
        assert_eq!(session.power_spectrum(0, None).unwrap().len(), 501);
        assert_eq!(session.time_series(0, 1.0, 1.0).unwrap().len(), 251);
    }

    #[test]
    fn test_spectrogram_defaults_from_config() {
        let session = session_with(vec![Channel::new("A", 250.0, vec![0.5; 1000])]);
        let spec = session
            .spectrogram(0, None, None, &CancellationToken::new())
            .unwrap();
        assert_eq!(spec.num_windows(), 12);
        assert_eq!(spec.num_bins(), 129);
    }
}
