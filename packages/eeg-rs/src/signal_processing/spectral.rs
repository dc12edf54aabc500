//! Frequency-domain analysis: magnitude spectrum, EEG band power and
//! short-time Fourier spectrogram.

use crate::error::{EegError, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Power below this threshold is reported at the decibel floor
pub const POWER_FLOOR: f64 = 1e-10;
pub const DB_FLOOR: f64 = -100.0;

/// Named EEG bands as half-open [low, high) ranges in Hz
pub const BANDS: [(&str, f64, f64); 5] = [
    ("delta", 0.5, 4.0),
    ("theta", 4.0, 8.0),
    ("alpha", 8.0, 13.0),
    ("beta", 13.0, 30.0),
    ("gamma", 30.0, 100.0),
];

/// Planned FFT plus its buffers, sized for one transform length.
///
/// Buffers are owned and freed when the workspace goes out of scope,
/// including on early return.
pub struct FftWorkspace {
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl FftWorkspace {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(len);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            buffer: vec![Complex::new(0.0, 0.0); len],
            scratch,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Forward transform of real input; `input` is truncated or zero-filled to
    /// the workspace length.
    pub fn transform<I>(&mut self, input: I) -> &[Complex<f64>]
    where
        I: IntoIterator<Item = f64>,
    {
        self.buffer.fill(Complex::new(0.0, 0.0));
        for (slot, x) in self.buffer.iter_mut().zip(input) {
            slot.re = x;
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        &self.buffer
    }
}

/// Magnitude spectrum `|X[k]| / N` for k in 0..=N/2.
///
/// Full-length transform with no window and no zero padding. Empty input or a
/// non-positive rate yields an empty spectrum.
pub fn power_spectrum(data: &[f64], sampling_rate: f64) -> Vec<f64> {
    if data.is_empty() || sampling_rate <= 0.0 {
        return Vec::new();
    }
    let n = data.len();
    let mut workspace = FftWorkspace::new(n);
    let spectrum = workspace.transform(data.iter().copied());
    spectrum[..=n / 2]
        .iter()
        .map(|c| c.norm() / n as f64)
        .collect()
}

/// Frequency of each bin of a spectrum of `spectrum_len` values:
/// `i * fs / (2 * spectrum_len)`
pub fn spectrum_frequencies(spectrum_len: usize, sampling_rate: f64) -> Vec<f64> {
    if spectrum_len == 0 {
        return Vec::new();
    }
    let resolution = sampling_rate / (2.0 * spectrum_len as f64);
    (0..spectrum_len).map(|i| i as f64 * resolution).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandPower {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl BandPower {
    pub fn total(&self) -> f64 {
        self.delta + self.theta + self.alpha + self.beta + self.gamma
    }

    /// (name, power) pairs in band order
    pub fn as_pairs(&self) -> [(&'static str, f64); 5] {
        [
            ("delta", self.delta),
            ("theta", self.theta),
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("gamma", self.gamma),
        ]
    }

    /// Name of the band holding the most power
    pub fn dominant(&self) -> &'static str {
        self.as_pairs()
            .into_iter()
            .fold(("delta", f64::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            })
            .0
    }

    fn slot(&mut self, freq: f64) -> Option<&mut f64> {
        let idx = BANDS
            .iter()
            .position(|&(_, lo, hi)| freq >= lo && freq < hi)?;
        Some(match idx {
            0 => &mut self.delta,
            1 => &mut self.theta,
            2 => &mut self.alpha,
            3 => &mut self.beta,
            _ => &mut self.gamma,
        })
    }
}

/// Sum of squared spectrum magnitudes within each EEG band
pub fn band_power(data: &[f64], sampling_rate: f64) -> BandPower {
    let mut power = BandPower::default();
    let spectrum = power_spectrum(data, sampling_rate);
    let freqs = spectrum_frequencies(spectrum.len(), sampling_rate);

    for (magnitude, freq) in spectrum.iter().zip(freqs) {
        if let Some(slot) = power.slot(freq) {
            *slot += magnitude * magnitude;
        }
    }
    power
}

/// Hann window `0.5 * (1 - cos(2*pi*i / (len - 1)))`
pub fn hann_window(len: usize) -> Vec<f64> {
    if len < 2 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (len - 1) as f64).cos()))
        .collect()
}

/// Short-time power spectrum in decibels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrogram {
    pub window: usize,
    pub hop: usize,
    pub sampling_rate: f64,
    /// Start time of each window in seconds
    pub times: Vec<f64>,
    /// Bin frequencies in Hz, `k * fs / window`
    pub frequencies: Vec<f64>,
    /// `power_db[t][k]`: window `t`, bin `k`
    pub power_db: Vec<Vec<f64>>,
}

impl Spectrogram {
    pub fn num_windows(&self) -> usize {
        self.power_db.len()
    }

    pub fn num_bins(&self) -> usize {
        self.window / 2 + 1
    }
}

/// Number of full windows of `window` samples stepping by `hop`
pub fn window_count(len: usize, window: usize, hop: usize) -> usize {
    if window == 0 || hop == 0 || len < window {
        return 0;
    }
    (len - window) / hop + 1
}

/// Hann-windowed short-time FFT.
///
/// Cancellation is checked before each window; a cancelled run returns
/// `CancelledOperation` and no partial matrix.
pub fn spectrogram(
    data: &[f64],
    sampling_rate: f64,
    window: usize,
    hop: usize,
    cancel: &CancellationToken,
) -> Result<Spectrogram> {
    if window < 2 || hop == 0 {
        return Err(EegError::InvalidSpectrogramParameters(format!(
            "window ({}) must be >= 2 and hop ({}) >= 1",
            window, hop
        )));
    }
    let num_windows = window_count(data.len(), window, hop);
    if num_windows < 1 {
        return Err(EegError::InsufficientDataForSpectrogram {
            samples: data.len(),
            window,
        });
    }

    let taper = hann_window(window);
    let taper_sum: f64 = taper.iter().sum();
    let norm = taper_sum * taper_sum;
    let num_bins = window / 2 + 1;

    let mut workspace = FftWorkspace::new(window);
    let mut power_db = Vec::with_capacity(num_windows);

    for w in 0..num_windows {
        if cancel.is_cancelled() {
            log::info!("Spectrogram cancelled after {} of {} windows", w, num_windows);
            return Err(EegError::CancelledOperation);
        }

        let start = w * hop;
        let segment = data[start..start + window]
            .iter()
            .zip(&taper)
            .map(|(x, t)| x * t);
        let spectrum = workspace.transform(segment);

        let row = spectrum[..num_bins]
            .iter()
            .map(|c| {
                let power = c.norm_sqr() / norm;
                if power > POWER_FLOOR {
                    10.0 * power.log10()
                } else {
                    DB_FLOOR
                }
            })
            .collect();
        power_db.push(row);
    }

    log::debug!(
        "Spectrogram: {} windows x {} bins (window {}, hop {})",
        num_windows,
        num_bins,
        window,
        hop
    );

    Ok(Spectrogram {
        window,
        hop,
        sampling_rate,
        times: (0..num_windows)
            .map(|w| (w * hop) as f64 / sampling_rate)
            .collect(),
        frequencies: (0..num_bins)
            .map(|k| k as f64 * sampling_rate / window as f64)
            .collect(),
        power_db,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_power_spectrum_length_and_dc() {
        let spectrum = power_spectrum(&[2.0; 8], 250.0);
        assert_eq!(spectrum.len(), 5);
        assert!((spectrum[0] - 2.0).abs() < 1e-12);
        assert!(spectrum[1..].iter().all(|&m| m.abs() < 1e-12));
    }

    #[test]
    fn test_power_spectrum_empty() {
        assert!(power_spectrum(&[], 250.0).is_empty());
        assert!(power_spectrum(&[1.0, 2.0], 0.0).is_empty());
    }

    #[test]
    fn test_power_spectrum_sine_peak() {
        let spectrum = power_spectrum(&sine(10.0, 250.0, 1000), 250.0);
        assert_eq!(spectrum.len(), 501);
        let peak = spectrum
            .iter()
            .enumerate()
            .fold((0, 0.0), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
        assert_eq!(peak.0, 40);
        assert!((peak.1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_spectrum_frequencies() {
        let freqs = spectrum_frequencies(5, 250.0);
        assert_eq!(freqs.len(), 5);
        assert_eq!(freqs[0], 0.0);
        assert_eq!(freqs[1], 25.0);
        assert!(spectrum_frequencies(0, 250.0).is_empty());
    }

    #[test]
    fn test_band_power_alpha_dominates_for_10hz() {
        let power = band_power(&sine(10.0, 250.0, 1000), 250.0);
        assert_eq!(power.dominant(), "alpha");
        assert!(power.alpha > 100.0 * (power.delta + power.theta + power.beta + power.gamma));
    }

    #[test]
    fn test_band_power_excludes_dc() {
        let power = band_power(&[5.0; 256], 250.0);
        assert!(power.total() < 1e-20);
    }

    #[test]
    fn test_hann_window() {
        let w = hann_window(5);
        assert_eq!(w[0], 0.0);
        assert!((w[2] - 1.0).abs() < 1e-12);
        assert!(w[4].abs() < 1e-12);
    }

    #[test]
    fn test_spectrogram_dimensions() {
        let data = sine(10.0, 250.0, 1000);
        let spec = spectrogram(&data, 250.0, 256, 64, &CancellationToken::new()).unwrap();
        assert_eq!(spec.num_windows(), 12);
        assert!(spec.power_db.iter().all(|row| row.len() == 129));
        assert_eq!(spec.frequencies.len(), 129);
        assert_eq!(spec.times.len(), 12);
        assert_eq!(spec.times[1], 64.0 / 250.0);
    }

    #[test]
    fn test_spectrogram_silence_hits_floor() {
        let spec = spectrogram(&[0.0; 300], 250.0, 256, 64, &CancellationToken::new()).unwrap();
        assert!(spec
            .power_db
            .iter()
            .flatten()
            .all(|&db| db == DB_FLOOR));
    }

    #[test]
    fn test_spectrogram_peak_bin() {
        // 31.25 Hz sits exactly on bin 32 for a 256-sample window at 250 Hz
        let data = sine(31.25, 250.0, 512);
        let spec = spectrogram(&data, 250.0, 256, 128, &CancellationToken::new()).unwrap();
        let row = &spec.power_db[0];
        let peak = row
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert_eq!(peak.0, 32);
    }

    #[test]
    fn test_spectrogram_insufficient_data() {
        let err = spectrogram(&[0.0; 100], 250.0, 256, 64, &CancellationToken::new()).unwrap_err();
        assert!(matches!(
            err,
            EegError::InsufficientDataForSpectrogram {
                samples: 100,
                window: 256
            }
        ));
    }

    #[test]
    fn test_spectrogram_rejects_degenerate_window_and_hop() {
        let cancel = CancellationToken::new();
        for (window, hop) in [(1, 64), (256, 0)] {
            let err = spectrogram(&[0.0; 1000], 250.0, window, hop, &cancel).unwrap_err();
            assert!(matches!(err, EegError::InvalidSpectrogramParameters(_)));
            assert!(err.to_string().starts_with("Invalid spectrogram parameters"));
        }
    }

    #[test]
    fn test_spectrogram_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = spectrogram(&[0.0; 1000], 250.0, 256, 64, &cancel).unwrap_err();
        assert!(matches!(err, EegError::CancelledOperation));
    }

    #[test]
    fn test_window_count() {
        assert_eq!(window_count(1000, 256, 64), 12);
        assert_eq!(window_count(256, 256, 64), 1);
        assert_eq!(window_count(255, 256, 64), 0);
    }
}
