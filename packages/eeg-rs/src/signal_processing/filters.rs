//! Digital Filter Implementations
//!
//! IIR filters built from second-order sections (biquads):
//! - 4th-order Butterworth bandpass, designed once per parameter set and
//!   applied forward and backward for zero phase
//! - single-biquad powerline notch

use crate::error::{EegError, Result};
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

/// Order of the lowpass prototype used for bandpass design
pub const BANDPASS_ORDER: usize = 4;

/// Second-order section (biquad) coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Complex frequency response at normalised angular frequency `w` (rad/sample)
    fn response(&self, w: f64) -> Complex<f64> {
        let z1 = Complex::from_polar(1.0, -w);
        let z2 = z1 * z1;
        (self.b0 + z1 * self.b1 + z2 * self.b2) / (1.0 + z1 * self.a1 + z2 * self.a2)
    }
}

/// State for a single biquad section (Direct Form II Transposed)
#[derive(Debug, Clone, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }

    /// Process a single sample using Direct Form II Transposed
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.state = BiquadState::default();
    }
}

/// Cascaded second-order sections filter
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<BiquadFilter>,
    gain: f64,
}

impl SosFilter {
    pub fn new(sections: Vec<BiquadCoeffs>, gain: f64) -> Self {
        Self {
            sections: sections.into_iter().map(BiquadFilter::new).collect(),
            gain,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let mut output = input * self.gain;
        for section in &mut self.sections {
            output = section.process(output);
        }
        output
    }

    /// Process an entire signal in place
    pub fn process_signal(&mut self, signal: &mut [f64]) {
        for sample in signal.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    /// Magnitude response at `freq` Hz
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let response = self
            .sections
            .iter()
            .fold(Complex::new(self.gain, 0.0), |acc, s| acc * s.coeffs.response(w));
        response.norm()
    }

    /// Filter forward, then backward over the reversed signal.
    ///
    /// The two passes cancel each other's phase shift; the magnitude response
    /// is squared. State is cleared before each pass.
    pub fn filter_zero_phase(&mut self, signal: &mut [f64]) {
        self.reset();
        self.process_signal(signal);
        signal.reverse();
        self.reset();
        self.process_signal(signal);
        signal.reverse();
    }
}

/// Butterworth filter designer
pub struct ButterworthFilter;

impl ButterworthFilter {
    /// Design a Butterworth bandpass from an `order`-pole lowpass prototype.
    ///
    /// Each prototype pole is mapped through the lowpass-to-bandpass
    /// substitution and then the bilinear transform, giving `order` biquads
    /// with zeros at z = 1 and z = -1. Gain is normalised to unity at the
    /// geometric band centre. `order` must be even.
    pub fn bandpass(low: f64, high: f64, sample_rate: f64, order: usize) -> SosFilter {
        let wl = Self::prewarp(low, sample_rate);
        let wh = Self::prewarp(high, sample_rate);
        let bandwidth = wh - wl;
        let w0_sq = wl * wh;

        let mut sections = Vec::with_capacity(order);
        // Upper-half-plane prototype poles; their conjugates are implied by
        // building real sections from conjugate pole pairs.
        for k in 0..order / 2 {
            let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            let proto = Complex::from_polar(1.0, theta);

            let pb = proto * bandwidth;
            let disc = (pb * pb - 4.0 * w0_sq).sqrt();
            for s in [(pb + disc) / 2.0, (pb - disc) / 2.0] {
                let z = (1.0 + s) / (1.0 - s);
                sections.push(BiquadCoeffs {
                    b0: 1.0,
                    b1: 0.0,
                    b2: -1.0,
                    a1: -2.0 * z.re,
                    a2: z.norm_sqr(),
                });
            }
        }

        let mut filter = SosFilter::new(sections, 1.0);
        let centre = 2.0 * w0_sq.sqrt().atan() * sample_rate / (2.0 * PI);
        let magnitude = filter.magnitude_at(centre, sample_rate);
        if magnitude > 0.0 && magnitude.is_finite() {
            filter.gain = 1.0 / magnitude;
        }
        filter
    }

    /// Prewarp frequency for bilinear transform
    fn prewarp(freq: f64, sample_rate: f64) -> f64 {
        (PI * freq / sample_rate).tan()
    }
}

/// Validate bandpass edges against the sampling rate
pub fn validate_band(sample_rate: f64, low: f64, high: f64) -> Result<()> {
    let nyquist = sample_rate / 2.0;
    if !(sample_rate > 0.0) {
        return Err(EegError::InvalidFilterParameters(format!(
            "Sampling rate must be positive, got {} Hz",
            sample_rate
        )));
    }
    if !(low > 0.0) {
        return Err(EegError::InvalidFilterParameters(format!(
            "Low cutoff ({} Hz) must be positive",
            low
        )));
    }
    if !(high > low) {
        return Err(EegError::InvalidFilterParameters(format!(
            "High cutoff ({} Hz) must exceed low cutoff ({} Hz)",
            high, low
        )));
    }
    if high >= nyquist {
        return Err(EegError::InvalidFilterParameters(format!(
            "High cutoff ({} Hz) must be less than Nyquist ({} Hz)",
            high, nyquist
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BandKey {
    sample_rate: f64,
    low: f64,
    high: f64,
}

/// Zero-phase Butterworth bandpass with a one-entry design cache.
///
/// Owned by whoever filters repeatedly; coefficients are only recomputed when
/// the (sample rate, low, high) triple differs from the previous call.
#[derive(Debug, Clone, Default)]
pub struct BandpassFilter {
    design: Option<(BandKey, SosFilter)>,
    designs_computed: usize,
}

impl BandpassFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of coefficient designs performed so far
    pub fn designs_computed(&self) -> usize {
        self.designs_computed
    }

    fn design(&mut self, sample_rate: f64, low: f64, high: f64) -> &mut SosFilter {
        let key = BandKey {
            sample_rate,
            low,
            high,
        };
        if !matches!(&self.design, Some((cached, _)) if *cached == key) {
            log::debug!(
                "Designing bandpass {}-{} Hz at {} Hz",
                low,
                high,
                sample_rate
            );
            self.design = None;
            self.designs_computed += 1;
        }
        let (_, filter) = self.design.get_or_insert_with(|| {
            (
                key,
                ButterworthFilter::bandpass(low, high, sample_rate, BANDPASS_ORDER),
            )
        });
        filter
    }

    /// Bandpass `data` in place with zero phase.
    ///
    /// Invalid edges leave the buffer untouched and return
    /// `InvalidFilterParameters`.
    pub fn apply(&mut self, data: &mut [f64], sample_rate: f64, low: f64, high: f64) -> Result<()> {
        if let Err(e) = validate_band(sample_rate, low, high) {
            log::warn!("Bandpass skipped: {}", e);
            return Err(e);
        }
        if data.is_empty() {
            return Ok(());
        }
        self.design(sample_rate, low, high).filter_zero_phase(data);
        Ok(())
    }
}

/// Notch (band-reject) filter for powerline interference
pub struct NotchFilter;

impl NotchFilter {
    /// Biquad coefficients for a notch at `freq` Hz, before normalisation by a0.
    /// Returned as (b, a) with a = [a0, a1, a2].
    pub fn coefficients(freq: f64, sample_rate: f64) -> ([f64; 3], [f64; 3]) {
        let w0 = 2.0 * PI * freq / sample_rate;
        let alpha = w0.sin() / 2.0;
        let cos_w0 = w0.cos();
        (
            [1.0, -2.0 * cos_w0, 1.0],
            [1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha],
        )
    }

    /// Apply the notch in place.
    ///
    /// The first two outputs are copied from the input rather than solved
    /// from initial conditions; the difference equation runs from index 2.
    /// Buffers shorter than four samples are left unchanged.
    pub fn apply(data: &mut [f64], sample_rate: f64, freq: f64) -> Result<()> {
        if !(sample_rate > 0.0) || !(freq > 0.0) || freq >= sample_rate / 2.0 {
            let e = EegError::InvalidFilterParameters(format!(
                "Notch frequency ({} Hz) must lie in (0, {} Hz)",
                freq,
                sample_rate / 2.0
            ));
            log::warn!("Notch skipped: {}", e);
            return Err(e);
        }
        if data.len() < 4 {
            return Ok(());
        }

        let ([b0, b1, b2], [a0, a1, a2]) = Self::coefficients(freq, sample_rate);

        let mut y = vec![0.0; data.len()];
        y[0] = data[0];
        y[1] = data[1];
        for i in 2..data.len() {
            y[i] = (b0 * data[i] + b1 * data[i - 1] + b2 * data[i - 2]
                - a1 * y[i - 1]
                - a2 * y[i - 2])
                / a0;
        }

        data.copy_from_slice(&y);
        Ok(())
    }
}
