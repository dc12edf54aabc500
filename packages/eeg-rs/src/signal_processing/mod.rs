//! Signal Processing Module
//!
//! Numerical transforms over channel sample buffers:
//! - elementwise gain, offset, normalisation and DC removal
//! - zero-phase Butterworth bandpass and powerline notch filters
//! - re-referencing montages (average, bipolar, Laplacian)
//! - magnitude spectrum, band power and spectrogram
//! - descriptive statistics
//!
//! Filters use second-order sections (biquads) for numerical stability.

pub mod filters;
pub mod montage;
pub mod spectral;
pub mod stats;
pub mod transforms;

pub use filters::{BandpassFilter, BiquadCoeffs, ButterworthFilter, NotchFilter, SosFilter};
pub use montage::{MontageKind, MontageReport, PairingStrategy};
pub use spectral::{BandPower, FftWorkspace, Spectrogram};
pub use stats::ChannelStats;
