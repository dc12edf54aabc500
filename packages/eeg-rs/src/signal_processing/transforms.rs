//! Elementwise channel transforms

use super::stats;

pub fn apply_gain(data: &mut [f64], gain: f64) {
    for x in data.iter_mut() {
        *x *= gain;
    }
}

pub fn apply_offset(data: &mut [f64], offset: f64) {
    for x in data.iter_mut() {
        *x += offset;
    }
}

/// Linearly rescale `data` so its minimum maps to `lo` and its maximum to `hi`.
///
/// A constant (or empty) buffer has no range to stretch and is left as is;
/// returns false in that case.
pub fn normalize(data: &mut [f64], lo: f64, hi: f64) -> bool {
    let (min, max) = match (stats::min_value(data), stats::max_value(data)) {
        (Some(min), Some(max)) => (min, max),
        _ => return false,
    };
    let range = max - min;
    if range <= 0.0 {
        return false;
    }

    let scale = (hi - lo) / range;
    for x in data.iter_mut() {
        *x = lo + (*x - min) * scale;
    }
    true
}

/// Subtract the mean from every sample. Returns the mean that was removed.
pub fn remove_dc(data: &mut [f64]) -> f64 {
    let mean = stats::mean(data);
    apply_offset(data, -mean);
    mean
}
