//! Re-referencing montages
//!
//! Every montage reads the full channel set and produces a complete
//! replacement set; callers swap it in as a whole. Output buffers never
//! contain NaN or infinity: such values are replaced with 0.0 and counted in
//! the returned [`MontageReport`].

use crate::types::Channel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Anterior-posterior chains of the 10-20 system, left, right, then midline
pub const CANONICAL_BIPOLAR_PAIRS: [(&str, &str); 10] = [
    ("Fp1", "F7"),
    ("F7", "T3"),
    ("T3", "T5"),
    ("T5", "O1"),
    ("Fp2", "F8"),
    ("F8", "T4"),
    ("T4", "T6"),
    ("T6", "O2"),
    ("Fz", "Cz"),
    ("Cz", "Pz"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MontageKind {
    AverageReference,
    Bipolar,
    Laplacian,
}

impl MontageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MontageKind::AverageReference => "average",
            MontageKind::Bipolar => "bipolar",
            MontageKind::Laplacian => "laplacian",
        }
    }
}

impl fmt::Display for MontageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MontageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "average" | "average_reference" | "car" => Ok(MontageKind::AverageReference),
            "bipolar" => Ok(MontageKind::Bipolar),
            "laplacian" => Ok(MontageKind::Laplacian),
            other => Err(format!(
                "Unknown montage '{}' (expected average, bipolar or laplacian)",
                other
            )),
        }
    }
}

/// How bipolar pairs were resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingStrategy {
    Canonical,
    PrefixGroups,
    Consecutive,
}

/// Outcome of a montage application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MontageReport {
    pub kind: MontageKind,
    /// False when the input could not support the montage; the channel set
    /// is then left unchanged
    pub applied: bool,
    pub channels_in: usize,
    pub channels_out: usize,
    /// Non-finite values replaced with 0.0 (inputs and results)
    pub sanitized_values: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing: Option<PairingStrategy>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub pairs: Vec<(usize, usize)>,
}

impl MontageReport {
    fn skipped(kind: MontageKind, channels: usize) -> Self {
        Self {
            kind,
            applied: false,
            channels_in: channels,
            channels_out: channels,
            sanitized_values: 0,
            pairing: None,
            pairs: Vec::new(),
        }
    }
}

/// Compute the montage of `channels`.
///
/// Returns the replacement channel set, or `None` when the montage is not
/// applicable (for example Laplacian with fewer than three channels).
pub fn apply(kind: MontageKind, channels: &[Channel]) -> (Option<Vec<Channel>>, MontageReport) {
    let (output, report) = match kind {
        MontageKind::AverageReference => average_reference(channels),
        MontageKind::Bipolar => bipolar(channels),
        MontageKind::Laplacian => laplacian(channels),
    };

    if report.sanitized_values > 0 {
        log::warn!(
            "{} montage replaced {} non-finite values with 0",
            kind,
            report.sanitized_values
        );
    }
    if !report.applied {
        log::warn!(
            "{} montage not applicable to {} channels; left unchanged",
            kind,
            channels.len()
        );
    }
    (output, report)
}

/// Replace a non-finite value with 0.0, counting the replacement
#[inline]
fn sanitize(value: f64, count: &mut usize) -> f64 {
    if value.is_finite() {
        value
    } else {
        *count += 1;
        0.0
    }
}

fn average_reference(channels: &[Channel]) -> (Option<Vec<Channel>>, MontageReport) {
    let kind = MontageKind::AverageReference;
    if channels.is_empty() {
        return (None, MontageReport::skipped(kind, 0));
    }

    let mut sanitized = 0usize;
    let mut output: Vec<Channel> = channels.to_vec();
    let max_samples = channels.iter().map(|c| c.data.len()).max().unwrap_or(0);

    for s in 0..max_samples {
        let mut sum = 0.0;
        let mut count = 0usize;
        for channel in output.iter_mut() {
            if let Some(x) = channel.data.get_mut(s) {
                if x.is_finite() {
                    sum += *x;
                    count += 1;
                } else {
                    *x = 0.0;
                    sanitized += 1;
                }
            }
        }

        let mean = if count > 0 { sum / count as f64 } else { 0.0 };
        for channel in output.iter_mut() {
            if let Some(x) = channel.data.get_mut(s) {
                *x = sanitize(*x - mean, &mut sanitized);
            }
        }
    }

    let report = MontageReport {
        kind,
        applied: true,
        channels_in: channels.len(),
        channels_out: output.len(),
        sanitized_values: sanitized,
        pairing: None,
        pairs: Vec::new(),
    };
    (Some(output), report)
}

/// First channel whose label contains `name`, ignoring case
pub fn find_channel_index(channels: &[Channel], name: &str) -> Option<usize> {
    let needle = name.to_lowercase();
    channels
        .iter()
        .position(|c| c.label.to_lowercase().contains(&needle))
}

fn canonical_pairs(channels: &[Channel]) -> Vec<(usize, usize)> {
    CANONICAL_BIPOLAR_PAIRS
        .iter()
        .filter_map(|(a, b)| {
            let i1 = find_channel_index(channels, a)?;
            let i2 = find_channel_index(channels, b)?;
            (i1 != i2).then_some((i1, i2))
        })
        .collect()
}

/// Split a label into its alphabetic prefix (digits removed, upper-cased)
/// and the last run of digits in it, so `EEG C3-REF` gives `EEG C-REF` and 3
fn prefix_and_suffix(label: &str) -> (String, Option<u32>) {
    let label = label.trim();
    let prefix: String = label
        .chars()
        .filter(|c| !c.is_ascii_digit())
        .collect::<String>()
        .to_uppercase();
    let digits: String = label
        .chars()
        .rev()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    (prefix, digits.parse().ok())
}

/// Pair odd-numbered with even-numbered members of each prefix group, in
/// order of appearance (C3 with C4, P3 with P4, ...)
fn prefix_group_pairs(channels: &[Channel]) -> Vec<(usize, usize)> {
    let mut groups: Vec<(String, Vec<usize>, Vec<usize>)> = Vec::new();

    for (idx, channel) in channels.iter().enumerate() {
        let (prefix, suffix) = prefix_and_suffix(&channel.label);
        let Some(n) = suffix else { continue };
        if prefix.is_empty() {
            continue;
        }

        let group = match groups.iter().position(|(p, _, _)| *p == prefix) {
            Some(pos) => &mut groups[pos],
            None => {
                groups.push((prefix, Vec::new(), Vec::new()));
                let last = groups.len() - 1;
                &mut groups[last]
            }
        };
        if n % 2 == 1 {
            group.1.push(idx);
        } else {
            group.2.push(idx);
        }
    }

    groups
        .into_iter()
        .flat_map(|(_, odd, even)| odd.into_iter().zip(even))
        .collect()
}

fn consecutive_pairs(count: usize) -> Vec<(usize, usize)> {
    (1..count).map(|i| (i - 1, i)).collect()
}

fn bipolar(channels: &[Channel]) -> (Option<Vec<Channel>>, MontageReport) {
    let kind = MontageKind::Bipolar;

    let mut pairing = PairingStrategy::Canonical;
    let mut pairs = canonical_pairs(channels);
    if pairs.is_empty() {
        pairing = PairingStrategy::PrefixGroups;
        pairs = prefix_group_pairs(channels);
    }
    if pairs.is_empty() {
        pairing = PairingStrategy::Consecutive;
        pairs = consecutive_pairs(channels.len());
    }
    if pairs.is_empty() {
        return (None, MontageReport::skipped(kind, channels.len()));
    }
    log::debug!("Bipolar pairing {:?}: {:?}", pairing, pairs);

    let mut sanitized = 0usize;
    let output: Vec<Channel> = pairs
        .iter()
        .map(|&(i1, i2)| {
            let (a, b) = (&channels[i1], &channels[i2]);
            let data = a
                .data
                .iter()
                .zip(&b.data)
                .map(|(&x, &y)| {
                    let x = sanitize(x, &mut sanitized);
                    let y = sanitize(y, &mut sanitized);
                    sanitize(x - y, &mut sanitized)
                })
                .collect();
            Channel {
                label: format!("{}-{}", a.label, b.label),
                data,
                ..a.clone()
            }
        })
        .collect();

    let report = MontageReport {
        kind,
        applied: true,
        channels_in: channels.len(),
        channels_out: output.len(),
        sanitized_values: sanitized,
        pairing: Some(pairing),
        pairs,
    };
    (Some(output), report)
}

fn laplacian(channels: &[Channel]) -> (Option<Vec<Channel>>, MontageReport) {
    let kind = MontageKind::Laplacian;
    if channels.len() < 3 {
        return (None, MontageReport::skipped(kind, channels.len()));
    }

    let mut sanitized = 0usize;
    let clean: Vec<Vec<f64>> = channels
        .iter()
        .map(|c| c.data.iter().map(|&x| sanitize(x, &mut sanitized)).collect())
        .collect();

    let last = channels.len() - 1;
    let output: Vec<Channel> = channels
        .iter()
        .enumerate()
        .map(|(ch, channel)| {
            let data = clean[ch]
                .iter()
                .enumerate()
                .map(|(s, &x)| {
                    let neighbours = [ch.checked_sub(1), (ch < last).then_some(ch + 1)];
                    let (sum, count) = neighbours
                        .iter()
                        .flatten()
                        .filter_map(|&n| clean[n].get(s))
                        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
                    if count > 0 {
                        sanitize(x - sum / count as f64, &mut sanitized)
                    } else {
                        x
                    }
                })
                .collect();
            Channel {
                data,
                ..channel.clone()
            }
        })
        .collect();

    let report = MontageReport {
        kind,
        applied: true,
        channels_in: channels.len(),
        channels_out: output.len(),
        sanitized_values: sanitized,
        pairing: None,
        pairs: Vec::new(),
    };
    (Some(output), report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels(specs: &[(&str, Vec<f64>)]) -> Vec<Channel> {
        specs
            .iter()
            .map(|(label, data)| Channel::new(*label, 250.0, data.clone()))
            .collect()
    }

    #[test]
    fn test_parse_montage_kind() {
        assert_eq!("Bipolar".parse::<MontageKind>(), Ok(MontageKind::Bipolar));
        assert_eq!(
            "average".parse::<MontageKind>(),
            Ok(MontageKind::AverageReference)
        );
        assert_eq!("laplacian".parse::<MontageKind>(), Ok(MontageKind::Laplacian));
        assert!("hjorth".parse::<MontageKind>().is_err());
    }

    #[test]
    fn test_average_reference_sums_to_zero() {
        let input = channels(&[
            ("A", vec![1.0, 5.0, -3.0, 2.5]),
            ("B", vec![4.0, -2.0, 8.0, 0.0]),
            ("C", vec![-7.0, 3.0, 1.0, 9.5]),
        ]);
        let (output, report) = apply(MontageKind::AverageReference, &input);
        let output = output.unwrap();

        assert!(report.applied);
        assert_eq!(report.sanitized_values, 0);
        for s in 0..4 {
            let sum: f64 = output.iter().map(|c| c.data[s]).sum();
            assert!(sum.abs() < 1e-12, "sample {} sums to {}", s, sum);
        }
    }

    #[test]
    fn test_average_reference_sanitizes_non_finite() {
        let input = channels(&[
            ("A", vec![f64::NAN, 2.0]),
            ("B", vec![4.0, f64::INFINITY]),
            ("C", vec![2.0, 4.0]),
        ]);
        let (output, report) = apply(MontageKind::AverageReference, &input);
        let output = output.unwrap();

        assert_eq!(report.sanitized_values, 2);
        // Sample 0: finite mean is 3.0, NaN input zeroed
        assert_eq!(output[0].data[0], -3.0);
        assert_eq!(output[1].data[0], 1.0);
        assert_eq!(output[2].data[0], -1.0);
        assert!(output.iter().all(|c| c.data.iter().all(|x| x.is_finite())));
    }

    #[test]
    fn test_bipolar_canonical_chain() {
        let input = channels(&[
            ("EEG Fp1-REF", vec![10.0, 10.0]),
            ("EEG F7-REF", vec![4.0, 6.0]),
            ("EEG T3-REF", vec![1.0, 1.0]),
            ("EEG Cz-REF", vec![0.0, 0.0]),
        ]);
        let (output, report) = apply(MontageKind::Bipolar, &input);
        let output = output.unwrap();

        assert_eq!(report.pairing, Some(PairingStrategy::Canonical));
        assert_eq!(report.pairs, vec![(0, 1), (1, 2)]);
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].label, "EEG Fp1-REF-EEG F7-REF");
        assert_eq!(output[0].data, vec![6.0, 4.0]);
        assert_eq!(output[1].data, vec![3.0, 5.0]);
    }

    #[test]
    fn test_bipolar_prefix_group_fallback() {
        let input = channels(&[
            ("C3", vec![5.0]),
            ("P3", vec![7.0]),
            ("C4", vec![1.0]),
            ("Oz", vec![0.0]),
            ("P4", vec![2.0]),
        ]);
        let (output, report) = apply(MontageKind::Bipolar, &input);
        let output = output.unwrap();

        assert_eq!(report.pairing, Some(PairingStrategy::PrefixGroups));
        assert_eq!(report.pairs, vec![(0, 2), (1, 4)]);
        assert_eq!(output[0].label, "C3-C4");
        assert_eq!(output[0].data, vec![4.0]);
        assert_eq!(output[1].data, vec![5.0]);
    }

    #[test]
    fn test_bipolar_prefix_groups_with_reference_suffix() {
        let input = channels(&[
            ("EEG C3-REF", vec![5.0]),
            ("EEG C4-REF", vec![1.0]),
            ("EEG P3-REF", vec![7.0]),
            ("EEG P4-REF", vec![2.0]),
        ]);
        let (output, report) = apply(MontageKind::Bipolar, &input);
        let output = output.unwrap();

        assert_eq!(report.pairing, Some(PairingStrategy::PrefixGroups));
        assert_eq!(report.pairs, vec![(0, 1), (2, 3)]);
        assert_eq!(output[0].label, "EEG C3-REF-EEG C4-REF");
        assert_eq!(output[1].data, vec![5.0]);
    }

    #[test]
    fn test_prefix_and_suffix_uses_last_digit_run() {
        assert_eq!(prefix_and_suffix("C3"), ("C".to_string(), Some(3)));
        assert_eq!(
            prefix_and_suffix("EEG T10-REF"),
            ("EEG T-REF".to_string(), Some(10))
        );
        assert_eq!(prefix_and_suffix("Cz"), ("CZ".to_string(), None));
    }

    #[test]
    fn test_bipolar_consecutive_fallback() {
        let input = channels(&[
            ("X", vec![3.0, f64::NAN]),
            ("Y", vec![1.0, 1.0]),
            ("Z", vec![0.5, 0.5]),
        ]);
        let (output, report) = apply(MontageKind::Bipolar, &input);
        let output = output.unwrap();

        assert_eq!(report.pairing, Some(PairingStrategy::Consecutive));
        assert_eq!(report.channels_out, 2);
        assert_eq!(output[0].data, vec![2.0, -1.0]);
        assert_eq!(output[1].data, vec![0.5, 0.5]);
        assert_eq!(report.sanitized_values, 1);
    }

    #[test]
    fn test_bipolar_single_channel_not_applied() {
        let input = channels(&[("X", vec![1.0])]);
        let (output, report) = apply(MontageKind::Bipolar, &input);
        assert!(output.is_none());
        assert!(!report.applied);
    }

    #[test]
    fn test_laplacian_constant_input_is_zero() {
        let input = channels(&[
            ("A", vec![3.0; 16]),
            ("B", vec![3.0; 16]),
            ("C", vec![3.0; 16]),
        ]);
        let (output, _) = apply(MontageKind::Laplacian, &input);
        let output = output.unwrap();
        assert!(output.iter().all(|c| c.data.iter().all(|&x| x == 0.0)));
    }

    #[test]
    fn test_laplacian_neighbours() {
        let input = channels(&[
            ("A", vec![1.0]),
            ("B", vec![4.0]),
            ("C", vec![9.0]),
            ("D", vec![f64::NAN]),
        ]);
        let (output, report) = apply(MontageKind::Laplacian, &input);
        let output = output.unwrap();

        assert_eq!(output[0].data, vec![-3.0]);
        assert_eq!(output[1].data, vec![-1.0]);
        assert_eq!(output[2].data, vec![7.0]);
        assert_eq!(output[3].data, vec![-9.0]);
        assert_eq!(report.sanitized_values, 1);
    }

    #[test]
    fn test_laplacian_requires_three_channels() {
        let input = channels(&[("A", vec![1.0]), ("B", vec![2.0])]);
        let (output, report) = apply(MontageKind::Laplacian, &input);
        assert!(output.is_none());
        assert!(!report.applied);
        assert_eq!(report.channels_out, 2);
    }
}
