//! Stereo pair proposal and greedy acceptance.
//!
//! Every non-silent stem is band-limited (100-5000 Hz by default) and
//! z-score normalized. The score for a pair is `|mean(a * b)|` over the
//! common length, which is the absolute Pearson correlation of the two
//! band-limited signals.

use std::collections::HashSet;

use crate::config::DetectionSettings;
use crate::models::{ChannelFeatures, ChannelPairCandidate};

use super::filtering::{apply_filter, FilterConfig};

/// Pair correlation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PairingConfig {
    pub low_hz: f64,
    pub high_hz: f64,
    /// Minimum score for a pair to be accepted.
    pub threshold: f64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            low_hz: 100.0,
            high_hz: 5000.0,
            threshold: 0.7,
        }
    }
}

impl PairingConfig {
    pub fn from_settings(settings: &DetectionSettings) -> Self {
        Self {
            low_hz: settings.pair_low_hz,
            high_hz: settings.pair_high_hz,
            threshold: settings.pair_threshold,
        }
    }
}

/// Band-limit and z-score a stem.
///
/// A constant signal has no variance and normalizes to all zeros, so it
/// scores 0 against everything.
pub fn normalize_for_pairing(samples: &[f64], sample_rate: u32, config: &PairingConfig) -> Vec<f64> {
    let filter = FilterConfig::pair_bandpass(sample_rate, config.low_hz, config.high_hz);
    let filtered = apply_filter(samples, &filter);
    z_score(&filtered)
}

fn z_score(samples: &[f64]) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if !std.is_finite() || std < 1e-12 {
        return vec![0.0; samples.len()];
    }
    samples.iter().map(|x| (x - mean) / std).collect()
}

/// `|mean(a * b)|` over the shorter of the two buffers, clamped to 0..1.
pub fn correlation_score(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let sum: f64 = a[..len].iter().zip(&b[..len]).map(|(x, y)| x * y).sum();
    let score = (sum / len as f64).abs();
    if score.is_finite() {
        score.min(1.0)
    } else {
        0.0
    }
}

/// Score every unordered pair of non-silent channels.
///
/// `stems[i]` must belong to the channel described by `features[i]`.
/// Candidates come back unranked, in (channel_a, channel_b) order.
pub fn correlate_pairs(
    stems: &[&[f64]],
    features: &[ChannelFeatures],
    sample_rate: u32,
    config: &PairingConfig,
) -> Vec<ChannelPairCandidate> {
    let active: Vec<(usize, Vec<f64>)> = features
        .iter()
        .zip(stems.iter())
        .filter(|(f, _)| !f.is_silent)
        .map(|(f, stem)| (f.index, normalize_for_pairing(stem, sample_rate, config)))
        .collect();

    let mut candidates = Vec::new();
    for (i, (index_a, a)) in active.iter().enumerate() {
        for (index_b, b) in &active[i + 1..] {
            let score = correlation_score(a, b);
            tracing::debug!("Pair ({}, {}): correlation {:.3}", index_a, index_b, score);
            candidates.push(ChannelPairCandidate::new(*index_a, *index_b, score));
        }
    }
    candidates
}

/// Greedily accept conflict-free pairs at or above `threshold`.
///
/// Candidates are ordered by (-correlation, channel_a, channel_b); each is
/// accepted only if neither member was consumed by an earlier acceptance.
/// Returned pairs carry their `pair_rank` in acceptance order.
pub fn select_pairs(
    candidates: &[ChannelPairCandidate],
    threshold: f64,
) -> Vec<ChannelPairCandidate> {
    let mut ordered: Vec<&ChannelPairCandidate> = candidates.iter().collect();
    ordered.sort_by(|x, y| {
        y.correlation
            .total_cmp(&x.correlation)
            .then(x.channel_a.cmp(&y.channel_a))
            .then(x.channel_b.cmp(&y.channel_b))
    });

    let mut consumed = HashSet::new();
    let mut accepted = Vec::new();
    for candidate in ordered {
        if candidate.correlation < threshold {
            break;
        }
        if consumed.contains(&candidate.channel_a) || consumed.contains(&candidate.channel_b) {
            continue;
        }
        consumed.insert(candidate.channel_a);
        consumed.insert(candidate.channel_b);

        let mut pair = candidate.clone();
        pair.pair_rank = Some(accepted.len());
        accepted.push(pair);
    }

    tracing::debug!(
        "Accepted {} of {} candidate pair(s)",
        accepted.len(),
        candidates.len()
    );
    accepted
}
