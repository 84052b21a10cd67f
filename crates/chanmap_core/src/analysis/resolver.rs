//! Final role assignment.
//!
//! Precedence, each step removing channels from further consideration:
//! 1. LFE: strongest low-band channel, if its ratio exceeds 0.6
//! 2. Center: strongest mid-band channel outside every accepted pair
//! 3. Pairs: accepted pairs in rank order, lower index on the left; a pair
//!    keeps its rank label even when an earlier pair was skipped
//! 4. Leftovers: `Silent`, or `Unknown_{i}` with a warning

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ChannelFeatures, ChannelPairCandidate, ChannelRole, LayoutResult, PairRank};

/// Low-band ratio a channel must exceed to be LFE.
pub const LFE_MIN_RATIO: f64 = 0.6;
/// Low-band ratio at which LFE confidence saturates.
const LFE_FULL_RATIO: f64 = 0.8;
/// Mid-band ratio a channel must exceed to be center.
pub const CENTER_MIN_RATIO: f64 = 0.5;
/// Mid-band ratio at which center confidence saturates.
const CENTER_FULL_RATIO: f64 = 0.7;

const SILENT_CONFIDENCE: f64 = 1.0;
const UNKNOWN_CONFIDENCE: f64 = 0.3;

/// Resolve roles for every channel in `features`.
///
/// `features` must hold one entry per channel, indexed `0..n` in order.
/// `accepted_pairs` must be the output of `select_pairs` (rank order).
pub fn resolve_layout(
    features: &[ChannelFeatures],
    accepted_pairs: &[ChannelPairCandidate],
) -> LayoutResult {
    let channel_count = features.len();
    if channel_count == 0 {
        return LayoutResult::empty("No audio channels found");
    }

    let mut roles: BTreeMap<usize, ChannelRole> = BTreeMap::new();
    let mut confidence: BTreeMap<usize, f64> = BTreeMap::new();
    let mut warnings = Vec::new();

    // 1. LFE
    let lfe = strongest(features.iter().filter(|f| !f.is_silent), |f| f.low_freq_ratio);
    if let Some(f) = lfe.filter(|f| f.low_freq_ratio > LFE_MIN_RATIO) {
        roles.insert(f.index, ChannelRole::Lfe);
        confidence.insert(f.index, (f.low_freq_ratio / LFE_FULL_RATIO).min(1.0));
    }

    // 2. Center
    let center_candidates = features.iter().filter(|f| {
        !f.is_silent
            && !roles.contains_key(&f.index)
            && !accepted_pairs.iter().any(|p| p.contains(f.index))
    });
    let center = strongest(center_candidates, |f| f.mid_freq_ratio);
    if let Some(f) = center.filter(|f| f.mid_freq_ratio > CENTER_MIN_RATIO) {
        roles.insert(f.index, ChannelRole::Center);
        confidence.insert(f.index, (f.mid_freq_ratio / CENTER_FULL_RATIO).min(1.0));
    }

    // 3. Pairs
    for (position, pair) in accepted_pairs.iter().enumerate() {
        if roles.contains_key(&pair.channel_a) || roles.contains_key(&pair.channel_b) {
            tracing::debug!(
                "Skipping pair ({}, {}): member already assigned",
                pair.channel_a,
                pair.channel_b
            );
            continue;
        }
        let rank = pair.rank().unwrap_or(PairRank::from_rank(position));
        let (left, right) = rank.roles();

        roles.insert(pair.channel_a, left);
        roles.insert(pair.channel_b, right);
        confidence.insert(pair.channel_a, pair.correlation);
        confidence.insert(pair.channel_b, pair.correlation);
    }

    // 4. Leftovers
    for f in features {
        if roles.contains_key(&f.index) {
            continue;
        }
        if f.is_silent {
            roles.insert(f.index, ChannelRole::Silent);
            confidence.insert(f.index, SILENT_CONFIDENCE);
        } else {
            roles.insert(f.index, ChannelRole::Unknown(f.index));
            confidence.insert(f.index, UNKNOWN_CONFIDENCE);
            warnings.push(format!(
                "Channel {} could not be identified (low {:.2}, mid {:.2}, no correlated partner)",
                f.index, f.low_freq_ratio, f.mid_freq_ratio
            ));
        }
    }

    let overall_confidence = confidence.values().sum::<f64>() / confidence.len() as f64;
    let layout_name = layout_name_for(channel_count, &roles);

    tracing::info!(
        "Detected layout {} ({} channel(s), confidence {:.2})",
        layout_name,
        channel_count,
        overall_confidence
    );

    LayoutResult {
        channel_count,
        layout_name,
        role_map: roles,
        confidence_map: confidence,
        overall_confidence,
        warnings,
        features: features.to_vec(),
        pairs: accepted_pairs.to_vec(),
    }
}

/// Highest-scoring channel; the lowest index wins ties.
fn strongest<'a>(
    candidates: impl Iterator<Item = &'a ChannelFeatures>,
    score: impl Fn(&ChannelFeatures) -> f64,
) -> Option<&'a ChannelFeatures> {
    candidates.fold(None, |best, f| match best {
        Some(b) if score(b) >= score(f) => Some(b),
        _ => Some(f),
    })
}

/// Name a layout from its channel count and assigned roles.
pub fn layout_name_for(channel_count: usize, roles: &BTreeMap<usize, ChannelRole>) -> String {
    let present: BTreeSet<ChannelRole> = roles.values().copied().collect();
    let has_all = |wanted: &[ChannelRole]| wanted.iter().all(|r| present.contains(r));

    use ChannelRole::*;
    match channel_count {
        0 => "0ch".to_string(),
        1 => "mono".to_string(),
        2 if has_all(&[Left, Right]) => "stereo".to_string(),
        2 => "2.0".to_string(),
        6 if has_all(&[Left, Right, Center, Lfe, LeftSurround, RightSurround]) => {
            "5.1".to_string()
        }
        6 if has_all(&[Left, Right, Center, Lfe]) => "5.1 (partial)".to_string(),
        8 if present.contains(&Lfe) => "7.1".to_string(),
        n => format!("{}ch", n),
    }
}
