//! Channel analysis for layout detection.
//!
//! # Architecture
//!
//! Pure functions composed by the detector:
//!
//! 1. **Features** (`features`): levels, band ratios and spectral centroid
//!    for each stem. Independent per channel, safe to run in parallel.
//!
//! 2. **Filtering** (`filtering`): Butterworth band-pass applied before
//!    pair correlation.
//!
//! 3. **Pairing** (`pairing`): band-limited correlation for every pair of
//!    non-silent channels, then greedy conflict-free acceptance.
//!
//! 4. **Resolution** (`resolver`): LFE, center, pairs and leftovers, in that
//!    order, producing the final [`LayoutResult`](crate::models::LayoutResult).
//!
//! # Usage
//!
//! ```ignore
//! use chanmap_core::analysis::*;
//!
//! let features: Vec<_> = stems
//!     .iter()
//!     .enumerate()
//!     .map(|(i, s)| analyze_channel(i, s, 48000, &FeatureConfig::default()))
//!     .collect();
//! let candidates = correlate_pairs(&stems, &features, 48000, &PairingConfig::default());
//! let pairs = select_pairs(&candidates, 0.7);
//! let layout = resolve_layout(&features, &pairs);
//! ```

mod features;
pub mod filtering;
mod pairing;
mod resolver;

pub use features::{
    analyze_channel, FeatureConfig, LOW_BAND_MAX_HZ, MID_BAND_MAX_HZ, MID_BAND_MIN_HZ,
};
pub use filtering::{apply_filter, FilterConfig};
pub use pairing::{
    correlate_pairs, correlation_score, normalize_for_pairing, select_pairs, PairingConfig,
};
pub use resolver::{layout_name_for, resolve_layout, CENTER_MIN_RATIO, LFE_MIN_RATIO};
