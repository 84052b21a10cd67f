//! Layout detection pipeline.
//!
//! Probe → channel specs → stems → features → pairs → roles.
//!
//! Extraction and per-channel analysis depend only on their own channel, so
//! they run on the rayon pool; the indexed collect keeps results in channel
//! order before pairing and resolution, which are index-order sensitive.

use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;

use crate::analysis::{
    analyze_channel, correlate_pairs, resolve_layout, select_pairs, FeatureConfig, PairingConfig,
};
use crate::config::Settings;
use crate::extraction::{extract_stem_or_silence, FfmpegStemExtractor, StemExtractor, StemWindow};
use crate::models::{ChannelFeatures, ChannelSpec, LayoutResult};
use crate::probe::{probe_audio_streams, resolve_channel_specs, Ffprobe, StreamProber};

/// Detector parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub features: FeatureConfig,
    pub pairing: PairingConfig,
    /// Extract and analyze channels concurrently.
    pub parallel: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            pairing: PairingConfig::default(),
            parallel: true,
        }
    }
}

impl DetectorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            features: FeatureConfig::from_settings(&settings.detection),
            pairing: PairingConfig::from_settings(&settings.detection),
            parallel: settings.detection.parallel,
        }
    }
}

/// Specs and detected layout for one file.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub specs: Vec<ChannelSpec>,
    pub layout: LayoutResult,
}

/// Detects channel layouts using pluggable probing and extraction.
pub struct LayoutDetector {
    prober: Box<dyn StreamProber>,
    extractor: Box<dyn StemExtractor>,
    config: DetectorConfig,
}

impl LayoutDetector {
    pub fn new(
        prober: Box<dyn StreamProber>,
        extractor: Box<dyn StemExtractor>,
        config: DetectorConfig,
    ) -> Self {
        Self {
            prober,
            extractor,
            config,
        }
    }

    /// Detector backed by ffprobe/ffmpeg as configured.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Box::new(Ffprobe::from_settings(settings)),
            Box::new(FfmpegStemExtractor::from_settings(settings)),
            DetectorConfig::from_settings(settings),
        )
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect the layout of `path`.
    ///
    /// Never fails: a file without audio yields an empty result with a
    /// warning, and a channel that cannot be extracted analyzes as silent.
    pub fn detect(&self, path: &Path, skip_secs: f64, duration_secs: f64) -> LayoutResult {
        self.detect_with_specs(path, skip_secs, duration_secs).layout
    }

    /// Like [`detect`](Self::detect), also returning the channel specs the
    /// role map is indexed by.
    pub fn detect_with_specs(&self, path: &Path, skip_secs: f64, duration_secs: f64) -> Detection {
        let streams = probe_audio_streams(self.prober.as_ref(), path);
        let specs = resolve_channel_specs(&streams);
        if specs.is_empty() {
            tracing::warn!("No audio channels in {}", path.display());
            return Detection {
                specs,
                layout: LayoutResult::empty(format!(
                    "No audio streams found in {}",
                    path.display()
                )),
            };
        }

        let window = StemWindow::new(skip_secs, duration_secs);
        let sample_rate = self.extractor.sample_rate();
        tracing::info!(
            "Analyzing {} channel(s) of {} ({:.1}s from {:.1}s)",
            specs.len(),
            path.display(),
            window.duration_secs,
            window.skip_secs
        );

        let analyze = |(index, spec): (usize, &ChannelSpec)| {
            let stem = extract_stem_or_silence(self.extractor.as_ref(), path, spec, &window);
            let features =
                analyze_channel(index, &stem.samples, sample_rate, &self.config.features);
            (stem, features)
        };
        let analyzed: Vec<_> = if self.config.parallel {
            specs.par_iter().enumerate().map(analyze).collect()
        } else {
            specs.iter().enumerate().map(analyze).collect()
        };

        let mut fallback_warnings = Vec::new();
        let mut stems = Vec::with_capacity(analyzed.len());
        let mut features = Vec::with_capacity(analyzed.len());
        for (index, (stem, f)) in analyzed.into_iter().enumerate() {
            if stem.is_fallback {
                fallback_warnings.push(format!(
                    "Channel {} ({}) could not be extracted and was treated as silent",
                    index, specs[index].role_hint
                ));
            }
            stems.push(stem.samples);
            features.push(f);
        }

        let mut layout = resolve_from_features(&stems, features, sample_rate, &self.config);
        layout.warnings.extend(fallback_warnings);
        Detection { specs, layout }
    }
}

/// Resolve a layout from already extracted stems, one per channel in order.
pub fn resolve_from_stems(
    stems: &[Vec<f64>],
    sample_rate: u32,
    config: &DetectorConfig,
) -> LayoutResult {
    let analyze = |(index, stem): (usize, &Vec<f64>)| {
        analyze_channel(index, stem, sample_rate, &config.features)
    };
    let features: Vec<_> = if config.parallel {
        stems.par_iter().enumerate().map(analyze).collect()
    } else {
        stems.iter().enumerate().map(analyze).collect()
    };
    resolve_from_features(stems, features, sample_rate, config)
}

fn resolve_from_features(
    stems: &[Vec<f64>],
    features: Vec<ChannelFeatures>,
    sample_rate: u32,
    config: &DetectorConfig,
) -> LayoutResult {
    let stem_refs: Vec<&[f64]> = stems.iter().map(Vec::as_slice).collect();
    let candidates = correlate_pairs(&stem_refs, &features, sample_rate, &config.pairing);
    let accepted = select_pairs(&candidates, config.pairing.threshold);
    resolve_layout(&features, &accepted)
}

/// Detect the layout of `path` with default settings (ffprobe/ffmpeg on PATH).
pub fn detect_layout(path: impl AsRef<Path>, skip_secs: f64, duration_secs: f64) -> LayoutResult {
    LayoutDetector::from_settings(&Settings::default()).detect(
        path.as_ref(),
        skip_secs,
        duration_secs,
    )
}
