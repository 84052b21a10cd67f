//! Synthetic multichannel material for detection tests.

#![allow(dead_code)]

use std::f64::consts::PI;
use std::path::Path;

use chanmap_core::extraction::{ExtractionError, ExtractionResult, StemExtractor, StemWindow};
use chanmap_core::models::{AudioStreamInfo, ChannelSpec};
use chanmap_core::probe::{ProbeResult, StreamProber};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SAMPLE_RATE: u32 = 48000;
pub const SECONDS: f64 = 2.0;

pub fn len() -> usize {
    (SAMPLE_RATE as f64 * SECONDS) as usize
}

pub fn noise(seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len()).map(|_| rng.gen_range(-0.5..0.5)).collect()
}

pub fn tone(freq: f64, amplitude: f64) -> Vec<f64> {
    (0..len())
        .map(|i| amplitude * (2.0 * PI * freq * i as f64 / SAMPLE_RATE as f64).sin())
        .collect()
}

pub fn mix(parts: &[(f64, &[f64])]) -> Vec<f64> {
    (0..len())
        .map(|i| parts.iter().map(|(gain, s)| gain * s[i]).sum())
        .collect()
}

pub fn silence() -> Vec<f64> {
    vec![0.0; len()]
}

/// Dialogue-like channel: energy concentrated in 300-3000 Hz.
pub fn speech_band() -> Vec<f64> {
    let parts = [tone(500.0, 0.2), tone(1000.0, 0.2), tone(2000.0, 0.15)];
    mix(&[(1.0, &parts[0][..]), (1.0, &parts[1][..]), (1.0, &parts[2][..])])
}

/// Six channels in 5.1 order: broadband L/R (~0.99), speech-band C,
/// 50 Hz LFE, surround pair correlated at ~0.8.
pub fn five_one_stems() -> Vec<Vec<f64>> {
    let front = noise(1);
    let front_hiss = noise(2);
    let surround = noise(3);
    let surround_diffuse = noise(4);

    vec![
        front.clone(),
        mix(&[(0.9, &front[..]), (0.1, &front_hiss[..])]),
        speech_band(),
        tone(50.0, 0.5),
        surround.clone(),
        mix(&[(0.8, &surround[..]), (0.6, &surround_diffuse[..])]),
    ]
}

pub fn stream(stream_index: usize, channel_count: usize, layout: Option<&str>) -> AudioStreamInfo {
    AudioStreamInfo {
        stream_index,
        container_index: stream_index + 1,
        codec_name: "pcm_s24le".to_string(),
        channel_count,
        declared_layout: layout.map(str::to_string),
    }
}

/// Prober returning a fixed stream list.
pub struct StaticProber(pub Vec<AudioStreamInfo>);

impl StreamProber for StaticProber {
    fn probe(&self, _path: &Path) -> ProbeResult<Vec<AudioStreamInfo>> {
        Ok(self.0.clone())
    }
}

/// Extractor serving prepared stems by physical channel order.
///
/// Channels listed in `failing` return an error instead.
pub struct MemoryExtractor {
    pub stems: Vec<Vec<f64>>,
    pub failing: Vec<usize>,
}

impl MemoryExtractor {
    pub fn new(stems: Vec<Vec<f64>>) -> Self {
        Self {
            stems,
            failing: Vec::new(),
        }
    }

    fn channel_of(spec: &ChannelSpec) -> usize {
        spec.channel_slot.unwrap_or(spec.origin_stream_index)
    }
}

impl StemExtractor for MemoryExtractor {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn extract(
        &self,
        _path: &Path,
        spec: &ChannelSpec,
        _window: &StemWindow,
    ) -> ExtractionResult<Vec<f64>> {
        let channel = Self::channel_of(spec);
        if self.failing.contains(&channel) {
            return Err(ExtractionError::Empty {
                role_hint: spec.role_hint.clone(),
            });
        }
        self.stems
            .get(channel)
            .cloned()
            .ok_or_else(|| ExtractionError::Empty {
                role_hint: spec.role_hint.clone(),
            })
    }
}
