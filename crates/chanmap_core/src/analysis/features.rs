//! Per-channel acoustic features.
//!
//! Level features come straight from the samples. Spectral features come from
//! an averaged power spectrum over up to `max_windows` non-overlapping
//! Hann-windowed frames:
//!
//! - low band: bins below 120 Hz
//! - mid band: bins in 300-3000 Hz (inclusive)
//! - high band: bins above 3000 Hz
//!
//! Power in 120-300 Hz counts toward the total but toward no band, so the
//! three ratios sum to less than 1 for most real material.

use std::f64::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};

use crate::config::DetectionSettings;
use crate::models::ChannelFeatures;

/// Upper edge of the low band (exclusive).
pub const LOW_BAND_MAX_HZ: f64 = 120.0;
/// Lower edge of the mid band (inclusive).
pub const MID_BAND_MIN_HZ: f64 = 300.0;
/// Upper edge of the mid band (inclusive); also the high band's lower edge.
pub const MID_BAND_MAX_HZ: f64 = 3000.0;

/// Smallest linear amplitude converted to dB (gives a -200 dB floor).
const DB_FLOOR_AMPLITUDE: f64 = 1e-10;

/// Feature extraction parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub silence_threshold_db: f64,
    pub max_windows: usize,
    pub max_window_len: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            silence_threshold_db: -60.0,
            max_windows: 100,
            max_window_len: 8192,
        }
    }
}

impl FeatureConfig {
    pub fn from_settings(settings: &DetectionSettings) -> Self {
        Self {
            silence_threshold_db: settings.silence_threshold_db,
            max_windows: settings.max_windows.max(1),
            max_window_len: settings.max_window_len.max(1),
        }
    }
}

/// Compute features for one channel.
///
/// Never fails: an empty buffer reads as silent at the dB floor.
pub fn analyze_channel(
    index: usize,
    samples: &[f64],
    sample_rate: u32,
    config: &FeatureConfig,
) -> ChannelFeatures {
    let (rms, peak) = level(samples);
    let rms_db = to_db(rms);
    let peak_db = to_db(peak);
    let crest_factor = if rms > 0.0 { peak / rms } else { 0.0 };
    let is_silent = rms_db < config.silence_threshold_db;

    let mut features = ChannelFeatures {
        index,
        rms_db,
        peak_db,
        crest_factor,
        is_silent,
        ..Default::default()
    };

    if is_silent {
        tracing::debug!("Channel {}: silent ({:.1} dB RMS)", index, rms_db);
        return features;
    }

    let spectrum = averaged_power_spectrum(samples, config.max_window_len, config.max_windows);
    let bands = BandPowers::measure(&spectrum, sample_rate);
    features.low_freq_ratio = bands.low_ratio();
    features.mid_freq_ratio = bands.mid_ratio();
    features.high_freq_ratio = bands.high_ratio();
    features.spectral_centroid_hz = bands.centroid_hz();

    tracing::debug!(
        "Channel {}: {:.1} dB RMS, low {:.2}, mid {:.2}, high {:.2}, centroid {:.0} Hz",
        index,
        rms_db,
        features.low_freq_ratio,
        features.mid_freq_ratio,
        features.high_freq_ratio,
        features.spectral_centroid_hz
    );

    features
}

/// Linear RMS and peak amplitude; non-finite samples are ignored.
fn level(samples: &[f64]) -> (f64, f64) {
    let mut sum_sq = 0.0;
    let mut peak = 0.0f64;
    let mut count = 0usize;
    for &s in samples.iter().filter(|s| s.is_finite()) {
        sum_sq += s * s;
        peak = peak.max(s.abs());
        count += 1;
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    ((sum_sq / count as f64).sqrt(), peak)
}

fn to_db(amplitude: f64) -> f64 {
    20.0 * amplitude.max(DB_FLOOR_AMPLITUDE).log10()
}

/// Periodic Hann window.
fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / size as f64).cos()))
        .collect()
}

/// Power spectrum averaged over evenly spread, non-overlapping frames.
///
/// The frame length is `min(max_window_len, samples.len())`. Returns
/// `frame_len / 2 + 1` bins, empty for an empty input.
fn averaged_power_spectrum(samples: &[f64], max_window_len: usize, max_windows: usize) -> Spectrum {
    let frame_len = max_window_len.min(samples.len());
    if frame_len == 0 {
        return Spectrum::default();
    }

    let available = samples.len() / frame_len;
    let num_frames = available.min(max_windows).max(1);
    let num_bins = frame_len / 2 + 1;
    let window = hann_window(frame_len);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(frame_len);

    let mut power = vec![0.0; num_bins];
    for i in 0..num_frames {
        // Distinct slots keep frames non-overlapping while covering the buffer.
        let slot = i * available / num_frames;
        let start = slot * frame_len;

        let mut buffer: Vec<Complex<f64>> = samples[start..start + frame_len]
            .iter()
            .zip(window.iter())
            .map(|(&s, &w)| Complex::new(if s.is_finite() { s * w } else { 0.0 }, 0.0))
            .collect();

        fft.process(&mut buffer);

        for (acc, bin) in power.iter_mut().zip(buffer.iter()) {
            *acc += bin.norm_sqr();
        }
    }

    let scale = 1.0 / num_frames as f64;
    power.iter_mut().for_each(|p| *p *= scale);

    Spectrum { power, frame_len }
}

#[derive(Debug, Default)]
struct Spectrum {
    power: Vec<f64>,
    frame_len: usize,
}

/// Band and total power of a spectrum.
#[derive(Debug, Default)]
struct BandPowers {
    total: f64,
    low: f64,
    mid: f64,
    high: f64,
    weighted_freq: f64,
}

impl BandPowers {
    fn measure(spectrum: &Spectrum, sample_rate: u32) -> Self {
        let mut bands = BandPowers::default();
        if spectrum.frame_len == 0 {
            return bands;
        }

        let bin_hz = sample_rate as f64 / spectrum.frame_len as f64;
        for (k, &p) in spectrum.power.iter().enumerate() {
            let freq = k as f64 * bin_hz;
            bands.total += p;
            bands.weighted_freq += freq * p;
            if freq < LOW_BAND_MAX_HZ {
                bands.low += p;
            } else if (MID_BAND_MIN_HZ..=MID_BAND_MAX_HZ).contains(&freq) {
                bands.mid += p;
            } else if freq > MID_BAND_MAX_HZ {
                bands.high += p;
            }
        }
        bands
    }

    fn ratio(&self, part: f64) -> f64 {
        if self.total > 0.0 {
            part / self.total
        } else {
            0.0
        }
    }

    fn low_ratio(&self) -> f64 {
        self.ratio(self.low)
    }

    fn mid_ratio(&self) -> f64 {
        self.ratio(self.mid)
    }

    fn high_ratio(&self) -> f64 {
        self.ratio(self.high)
    }

    fn centroid_hz(&self) -> f64 {
        self.ratio(self.weighted_freq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 48000;

    fn tone(freq: f64, amplitude: f64, secs: f64) -> Vec<f64> {
        let n = (SR as f64 * secs) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / SR as f64).sin())
            .collect()
    }

    #[test]
    fn digital_silence_is_silent_with_zeroed_spectrum() {
        let features = analyze_channel(3, &vec![0.0; 48000], SR, &FeatureConfig::default());
        assert_eq!(features.index, 3);
        assert!(features.is_silent);
        assert!((features.rms_db + 200.0).abs() < 1e-9);
        assert_eq!(features.low_freq_ratio, 0.0);
        assert_eq!(features.mid_freq_ratio, 0.0);
        assert_eq!(features.high_freq_ratio, 0.0);
        assert_eq!(features.spectral_centroid_hz, 0.0);
    }

    #[test]
    fn empty_buffer_is_silent() {
        let features = analyze_channel(0, &[], SR, &FeatureConfig::default());
        assert!(features.is_silent);
        assert_eq!(features.crest_factor, 0.0);
    }

    #[test]
    fn very_quiet_tone_is_silent() {
        // 0.0005 peak is about -69 dB RMS
        let features = analyze_channel(0, &tone(1000.0, 0.0005, 1.0), SR, &FeatureConfig::default());
        assert!(features.is_silent);
    }

    #[test]
    fn sine_levels() {
        let features = analyze_channel(0, &tone(1000.0, 1.0, 1.0), SR, &FeatureConfig::default());
        assert!(!features.is_silent);
        assert!((features.rms_db - (-3.01)).abs() < 0.05);
        assert!(features.peak_db.abs() < 0.01);
        assert!((features.crest_factor - 2f64.sqrt()).abs() < 0.01);
    }

    #[test]
    fn low_tone_is_low_band() {
        let features = analyze_channel(0, &tone(50.0, 0.5, 1.0), SR, &FeatureConfig::default());
        assert!(features.low_freq_ratio > 0.9);
        assert!(features.spectral_centroid_hz < 120.0);
    }

    #[test]
    fn speech_band_tone_is_mid_band() {
        let features = analyze_channel(0, &tone(1000.0, 0.5, 1.0), SR, &FeatureConfig::default());
        assert!(features.mid_freq_ratio > 0.95);
        assert!((features.spectral_centroid_hz - 1000.0).abs() < 20.0);
    }

    #[test]
    fn bright_tone_is_high_band() {
        let features = analyze_channel(0, &tone(8000.0, 0.5, 1.0), SR, &FeatureConfig::default());
        assert!(features.high_freq_ratio > 0.95);
    }

    #[test]
    fn gap_band_power_counts_in_no_ratio() {
        let features = analyze_channel(0, &tone(200.0, 0.5, 1.0), SR, &FeatureConfig::default());
        let sum = features.low_freq_ratio + features.mid_freq_ratio + features.high_freq_ratio;
        assert!(sum < 0.1, "ratios summed to {}", sum);
        assert!(!features.is_silent);
    }

    #[test]
    fn short_buffer_uses_single_shorter_frame() {
        let samples = tone(1000.0, 0.5, 0.05);
        assert!(samples.len() < 8192);
        let spectrum = averaged_power_spectrum(&samples, 8192, 100);
        assert_eq!(spectrum.frame_len, samples.len());
        assert_eq!(spectrum.power.len(), samples.len() / 2 + 1);
    }

    #[test]
    fn frame_count_is_capped() {
        let config = FeatureConfig {
            max_windows: 2,
            max_window_len: 1024,
            ..Default::default()
        };
        let features = analyze_channel(0, &tone(1000.0, 0.5, 2.0), SR, &config);
        assert!(features.mid_freq_ratio > 0.9);
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let mut samples = tone(1000.0, 0.5, 0.5);
        samples[10] = f64::NAN;
        samples[20] = f64::INFINITY;
        let features = analyze_channel(0, &samples, SR, &FeatureConfig::default());
        assert!(features.rms_db.is_finite());
        assert!(features.spectral_centroid_hz.is_finite());
    }
}
