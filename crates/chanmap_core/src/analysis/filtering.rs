//! IIR Butterworth band-pass via cascaded biquad sections.
//!
//! `order` is the total filter order: a band-pass of order N is a high-pass
//! of order N/2 followed by a low-pass of order N/2, each stage running
//! ceil(N/4) second-order sections (minimum 1).

use biquad::{Biquad, Coefficients, DirectForm2Transposed, Type, Q_BUTTERWORTH_F64};

/// Configuration for a Butterworth band-pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub sample_rate: u32,
    /// High-pass corner (Hz).
    pub low_cutoff_hz: f64,
    /// Low-pass corner (Hz).
    pub high_cutoff_hz: f64,
    pub order: usize,
}

impl FilterConfig {
    /// 4th-order band-pass used before pair correlation.
    pub fn pair_bandpass(sample_rate: u32, low_hz: f64, high_hz: f64) -> Self {
        Self::band_pass(sample_rate, low_hz, high_hz, 4)
    }

    pub fn band_pass(sample_rate: u32, low_hz: f64, high_hz: f64, order: usize) -> Self {
        Self {
            sample_rate,
            low_cutoff_hz: low_hz,
            high_cutoff_hz: high_hz,
            order,
        }
    }
}

/// Band-limit `samples` with the configured filter.
///
/// A corner at or above Nyquist skips its stage.
pub fn apply_filter(samples: &[f64], config: &FilterConfig) -> Vec<f64> {
    let sections = sections_for(config.order / 2);
    let high_passed = butterworth(
        samples,
        Type::HighPass,
        config.sample_rate,
        config.low_cutoff_hz,
        sections,
    );
    butterworth(
        &high_passed,
        Type::LowPass,
        config.sample_rate,
        config.high_cutoff_hz,
        sections,
    )
}

/// Second-order sections needed for a given order (minimum 1).
fn sections_for(order: usize) -> usize {
    order.div_ceil(2).max(1)
}

/// Run `sections` identical Butterworth biquads in series.
///
/// Returns the input unfiltered if the cutoff is not strictly between 0 Hz
/// and Nyquist.
fn butterworth(
    samples: &[f64],
    filter_type: Type<f64>,
    sample_rate: u32,
    cutoff_hz: f64,
    sections: usize,
) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }

    let normalized = cutoff_hz / (sample_rate as f64 / 2.0);
    if !(normalized > 0.0 && normalized < 1.0) {
        tracing::debug!(
            "Cutoff {} Hz outside (0, Nyquist) at {} Hz, passing through",
            cutoff_hz,
            sample_rate
        );
        return samples.to_vec();
    }

    let coeffs = match Coefficients::<f64>::from_normalized_params(
        filter_type,
        normalized,
        Q_BUTTERWORTH_F64,
    ) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!("Invalid filter at {} Hz: {:?}, passing through", cutoff_hz, e);
            return samples.to_vec();
        }
    };

    let mut result = samples.to_vec();
    for _ in 0..sections {
        let mut filter = DirectForm2Transposed::<f64>::new(coeffs);
        for sample in &mut result {
            *sample = filter.run(*sample);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const SR: u32 = 48000;

    fn tone(freq: f64, sample_rate: u32, secs: f64) -> Vec<f64> {
        let n = (sample_rate as f64 * secs) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    /// Steady-state gain in dB, measured over the second half of a 1 s sine.
    fn gain_db(freq: f64, config: &FilterConfig) -> f64 {
        let input = tone(freq, config.sample_rate, 1.0);
        let output = apply_filter(&input, config);
        let tail = |s: &[f64]| s[s.len() / 2..].iter().map(|x| x * x).sum::<f64>();
        10.0 * (tail(&output) / tail(&input)).log10()
    }

    #[test]
    fn section_counts() {
        assert_eq!(sections_for(0), 1);
        assert_eq!(sections_for(2), 1);
        assert_eq!(sections_for(4), 2);
        assert_eq!(sections_for(5), 3);
    }

    #[test]
    fn pair_bandpass_gain_table() {
        let config = FilterConfig::pair_bandpass(SR, 100.0, 5000.0);

        let at_low_corner = gain_db(100.0, &config);
        let in_band = gain_db(1000.0, &config);
        let at_high_corner = gain_db(5000.0, &config);
        assert!((at_low_corner + 3.0).abs() < 0.5, "100 Hz: {:.2} dB", at_low_corner);
        assert!(in_band.abs() < 0.2, "1 kHz: {:.2} dB", in_band);
        assert!((at_high_corner + 3.0).abs() < 0.5, "5 kHz: {:.2} dB", at_high_corner);

        assert!(gain_db(20.0, &config) < -20.0);
        assert!(gain_db(15000.0, &config) < -15.0);
    }

    #[test]
    fn corners_follow_the_sample_rate() {
        let at_44k = gain_db(5000.0, &FilterConfig::pair_bandpass(44100, 100.0, 5000.0));
        assert!((at_44k + 3.0).abs() < 0.5, "5 kHz at 44.1 kHz: {:.2} dB", at_44k);
    }

    #[test]
    fn cutoffs_above_nyquist_pass_through() {
        let samples = tone(100.0, 8000, 0.05);
        let config = FilterConfig::band_pass(8000, 5000.0, 6000.0, 4);
        assert_eq!(apply_filter(&samples, &config), samples);
    }

    #[test]
    fn empty_input_stays_empty() {
        let config = FilterConfig::pair_bandpass(SR, 100.0, 5000.0);
        assert!(apply_filter(&[], &config).is_empty());
    }
}
