//! FFmpeg stem extraction.
//!
//! Isolates one physical channel as a mono f64 buffer at the analysis sample
//! rate. Multichannel streams are isolated with a `pan` expression selecting a
//! single slot, never downmixed; mono streams pass through unchanged.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::config::Settings;
use crate::models::{ChannelSpec, PcmCodec};
use crate::process::run_tool;

use super::{ExtractionError, ExtractionResult, StemExtractor, StemWindow};

/// Default sample rate for analysis (48kHz).
pub const DEFAULT_ANALYSIS_SAMPLE_RATE: u32 = 48000;

/// Default per-channel extraction timeout.
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(120);

/// A mono stem ready for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Stem {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
    /// True when extraction failed and `samples` is a zero-filled substitute.
    pub is_fallback: bool,
}

impl Stem {
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            is_fallback: false,
        }
    }

    /// Zero-filled stem covering `window`.
    pub fn silence(window: &StemWindow, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; window.expected_samples(sample_rate)],
            sample_rate,
            is_fallback: true,
        }
    }
}

/// Stem extractor backed by the ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegStemExtractor {
    program: String,
    sample_rate: u32,
    timeout: Duration,
}

impl FfmpegStemExtractor {
    pub fn new(program: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            program: program.into(),
            sample_rate,
            timeout: DEFAULT_EXTRACTION_TIMEOUT,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.tools.ffmpeg.clone(), settings.detection.sample_rate).with_timeout(
            Duration::from_secs(settings.detection.extraction_timeout_secs),
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the ffmpeg command that writes raw f64 samples to stdout.
    pub fn command(&self, path: &Path, spec: &ChannelSpec, window: &StemWindow) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-nostdin", "-hide_banner", "-v", "error"]);
        if window.skip_secs > 0.0 {
            cmd.arg("-ss").arg(format!("{:.3}", window.skip_secs));
        }
        cmd.arg("-i").arg(path);
        cmd.arg("-t").arg(format!("{:.3}", window.duration_secs));
        cmd.arg("-map").arg(spec.stream_specifier());
        cmd.arg("-vn");

        if let Some(filter) = isolation_filter(spec) {
            cmd.arg("-af").arg(filter);
        }

        cmd.arg("-ar")
            .arg(self.sample_rate.to_string())
            .args(["-f", "f64le", "-acodec", "pcm_f64le", "pipe:1"]);
        cmd
    }
}

impl StemExtractor for FfmpegStemExtractor {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn extract(
        &self,
        path: &Path,
        spec: &ChannelSpec,
        window: &StemWindow,
    ) -> ExtractionResult<Vec<f64>> {
        if !path.exists() {
            return Err(ExtractionError::FileNotFound(path.to_path_buf()));
        }

        let output = run_tool(self.command(path, spec, window), self.timeout, None)?;
        let samples = bytes_to_f64_samples(&output.stdout);

        if samples.is_empty() {
            return Err(ExtractionError::Empty {
                role_hint: spec.role_hint.clone(),
            });
        }

        tracing::debug!(
            "Extracted {} ({} samples, {:.2}s)",
            spec.role_hint,
            samples.len(),
            samples.len() as f64 / self.sample_rate as f64
        );
        Ok(samples)
    }
}

/// Channel isolation expression for a spec, or `None` for mono pass-through.
pub fn isolation_filter(spec: &ChannelSpec) -> Option<String> {
    match spec.channel_slot {
        Some(slot) if spec.origin_channel_count > 1 => Some(format!("pan=mono|c0=c{}", slot)),
        _ => None,
    }
}

/// Extract a stem, substituting silence when extraction fails.
///
/// The zero-filled substitute analyzes as silent and is excluded from pairing,
/// so a failed channel can never receive a semantic role.
pub fn extract_stem_or_silence(
    extractor: &dyn StemExtractor,
    path: &Path,
    spec: &ChannelSpec,
    window: &StemWindow,
) -> Stem {
    match extractor.extract(path, spec, window) {
        Ok(samples) => Stem::new(samples, extractor.sample_rate()),
        Err(e) => {
            tracing::warn!(
                "Extraction of channel {} failed, substituting silence: {}",
                spec.role_hint,
                e
            );
            Stem::silence(window, extractor.sample_rate())
        }
    }
}

/// Write one channel to a mono PCM file (format inferred from `output`).
pub fn extract_stem_to_file(
    ffmpeg: &str,
    path: &Path,
    spec: &ChannelSpec,
    output: &Path,
    sample_rate: u32,
    codec: PcmCodec,
    timeout: Duration,
) -> ExtractionResult<()> {
    if !path.exists() {
        return Err(ExtractionError::FileNotFound(path.to_path_buf()));
    }

    let mut cmd = Command::new(ffmpeg);
    cmd.args(["-nostdin", "-hide_banner", "-v", "error", "-y"])
        .arg("-i")
        .arg(path)
        .arg("-map")
        .arg(spec.stream_specifier())
        .arg("-vn");
    if let Some(filter) = isolation_filter(spec) {
        cmd.arg("-af").arg(filter);
    }
    cmd.arg("-ar")
        .arg(sample_rate.to_string())
        .arg("-c:a")
        .arg(codec.ffmpeg_name())
        .arg(output);

    run_tool(cmd, timeout, None)?;

    let written = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    if written == 0 {
        return Err(ExtractionError::OutputMissing(output.to_path_buf()));
    }
    Ok(())
}

/// Convert raw bytes to f64 samples (little-endian); a trailing partial sample is dropped.
fn bytes_to_f64_samples(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(chunk);
            f64::from_le_bytes(arr)
        })
        .collect()
}
