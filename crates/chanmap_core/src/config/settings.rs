//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::models::PcmCodec;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// External tool locations.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Layout detection settings.
    #[serde(default)]
    pub detection: DetectionSettings,

    /// Repair settings.
    #[serde(default)]
    pub repair: RepairSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Paths to FFmpeg binaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

/// Channel layout detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Sample rate stems are resampled to before analysis.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Seconds skipped at the start of the file (intros are often silent).
    #[serde(default = "default_skip_secs")]
    pub skip_secs: f64,

    /// Seconds of audio analyzed per channel.
    #[serde(default = "default_analysis_duration")]
    pub analysis_duration_secs: f64,

    /// Channels with RMS below this level are silent.
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold_db: f64,

    /// Maximum number of FFT frames averaged per channel.
    #[serde(default = "default_max_windows")]
    pub max_windows: usize,

    /// Maximum FFT window length in samples.
    #[serde(default = "default_max_window_len")]
    pub max_window_len: usize,

    /// Lower edge of the pair correlation band (Hz).
    #[serde(default = "default_pair_low_hz")]
    pub pair_low_hz: f64,

    /// Upper edge of the pair correlation band (Hz).
    #[serde(default = "default_pair_high_hz")]
    pub pair_high_hz: f64,

    /// Minimum correlation for a pair to be accepted.
    #[serde(default = "default_pair_threshold")]
    pub pair_threshold: f64,

    /// Timeout for extracting a single channel.
    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_secs: u64,

    /// Extract and analyze channels on a thread pool.
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_true() -> bool {
    true
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_skip_secs() -> f64 {
    30.0
}

fn default_analysis_duration() -> f64 {
    60.0
}

fn default_silence_threshold() -> f64 {
    -60.0
}

fn default_max_windows() -> usize {
    100
}

fn default_max_window_len() -> usize {
    8192
}

fn default_pair_low_hz() -> f64 {
    100.0
}

fn default_pair_high_hz() -> f64 {
    5000.0
}

fn default_pair_threshold() -> f64 {
    0.7
}

fn default_extraction_timeout() -> u64 {
    120
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            skip_secs: default_skip_secs(),
            analysis_duration_secs: default_analysis_duration(),
            silence_threshold_db: default_silence_threshold(),
            max_windows: default_max_windows(),
            max_window_len: default_max_window_len(),
            pair_low_hz: default_pair_low_hz(),
            pair_high_hz: default_pair_high_hz(),
            pair_threshold: default_pair_threshold(),
            extraction_timeout_secs: default_extraction_timeout(),
            parallel: true,
        }
    }
}

/// Per-channel repair settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairSettings {
    /// Output audio sample rate.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Uncompressed PCM encoding of repaired audio.
    #[serde(default)]
    pub codec: PcmCodec,

    /// Pad/trim every output to the source duration.
    #[serde(default = "default_true")]
    pub keep_duration: bool,

    /// Timeout for the whole transcode.
    #[serde(default = "default_repair_timeout")]
    pub timeout_secs: u64,
}

fn default_repair_timeout() -> u64 {
    1800
}

impl Default for RepairSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            codec: PcmCodec::default(),
            keep_duration: true,
            timeout_secs: default_repair_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when RUST_LOG is not set.
    #[serde(default)]
    pub level: LogLevel,

    /// Also write logs to a file in this folder.
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_dir: None,
        }
    }
}

/// Configuration sections for atomic updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Tools,
    Detection,
    Repair,
    Logging,
}

impl ConfigSection {
    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Tools => "tools",
            ConfigSection::Detection => "detection",
            ConfigSection::Repair => "repair",
            ConfigSection::Logging => "logging",
        }
    }

    pub fn all() -> [ConfigSection; 4] {
        [
            ConfigSection::Tools,
            ConfigSection::Detection,
            ConfigSection::Repair,
            ConfigSection::Logging,
        ]
    }
}
