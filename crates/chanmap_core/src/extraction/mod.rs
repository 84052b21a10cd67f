//! Per-channel stem extraction.

mod stem;

pub use stem::{
    extract_stem_or_silence, extract_stem_to_file, isolation_filter, FfmpegStemExtractor, Stem,
    DEFAULT_ANALYSIS_SAMPLE_RATE, DEFAULT_EXTRACTION_TIMEOUT,
};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::ChannelSpec;
use crate::process::ToolError;

/// Errors from extracting one channel.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("No samples extracted for channel {role_hint}")]
    Empty { role_hint: String },

    #[error("Output file missing or empty: {}", .0.display())]
    OutputMissing(PathBuf),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Portion of the file analyzed per channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StemWindow {
    pub skip_secs: f64,
    pub duration_secs: f64,
}

impl StemWindow {
    pub fn new(skip_secs: f64, duration_secs: f64) -> Self {
        Self {
            skip_secs: skip_secs.max(0.0),
            duration_secs: duration_secs.max(0.0),
        }
    }

    /// Samples a full-length stem of this window holds.
    pub fn expected_samples(&self, sample_rate: u32) -> usize {
        (self.duration_secs * sample_rate as f64).round() as usize
    }
}

/// Source of mono stems for physical channels.
pub trait StemExtractor: Send + Sync {
    /// Sample rate of every stem this extractor produces.
    fn sample_rate(&self) -> u32;

    fn extract(
        &self,
        path: &Path,
        spec: &ChannelSpec,
        window: &StemWindow,
    ) -> ExtractionResult<Vec<f64>>;
}
