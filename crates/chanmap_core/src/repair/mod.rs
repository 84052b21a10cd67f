//! Per-channel timing repair.
//!
//! 1. **Plan** (`plan`): role → offset map plus channel specs become a pure,
//!    declarative [`RepairPlan`](crate::models::RepairPlan).
//! 2. **Render** (`render`): the plan becomes an ffmpeg `-filter_complex`
//!    graph and argument list.
//! 3. **Apply** (`apply`): one ffmpeg run into a temporary sibling file,
//!    renamed onto the output only on success.

mod apply;
mod plan;
mod render;

pub use apply::{apply_repair_plan, apply_repair_plan_with, partial_output_path};
pub use plan::{build_repair_plan, build_repair_plan_with, correction_for, OFFSET_EPSILON_SECS};
pub use render::{ffmpeg_args, render_filter_complex};

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::Settings;
use crate::models::PcmCodec;
use crate::process::ToolError;

/// Errors from rendering or applying a repair plan.
#[derive(Error, Debug)]
pub enum RepairError {
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Could not determine duration of {}: {reason}", .path.display())]
    DurationUnavailable { path: PathBuf, reason: String },

    #[error("Invalid repair plan: {0}")]
    InvalidPlan(String),

    /// The transcode failed; ffmpeg's diagnostic output is carried verbatim.
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("ffmpeg produced no output at {}", .0.display())]
    OutputMissing(PathBuf),

    #[error("Failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl RepairError {
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

pub type RepairResult<T> = Result<T, RepairError>;

/// Default timeout for the whole transcode.
pub const DEFAULT_REPAIR_TIMEOUT: Duration = Duration::from_secs(1800);

/// Repair parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairConfig {
    pub sample_rate: u32,
    pub codec: PcmCodec,
    pub keep_duration: bool,
    pub timeout: Duration,
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            codec: PcmCodec::default(),
            keep_duration: true,
            timeout: DEFAULT_REPAIR_TIMEOUT,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl RepairConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            sample_rate: settings.repair.sample_rate,
            codec: settings.repair.codec,
            keep_duration: settings.repair.keep_duration,
            timeout: Duration::from_secs(settings.repair.timeout_secs),
            ffmpeg: settings.tools.ffmpeg.clone(),
            ffprobe: settings.tools.ffprobe.clone(),
        }
    }
}
