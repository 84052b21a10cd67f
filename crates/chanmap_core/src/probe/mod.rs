//! Stream probing and channel spec resolution.
//!
//! 1. **Probing** (`ffprobe`): list audio streams with channel counts and
//!    declared layouts.
//! 2. **Layout table** (`layouts`): declared layout → role hints, with a
//!    generic fallback.
//! 3. **Spec resolution** (`specs`): one extraction spec per physical channel.

mod ffprobe;
mod layouts;
mod specs;

pub use ffprobe::Ffprobe;
pub use layouts::{KnownLayout, LayoutHint};
pub use specs::{relabel_specs, resolve_channel_specs};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::AudioStreamInfo;
use crate::process::ToolError;

/// Errors from probing a media file.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Failed to parse ffprobe output: {0}")]
    Parse(String),
}

pub type ProbeResult<T> = Result<T, ProbeError>;

/// Source of audio stream information for a file.
pub trait StreamProber: Send + Sync {
    fn probe(&self, path: &Path) -> ProbeResult<Vec<AudioStreamInfo>>;
}

/// Probe a file, reporting failure as "no audio".
///
/// A file without readable audio is a valid, reportable state, so this never
/// fails; the cause is logged.
pub fn probe_audio_streams(prober: &dyn StreamProber, path: &Path) -> Vec<AudioStreamInfo> {
    match prober.probe(path) {
        Ok(streams) => {
            tracing::debug!(
                "Found {} audio stream(s) in {}",
                streams.len(),
                path.display()
            );
            streams
        }
        Err(e) => {
            tracing::warn!("Probe of {} failed: {}", path.display(), e);
            Vec::new()
        }
    }
}
