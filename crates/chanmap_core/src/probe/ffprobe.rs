//! Stream probing using `ffprobe -of json`.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;

use crate::config::Settings;
use crate::models::AudioStreamInfo;
use crate::process::run_tool;

use super::{ProbeError, ProbeResult, StreamProber};

/// Default timeout for a single ffprobe call.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Prober backed by the ffprobe binary.
#[derive(Debug, Clone)]
pub struct Ffprobe {
    program: String,
    timeout: Duration,
}

impl Ffprobe {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.tools.ffprobe.clone())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Container duration in seconds.
    pub fn duration(&self, path: &Path) -> ProbeResult<f64> {
        if !path.exists() {
            return Err(ProbeError::FileNotFound(path.to_path_buf()));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(path);

        let output = run_tool(cmd, self.timeout, None)?;
        let text = String::from_utf8_lossy(&output.stdout);
        let trimmed = text.trim();
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| ProbeError::Parse(format!("invalid duration '{}'", trimmed)))
    }
}

impl Default for Ffprobe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl StreamProber for Ffprobe {
    fn probe(&self, path: &Path) -> ProbeResult<Vec<AudioStreamInfo>> {
        if !path.exists() {
            return Err(ProbeError::FileNotFound(path.to_path_buf()));
        }

        tracing::debug!("Probing audio streams: {}", path.display());

        let mut cmd = Command::new(&self.program);
        cmd.args(["-v", "error", "-select_streams", "a"])
            .args([
                "-show_entries",
                "stream=index,codec_type,codec_name,channels,channel_layout",
            ])
            .args(["-of", "json"])
            .arg(path);

        let output = run_tool(cmd, self.timeout, None)?;
        parse_streams_json(&output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: usize,
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    channels: Option<usize>,
    #[serde(default)]
    channel_layout: Option<String>,
}

/// Parse ffprobe JSON into audio streams, assigning audio-relative ordinals.
fn parse_streams_json(json: &[u8]) -> ProbeResult<Vec<AudioStreamInfo>> {
    let parsed: FfprobeOutput =
        serde_json::from_slice(json).map_err(|e| ProbeError::Parse(e.to_string()))?;

    let streams = parsed
        .streams
        .into_iter()
        .filter(|s| s.codec_type.as_deref().map_or(true, |t| t == "audio"))
        .enumerate()
        .map(|(ordinal, s)| AudioStreamInfo {
            stream_index: ordinal,
            container_index: s.index,
            codec_name: s.codec_name.unwrap_or_else(|| "unknown".to_string()),
            channel_count: s.channels.unwrap_or(0),
            declared_layout: s
                .channel_layout
                .filter(|l| !l.trim().is_empty() && l != "unknown"),
        })
        .collect();

    Ok(streams)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_audio_streams_with_relative_indices() {
        let json = br#"{
            "streams": [
                {"index": 1, "codec_name": "eac3", "codec_type": "audio", "channels": 6, "channel_layout": "5.1(side)"},
                {"index": 2, "codec_name": "pcm_s24le", "codec_type": "audio", "channels": 1}
            ]
        }"#;

        let streams = parse_streams_json(json).unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].stream_index, 0);
        assert_eq!(streams[0].container_index, 1);
        assert_eq!(streams[0].channel_count, 6);
        assert_eq!(streams[0].declared_layout.as_deref(), Some("5.1(side)"));
        assert_eq!(streams[1].stream_index, 1);
        assert_eq!(streams[1].declared_layout, None);
    }

    #[test]
    fn skips_non_audio_entries() {
        let json = br#"{"streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264"},
            {"index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 2, "channel_layout": "stereo"}
        ]}"#;
        let streams = parse_streams_json(json).unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].stream_index, 0);
        assert!(streams[0].is_multichannel());
    }

    #[test]
    fn empty_output_means_no_audio() {
        assert!(parse_streams_json(b"{}").unwrap().is_empty());
    }

    #[test]
    fn unknown_layout_is_dropped() {
        let json = br#"{"streams": [{"index": 0, "codec_type": "audio", "channels": 3, "channel_layout": "unknown"}]}"#;
        let streams = parse_streams_json(json).unwrap();
        assert_eq!(streams[0].declared_layout, None);
        assert_eq!(streams[0].codec_name, "unknown");
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_streams_json(b"not json"),
            Err(ProbeError::Parse(_))
        ));
    }

    #[test]
    fn probe_rejects_missing_file() {
        let result = Ffprobe::default().probe(Path::new("/nonexistent/file.mkv"));
        assert!(matches!(result, Err(ProbeError::FileNotFound(_))));
    }
}
