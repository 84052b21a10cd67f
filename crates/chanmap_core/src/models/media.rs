//! Media structures describing audio streams and physical channels.

use serde::{Deserialize, Serialize};

/// One audio stream as reported by the prober.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    /// Audio-relative stream ordinal (for FFmpeg `-map 0:a:N`).
    pub stream_index: usize,
    /// Absolute stream index inside the container.
    pub container_index: usize,
    /// Codec name (e.g., "aac", "pcm_s24le").
    pub codec_name: String,
    /// Number of channels carried by the stream.
    pub channel_count: usize,
    /// Declared channel layout string, if the container tags one.
    pub declared_layout: Option<String>,
}

impl AudioStreamInfo {
    /// Whether this stream carries more than one channel.
    pub fn is_multichannel(&self) -> bool {
        self.channel_count > 1
    }
}

/// How to obtain one physical channel as a mono stem.
///
/// Specs are ordered in file/stream order, one per physical channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Audio-relative index of the stream the channel lives in.
    pub origin_stream_index: usize,
    /// Channel slot inside a multichannel stream; `None` for mono streams.
    pub channel_slot: Option<usize>,
    /// Channel count of the origin stream.
    pub origin_channel_count: usize,
    /// Declared layout of the origin stream, carried for re-merging.
    pub origin_layout: Option<String>,
    /// Best-guess role label ("FL", "LFE", "c3", "S1", ...).
    pub role_hint: String,
}

impl ChannelSpec {
    /// Spec for a single-channel stream.
    pub fn mono(stream_index: usize) -> Self {
        Self {
            origin_stream_index: stream_index,
            channel_slot: None,
            origin_channel_count: 1,
            origin_layout: None,
            role_hint: format!("S{}", stream_index),
        }
    }

    /// Whether the origin stream has more than one channel.
    pub fn is_from_multichannel(&self) -> bool {
        self.channel_slot.is_some() && self.origin_channel_count > 1
    }

    /// FFmpeg stream specifier for the origin stream.
    pub fn stream_specifier(&self) -> String {
        format!("0:a:{}", self.origin_stream_index)
    }

    /// Copy of this spec with a different role hint.
    pub fn with_role_hint(&self, role_hint: impl Into<String>) -> Self {
        Self {
            role_hint: role_hint.into(),
            ..self.clone()
        }
    }
}
