//! Repair plan structures.
//!
//! A repair plan is a declarative filter graph: isolate each physical channel,
//! apply at most one timing correction, re-merge channels that came from a
//! multichannel stream and optionally fix the duration of every output.
//!
//! Merge inputs always end together: either each one is fixed to the source
//! duration or the shorter ones are padded with trailing silence.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::media::ChannelSpec;

/// Role label → signed offset in seconds.
///
/// Positive means the channel is late and must be delayed; negative means it
/// leads and must be trimmed at the start.
pub type RepairOffsetMap = BTreeMap<String, f64>;

/// Timing correction applied to one isolated channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correction {
    PassThrough,
    /// Prepend silence of this many whole milliseconds.
    Delay { ms: u64 },
    /// Drop this many seconds from the start and reset timestamps.
    Trim { seconds: f64 },
}

impl Correction {
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Correction::PassThrough)
    }

    /// Change in signal length, in seconds (delays lengthen, trims shorten).
    pub fn shift_secs(&self) -> f64 {
        match self {
            Correction::PassThrough => 0.0,
            Correction::Delay { ms } => *ms as f64 / 1000.0,
            Correction::Trim { seconds } => -seconds,
        }
    }
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correction::PassThrough => write!(f, "pass-through"),
            Correction::Delay { ms } => write!(f, "delay {}ms", ms),
            Correction::Trim { seconds } => write!(f, "trim {:.6}s", seconds),
        }
    }
}

/// One physical channel and the correction chosen for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRepair {
    pub spec: ChannelSpec,
    pub correction: Correction,
}

/// One node of the repair graph.
///
/// Labels name the pads connecting nodes; every label is produced once and
/// consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum GraphStep {
    /// Take one channel of an input audio stream as a mono signal.
    Isolate {
        stream_index: usize,
        /// `None` when the stream is mono and passes through unchanged.
        channel_slot: Option<usize>,
        output: String,
    },
    /// Apply a timing correction to a mono signal.
    Correct {
        input: String,
        correction: Correction,
        output: String,
    },
    /// Interleave mono signals, in order, back into one stream.
    Merge {
        inputs: Vec<String>,
        /// Layout to tag the merged stream with, if the source declared one.
        layout: Option<String>,
        output: String,
    },
    /// Append this many seconds of silence.
    Pad {
        input: String,
        seconds: f64,
        output: String,
    },
    /// Pad then hard-trim a signal to the source duration.
    FixDuration { input: String, output: String },
}

/// Output encoding for repaired audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PcmCodec {
    S16le,
    #[default]
    S24le,
    S32le,
    F32le,
}

impl PcmCodec {
    /// FFmpeg encoder name.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            PcmCodec::S16le => "pcm_s16le",
            PcmCodec::S24le => "pcm_s24le",
            PcmCodec::S32le => "pcm_s32le",
            PcmCodec::F32le => "pcm_f32le",
        }
    }

    /// Encoder for a given integer bit depth, if supported.
    pub fn for_bit_depth(bits: u32) -> Option<Self> {
        match bits {
            16 => Some(PcmCodec::S16le),
            24 => Some(PcmCodec::S24le),
            32 => Some(PcmCodec::S32le),
            _ => None,
        }
    }
}

/// Complete, deterministic description of a per-channel repair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairPlan {
    /// Per-channel summary in physical channel order.
    pub channels: Vec<ChannelRepair>,
    /// Graph nodes in evaluation order.
    pub steps: Vec<GraphStep>,
    /// Final labels, one per output audio stream, in stream order.
    pub outputs: Vec<String>,
    pub keep_duration: bool,
    pub sample_rate: u32,
    pub codec: PcmCodec,
}

impl RepairPlan {
    /// Whether every channel passes through unchanged.
    pub fn is_identity(&self) -> bool {
        self.channels.iter().all(|c| c.correction.is_pass_through())
    }
}
