//! Data models shared by detection and repair.
//!
//! - Media structures (audio streams, per-channel extraction specs)
//! - Layout results (roles, features, pairs)
//! - Repair plans (corrections, graph steps)

mod layout;
mod media;
mod repair;

pub use layout::{
    ChannelFeatures, ChannelPairCandidate, ChannelRole, LayoutResult, PairRank, ParseRoleError,
};
pub use media::{AudioStreamInfo, ChannelSpec};
pub use repair::{ChannelRepair, Correction, GraphStep, PcmCodec, RepairOffsetMap, RepairPlan};
