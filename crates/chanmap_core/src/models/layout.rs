//! Layout detection results and the per-channel values they are built from.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Semantic role assigned to a physical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelRole {
    Left,
    Right,
    Center,
    Lfe,
    LeftSurround,
    RightSurround,
    /// Left member of a pair beyond front and surround (`L{n}`).
    NumberedLeft(usize),
    /// Right member of a pair beyond front and surround (`R{n}`).
    NumberedRight(usize),
    /// Channel below the silence threshold.
    Silent,
    /// Channel with no conclusive evidence (`Unknown_{index}`).
    Unknown(usize),
}

impl ChannelRole {
    /// Whether this role is one of the explicit placeholders.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, ChannelRole::Silent | ChannelRole::Unknown(_))
    }
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRole::Left => write!(f, "L"),
            ChannelRole::Right => write!(f, "R"),
            ChannelRole::Center => write!(f, "C"),
            ChannelRole::Lfe => write!(f, "LFE"),
            ChannelRole::LeftSurround => write!(f, "Ls"),
            ChannelRole::RightSurround => write!(f, "Rs"),
            ChannelRole::NumberedLeft(n) => write!(f, "L{}", n),
            ChannelRole::NumberedRight(n) => write!(f, "R{}", n),
            ChannelRole::Silent => write!(f, "Silent"),
            ChannelRole::Unknown(i) => write!(f, "Unknown_{}", i),
        }
    }
}

/// Error returned when a role string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognised channel role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for ChannelRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let role = match s {
            "L" => ChannelRole::Left,
            "R" => ChannelRole::Right,
            "C" => ChannelRole::Center,
            "LFE" => ChannelRole::Lfe,
            "Ls" => ChannelRole::LeftSurround,
            "Rs" => ChannelRole::RightSurround,
            "Silent" => ChannelRole::Silent,
            other => {
                let err = || ParseRoleError(other.to_string());
                if let Some(idx) = other.strip_prefix("Unknown_") {
                    ChannelRole::Unknown(idx.parse().map_err(|_| err())?)
                } else if let Some(n) = other.strip_prefix('L') {
                    ChannelRole::NumberedLeft(n.parse().map_err(|_| err())?)
                } else if let Some(n) = other.strip_prefix('R') {
                    ChannelRole::NumberedRight(n.parse().map_err(|_| err())?)
                } else {
                    return Err(err());
                }
            }
        };
        Ok(role)
    }
}

impl Serialize for ChannelRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChannelRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Acoustic features of one physical channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelFeatures {
    /// Physical channel index.
    pub index: usize,
    pub rms_db: f64,
    pub peak_db: f64,
    /// Peak amplitude over RMS amplitude (linear).
    pub crest_factor: f64,
    /// Fraction of spectral power below 120 Hz.
    pub low_freq_ratio: f64,
    /// Fraction of spectral power in 300-3000 Hz.
    pub mid_freq_ratio: f64,
    /// Fraction of spectral power above 3000 Hz.
    pub high_freq_ratio: f64,
    pub spectral_centroid_hz: f64,
    pub is_silent: bool,
}

/// Order in which a pair was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairRank {
    Front,
    Surround,
    /// Any pair accepted after front and surround; holds the 0-based rank.
    Extra(usize),
}

impl PairRank {
    pub fn from_rank(rank: usize) -> Self {
        match rank {
            0 => PairRank::Front,
            1 => PairRank::Surround,
            n => PairRank::Extra(n),
        }
    }

    /// Roles for the (lower index, higher index) members of a pair.
    pub fn roles(&self) -> (ChannelRole, ChannelRole) {
        match self {
            PairRank::Front => (ChannelRole::Left, ChannelRole::Right),
            PairRank::Surround => (ChannelRole::LeftSurround, ChannelRole::RightSurround),
            PairRank::Extra(n) => (
                ChannelRole::NumberedLeft(n + 1),
                ChannelRole::NumberedRight(n + 1),
            ),
        }
    }
}

impl fmt::Display for PairRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairRank::Front => write!(f, "front"),
            PairRank::Surround => write!(f, "surround"),
            PairRank::Extra(_) => write!(f, "unknown"),
        }
    }
}

/// A proposed stereo pair between two non-silent channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPairCandidate {
    /// Lower channel index.
    pub channel_a: usize,
    /// Higher channel index.
    pub channel_b: usize,
    /// Band-limited correlation score (0..1).
    pub correlation: f64,
    /// Assignment order; `None` until the pair is accepted.
    pub pair_rank: Option<usize>,
}

impl ChannelPairCandidate {
    pub fn new(a: usize, b: usize, correlation: f64) -> Self {
        let (channel_a, channel_b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            channel_a,
            channel_b,
            correlation,
            pair_rank: None,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.channel_a == index || self.channel_b == index
    }

    /// Rank label for an accepted pair.
    pub fn rank(&self) -> Option<PairRank> {
        self.pair_rank.map(PairRank::from_rank)
    }
}

/// Final detection output for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub channel_count: usize,
    pub layout_name: String,
    /// Every index in `0..channel_count` exactly once.
    pub role_map: BTreeMap<usize, ChannelRole>,
    pub confidence_map: BTreeMap<usize, f64>,
    /// Mean of `confidence_map`, 0 when there are no channels.
    pub overall_confidence: f64,
    pub warnings: Vec<String>,
    #[serde(default)]
    pub features: Vec<ChannelFeatures>,
    /// Accepted pairs in rank order.
    #[serde(default)]
    pub pairs: Vec<ChannelPairCandidate>,
}

impl LayoutResult {
    /// Result for a file with no readable audio.
    pub fn empty(warning: impl Into<String>) -> Self {
        Self {
            channel_count: 0,
            layout_name: "0ch".to_string(),
            role_map: BTreeMap::new(),
            confidence_map: BTreeMap::new(),
            overall_confidence: 0.0,
            warnings: vec![warning.into()],
            features: Vec::new(),
            pairs: Vec::new(),
        }
    }

    pub fn role_of(&self, index: usize) -> Option<ChannelRole> {
        self.role_map.get(&index).copied()
    }

    /// Role map rendered as plain strings.
    pub fn role_strings(&self) -> BTreeMap<usize, String> {
        self.role_map
            .iter()
            .map(|(&i, role)| (i, role.to_string()))
            .collect()
    }
}
