//! Declared-layout → role-hint table.
//!
//! The table is closed: a declared layout either matches one of the
//! [`KnownLayout`] variants with the right channel count, or the stream falls
//! back to generic `c0..c{n-1}` hints.

/// Layouts whose channel order is known from the container tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownLayout {
    Stereo,
    Quad40,
    Surround51,
    Surround51Side,
    Surround71,
}

impl KnownLayout {
    pub const ALL: [KnownLayout; 5] = [
        KnownLayout::Stereo,
        KnownLayout::Quad40,
        KnownLayout::Surround51,
        KnownLayout::Surround51Side,
        KnownLayout::Surround71,
    ];

    /// Layout name as FFmpeg reports it.
    pub fn name(&self) -> &'static str {
        match self {
            KnownLayout::Stereo => "stereo",
            KnownLayout::Quad40 => "4.0",
            KnownLayout::Surround51 => "5.1",
            KnownLayout::Surround51Side => "5.1(side)",
            KnownLayout::Surround71 => "7.1",
        }
    }

    /// Role hints in channel slot order.
    pub fn roles(&self) -> &'static [&'static str] {
        match self {
            KnownLayout::Stereo => &["FL", "FR"],
            KnownLayout::Quad40 => &["FL", "FR", "FC", "BC"],
            KnownLayout::Surround51 | KnownLayout::Surround51Side => {
                &["FL", "FR", "FC", "LFE", "SL", "SR"]
            }
            KnownLayout::Surround71 => &["FL", "FR", "FC", "LFE", "SL", "SR", "BL", "BR"],
        }
    }

    pub fn channel_count(&self) -> usize {
        self.roles().len()
    }

    /// Find the entry for a declared name whose role list matches `channel_count`.
    pub fn lookup(declared: &str, channel_count: usize) -> Option<Self> {
        let declared = declared.trim();
        Self::ALL.into_iter().find(|layout| {
            layout.name().eq_ignore_ascii_case(declared) && layout.channel_count() == channel_count
        })
    }
}

/// Role hints for one stream: a table entry or the generic fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutHint {
    Known(KnownLayout),
    /// No usable declaration; hints are `c0..c{n-1}`.
    Generic(usize),
}

impl LayoutHint {
    pub fn resolve(declared: Option<&str>, channel_count: usize) -> Self {
        declared
            .and_then(|name| KnownLayout::lookup(name, channel_count))
            .map(LayoutHint::Known)
            .unwrap_or(LayoutHint::Generic(channel_count))
    }

    /// Role hint for a channel slot.
    pub fn role_hint(&self, slot: usize) -> String {
        match self {
            LayoutHint::Known(layout) => layout
                .roles()
                .get(slot)
                .map(|r| r.to_string())
                .unwrap_or_else(|| format!("c{}", slot)),
            LayoutHint::Generic(_) => format!("c{}", slot),
        }
    }
}
