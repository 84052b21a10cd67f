//! Channel spec resolution.
//!
//! Turns prober output into one [`ChannelSpec`] per physical channel. Role
//! hints come from the declared layout only; acoustic evidence decides the
//! final roles later.

use std::collections::BTreeSet;

use crate::models::{AudioStreamInfo, ChannelSpec, LayoutResult};

use super::layouts::LayoutHint;

/// Resolve extraction specs for all audio streams, in stream and slot order.
pub fn resolve_channel_specs(streams: &[AudioStreamInfo]) -> Vec<ChannelSpec> {
    let mut specs = Vec::new();

    for stream in streams {
        match stream.channel_count {
            0 => {
                tracing::warn!(
                    "Audio stream {} reports zero channels, skipping",
                    stream.stream_index
                );
            }
            1 => specs.push(ChannelSpec::mono(stream.stream_index)),
            n => {
                let hint = LayoutHint::resolve(stream.declared_layout.as_deref(), n);
                if let LayoutHint::Generic(_) = hint {
                    tracing::debug!(
                        "Stream {}: layout {:?} not in table for {} channels, using generic labels",
                        stream.stream_index,
                        stream.declared_layout,
                        n
                    );
                }
                specs.extend((0..n).map(|slot| ChannelSpec {
                    origin_stream_index: stream.stream_index,
                    channel_slot: Some(slot),
                    origin_channel_count: n,
                    origin_layout: stream.declared_layout.clone(),
                    role_hint: hint.role_hint(slot),
                }));
            }
        }
    }

    specs
}

/// Replace role hints with detected roles.
///
/// Lets a caller key offsets by detected roles ("L", "C", ...). Channels whose
/// detected role is a placeholder ("Silent", "Unknown_i") keep their hint,
/// unless that hint names a role detected on another channel; those become
/// `ch{index}` so each key reaches one channel.
pub fn relabel_specs(specs: &[ChannelSpec], layout: &LayoutResult) -> Vec<ChannelSpec> {
    let detected: BTreeSet<String> = layout
        .role_map
        .values()
        .filter(|role| !role.is_placeholder())
        .map(|role| role.to_string())
        .collect();

    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| match layout.role_of(index) {
            Some(role) if !role.is_placeholder() => spec.with_role_hint(role.to_string()),
            _ if detected.contains(&spec.role_hint) => {
                let renamed = format!("ch{}", index);
                tracing::debug!(
                    "Channel {}: declared hint {} is detected elsewhere, using {}",
                    index,
                    spec.role_hint,
                    renamed
                );
                spec.with_role_hint(renamed)
            }
            _ => spec.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelRole;
    use std::collections::BTreeMap;

    fn stream(index: usize, channels: usize, layout: Option<&str>) -> AudioStreamInfo {
        AudioStreamInfo {
            stream_index: index,
            container_index: index + 1,
            codec_name: "pcm_s24le".to_string(),
            channel_count: channels,
            declared_layout: layout.map(str::to_string),
        }
    }

    #[test]
    fn mono_streams_get_stream_labels() {
        let specs = resolve_channel_specs(&[stream(0, 1, None), stream(1, 1, Some("mono"))]);
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].role_hint, "S0");
        assert_eq!(specs[1].role_hint, "S1");
        assert!(specs.iter().all(|s| s.channel_slot.is_none()));
    }

    #[test]
    fn surround_stream_uses_table() {
        let specs = resolve_channel_specs(&[stream(0, 6, Some("5.1(side)"))]);
        let hints: Vec<&str> = specs.iter().map(|s| s.role_hint.as_str()).collect();
        assert_eq!(hints, ["FL", "FR", "FC", "LFE", "SL", "SR"]);
        let slots: Vec<Option<usize>> = specs.iter().map(|s| s.channel_slot).collect();
        assert_eq!(slots, (0..6).map(Some).collect::<Vec<_>>());
        assert!(specs.iter().all(|s| s.origin_channel_count == 6));
    }

    #[test]
    fn mismatched_layout_falls_back_to_generic() {
        let specs = resolve_channel_specs(&[stream(0, 3, Some("stereo"))]);
        let hints: Vec<&str> = specs.iter().map(|s| s.role_hint.as_str()).collect();
        assert_eq!(hints, ["c0", "c1", "c2"]);
    }

    #[test]
    fn mixed_streams_keep_file_order() {
        let specs = resolve_channel_specs(&[
            stream(0, 2, Some("stereo")),
            stream(1, 1, None),
            stream(2, 0, None),
        ]);
        let hints: Vec<&str> = specs.iter().map(|s| s.role_hint.as_str()).collect();
        assert_eq!(hints, ["FL", "FR", "S1"]);
        assert_eq!(specs[2].origin_stream_index, 1);
    }

    #[test]
    fn relabel_keeps_hint_for_placeholders() {
        let specs = resolve_channel_specs(&[stream(0, 3, None)]);
        let mut layout = LayoutResult::empty("test");
        layout.channel_count = 3;
        layout.role_map = BTreeMap::from([
            (0, ChannelRole::Left),
            (1, ChannelRole::Silent),
            (2, ChannelRole::Unknown(2)),
        ]);

        let relabeled = relabel_specs(&specs, &layout);
        let hints: Vec<&str> = relabeled.iter().map(|s| s.role_hint.as_str()).collect();
        assert_eq!(hints, ["L", "c1", "c2"]);
    }

    #[test]
    fn relabel_renames_placeholder_hint_taken_by_detected_role() {
        let specs = resolve_channel_specs(&[stream(0, 6, Some("5.1"))]);
        let mut layout = LayoutResult::empty("test");
        layout.channel_count = 6;
        layout.role_map = BTreeMap::from([
            (0, ChannelRole::Left),
            (1, ChannelRole::Right),
            (2, ChannelRole::Center),
            (3, ChannelRole::Unknown(3)),
            (4, ChannelRole::Silent),
            (5, ChannelRole::Lfe),
        ]);

        let relabeled = relabel_specs(&specs, &layout);
        let hints: Vec<&str> = relabeled.iter().map(|s| s.role_hint.as_str()).collect();
        assert_eq!(hints, ["L", "R", "C", "ch3", "SL", "LFE"]);
    }
}
