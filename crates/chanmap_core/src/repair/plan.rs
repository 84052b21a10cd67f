//! Repair plan construction.
//!
//! Pure: the same specs and offsets always give the same plan. Pad labels are
//! derived from stream and slot numbers only.
//!
//! Label scheme:
//! - `s{stream}c{slot}` isolated channel of a multichannel stream
//! - `s{stream}` isolated mono stream
//! - `...d` corrected signal
//! - `...f` channel fixed to the source duration
//! - `...p` channel padded to the longest channel of its stream
//! - `s{stream}m` re-merged multichannel stream
//! - `out{n}` duration-fixed output stream

use crate::models::{
    ChannelRepair, ChannelSpec, Correction, GraphStep, RepairOffsetMap, RepairPlan,
};

use super::RepairConfig;

/// Offsets within this many seconds of zero are treated as zero.
pub const OFFSET_EPSILON_SECS: f64 = 1e-6;

/// Correction for a signed offset in seconds.
///
/// Positive offsets become whole-millisecond delays, negative offsets become
/// start trims. A positive offset that rounds to 0 ms passes through.
pub fn correction_for(offset_secs: f64) -> Correction {
    if !offset_secs.is_finite() || offset_secs.abs() <= OFFSET_EPSILON_SECS {
        return Correction::PassThrough;
    }
    if offset_secs > 0.0 {
        let ms = (offset_secs * 1000.0).round() as u64;
        if ms == 0 {
            tracing::debug!(
                "Offset {:.6}s rounds to 0 ms, passing through",
                offset_secs
            );
            Correction::PassThrough
        } else {
            Correction::Delay { ms }
        }
    } else {
        Correction::Trim {
            seconds: -offset_secs,
        }
    }
}

/// Build a plan with default output settings (48 kHz, 24-bit PCM).
pub fn build_repair_plan(
    specs: &[ChannelSpec],
    offsets: &RepairOffsetMap,
    keep_duration: bool,
) -> RepairPlan {
    let config = RepairConfig {
        keep_duration,
        ..RepairConfig::default()
    };
    build_repair_plan_with(specs, offsets, &config)
}

/// Build a plan using `config` for duration handling and output encoding.
///
/// Offsets are looked up by each spec's `role_hint`; roles missing from the
/// map pass through and unused map entries are ignored.
pub fn build_repair_plan_with(
    specs: &[ChannelSpec],
    offsets: &RepairOffsetMap,
    config: &RepairConfig,
) -> RepairPlan {
    let channels: Vec<ChannelRepair> = specs
        .iter()
        .map(|spec| ChannelRepair {
            spec: spec.clone(),
            correction: offsets
                .get(&spec.role_hint)
                .map_or(Correction::PassThrough, |&o| correction_for(o)),
        })
        .collect();

    let unused: Vec<&String> = offsets
        .keys()
        .filter(|role| !specs.iter().any(|s| &s.role_hint == *role))
        .collect();
    if !unused.is_empty() {
        tracing::debug!("Ignoring offsets for absent roles: {:?}", unused);
    }

    let mut steps = Vec::new();
    let mut outputs = Vec::new();

    for group in group_by_stream(&channels) {
        let (stream_label, duration_fixed) = match group.as_slice() {
            [single] if !single.spec.is_from_multichannel() => {
                (isolate_and_correct(single, &mut steps), false)
            }
            _ => {
                let corrected: Vec<(String, Correction)> = group
                    .iter()
                    .map(|channel| (isolate_and_correct(channel, &mut steps), channel.correction))
                    .collect();
                let inputs = equalize_lengths(corrected, config.keep_duration, &mut steps);
                let merged = if config.keep_duration {
                    format!("out{}", outputs.len())
                } else {
                    format!("s{}m", group[0].spec.origin_stream_index)
                };
                steps.push(GraphStep::Merge {
                    inputs,
                    layout: group[0].spec.origin_layout.clone(),
                    output: merged.clone(),
                });
                (merged, config.keep_duration)
            }
        };

        let output = if config.keep_duration && !duration_fixed {
            let fixed = format!("out{}", outputs.len());
            steps.push(GraphStep::FixDuration {
                input: stream_label,
                output: fixed.clone(),
            });
            fixed
        } else {
            stream_label
        };
        outputs.push(output);
    }

    for channel in channels.iter().filter(|c| !c.correction.is_pass_through()) {
        tracing::debug!(
            "{} (stream {}): {}",
            channel.spec.role_hint,
            channel.spec.origin_stream_index,
            channel.correction
        );
    }

    RepairPlan {
        channels,
        steps,
        outputs,
        keep_duration: config.keep_duration,
        sample_rate: config.sample_rate,
        codec: config.codec,
    }
}

/// Channels grouped by origin stream, streams in first-seen order and
/// channels in slot order.
fn group_by_stream(channels: &[ChannelRepair]) -> Vec<Vec<&ChannelRepair>> {
    let mut groups: Vec<Vec<&ChannelRepair>> = Vec::new();
    for channel in channels {
        let stream = channel.spec.origin_stream_index;
        match groups
            .iter_mut()
            .find(|g| g[0].spec.origin_stream_index == stream)
        {
            Some(group) => group.push(channel),
            None => groups.push(vec![channel]),
        }
    }
    for group in &mut groups {
        group.sort_by_key(|c| c.spec.channel_slot);
    }
    groups
}

/// Push the isolate (and correction, if any) steps for one channel and
/// return the label carrying its final signal.
fn isolate_and_correct(channel: &ChannelRepair, steps: &mut Vec<GraphStep>) -> String {
    let spec = &channel.spec;
    let isolated = match spec.channel_slot {
        Some(slot) if spec.is_from_multichannel() => {
            format!("s{}c{}", spec.origin_stream_index, slot)
        }
        _ => format!("s{}", spec.origin_stream_index),
    };
    steps.push(GraphStep::Isolate {
        stream_index: spec.origin_stream_index,
        channel_slot: spec.channel_slot.filter(|_| spec.is_from_multichannel()),
        output: isolated.clone(),
    });

    if channel.correction.is_pass_through() {
        return isolated;
    }

    let corrected = format!("{}d", isolated);
    steps.push(GraphStep::Correct {
        input: isolated,
        correction: channel.correction,
        output: corrected.clone(),
    });
    corrected
}

/// Make corrected channels of one stream end together before they are
/// merged, since the merge stops at its shortest input.
///
/// With `keep_duration` every channel is fixed to the source duration.
/// Otherwise each channel is padded up to the longest one.
fn equalize_lengths(
    channels: Vec<(String, Correction)>,
    keep_duration: bool,
    steps: &mut Vec<GraphStep>,
) -> Vec<String> {
    if keep_duration {
        return channels
            .into_iter()
            .map(|(label, _)| {
                let fixed = format!("{}f", label);
                steps.push(GraphStep::FixDuration {
                    input: label,
                    output: fixed.clone(),
                });
                fixed
            })
            .collect();
    }

    let longest = channels
        .iter()
        .map(|(_, c)| c.shift_secs())
        .fold(f64::NEG_INFINITY, f64::max);
    channels
        .into_iter()
        .map(|(label, correction)| {
            let seconds = longest - correction.shift_secs();
            if seconds <= OFFSET_EPSILON_SECS {
                return label;
            }
            let padded = format!("{}p", label);
            steps.push(GraphStep::Pad {
                input: label,
                seconds,
                output: padded.clone(),
            });
            padded
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PcmCodec;

    fn five_one_specs() -> Vec<ChannelSpec> {
        ["FL", "FR", "FC", "LFE", "SL", "SR"]
            .iter()
            .enumerate()
            .map(|(slot, hint)| ChannelSpec {
                origin_stream_index: 0,
                channel_slot: Some(slot),
                origin_channel_count: 6,
                origin_layout: Some("5.1(side)".to_string()),
                role_hint: hint.to_string(),
            })
            .collect()
    }

    fn offsets(entries: &[(&str, f64)]) -> RepairOffsetMap {
        entries
            .iter()
            .map(|(role, offset)| (role.to_string(), *offset))
            .collect()
    }

    #[test]
    fn corrections_from_offsets() {
        assert_eq!(correction_for(0.0), Correction::PassThrough);
        assert_eq!(correction_for(5e-7), Correction::PassThrough);
        assert_eq!(correction_for(-5e-7), Correction::PassThrough);
        assert_eq!(correction_for(0.0004), Correction::PassThrough);
        assert_eq!(correction_for(0.040), Correction::Delay { ms: 40 });
        assert_eq!(correction_for(0.0406), Correction::Delay { ms: 41 });
        assert_eq!(correction_for(-0.020), Correction::Trim { seconds: 0.020 });
        assert_eq!(correction_for(f64::NAN), Correction::PassThrough);
    }

    #[test]
    fn multichannel_stream_is_isolated_corrected_and_merged() {
        let plan = build_repair_plan(
            &five_one_specs(),
            &offsets(&[
                ("FL", 0.040),
                ("FR", 0.040),
                ("FC", 0.0),
                ("LFE", 0.0),
                ("SL", -0.020),
                ("SR", -0.020),
            ]),
            true,
        );

        let corrections: Vec<Correction> = plan.channels.iter().map(|c| c.correction).collect();
        assert_eq!(
            corrections,
            vec![
                Correction::Delay { ms: 40 },
                Correction::Delay { ms: 40 },
                Correction::PassThrough,
                Correction::PassThrough,
                Correction::Trim { seconds: 0.020 },
                Correction::Trim { seconds: 0.020 },
            ]
        );

        let merge = plan
            .steps
            .iter()
            .find_map(|s| match s {
                GraphStep::Merge { inputs, layout, .. } => Some((inputs.clone(), layout.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            merge.0,
            vec!["s0c0df", "s0c1df", "s0c2f", "s0c3f", "s0c4df", "s0c5df"]
        );
        assert_eq!(merge.1.as_deref(), Some("5.1(side)"));
        assert_eq!(plan.outputs, vec!["out0"]);
        assert!(matches!(
            plan.steps.last(),
            Some(GraphStep::Merge { output, .. }) if output == "out0"
        ));
    }

    fn merge_inputs(plan: &RepairPlan) -> Vec<String> {
        plan.steps
            .iter()
            .find_map(|s| match s {
                GraphStep::Merge { inputs, .. } => Some(inputs.clone()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn merge_inputs_are_fixed_to_source_duration() {
        let plan = build_repair_plan(
            &five_one_specs(),
            &offsets(&[("FL", 0.040), ("SL", -0.020)]),
            true,
        );
        let fixed: Vec<&str> = plan
            .steps
            .iter()
            .filter_map(|s| match s {
                GraphStep::FixDuration { output, .. } => Some(output.as_str()),
                _ => None,
            })
            .collect();
        let inputs = merge_inputs(&plan);
        assert_eq!(inputs.len(), 6);
        assert!(inputs.iter().all(|i| fixed.contains(&i.as_str())));
        // No second fix after the merge
        assert_eq!(fixed.len(), 6);
    }

    #[test]
    fn merge_inputs_are_padded_to_longest_channel() {
        let plan = build_repair_plan(
            &five_one_specs(),
            &offsets(&[("FL", 0.040), ("FR", 0.040), ("SL", -0.020), ("SR", -0.020)]),
            false,
        );
        assert_eq!(
            merge_inputs(&plan),
            vec!["s0c0d", "s0c1d", "s0c2p", "s0c3p", "s0c4dp", "s0c5dp"]
        );

        let pads: Vec<(String, f64)> = plan
            .steps
            .iter()
            .filter_map(|s| match s {
                GraphStep::Pad { input, seconds, .. } => Some((input.clone(), *seconds)),
                _ => None,
            })
            .collect();
        assert_eq!(pads.len(), 4);
        for (input, seconds) in &pads {
            let expected = if input.ends_with('d') { 0.060 } else { 0.040 };
            assert!((seconds - expected).abs() < 1e-9, "{} padded {}", input, seconds);
        }
    }

    #[test]
    fn uncorrected_stream_needs_no_padding() {
        let plan = build_repair_plan(&five_one_specs(), &RepairOffsetMap::new(), false);
        assert!(!plan
            .steps
            .iter()
            .any(|s| matches!(s, GraphStep::Pad { .. })));
        assert_eq!(plan.outputs, vec!["s0m"]);
    }

    #[test]
    fn mono_streams_stay_independent() {
        let specs = vec![ChannelSpec::mono(0), ChannelSpec::mono(1)];
        let plan = build_repair_plan(&specs, &offsets(&[("S0", 0.1)]), true);

        assert_eq!(plan.outputs, vec!["out0", "out1"]);
        assert!(!plan
            .steps
            .iter()
            .any(|s| matches!(s, GraphStep::Merge { .. })));
        assert_eq!(plan.channels[0].correction, Correction::Delay { ms: 100 });
        assert_eq!(plan.channels[1].correction, Correction::PassThrough);
        assert_eq!(
            plan.steps[0],
            GraphStep::Isolate {
                stream_index: 0,
                channel_slot: None,
                output: "s0".to_string()
            }
        );
    }

    #[test]
    fn unknown_roles_are_ignored() {
        let specs = vec![ChannelSpec::mono(0)];
        let plan = build_repair_plan(&specs, &offsets(&[("BL", 0.5), ("TFL", -0.2)]), false);
        assert!(plan.is_identity());
        assert_eq!(plan.outputs, vec!["s0"]);
    }

    #[test]
    fn without_duration_fix_outputs_are_stream_labels() {
        let plan = build_repair_plan(&five_one_specs(), &offsets(&[("FL", 0.01)]), false);
        assert_eq!(plan.outputs, vec!["s0m"]);
        assert!(!plan
            .steps
            .iter()
            .any(|s| matches!(s, GraphStep::FixDuration { .. })));
    }

    #[test]
    fn mixed_streams_keep_stream_order() {
        let mut specs = vec![ChannelSpec::mono(0)];
        specs.extend(five_one_specs().into_iter().map(|mut s| {
            s.origin_stream_index = 1;
            s
        }));
        specs.push(ChannelSpec::mono(2));

        let plan = build_repair_plan(&specs, &RepairOffsetMap::new(), true);
        assert_eq!(plan.outputs, vec!["out0", "out1", "out2"]);
        assert_eq!(plan.channels.len(), 8);
    }

    #[test]
    fn plan_is_deterministic() {
        let offsets = offsets(&[("FL", 0.040), ("SR", -0.020)]);
        let config = RepairConfig {
            codec: PcmCodec::S16le,
            sample_rate: 44100,
            ..RepairConfig::default()
        };
        let first = build_repair_plan_with(&five_one_specs(), &offsets, &config);
        let second = build_repair_plan_with(&five_one_specs(), &offsets, &config);
        assert_eq!(first, second);
        assert_eq!(first.codec, PcmCodec::S16le);
        assert_eq!(first.sample_rate, 44100);
    }
}
