//! Repair plan construction and rendering for realistic stream layouts.

use std::path::Path;

use chanmap_core::models::{
    AudioStreamInfo, ChannelRole, Correction, GraphStep, LayoutResult, RepairOffsetMap,
};
use chanmap_core::probe::{relabel_specs, resolve_channel_specs};
use chanmap_core::repair::{build_repair_plan, ffmpeg_args, render_filter_complex};

fn stream(stream_index: usize, channel_count: usize, layout: Option<&str>) -> AudioStreamInfo {
    AudioStreamInfo {
        stream_index,
        container_index: stream_index + 1,
        codec_name: "eac3".to_string(),
        channel_count,
        declared_layout: layout.map(str::to_string),
    }
}

fn offsets(entries: &[(&str, f64)]) -> RepairOffsetMap {
    entries.iter().map(|(r, o)| (r.to_string(), *o)).collect()
}

#[test]
fn five_one_front_delay_and_surround_trim() {
    let specs = resolve_channel_specs(&[stream(0, 6, Some("5.1(side)"))]);
    let plan = build_repair_plan(
        &specs,
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

    let by_hint = |hint: &str| {
        plan.channels
            .iter()
            .find(|c| c.spec.role_hint == hint)
            .map(|c| c.correction)
            .unwrap()
    };
    assert_eq!(by_hint("FL"), Correction::Delay { ms: 40 });
    assert_eq!(by_hint("FR"), Correction::Delay { ms: 40 });
    assert_eq!(by_hint("FC"), Correction::PassThrough);
    assert_eq!(by_hint("LFE"), Correction::PassThrough);
    assert_eq!(by_hint("SL"), Correction::Trim { seconds: 0.020 });
    assert_eq!(by_hint("SR"), Correction::Trim { seconds: 0.020 });

    let graph = render_filter_complex(&plan, Some(10.0)).unwrap();
    assert!(graph.contains("adelay=40"));
    assert!(graph.contains("atrim=start=0.020000,asetpts=PTS-STARTPTS"));
    assert!(graph.ends_with("amerge=inputs=6,channelmap=channel_layout=5.1(side)[out0]"));
    assert_eq!(graph.matches("adelay").count(), 2);
    assert_eq!(graph.matches("atrim=start").count(), 2);
    // Center and LFE are fixed to the source length before the merge, so
    // trimmed surrounds cannot shorten them
    assert!(graph.contains("[s0c2]apad=whole_dur=10.000000,atrim=end=10.000000[s0c2f]"));
    assert!(graph.contains("[s0c3]apad=whole_dur=10.000000,atrim=end=10.000000[s0c3f]"));
    assert_eq!(graph.matches("atrim=end").count(), 6);

    let args = ffmpeg_args(&plan, Path::new("in.mkv"), Path::new("out.mkv"), Some(10.0)).unwrap();
    assert_eq!(args.iter().filter(|a| *a == "-map").count(), 2);
}

#[test]
fn dual_mono_delays_only_the_first_stream() {
    let specs = resolve_channel_specs(&[stream(0, 1, None), stream(1, 1, None)]);
    let plan = build_repair_plan(&specs, &offsets(&[("S0", 0.1)]), true);

    assert_eq!(plan.outputs.len(), 2);
    assert!(!plan
        .steps
        .iter()
        .any(|s| matches!(s, GraphStep::Merge { .. })));

    let graph = render_filter_complex(&plan, Some(42.0)).unwrap();
    assert!(graph.contains("[s0]adelay=100[s0d]"));
    assert!(!graph.contains("[s1]adelay"));

    let args = ffmpeg_args(&plan, Path::new("in.mkv"), Path::new("out.mkv"), Some(42.0)).unwrap();
    let joined = args.join(" ");
    assert!(joined.contains("-map 0:v? -c:v copy"));
    assert!(joined.contains("-map [out0] -map [out1]"));
}

#[test]
fn offsets_keyed_by_detected_roles() {
    let specs = resolve_channel_specs(&[stream(0, 6, Some("5.1"))]);
    let mut layout = LayoutResult::empty("unused");
    layout.warnings.clear();
    layout.channel_count = 6;
    let detected = [
        ChannelRole::Left,
        ChannelRole::Right,
        ChannelRole::Center,
        ChannelRole::Lfe,
        ChannelRole::LeftSurround,
        ChannelRole::Unknown(5),
    ];
    for (i, role) in detected.into_iter().enumerate() {
        layout.role_map.insert(i, role);
    }

    let relabelled = relabel_specs(&specs, &layout);
    let plan = build_repair_plan(
        &relabelled,
        &offsets(&[("L", 0.012), ("Ls", -0.5), ("SR", 0.25)]),
        false,
    );

    let corrections: Vec<Correction> = plan.channels.iter().map(|c| c.correction).collect();
    assert_eq!(corrections[0], Correction::Delay { ms: 12 });
    assert_eq!(corrections[4], Correction::Trim { seconds: 0.5 });
    // Unknown channel keeps its declared hint
    assert_eq!(corrections[5], Correction::Delay { ms: 250 });
    assert!(corrections[1..4].iter().all(|c| *c == Correction::PassThrough));
}

#[test]
fn detected_role_offset_reaches_one_channel() {
    // Declared 5.1 whose real LFE sits in the last slot
    let specs = resolve_channel_specs(&[stream(0, 6, Some("5.1"))]);
    let mut layout = LayoutResult::empty("unused");
    layout.warnings.clear();
    layout.channel_count = 6;
    let detected = [
        ChannelRole::Left,
        ChannelRole::Right,
        ChannelRole::Center,
        ChannelRole::Unknown(3),
        ChannelRole::Unknown(4),
        ChannelRole::Lfe,
    ];
    for (i, role) in detected.into_iter().enumerate() {
        layout.role_map.insert(i, role);
    }

    let relabelled = relabel_specs(&specs, &layout);
    let plan = build_repair_plan(&relabelled, &offsets(&[("LFE", 0.05)]), false);

    let delayed: Vec<usize> = plan
        .channels
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.correction.is_pass_through())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(delayed, [5]);
    assert_eq!(plan.channels[5].correction, Correction::Delay { ms: 50 });
    assert_eq!(plan.channels[3].spec.role_hint, "ch3");
}

#[test]
fn repeated_builds_are_identical() {
    let specs = resolve_channel_specs(&[
        stream(0, 1, None),
        stream(1, 8, Some("7.1")),
        stream(2, 3, None),
    ]);
    let offsets = offsets(&[("S0", -0.3), ("BL", 0.02), ("c2", 0.001), ("TFL", 1.0)]);

    let first = build_repair_plan(&specs, &offsets, true);
    let second = build_repair_plan(&specs, &offsets, true);
    assert_eq!(first, second);
    assert_eq!(
        render_filter_complex(&first, Some(1.0)).unwrap(),
        render_filter_complex(&second, Some(1.0)).unwrap()
    );
    assert_eq!(first.outputs.len(), 3);
}
