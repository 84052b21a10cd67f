//! Rendering a repair plan as an ffmpeg invocation.
//!
//! Each graph step becomes one filter chain `[in]filters[out]`. An input
//! stream isolated more than once is fanned out with `asplit` first, so every
//! pad is consumed exactly once.

use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{Correction, GraphStep, RepairPlan};

use super::{RepairError, RepairResult};

/// Render the plan's `-filter_complex` graph.
///
/// `source_duration` (seconds) is required when the plan fixes durations.
pub fn render_filter_complex(
    plan: &RepairPlan,
    source_duration: Option<f64>,
) -> RepairResult<String> {
    if plan.steps.is_empty() {
        return Err(RepairError::InvalidPlan("plan has no channels".to_string()));
    }

    let mut isolate_counts: BTreeMap<usize, usize> = BTreeMap::new();
    for step in &plan.steps {
        if let GraphStep::Isolate { stream_index, .. } = step {
            *isolate_counts.entry(*stream_index).or_default() += 1;
        }
    }

    let mut chains = Vec::new();
    for (&stream, &count) in &isolate_counts {
        if count > 1 {
            let pads: String = (0..count).map(|k| format!("[s{}i{}]", stream, k)).collect();
            chains.push(format!("[0:a:{}]asplit={}{}", stream, count, pads));
        }
    }

    let mut next_split: BTreeMap<usize, usize> = BTreeMap::new();
    for step in &plan.steps {
        let chain = match step {
            GraphStep::Isolate {
                stream_index,
                channel_slot,
                output,
            } => {
                let input = if isolate_counts.get(stream_index).copied().unwrap_or(0) > 1 {
                    let k = next_split.entry(*stream_index).or_default();
                    let pad = format!("s{}i{}", stream_index, k);
                    *k += 1;
                    pad
                } else {
                    format!("0:a:{}", stream_index)
                };
                let filter = match channel_slot {
                    Some(slot) => format!("pan=mono|c0=c{}", slot),
                    None => "anull".to_string(),
                };
                format!("[{}]{}[{}]", input, filter, output)
            }
            GraphStep::Correct {
                input,
                correction,
                output,
            } => format!("[{}]{}[{}]", input, correction_filter(correction), output),
            GraphStep::Merge {
                inputs,
                layout,
                output,
            } => {
                let pads: String = inputs.iter().map(|i| format!("[{}]", i)).collect();
                let mut filter = if inputs.len() > 1 {
                    format!("amerge=inputs={}", inputs.len())
                } else {
                    "anull".to_string()
                };
                if let Some(layout) = layout {
                    filter.push_str(&format!(",channelmap=channel_layout={}", layout));
                }
                format!("{}{}[{}]", pads, filter, output)
            }
            GraphStep::Pad {
                input,
                seconds,
                output,
            } => format!("[{}]apad=pad_dur={:.6}[{}]", input, seconds, output),
            GraphStep::FixDuration { input, output } => {
                let duration = source_duration.ok_or_else(|| {
                    RepairError::InvalidPlan(
                        "duration fix requested without a source duration".to_string(),
                    )
                })?;
                format!(
                    "[{}]apad=whole_dur={:.6},atrim=end={:.6}[{}]",
                    input, duration, duration, output
                )
            }
        };
        chains.push(chain);
    }

    Ok(chains.join(";"))
}

fn correction_filter(correction: &Correction) -> String {
    match correction {
        Correction::PassThrough => "anull".to_string(),
        Correction::Delay { ms } => format!("adelay={}", ms),
        Correction::Trim { seconds } => {
            format!("atrim=start={:.6},asetpts=PTS-STARTPTS", seconds)
        }
    }
}

/// Full ffmpeg argument list (without the program name).
///
/// Video is stream-copied; every plan output becomes one PCM audio stream.
pub fn ffmpeg_args(
    plan: &RepairPlan,
    input: &Path,
    output: &Path,
    source_duration: Option<f64>,
) -> RepairResult<Vec<String>> {
    let graph = render_filter_complex(plan, source_duration)?;

    let mut args: Vec<String> = ["-nostdin", "-hide_banner", "-v", "error", "-y", "-i"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.push(input.to_string_lossy().to_string());
    args.push("-filter_complex".to_string());
    args.push(graph);

    // Video passes through untouched
    args.extend(["-map", "0:v?", "-c:v", "copy"].iter().map(|s| s.to_string()));

    for label in &plan.outputs {
        args.push("-map".to_string());
        args.push(format!("[{}]", label));
    }

    args.push("-c:a".to_string());
    args.push(plan.codec.ffmpeg_name().to_string());
    args.push("-ar".to_string());
    args.push(plan.sample_rate.to_string());
    args.push(output.to_string_lossy().to_string());

    Ok(args)
}
