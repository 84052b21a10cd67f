//! Running a repair plan through ffmpeg.
//!
//! ffmpeg writes to a hidden sibling of the output (`.<name>.partial.<ext>`,
//! same directory so the final rename stays on one filesystem). The partial
//! file is renamed onto the output only after ffmpeg succeeds and removed on
//! every failure path.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::models::RepairPlan;
use crate::probe::Ffprobe;
use crate::process::{run_tool, CancelHandle};

use super::{ffmpeg_args, RepairConfig, RepairError, RepairResult};

/// Apply `plan` to `path`, writing `output`, with default tools and timeout.
pub fn apply_repair_plan(
    path: impl AsRef<Path>,
    plan: &RepairPlan,
    output: impl AsRef<Path>,
) -> RepairResult<PathBuf> {
    apply_repair_plan_with(path.as_ref(), plan, output.as_ref(), &RepairConfig::default(), None)
}

/// Apply `plan` using the tools and timeout from `config`.
///
/// Returns the output path. On failure `output` is left untouched and
/// ffmpeg's stderr is carried in the error.
pub fn apply_repair_plan_with(
    path: &Path,
    plan: &RepairPlan,
    output: &Path,
    config: &RepairConfig,
    cancel: Option<&CancelHandle>,
) -> RepairResult<PathBuf> {
    if !path.exists() {
        return Err(RepairError::SourceNotFound(path.to_path_buf()));
    }

    let duration = if plan.keep_duration {
        let probe = Ffprobe::new(config.ffprobe.clone());
        let secs = probe
            .duration(path)
            .map_err(|e| RepairError::DurationUnavailable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Some(secs)
    } else {
        None
    };

    let partial = partial_output_path(output);
    let args = ffmpeg_args(plan, path, &partial, duration)?;

    tracing::info!(
        "Repairing {} -> {} ({} channel(s), {} output stream(s))",
        path.display(),
        output.display(),
        plan.channels.len(),
        plan.outputs.len()
    );
    tracing::debug!("{} {}", config.ffmpeg, args.join(" "));

    let mut cmd = Command::new(&config.ffmpeg);
    cmd.args(&args);

    let result = run_tool(cmd, config.timeout, cancel)
        .map_err(RepairError::from)
        .and_then(|_| finish(&partial, output));

    if let Err(e) = &result {
        remove_partial(&partial);
        tracing::warn!("Repair of {} failed: {}", path.display(), e);
    }
    result
}

/// Check the partial file and move it into place.
fn finish(partial: &Path, output: &Path) -> RepairResult<PathBuf> {
    let written = fs::metadata(partial).map(|m| m.len()).unwrap_or(0);
    if written == 0 {
        return Err(RepairError::OutputMissing(partial.to_path_buf()));
    }
    fs::rename(partial, output).map_err(|e| {
        RepairError::io(
            format!("move {} to {}", partial.display(), output.display()),
            e,
        )
    })?;
    tracing::info!("Wrote {}", output.display());
    Ok(output.to_path_buf())
}

fn remove_partial(partial: &Path) {
    if partial.exists() {
        if let Err(e) = fs::remove_file(partial) {
            tracing::warn!("Failed to remove {}: {}", partial.display(), e);
        }
    }
}

/// Temporary path ffmpeg writes to before the output is moved into place.
///
/// Keeps the extension so ffmpeg picks the same container format.
pub fn partial_output_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = match output.extension() {
        Some(ext) => format!(".{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!(".{}.partial", stem),
    };
    output.with_file_name(name)
}
