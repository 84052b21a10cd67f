//! `chanmap` - detect channel layouts and repair per-channel timing.
//!
//! Every command prints JSON to stdout; logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chanmap_core::config::{ConfigManager, Settings};
use chanmap_core::detect::LayoutDetector;
use chanmap_core::extraction::extract_stem_to_file;
use chanmap_core::logging::{init_tracing, LogLevel};
use chanmap_core::models::{AudioStreamInfo, ChannelSpec, PcmCodec, RepairOffsetMap, RepairPlan};
use chanmap_core::probe::{probe_audio_streams, relabel_specs, resolve_channel_specs, Ffprobe};
use chanmap_core::repair::{
    apply_repair_plan_with, build_repair_plan_with, ffmpeg_args, RepairConfig,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "chanmap",
    version,
    about = "Detect multichannel audio layouts and repair per-channel timing"
)]
struct Cli {
    /// Settings file (TOML); defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (overrides the settings file)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List audio streams and the per-channel specs derived from them
    Probe { file: PathBuf },

    /// Detect which physical channel plays which role
    Detect {
        file: PathBuf,
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Build a repair plan and print it with the ffmpeg command, without running it
    Plan {
        file: PathBuf,
        #[command(flatten)]
        repair: RepairArgs,
    },

    /// Build a repair plan and apply it
    Repair {
        file: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        repair: RepairArgs,
    },

    /// Write one physical channel to a mono PCM file
    Extract {
        file: PathBuf,
        /// Physical channel index (as reported by `probe`)
        channel: usize,
        output: PathBuf,
        #[arg(long, default_value_t = 24)]
        bit_depth: u32,
    },
}

#[derive(Args, Debug)]
struct WindowArgs {
    /// Seconds to skip before analysis (defaults to the settings value)
    #[arg(long)]
    skip: Option<f64>,
    /// Seconds analyzed per channel (defaults to the settings value)
    #[arg(long)]
    duration: Option<f64>,
}

#[derive(Args, Debug)]
struct RepairArgs {
    /// Channel offset as ROLE=SECONDS (positive delays, negative trims); repeatable
    #[arg(long = "offset", value_parser = parse_offset, required = true)]
    offsets: Vec<(String, f64)>,

    /// Key offsets by detected roles (L, R, C, ...) instead of declared ones (FL, FR, FC, ...)
    #[arg(long)]
    by_detected_roles: bool,

    /// Do not pad/trim outputs to the source duration
    #[arg(long)]
    no_keep_duration: bool,

    #[command(flatten)]
    window: WindowArgs,
}

fn parse_offset(s: &str) -> Result<(String, f64), String> {
    let (role, secs) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ROLE=SECONDS, got '{}'", s))?;
    let role = role.trim();
    if role.is_empty() {
        return Err(format!("missing role in '{}'", s));
    }
    let secs: f64 = secs
        .trim()
        .parse()
        .map_err(|_| format!("invalid offset '{}' for {}", secs, role))?;
    if !secs.is_finite() {
        return Err(format!("offset for {} must be finite", role));
    }
    Ok((role.to_string(), secs))
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    let level = cli.log_level.unwrap_or(settings.logging.level);
    let log_dir = settings.logging.log_dir.as_ref().map(PathBuf::from);
    let _guard = init_tracing(level, log_dir.as_deref());

    match cli.command {
        Commands::Probe { file } => run_probe(&settings, &file),
        Commands::Detect { file, window } => run_detect(&settings, &file, &window),
        Commands::Plan { file, repair } => run_plan(&settings, &file, &repair),
        Commands::Repair {
            file,
            output,
            repair,
        } => run_repair(&settings, &file, &output, &repair),
        Commands::Extract {
            file,
            channel,
            output,
            bit_depth,
        } => run_extract(&settings, &file, channel, &output, bit_depth),
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let mut manager = ConfigManager::new(path);
    manager
        .load()
        .with_context(|| format!("loading settings from {}", path.display()))?;
    Ok(manager.settings().clone())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ensure_exists(file: &Path) -> Result<()> {
    if !file.exists() {
        bail!("input file not found: {}", file.display());
    }
    Ok(())
}

fn channel_specs(settings: &Settings, file: &Path) -> Vec<ChannelSpec> {
    let streams = probe_audio_streams(&Ffprobe::from_settings(settings), file);
    resolve_channel_specs(&streams)
}

#[derive(Serialize)]
struct ProbeReport {
    streams: Vec<AudioStreamInfo>,
    channels: Vec<ChannelSpec>,
}

fn run_probe(settings: &Settings, file: &Path) -> Result<()> {
    ensure_exists(file)?;
    let streams = probe_audio_streams(&Ffprobe::from_settings(settings), file);
    let channels = resolve_channel_specs(&streams);
    print_json(&ProbeReport { streams, channels })
}

fn window_of(settings: &Settings, window: &WindowArgs) -> (f64, f64) {
    (
        window.skip.unwrap_or(settings.detection.skip_secs),
        window
            .duration
            .unwrap_or(settings.detection.analysis_duration_secs),
    )
}

fn run_detect(settings: &Settings, file: &Path, window: &WindowArgs) -> Result<()> {
    ensure_exists(file)?;
    let (skip, duration) = window_of(settings, window);
    let detection = LayoutDetector::from_settings(settings).detect_with_specs(file, skip, duration);
    print_json(&detection)
}

/// Specs and offsets a repair is built from.
fn repair_inputs(
    settings: &Settings,
    file: &Path,
    args: &RepairArgs,
) -> Result<(Vec<ChannelSpec>, RepairOffsetMap)> {
    ensure_exists(file)?;
    let specs = if args.by_detected_roles {
        let (skip, duration) = window_of(settings, &args.window);
        let detection =
            LayoutDetector::from_settings(settings).detect_with_specs(file, skip, duration);
        for warning in &detection.layout.warnings {
            tracing::warn!("{}", warning);
        }
        relabel_specs(&detection.specs, &detection.layout)
    } else {
        channel_specs(settings, file)
    };
    if specs.is_empty() {
        bail!("no audio channels found in {}", file.display());
    }

    let offsets: RepairOffsetMap = args.offsets.iter().cloned().collect();
    Ok((specs, offsets))
}

fn repair_config(settings: &Settings, args: &RepairArgs) -> RepairConfig {
    let mut config = RepairConfig::from_settings(settings);
    if args.no_keep_duration {
        config.keep_duration = false;
    }
    config
}

#[derive(Serialize)]
struct PlanReport<'a> {
    plan: &'a RepairPlan,
    source_duration: Option<f64>,
    ffmpeg: Vec<String>,
}

fn run_plan(settings: &Settings, file: &Path, args: &RepairArgs) -> Result<()> {
    let (specs, offsets) = repair_inputs(settings, file, args)?;
    let config = repair_config(settings, args);
    let plan = build_repair_plan_with(&specs, &offsets, &config);

    let source_duration = if plan.keep_duration {
        Some(
            Ffprobe::from_settings(settings)
                .duration(file)
                .with_context(|| format!("probing duration of {}", file.display()))?,
        )
    } else {
        None
    };

    let mut ffmpeg = vec![config.ffmpeg.clone()];
    ffmpeg.extend(ffmpeg_args(&plan, file, Path::new("OUTPUT.mkv"), source_duration)?);

    print_json(&PlanReport {
        plan: &plan,
        source_duration,
        ffmpeg,
    })
}

fn run_repair(settings: &Settings, file: &Path, output: &Path, args: &RepairArgs) -> Result<()> {
    let (specs, offsets) = repair_inputs(settings, file, args)?;
    let config = repair_config(settings, args);
    let plan = build_repair_plan_with(&specs, &offsets, &config);

    if plan.is_identity() {
        tracing::info!("All offsets are zero; output will be a lossless re-encode");
    }

    let written = apply_repair_plan_with(file, &plan, output, &config, None)
        .with_context(|| format!("repairing {}", file.display()))?;
    print_json(&serde_json::json!({ "output": written, "plan": plan }))
}

fn run_extract(
    settings: &Settings,
    file: &Path,
    channel: usize,
    output: &Path,
    bit_depth: u32,
) -> Result<()> {
    ensure_exists(file)?;
    let Some(codec) = PcmCodec::for_bit_depth(bit_depth) else {
        bail!("unsupported bit depth {} (use 16, 24 or 32)", bit_depth);
    };

    let specs = channel_specs(settings, file);
    let Some(spec) = specs.get(channel) else {
        bail!(
            "channel {} out of range ({} channel(s) in {})",
            channel,
            specs.len(),
            file.display()
        );
    };

    extract_stem_to_file(
        &settings.tools.ffmpeg,
        file,
        spec,
        output,
        settings.repair.sample_rate,
        codec,
        Duration::from_secs(settings.detection.extraction_timeout_secs),
    )
    .with_context(|| format!("extracting channel {} ({})", channel, spec.role_hint))?;

    print_json(&serde_json::json!({ "output": output, "channel": spec }))
}
