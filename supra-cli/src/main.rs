//! supra CLI entrypoint.
//!
//! ```bash
//! supra run --frames 120 --mode nvidia --scale 1080p --json
//! supra run --frames 60 --planar --width 720 --height 480
//! supra probe --json
//! supra policy --width 720 --height 480 --scale 1080p
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{error, info};

use supra_core::error::{FilterError, Result};
use supra_core::hw::{HwRegistry, HwSession, TextureDesc, TextureUsage};
use supra_core::options::{ScaleTarget, SuperResMode, SuperResOptions};
use supra_core::policy;
use supra_core::types::{FrameMeta, FrameParams, PixelFormat, PlanarBuf, VideoFrame};
use supra_d3d11::mock::MockHw;
use supra_d3d11::session::D3d11Registry;
use supra_filter::SuperResFilter;

#[derive(Parser, Debug)]
#[command(
    name = "supra",
    version,
    about = "Hardware video post-processing filter with vendor super-resolution",
    arg_required_else_help = true,
    after_help = "Examples:\n  supra run --frames 120 --mode nvidia --scale 1080p --json\n  supra run --planar --width 720 --height 480\n  supra probe --json\n  supra policy --width 720 --height 480 --scale 1080p"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the filter over synthetic frames and report counters.
    Run(RunArgs),
    /// Probe the host video registry and list adapters.
    Probe(ProbeArgs),
    /// Print the render size the policy derives for a given input.
    Policy(PolicyArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Off,
    Nvidia,
    Intel,
}

impl From<ModeArg> for SuperResMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Off => Self::Off,
            ModeArg::Nvidia => Self::Nvidia,
            ModeArg::Intel => Self::Intel,
        }
    }
}

impl ModeArg {
    fn label(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Nvidia => "nvidia",
            Self::Intel => "intel",
        }
    }
}

impl std::fmt::Display for ModeArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ScaleArg {
    Auto,
    #[value(name = "2x")]
    X2,
    #[value(name = "3x")]
    X3,
    #[value(name = "720p")]
    P720,
    #[value(name = "1080p")]
    P1080,
    #[value(name = "1440p")]
    P1440,
    #[value(name = "2160p")]
    P2160,
}

impl From<ScaleArg> for ScaleTarget {
    fn from(scale: ScaleArg) -> Self {
        match scale {
            ScaleArg::Auto => Self::Auto,
            ScaleArg::X2 => Self::X2,
            ScaleArg::X3 => Self::X3,
            ScaleArg::P720 => Self::P720,
            ScaleArg::P1080 => Self::P1080,
            ScaleArg::P1440 => Self::P1440,
            ScaleArg::P2160 => Self::P2160,
        }
    }
}

impl ScaleArg {
    fn label(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::X2 => "2x",
            Self::X3 => "3x",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::P1440 => "1440p",
            Self::P2160 => "2160p",
        }
    }
}

impl std::fmt::Display for ScaleArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Number of synthetic frames to feed.
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Input frame width.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Input frame height.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Super-resolution mode.
    #[arg(long, value_enum, default_value_t = ModeArg::Off)]
    mode: ModeArg,

    /// Upscale target.
    #[arg(long, value_enum, default_value_t = ScaleArg::Auto)]
    scale: ScaleArg,

    /// Feed CPU-resident planar frames (exercises the upload path)
    /// instead of GPU surfaces.
    #[arg(long)]
    planar: bool,

    /// Emit the run report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Probe the mock registry instead of the host video pipeline.
    #[arg(long)]
    mock: bool,

    /// Emit the probe report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct PolicyArgs {
    /// Input frame width.
    #[arg(long)]
    width: u32,

    /// Input frame height.
    #[arg(long)]
    height: u32,

    /// Upscale target.
    #[arg(long, value_enum, default_value_t = ScaleArg::Auto)]
    scale: ScaleArg,

    /// Emit the result as JSON on stdout.
    #[arg(long)]
    json: bool,
}

// ─── Reports ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RunReport {
    schema_version: u32,
    mode: &'static str,
    scale: &'static str,
    frames_in: u32,
    frames_out: u32,
    rendered: u64,
    passed: u64,
    skipped: u64,
    pool_allocated: u64,
    pool_hits: u64,
    pool_recycled: u64,
    processor_rebuilds: u64,
    output_width: u32,
    output_height: u32,
}

#[derive(Serialize)]
struct AdapterReport {
    name: String,
    vendor: String,
    vram_mb: u64,
}

#[derive(Serialize)]
struct ProbeReport {
    schema_version: u32,
    available: bool,
    adapters: Vec<AdapterReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct PolicyReport {
    schema_version: u32,
    input_width: u32,
    input_height: u32,
    target_width: u32,
    target_height: u32,
    output_width: u32,
    output_height: u32,
}

const SCHEMA_VERSION: u32 = 1;

// ─── Synthetic frames ────────────────────────────────────────────────────

fn synth_planar(width: u32, height: u32, pts: i64) -> Arc<VideoFrame> {
    let mut buf = PlanarBuf::alloc_yuv420(width, height);
    for row in 0..height as usize {
        for col in 0..width as usize {
            buf.planes[0][row * buf.strides[0] + col] = (row + col + pts as usize) as u8;
        }
    }
    buf.planes[1].fill(128);
    buf.planes[2].fill(128);
    Arc::new(VideoFrame::planar(
        FrameParams::new(PixelFormat::Yuv420p, width, height),
        FrameMeta { pts },
        buf,
    ))
}

fn synth_gpu(session: &HwSession, width: u32, height: u32, pts: i64) -> Result<Arc<VideoFrame>> {
    let surface = session.device.create_texture(&TextureDesc {
        width,
        height,
        format: PixelFormat::Nv12,
        usage: TextureUsage::Dynamic,
    })?;
    Ok(Arc::new(VideoFrame::gpu(
        FrameParams::new(PixelFormat::Nv12, width, height),
        FrameMeta { pts },
        surface,
        0,
    )))
}

// ─── Subcommands ─────────────────────────────────────────────────────────

fn cmd_run(args: RunArgs) -> Result<()> {
    let hw = MockHw::new();
    let opts = SuperResOptions {
        mode: args.mode.into(),
        scale: args.scale.into(),
    };
    let mut filter = SuperResFilter::new(opts, &hw)?;
    let session = hw.session_for_format(PixelFormat::Nv12).ok_or_else(|| {
        FilterError::BindFailed("mock registry has no NV12 session".into())
    })?;

    let mut frames_out = 0u32;
    for index in 0..args.frames {
        let pts = i64::from(index) * 1_000_000 / 30;
        let frame = if args.planar {
            synth_planar(args.width, args.height, pts)
        } else {
            synth_gpu(&session, args.width, args.height, pts)?
        };
        filter.push_frame(frame)?;
        filter.process()?;
        while let Some(frame) = filter.take_output() {
            frames_out += 1;
            drop(frame);
        }
    }

    let counters = filter.counters();
    let pool = filter.pool_stats();
    let (out_width, out_height) = filter
        .output_params()
        .map(|p| (p.width, p.height))
        .unwrap_or((args.width, args.height));
    let report = RunReport {
        schema_version: SCHEMA_VERSION,
        mode: args.mode.label(),
        scale: args.scale.label(),
        frames_in: args.frames,
        frames_out,
        rendered: counters.rendered,
        passed: counters.passed,
        skipped: counters.skipped,
        pool_allocated: pool.allocated,
        pool_hits: pool.hits,
        pool_recycled: pool.recycled,
        processor_rebuilds: filter.rebuild_count(),
        output_width: out_width,
        output_height: out_height,
    };

    if args.json {
        print_json(&report);
    } else {
        info!(
            frames_in = report.frames_in,
            frames_out = report.frames_out,
            rendered = report.rendered,
            passed = report.passed,
            skipped = report.skipped,
            "run finished"
        );
        println!(
            "{} frames in, {} out ({} rendered, {} passed, {} skipped)",
            report.frames_in, report.frames_out, report.rendered, report.passed, report.skipped
        );
        println!(
            "output {}x{}, {} pool allocations, {} rebuilds",
            report.output_width,
            report.output_height,
            report.pool_allocated,
            report.processor_rebuilds
        );
    }
    Ok(())
}

fn cmd_probe(args: ProbeArgs) {
    let report = if args.mock {
        let hw = MockHw::new();
        probe_registry(&hw)
    } else {
        match D3d11Registry::new() {
            Ok(registry) => probe_registry(&registry),
            Err(err) => ProbeReport {
                schema_version: SCHEMA_VERSION,
                available: false,
                adapters: Vec::new(),
                error: Some(err.to_string()),
            },
        }
    };

    if args.json {
        print_json(&report);
    } else if report.available {
        println!("video pipeline available, {} adapter(s):", report.adapters.len());
        for adapter in &report.adapters {
            println!("  {} ({}, {} MB)", adapter.name, adapter.vendor, adapter.vram_mb);
        }
    } else {
        println!(
            "video pipeline unavailable: {}",
            report.error.as_deref().unwrap_or("no adapters")
        );
    }
}

fn probe_registry(registry: &dyn HwRegistry) -> ProbeReport {
    let adapters: Vec<AdapterReport> = registry
        .adapters()
        .into_iter()
        .map(|a| AdapterReport {
            name: a.name,
            vendor: a.vendor,
            vram_mb: a.vram_bytes / (1024 * 1024),
        })
        .collect();
    ProbeReport {
        schema_version: SCHEMA_VERSION,
        available: !adapters.is_empty(),
        adapters,
        error: None,
    }
}

fn cmd_policy(args: PolicyArgs) {
    let scale: ScaleTarget = args.scale.into();
    let (target_w, target_h) = scale.resolve(args.width, args.height);
    let (out_w, out_h) = policy::render_size(args.width, args.height, target_w, target_h);
    let report = PolicyReport {
        schema_version: SCHEMA_VERSION,
        input_width: args.width,
        input_height: args.height,
        target_width: target_w,
        target_height: target_h,
        output_width: out_w,
        output_height: out_h,
    };

    if args.json {
        print_json(&report);
    } else {
        println!(
            "{}x{} -> {}x{} (target {}x{})",
            report.input_width,
            report.input_height,
            report.output_width,
            report.output_height,
            report.target_width,
            report.target_height
        );
    }
}

fn print_json<T: Serialize>(report: &T) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(err) => error!(%err, "failed to serialize report"),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Probe(args) => {
            cmd_probe(args);
            Ok(())
        }
        Commands::Policy(args) => {
            cmd_policy(args);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
