//! Declarative topology planning.
//!
//! [`plan`] maps `(output mode, model kind, platform class)` plus static
//! settings to an ordered list of stages. Consecutive stages are linked; the
//! frame-processing hook sits on the input of [`TopologyPlan::hook_point`].

use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::{
    graph::{RelaySpec, Stage, StageRole},
    platform::PlatformClass,
    settings::{BatcherMode, GraphSettings, ModelSettings, TrackerSettings, required},
    source::SourceDescriptor,
    tiling::{TileGrid, tile_grid},
};

pub const FILE_EXTENSION: &str = "mkv";
const RELAY_ENCODING: &str = "H264";
const NVMM_RGBA: &str = "video/x-raw(memory:NVMM), format=RGBA";
const NVMM_I420: &str = "video/x-raw(memory:NVMM), format=I420";
const SYSTEM_I420: &str = "video/x-raw, format=I420";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Display,
    File,
    Rtsp,
    Silent,
}

impl OutputMode {
    /// Whether the mode tiles and draws overlays.
    pub fn renders(&self) -> bool {
        !matches!(self, OutputMode::Silent)
    }
}

impl Display for OutputMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputMode::Display => write!(f, "display"),
            OutputMode::File => write!(f, "file"),
            OutputMode::Rtsp => write!(f, "rtsp"),
            OutputMode::Silent => write!(f, "silent"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Detection,
    Segmentation,
}

impl ModelKind {
    pub fn draws_masks(&self) -> bool {
        matches!(self, ModelKind::Segmentation)
    }
}

/// Encoder tuning, chosen by platform class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// CPU x264 with a fast, zero-latency preset.
    Software,
    /// Hardware encoder tuned for latency.
    LowLatency,
    /// Hardware encoder tuned for picture quality.
    Fidelity,
}

impl Encoding {
    pub fn for_platform(platform: PlatformClass) -> Self {
        match platform {
            PlatformClass::LowPowerEmbedded => Encoding::Software,
            PlatformClass::IntegratedGpu => Encoding::LowLatency,
            PlatformClass::DiscreteGpu => Encoding::Fidelity,
        }
    }

    fn stages(&self, bitrate: u32) -> Vec<Stage> {
        let convert = Stage::new(StageRole::EncoderConvert, "nvvideoconvert");
        match self {
            Encoding::Software => vec![
                convert,
                Stage::new(StageRole::EncoderCaps, "capsfilter").with_caps(SYSTEM_I420),
                Stage::new(StageRole::Encoder, "x264enc")
                    .with("bitrate", (bitrate / 1000).max(1))
                    .with_nick("speed-preset", "ultrafast")
                    .with_nick("tune", "zerolatency"),
            ],
            Encoding::LowLatency => vec![
                convert,
                Stage::new(StageRole::EncoderCaps, "capsfilter").with_caps(NVMM_I420),
                Stage::new(StageRole::Encoder, "nvv4l2h264enc")
                    .with("bitrate", bitrate)
                    .with("preset-level", 1u32)
                    .with("maxperf-enable", true)
                    .with("insert-sps-pps", true),
            ],
            Encoding::Fidelity => vec![
                convert,
                Stage::new(StageRole::EncoderCaps, "capsfilter").with_caps(NVMM_I420),
                Stage::new(StageRole::Encoder, "nvv4l2h264enc")
                    .with("bitrate", bitrate)
                    .with("tuning-info-id", 1u32)
                    .with("insert-sps-pps", true),
            ],
        }
    }
}

/// Where the processed stream ends up.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputTarget {
    Discard,
    Display(PlatformClass),
    File(PathBuf),
    Relay(RelaySpec),
}

impl Display for OutputTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputTarget::Discard => write!(f, "discard"),
            OutputTarget::Display(platform) => write!(f, "display ({})", platform),
            OutputTarget::File(path) => write!(f, "file {}", path.display()),
            OutputTarget::Relay(relay) => write!(f, "rtsp {}", relay.endpoint()),
        }
    }
}

pub struct PlanContext<'a> {
    pub output_mode: OutputMode,
    pub platform: PlatformClass,
    pub batcher_mode: BatcherMode,
    pub model: &'a ModelSettings,
    pub tracker: &'a TrackerSettings,
    pub settings: &'a GraphSettings,
    /// Sources that will be attached, in slot order.
    pub sources: &'a [SourceDescriptor],
    pub started_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopologyPlan {
    pub stages: Vec<Stage>,
    pub hook_point: StageRole,
    pub grid: Option<TileGrid>,
    pub output: OutputTarget,
}

impl TopologyPlan {
    pub fn stage(&self, role: StageRole) -> Option<&Stage> {
        self.stages.iter().find(|s| s.role == role)
    }

    pub fn roles(&self) -> Vec<StageRole> {
        self.stages.iter().map(|s| s.role).collect()
    }

    /// Upstream/downstream pairs in link order.
    pub fn links(&self) -> Vec<(StageRole, StageRole)> {
        self.stages
            .windows(2)
            .map(|pair| (pair[0].role, pair[1].role))
            .collect()
    }

    pub fn renders(&self) -> bool {
        self.grid.is_some()
    }
}

pub fn plan(ctx: &PlanContext<'_>) -> anyhow::Result<TopologyPlan> {
    if ctx.sources.is_empty() {
        anyhow::bail!("cannot plan a pipeline without sources");
    }
    ctx.settings.validate(ctx.output_mode, ctx.batcher_mode)?;

    let mut stages = vec![batcher(ctx)?, inference(ctx), tracker(ctx.tracker)];
    let branch = output_branch(ctx)?;
    stages.extend(branch.stages);

    Ok(TopologyPlan {
        stages,
        hook_point: branch.hook_point,
        grid: branch.grid,
        output: branch.output,
    })
}

struct Branch {
    stages: Vec<Stage>,
    hook_point: StageRole,
    grid: Option<TileGrid>,
    output: OutputTarget,
}

fn output_branch(ctx: &PlanContext<'_>) -> anyhow::Result<Branch> {
    let (tail, output) = sink_branch(ctx)?;
    if !ctx.output_mode.renders() {
        return Ok(Branch {
            stages: tail,
            hook_point: StageRole::Sink,
            grid: None,
            output,
        });
    }

    let grid = tile_grid(ctx.sources.len());
    let mut stages = render_stages(ctx, grid)?;
    stages.extend(tail);
    Ok(Branch {
        stages,
        hook_point: StageRole::Tiler,
        grid: Some(grid),
        output,
    })
}

/// Stages after the overlay, ending in the sink.
fn sink_branch(ctx: &PlanContext<'_>) -> anyhow::Result<(Vec<Stage>, OutputTarget)> {
    let encoding = Encoding::for_platform(ctx.platform);
    let bitrate = ctx.settings.encoder_bitrate();

    Ok(match ctx.output_mode {
        OutputMode::Silent => (vec![discard_sink()], OutputTarget::Discard),
        OutputMode::Display => (
            vec![display_sink(ctx.platform)],
            OutputTarget::Display(ctx.platform),
        ),
        OutputMode::File => {
            let path = output_file_path(
                &required(&ctx.settings.output_directory, "output_directory")?,
                &required(&ctx.settings.output_filename_prefix, "output_filename_prefix")?,
                ctx.started_at,
            );
            let mut stages = encoding.stages(bitrate);
            stages.push(Stage::new(StageRole::Parser, "h264parse"));
            stages.push(Stage::new(StageRole::Container, "matroskamux"));
            stages.push(
                Stage::new(StageRole::Sink, "filesink")
                    .with("location", path_arg(&path))
                    .with("sync", false)
                    .with("async", false),
            );
            (stages, OutputTarget::File(path))
        }
        OutputMode::Rtsp => {
            let relay = relay_spec(ctx.settings)?;
            let mut stages = encoding.stages(bitrate);
            stages.push(
                Stage::new(StageRole::Payloader, "rtph264pay").with("config-interval", 1i32),
            );
            stages.push(
                Stage::new(StageRole::Sink, "udpsink")
                    .with("host", relay.host.clone())
                    .with("port", relay.udp_port as i32)
                    .with("async", false)
                    .with("sync", true),
            );
            (stages, OutputTarget::Relay(relay))
        }
    })
}

fn batcher(ctx: &PlanContext<'_>) -> anyhow::Result<Stage> {
    let batch_size = u32::try_from(ctx.sources.len())?;
    let stage = Stage::new(StageRole::Batcher, "nvstreammux").with("batch-size", batch_size);
    let settings = ctx.settings;
    Ok(match ctx.batcher_mode {
        BatcherMode::Legacy => {
            let live = ctx.sources.iter().any(|s| s.kind.is_live());
            stage
                .with("width", required(&settings.muxer_output_width, "muxer_output_width")?)
                .with(
                    "height",
                    required(&settings.muxer_output_height, "muxer_output_height")?,
                )
                .with(
                    "batched-push-timeout",
                    i32::try_from(required(
                        &settings.muxer_batch_timeout_usec,
                        "muxer_batch_timeout_usec",
                    )?)
                    .context("muxer_batch_timeout_usec exceeds the batcher's range")?,
                )
                .with("live-source", live)
        }
        BatcherMode::New => match &settings.streammux_config_file {
            Some(path) => stage.with("config-file-path", path_arg(path)),
            None => stage,
        },
    })
}

fn inference(ctx: &PlanContext<'_>) -> Stage {
    Stage::new(StageRole::Inference, "nvinfer")
        .with("config-file-path", path_arg(ctx.model.inference_config()))
        .with("batch-size", ctx.sources.len() as u32)
}

fn tracker(tracker: &TrackerSettings) -> Stage {
    Stage::new(StageRole::Tracker, "nvtracker")
        .with("tracker-width", tracker.width)
        .with("tracker-height", tracker.height)
        .with("ll-lib-file", path_arg(&tracker.lib_file))
        .with("ll-config-file", path_arg(tracker.config_file()))
        .with("display-tracking-id", true)
}

fn render_stages(ctx: &PlanContext<'_>, grid: TileGrid) -> anyhow::Result<Vec<Stage>> {
    let settings = ctx.settings;
    let masks = ctx.model.kind.draws_masks();
    Ok(vec![
        Stage::new(StageRole::Tiler, "nvmultistreamtiler")
            .with("rows", grid.rows)
            .with("columns", grid.columns)
            .with("width", required(&settings.tiled_output_width, "tiled_output_width")?)
            .with("height", required(&settings.tiled_output_height, "tiled_output_height")?),
        Stage::new(StageRole::OverlayConvert, "nvvideoconvert"),
        Stage::new(StageRole::OverlayCaps, "capsfilter").with_caps(NVMM_RGBA),
        Stage::new(StageRole::Overlay, "nvdsosd")
            .with("process-mode", required(&settings.osd_process_mode, "osd_process_mode")?)
            .with("display-text", required(&settings.osd_display_text, "osd_display_text")?)
            .with("display-bbox", true)
            .with("display-mask", masks),
    ])
}

fn display_sink(platform: PlatformClass) -> Stage {
    let factory = if platform.is_integrated() {
        "nv3dsink"
    } else {
        "nveglglessink"
    };
    Stage::new(StageRole::Sink, factory).with("sync", false)
}

fn discard_sink() -> Stage {
    Stage::new(StageRole::Sink, "fakesink")
        .with("enable-last-sample", false)
        .with("sync", false)
}

fn relay_spec(settings: &GraphSettings) -> anyhow::Result<RelaySpec> {
    Ok(RelaySpec {
        host: settings.relay_host().to_string(),
        port: required(&settings.rtsp_port, "rtsp_port")?,
        udp_port: required(&settings.rtsp_udp_sync_port, "rtsp_udp_sync_port")?,
        mount_path: normalize_mount(&required(&settings.rtsp_mount_path, "rtsp_mount_path")?),
        encoding: RELAY_ENCODING,
    })
}

fn normalize_mount(mount: &str) -> String {
    if mount.starts_with('/') {
        mount.to_string()
    } else {
        format!("/{}", mount)
    }
}

/// `{dir}/{prefix}_{yyyyMMddHHmmss}.mkv`
pub fn output_file_path(dir: &Path, prefix: &str, at: NaiveDateTime) -> PathBuf {
    dir.join(format!(
        "{}_{}.{}",
        prefix,
        at.format("%Y%m%d%H%M%S"),
        FILE_EXTENSION
    ))
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
#[path = "topology_test.rs"]
mod topology_test;
