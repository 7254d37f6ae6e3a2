//! Static configuration values consumed by the topology.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::topology::{ModelKind, OutputMode};

pub const DEFAULT_ENCODER_BITRATE: u32 = 4_097_152;
pub const DEFAULT_RELAY_HOST: &str = "127.0.0.1";
pub const NEW_STREAMMUX_ENV: &str = "USE_NEW_NVSTREAMMUX";

/// Which batcher implementation the DeepStream installation loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatcherMode {
    Legacy,
    New,
}

impl BatcherMode {
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(NEW_STREAMMUX_ENV).ok().as_deref())
    }

    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("yes") => BatcherMode::New,
            _ => BatcherMode::Legacy,
        }
    }
}

/// Output and display values. Every field is optional here; which ones are
/// required depends on the output mode, see [`GraphSettings::validate`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub muxer_batch_timeout_usec: Option<u32>,
    pub muxer_output_width: Option<u32>,
    pub muxer_output_height: Option<u32>,
    pub tiled_output_width: Option<u32>,
    pub tiled_output_height: Option<u32>,
    pub osd_process_mode: Option<u32>,
    pub osd_display_text: Option<bool>,
    pub rtsp_port: Option<u16>,
    pub rtsp_udp_sync_port: Option<u16>,
    pub rtsp_mount_path: Option<String>,
    pub output_directory: Option<PathBuf>,
    pub output_filename_prefix: Option<String>,
    pub encoder_bitrate: Option<u32>,
    pub relay_host: Option<String>,
    pub streammux_config_file: Option<PathBuf>,
}

impl GraphSettings {
    /// Keys required by `mode` that are not set.
    pub fn missing(&self, mode: OutputMode, batcher: BatcherMode) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let mut require = |present: bool, key: &'static str| {
            if !present {
                missing.push(key);
            }
        };

        if batcher == BatcherMode::Legacy {
            require(self.muxer_batch_timeout_usec.is_some(), "muxer_batch_timeout_usec");
            require(self.muxer_output_width.is_some(), "muxer_output_width");
            require(self.muxer_output_height.is_some(), "muxer_output_height");
        }
        if mode.renders() {
            require(self.tiled_output_width.is_some(), "tiled_output_width");
            require(self.tiled_output_height.is_some(), "tiled_output_height");
            require(self.osd_process_mode.is_some(), "osd_process_mode");
            require(self.osd_display_text.is_some(), "osd_display_text");
        }
        match mode {
            OutputMode::File => {
                require(self.output_directory.is_some(), "output_directory");
                require(self.output_filename_prefix.is_some(), "output_filename_prefix");
            }
            OutputMode::Rtsp => {
                require(self.rtsp_port.is_some(), "rtsp_port");
                require(self.rtsp_udp_sync_port.is_some(), "rtsp_udp_sync_port");
                require(self.rtsp_mount_path.is_some(), "rtsp_mount_path");
            }
            OutputMode::Display | OutputMode::Silent => {}
        }
        missing
    }

    pub fn validate(&self, mode: OutputMode, batcher: BatcherMode) -> anyhow::Result<()> {
        let missing = self.missing(mode, batcher);
        if !missing.is_empty() {
            anyhow::bail!(
                "missing required configuration for {} output: {}",
                mode,
                missing.join(", ")
            );
        }
        Ok(())
    }

    pub fn encoder_bitrate(&self) -> u32 {
        self.encoder_bitrate.unwrap_or(DEFAULT_ENCODER_BITRATE)
    }

    pub fn relay_host(&self) -> &str {
        self.relay_host.as_deref().unwrap_or(DEFAULT_RELAY_HOST)
    }

    /// Geometry of batched frames when the legacy batcher scales them.
    pub fn batcher_frame_size(&self, batcher: BatcherMode) -> Option<(u32, u32)> {
        match (batcher, self.muxer_output_width, self.muxer_output_height) {
            (BatcherMode::Legacy, Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }
}

pub fn required<T: Clone>(value: &Option<T>, key: &'static str) -> anyhow::Result<T> {
    value
        .clone()
        .ok_or_else(|| anyhow::anyhow!("missing required configuration: {}", key))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelSettings {
    #[serde(default)]
    pub kind: ModelKind,
    #[serde(default = "default_detection_config")]
    pub detection_config: PathBuf,
    #[serde(default = "default_segmentation_config")]
    pub segmentation_config: PathBuf,
    pub labels_path: PathBuf,
}

impl ModelSettings {
    /// Inference configuration file for the selected model kind.
    pub fn inference_config(&self) -> &Path {
        match self.kind {
            ModelKind::Detection => &self.detection_config,
            ModelKind::Segmentation => &self.segmentation_config,
        }
    }
}

fn default_detection_config() -> PathBuf {
    PathBuf::from("config/pgie/config_pgie_yolo_det.txt")
}

fn default_segmentation_config() -> PathBuf {
    PathBuf::from("config/pgie/config_pgie_yolo_seg.txt")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerPreset {
    #[default]
    Accuracy,
    Performance,
}

/// Tracker parameters, fixed for the lifetime of a deployment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    pub preset: TrackerPreset,
    pub lib_file: PathBuf,
    pub accuracy_config: PathBuf,
    pub performance_config: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            preset: TrackerPreset::Accuracy,
            lib_file: PathBuf::from(
                "/opt/nvidia/deepstream/deepstream/lib/libnvds_nvmultiobjecttracker.so",
            ),
            accuracy_config: PathBuf::from("config/tracker/config_tracker_NvDCF_accuracy.yml"),
            performance_config: PathBuf::from("config/tracker/config_tracker_NvDCF_perf.yml"),
            width: 640,
            height: 384,
        }
    }
}

impl TrackerSettings {
    pub fn config_file(&self) -> &Path {
        match self.preset {
            TrackerPreset::Accuracy => &self.accuracy_config,
            TrackerPreset::Performance => &self.performance_config,
        }
    }
}
