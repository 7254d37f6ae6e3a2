//! Hardware class detection.
//!
//! The class decides which encoder and which display renderer the topology
//! uses, and how decoders are tuned.

use std::fmt::{Display, Formatter};

use serde::Deserialize;

const DEVICE_TREE_MODEL: &str = "/proc/device-tree/model";
const KERNEL_VERSION: &str = "/proc/version";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformClass {
    /// Jetson-class module with a shared-memory GPU and a hardware encoder.
    IntegratedGpu,
    /// PCIe GPU on an x86_64 host.
    DiscreteGpu,
    /// Jetson module without a hardware video encoder (Orin Nano).
    LowPowerEmbedded,
}

impl PlatformClass {
    /// Detects the class of the host this process runs on.
    pub fn detect() -> Self {
        let model = std::fs::read_to_string(DEVICE_TREE_MODEL).ok();
        let class = classify(std::env::consts::ARCH, model.as_deref());
        if is_wsl() {
            log::warn!("Platform: running under WSL, display output is unlikely to work");
        }
        log::info!(
            "Platform: detected {} ({})",
            class,
            model
                .as_deref()
                .map(|m| m.trim_end_matches('\0').trim())
                .unwrap_or("no device tree")
        );
        class
    }

    /// Shares memory between CPU and GPU (Jetson family).
    pub fn is_integrated(&self) -> bool {
        matches!(self, Self::IntegratedGpu | Self::LowPowerEmbedded)
    }

    pub fn has_hw_encoder(&self) -> bool {
        !matches!(self, Self::LowPowerEmbedded)
    }
}

impl Display for PlatformClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IntegratedGpu => write!(f, "integrated-gpu"),
            Self::DiscreteGpu => write!(f, "discrete-gpu"),
            Self::LowPowerEmbedded => write!(f, "low-power-embedded"),
        }
    }
}

/// Maps a CPU architecture and device-tree model string to a class.
pub fn classify(arch: &str, model: Option<&str>) -> PlatformClass {
    if arch != "aarch64" {
        return PlatformClass::DiscreteGpu;
    }
    match model {
        Some(model) if model.contains("Orin Nano") => PlatformClass::LowPowerEmbedded,
        _ => PlatformClass::IntegratedGpu,
    }
}

pub fn is_wsl() -> bool {
    std::fs::read_to_string(KERNEL_VERSION)
        .map(|v| v.to_ascii_lowercase().contains("microsoft"))
        .unwrap_or(false)
}
