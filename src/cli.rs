use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use nvds_bus::{platform::PlatformClass, topology::OutputMode};

#[derive(Parser, Debug)]
#[command(
    name = "ds-analytics",
    version,
    about = "Multi-stream detection and tracking with on-screen trajectories",
    after_help = "Examples:\n  ds-analytics --output file\n  ds-analytics --output rtsp --config config/pipeline.json\n  USE_NEW_NVSTREAMMUX=yes ds-analytics --output silent"
)]
pub struct Args {
    /// Where the annotated mosaic goes.
    #[arg(short, long, value_enum, default_value_t = OutputArg::Display)]
    pub output: OutputArg,

    /// Pipeline configuration file.
    #[arg(short, long, default_value = "config/pipeline.json")]
    pub config: PathBuf,

    /// Override the detected hardware platform.
    #[arg(long, value_enum)]
    pub platform: Option<PlatformArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputArg {
    Display,
    File,
    Rtsp,
    Silent,
}

impl From<OutputArg> for OutputMode {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Display => OutputMode::Display,
            OutputArg::File => OutputMode::File,
            OutputArg::Rtsp => OutputMode::Rtsp,
            OutputArg::Silent => OutputMode::Silent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    IntegratedGpu,
    DiscreteGpu,
    LowPowerEmbedded,
}

impl From<PlatformArg> for PlatformClass {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::IntegratedGpu => PlatformClass::IntegratedGpu,
            PlatformArg::DiscreteGpu => PlatformClass::DiscreteGpu,
            PlatformArg::LowPowerEmbedded => PlatformClass::LowPowerEmbedded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["ds-analytics"]);
        assert_eq!(args.output, OutputArg::Display);
        assert_eq!(args.config, PathBuf::from("config/pipeline.json"));
        assert!(args.platform.is_none());
    }

    #[test]
    fn test_output_and_platform_values() {
        let args = Args::parse_from([
            "ds-analytics",
            "--output",
            "rtsp",
            "--platform",
            "low-power-embedded",
        ]);
        assert_eq!(OutputMode::from(args.output), OutputMode::Rtsp);
        assert_eq!(
            args.platform.map(PlatformClass::from),
            Some(PlatformClass::LowPowerEmbedded)
        );
        assert!(Args::try_parse_from(["ds-analytics", "--output", "hdmi"]).is_err());
    }
}
