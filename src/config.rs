//! Application configuration file.

use std::path::Path;

use anyhow::Context;
use nvds_bus::{
    platform::PlatformClass,
    settings::{GraphSettings, ModelSettings, TrackerSettings},
    source::SourceEntry,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: GraphSettings,
    pub model: ModelSettings,
    #[serde(default)]
    pub tracker: TrackerSettings,
    /// Skips hardware detection when set.
    #[serde(default)]
    pub platform: Option<PlatformClass>,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parse config file {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
