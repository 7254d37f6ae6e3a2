use std::path::Path;

use nvds_bus::{
    platform::PlatformClass,
    settings::{BatcherMode, TrackerPreset},
    source::{SourceKind, resolve_sources},
    topology::{ModelKind, OutputMode},
};

use super::AppConfig;

#[test]
fn test_sample_config_is_complete() -> anyhow::Result<()> {
    let config = AppConfig::parse(include_str!("../config/pipeline.json"))?;
    for mode in [
        OutputMode::Display,
        OutputMode::File,
        OutputMode::Rtsp,
        OutputMode::Silent,
    ] {
        config.pipeline.validate(mode, BatcherMode::Legacy)?;
    }
    assert_eq!(config.model.kind, ModelKind::Detection);
    assert_eq!(config.model.labels_path, Path::new("config/labels.txt"));
    assert_eq!(config.tracker.preset, TrackerPreset::Accuracy);
    assert_eq!(config.tracker.width, 640);
    assert!(config.platform.is_none());

    assert_eq!(config.sources.len(), 2);
    assert_eq!(config.sources[1].kind, SourceKind::Rtsp);
    assert!(!config.sources[1].enable);
    assert_eq!(resolve_sources(&config.sources).len(), 1);
    Ok(())
}

#[test]
fn test_minimal_config() -> anyhow::Result<()> {
    let config = AppConfig::parse(
        r#"{
            "model": { "labels_path": "labels.txt", "kind": "segmentation" },
            "platform": "low-power-embedded"
        }"#,
    )?;
    assert_eq!(config.model.kind, ModelKind::Segmentation);
    assert_eq!(config.platform, Some(PlatformClass::LowPowerEmbedded));
    assert!(config.sources.is_empty());

    let err = config
        .pipeline
        .validate(OutputMode::File, BatcherMode::New)
        .unwrap_err()
        .to_string();
    assert!(err.contains("output_directory"));
    assert!(err.contains("output_filename_prefix"));
    Ok(())
}

#[test]
fn test_model_section_is_required() {
    assert!(AppConfig::parse(r#"{ "sources": [] }"#).is_err());
}

#[test]
fn test_load_names_missing_file() {
    let err = AppConfig::load(Path::new("/nonexistent/pipeline.json")).unwrap_err();
    assert!(format!("{:#}", err).contains("/nonexistent/pipeline.json"));
}
