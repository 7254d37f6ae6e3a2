use super::{
    Negotiation, SourceDescriptor, SourceEntry, SourceKind, SourceManager, StreamSlots,
    child_properties, negotiate, resolve_sources,
};
use crate::{
    graph::{GraphBackend, PropValue, Stage, StageRole},
    graph_mock::MockGraph,
    platform::PlatformClass,
};

fn entry(kind: SourceKind, url: &str) -> SourceEntry {
    SourceEntry {
        name: String::new(),
        kind,
        url: url.to_string(),
        uri: None,
        enable: true,
    }
}

fn descriptor(index: usize) -> SourceDescriptor {
    SourceDescriptor {
        index,
        kind: SourceKind::File,
        raw_url: format!("video{}.mp4", index),
        resolved_uri: format!("file:///data/video{}.mp4", index),
    }
}

// ------------------------------------------------------------------------
// Resolution
// ------------------------------------------------------------------------

#[test]
fn test_resolve_assigns_dense_indices() {
    let mut disabled = entry(SourceKind::Rtsp, "rtsp://cam0/stream");
    disabled.enable = false;
    let entries = vec![
        entry(SourceKind::Rtsp, "rtsp://cam1/stream"),
        disabled,
        entry(SourceKind::YouTube, "https://youtu.be/abc"),
        entry(SourceKind::Http, "http://host/video.mp4"),
    ];

    let sources = resolve_sources(&entries);
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].index, 0);
    assert_eq!(sources[0].resolved_uri, "rtsp://cam1/stream");
    assert_eq!(sources[1].index, 1);
    assert_eq!(sources[1].kind, SourceKind::Http);
}

#[test]
fn test_resolve_file_paths() {
    let sources = resolve_sources(&[
        entry(SourceKind::File, "/definitely/missing/clip.mp4"),
        entry(SourceKind::File, "file:///videos/a.mp4"),
        entry(SourceKind::File, "relative/clip.mp4"),
    ]);
    // missing files are degraded, not dropped
    assert_eq!(sources.len(), 3);
    assert_eq!(sources[0].resolved_uri, "file:///definitely/missing/clip.mp4");
    assert_eq!(sources[1].resolved_uri, "file:///videos/a.mp4");
    assert!(sources[2].resolved_uri.starts_with("file:///"));
    assert!(sources[2].resolved_uri.ends_with("relative/clip.mp4"));
}

#[test]
fn test_youtube_uses_resolved_uri() {
    let mut yt = entry(SourceKind::YouTube, "https://youtu.be/abc");
    yt.uri = Some("https://cdn.example/abc.m3u8".to_string());
    let sources = resolve_sources(&[yt]);
    assert_eq!(sources[0].resolved_uri, "https://cdn.example/abc.m3u8");
    assert_eq!(sources[0].raw_url, "https://youtu.be/abc");
}

#[test]
fn test_entry_deserialize() {
    let entry: SourceEntry =
        serde_json::from_str(r#"{"type": "youtube", "url": "https://youtu.be/x"}"#).unwrap();
    assert_eq!(entry.kind, SourceKind::YouTube);
    assert!(entry.enable);
    assert!(entry.uri.is_none());
}

// ------------------------------------------------------------------------
// Negotiation and decoder tuning
// ------------------------------------------------------------------------

#[test]
fn test_negotiation_requires_nvmm() {
    assert_eq!(negotiate("video/x-raw", &["memory:NVMM"]), Negotiation::Accept);
    assert_eq!(negotiate("video/x-raw", &[]), Negotiation::Reject);
    assert_eq!(
        negotiate("video/x-raw", &["memory:SystemMemory"]),
        Negotiation::Reject
    );
    assert_eq!(negotiate("audio/x-raw", &["memory:NVMM"]), Negotiation::Ignore);
}

#[test]
fn test_child_properties() {
    let props = child_properties("nvv4l2decoder0", PlatformClass::IntegratedGpu);
    assert_eq!(props.len(), 3);
    assert_eq!(props[0].name, "enable-max-performance");
    assert_eq!(props[0].value, PropValue::Bool(true));

    assert!(child_properties("nvv4l2decoder0", PlatformClass::DiscreteGpu).is_empty());

    let props = child_properties("source", PlatformClass::DiscreteGpu);
    assert_eq!(props[0].name, "drop-on-latency");
    assert!(child_properties("typefind", PlatformClass::IntegratedGpu).is_empty());
}

// ------------------------------------------------------------------------
// Slots and lifecycle
// ------------------------------------------------------------------------

#[test]
fn test_slots_are_dense() {
    let mut slots = StreamSlots::default();
    assert_eq!(slots.allocate(0), 0);
    assert_eq!(slots.allocate(2), 1);
    assert_eq!(slots.allocate(5), 2);
    assert_eq!(slots.allocate(2), 1);
    assert_eq!(slots.len(), 3);
    assert_eq!(slots.source_of(1), Some(2));
    assert_eq!(slots.slot_of(5), Some(2));
    assert_eq!(slots.slot_of(1), None);
}

#[test]
fn test_released_slot_stays_vacant() {
    let mut slots = StreamSlots::default();
    for index in [0, 1, 2] {
        slots.allocate(index);
    }
    assert_eq!(slots.release(1), Some(1));
    assert_eq!(slots.release(1), None);
    assert_eq!(slots.source_of(1), None);
    assert_eq!(slots.slot_of(2), Some(2));
    assert_eq!(slots.len(), 3);
    assert_eq!(slots.occupied(), 2);
    assert_eq!(slots.allocate(7), 3);
}

#[test]
fn test_rejected_source_is_detached() -> anyhow::Result<()> {
    let mut graph = MockGraph::new();
    graph.add_stage(&Stage::new(StageRole::Batcher, "nvstreammux"))?;
    let mut manager = SourceManager::create(
        &mut graph,
        (0..3).map(descriptor).collect(),
        PlatformClass::DiscreteGpu,
    )?;
    manager.attach(&mut graph, StageRole::Batcher)?;

    assert_eq!(manager.reject(&mut graph, 1, StageRole::Batcher)?, Some(1));
    assert_eq!(graph.detached, vec![(1, 1)]);
    assert_eq!(
        manager.active().iter().map(|s| s.index).collect::<Vec<_>>(),
        vec![0, 2]
    );
    assert_eq!(manager.stream_name(2), "stream2");
    assert_eq!(manager.slots().occupied(), 2);

    // a second rejection of the same stream is a no-op
    assert_eq!(manager.reject(&mut graph, 1, StageRole::Batcher)?, None);
    assert_eq!(graph.detached.len(), 1);

    manager.teardown(&mut graph);
    assert_eq!(graph.removed, vec![0, 2]);
    Ok(())
}

#[test]
fn test_failed_source_is_skipped() -> anyhow::Result<()> {
    let mut graph = MockGraph::new();
    graph.failing_sources.insert(1);
    graph.add_stage(&Stage::new(StageRole::Batcher, "nvstreammux"))?;

    let mut manager = SourceManager::create(
        &mut graph,
        (0..3).map(descriptor).collect(),
        PlatformClass::DiscreteGpu,
    )?;
    manager.attach(&mut graph, StageRole::Batcher)?;

    assert_eq!(manager.active().len(), 2);
    assert_eq!(graph.attached, vec![(0, 0), (2, 1)]);
    assert_eq!(manager.stream_name(1), "stream2");

    manager.teardown(&mut graph);
    assert_eq!(graph.removed, vec![0, 2]);
    assert!(manager.slots().is_empty());
    Ok(())
}

#[test]
fn test_no_active_sources_is_fatal() {
    let mut graph = MockGraph::new();
    graph.failing_sources.extend([0, 1]);
    let err = SourceManager::create(
        &mut graph,
        (0..2).map(descriptor).collect(),
        PlatformClass::DiscreteGpu,
    )
    .unwrap_err();
    assert!(err.to_string().contains("no usable sources"), "{}", err);
}
