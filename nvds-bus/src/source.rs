//! Source lifecycle: resolution, decode sub-graphs and batcher slots.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
    graph::{GraphBackend, Property, StageRole, prop},
    platform::PlatformClass,
};

/// Caps feature of GPU-resident frames.
pub const NVMM_FEATURE: &str = "memory:NVMM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Rtsp,
    Http,
    YouTube,
}

impl SourceKind {
    pub fn is_live(&self) -> bool {
        !matches!(self, SourceKind::File)
    }
}

/// One entry of the configured source list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceEntry {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub url: String,
    /// Playable URI resolved ahead of time (required for YouTube entries).
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default = "default_enable")]
    pub enable: bool,
}

fn default_enable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub index: usize,
    pub kind: SourceKind,
    pub raw_url: String,
    pub resolved_uri: String,
}

impl SourceDescriptor {
    pub fn name(&self) -> String {
        format!("source-bin-{:02}", self.index)
    }
}

/// Resolves enabled entries in order. Entries that cannot be resolved are
/// dropped with a warning; indices stay dense.
pub fn resolve_sources(entries: &[SourceEntry]) -> Vec<SourceDescriptor> {
    let mut descriptors = Vec::new();
    for entry in entries.iter().filter(|e| e.enable) {
        match resolve_uri(entry) {
            Ok(resolved_uri) => {
                let index = descriptors.len();
                log::info!("Sources: stream {} -> {}", index, resolved_uri);
                descriptors.push(SourceDescriptor {
                    index,
                    kind: entry.kind,
                    raw_url: entry.url.clone(),
                    resolved_uri,
                });
            }
            Err(e) => log::warn!("Sources: skip '{}': {:#}", entry.url, e),
        }
    }
    descriptors
}

fn resolve_uri(entry: &SourceEntry) -> anyhow::Result<String> {
    match entry.kind {
        SourceKind::File => {
            let path = absolute(Path::new(
                entry.url.strip_prefix("file://").unwrap_or(&entry.url),
            ))?;
            if !path.exists() {
                log::warn!(
                    "Sources: file {} does not exist, stream will produce no frames",
                    path.display()
                );
            }
            Ok(format!("file://{}", path.display()))
        }
        SourceKind::Rtsp => {
            if !entry.url.starts_with("rtsp://") && !entry.url.starts_with("rtsps://") {
                log::warn!("Sources: '{}' does not look like an RTSP URL", entry.url);
            }
            Ok(entry.url.clone())
        }
        SourceKind::Http => Ok(entry.url.clone()),
        SourceKind::YouTube => entry
            .uri
            .clone()
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| anyhow::anyhow!("youtube source has no resolved uri")),
    }
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

/// Outcome of caps negotiation on a new decoder output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// GPU-resident video, connect it.
    Accept,
    /// Video in system memory. Downstream stages cannot consume it.
    Reject,
    /// Not video (audio, subtitles).
    Ignore,
}

pub fn negotiate(media_type: &str, features: &[&str]) -> Negotiation {
    if !media_type.starts_with("video") {
        return Negotiation::Ignore;
    }
    if features.contains(&NVMM_FEATURE) {
        Negotiation::Accept
    } else {
        Negotiation::Reject
    }
}

/// Properties for an element created inside a decode sub-graph, keyed on
/// the child's name. Callers apply only those the element exposes.
pub fn child_properties(child_name: &str, platform: PlatformClass) -> Vec<Property> {
    if child_name.starts_with("nvv4l2decoder") && platform.is_integrated() {
        return vec![
            prop("enable-max-performance", true),
            prop("drop-frame-interval", 0u32),
            prop("num-extra-surfaces", 0u32),
        ];
    }
    if child_name == "source" {
        return vec![prop("drop-on-latency", true)];
    }
    Vec::new()
}

/// Batcher slot table. Slot `n` is the `n`-th attached source; a released
/// slot stays vacant so the others keep their batcher pad.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSlots {
    sources: Vec<Option<usize>>,
}

impl StreamSlots {
    pub fn allocate(&mut self, source_index: usize) -> usize {
        if let Some(slot) = self.slot_of(source_index) {
            return slot;
        }
        self.sources.push(Some(source_index));
        self.sources.len() - 1
    }

    /// Vacates the slot of `source_index`, returning it.
    pub fn release(&mut self, source_index: usize) -> Option<usize> {
        let slot = self.slot_of(source_index)?;
        self.sources[slot] = None;
        Some(slot)
    }

    pub fn slot_of(&self, source_index: usize) -> Option<usize> {
        self.sources.iter().position(|&s| s == Some(source_index))
    }

    pub fn source_of(&self, slot: usize) -> Option<usize> {
        self.sources.get(slot).copied().flatten()
    }

    /// Number of slots handed out, vacant ones included.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn occupied(&self) -> usize {
        self.sources.iter().flatten().count()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }
}

/// Owns the active sources of one pipeline.
#[derive(Debug, Default)]
pub struct SourceManager {
    active: Vec<SourceDescriptor>,
    slots: StreamSlots,
}

impl SourceManager {
    /// Builds a decode sub-graph per descriptor. Failing sources are skipped;
    /// having none left is fatal.
    pub fn create<B: GraphBackend + ?Sized>(
        backend: &mut B,
        descriptors: Vec<SourceDescriptor>,
        platform: PlatformClass,
    ) -> anyhow::Result<Self> {
        let requested = descriptors.len();
        let mut active = Vec::with_capacity(requested);
        for source in descriptors {
            match backend.add_source(&source, platform) {
                Ok(()) => active.push(source),
                Err(e) => log::error!(
                    "Sources: failed to create {} for {}: {:#}",
                    source.name(),
                    source.raw_url,
                    e
                ),
            }
        }
        if active.is_empty() {
            anyhow::bail!("no usable sources ({} requested)", requested);
        }
        log::info!("Sources: {} of {} sources active", active.len(), requested);
        Ok(Self {
            active,
            slots: StreamSlots::default(),
        })
    }

    /// Connects every active source to the next free batcher slot.
    pub fn attach<B: GraphBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        batcher: StageRole,
    ) -> anyhow::Result<()> {
        for source in &self.active {
            let slot = self.slots.allocate(source.index);
            backend.attach_source(source.index, batcher, slot).map_err(|e| {
                anyhow::anyhow!("attach {} to {} slot {}: {:#}", source.name(), batcher, slot, e)
            })?;
            log::debug!("Sources: {} -> {} slot {}", source.name(), batcher, slot);
        }
        Ok(())
    }

    /// Detaches a source the graph refused while running. Returns the slot
    /// it held, or `None` when the source was no longer active.
    pub fn reject<B: GraphBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        index: usize,
        batcher: StageRole,
    ) -> anyhow::Result<Option<usize>> {
        let Some(pos) = self.active.iter().position(|s| s.index == index) else {
            return Ok(None);
        };
        let source = self.active.remove(pos);
        let Some(slot) = self.slots.release(index) else {
            backend.remove_source(index);
            return Ok(None);
        };
        backend
            .detach_source(index, batcher, slot)
            .map_err(|e| anyhow::anyhow!("detach {} from slot {}: {:#}", source.name(), slot, e))?;
        log::warn!(
            "Sources: dropped {} ({}), {} sources remain",
            source.name(),
            source.raw_url,
            self.active.len()
        );
        Ok(Some(slot))
    }

    pub fn active(&self) -> &[SourceDescriptor] {
        &self.active
    }

    pub fn slots(&self) -> &StreamSlots {
        &self.slots
    }

    /// Display name of the stream attached at `slot`.
    pub fn stream_name(&self, slot: usize) -> String {
        match self.slots.source_of(slot) {
            Some(index) => format!("stream{}", index),
            None => format!("slot{}", slot),
        }
    }

    pub fn teardown<B: GraphBackend + ?Sized>(&mut self, backend: &mut B) {
        for source in self.active.drain(..) {
            backend.remove_source(source.index);
        }
        self.slots.clear();
    }
}

#[cfg(test)]
#[path = "source_test.rs"]
mod source_test;
