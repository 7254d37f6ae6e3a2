//! In-memory [`GraphBackend`] for tests.

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::Arc,
};

use crate::{
    graph::{GraphBackend, GraphEvent, GraphEventSender, GraphEvents, RelaySpec, Stage, StageRole},
    hook::{BatchView, FrameHook, RenderOutput},
    platform::PlatformClass,
    source::SourceDescriptor,
};

#[derive(Default)]
pub struct MockGraph {
    pub stages: Vec<Stage>,
    pub links: Vec<(StageRole, StageRole)>,
    pub sources: Vec<usize>,
    pub removed: Vec<usize>,
    pub attached: Vec<(usize, usize)>,
    /// `(index, slot)` of sources detached while running.
    pub detached: Vec<(usize, usize)>,
    pub hooks: Vec<(StageRole, Arc<dyn FrameHook>)>,
    pub relays: Vec<RelaySpec>,
    pub failing_sources: HashSet<usize>,
    pub failing_factories: HashSet<&'static str>,
    /// Batches pushed through the hooks when playing.
    pub script: Vec<BatchView>,
    /// Events sent after the script, before `finish_with`.
    pub pending: Vec<GraphEvent>,
    /// Event sent after the script. `None` keeps the graph running.
    pub finish_with: Option<GraphEvent>,
    pub rendered: Vec<RenderOutput>,
    pub created_files: Vec<PathBuf>,
    pub played: bool,
    pub stopped: bool,
    pub failing_stop: bool,
    events: Option<GraphEventSender>,
}

impl MockGraph {
    pub fn new() -> Self {
        Self {
            finish_with: Some(GraphEvent::EndOfStream),
            ..Default::default()
        }
    }

    pub fn stage(&self, role: StageRole) -> Option<&Stage> {
        self.stages.iter().find(|s| s.role == role)
    }
}

impl GraphBackend for MockGraph {
    fn add_stage(&mut self, stage: &Stage) -> anyhow::Result<()> {
        if self.failing_factories.contains(stage.factory) {
            anyhow::bail!("no element factory '{}'", stage.factory);
        }
        self.stages.push(stage.clone());
        Ok(())
    }

    fn link(&mut self, upstream: StageRole, downstream: StageRole) -> anyhow::Result<()> {
        if self.stage(upstream).is_none() || self.stage(downstream).is_none() {
            anyhow::bail!("unknown stage");
        }
        self.links.push((upstream, downstream));
        Ok(())
    }

    fn add_source(
        &mut self,
        source: &SourceDescriptor,
        _platform: PlatformClass,
    ) -> anyhow::Result<()> {
        if self.failing_sources.contains(&source.index) {
            anyhow::bail!("cannot decode {}", source.resolved_uri);
        }
        self.sources.push(source.index);
        Ok(())
    }

    fn remove_source(&mut self, index: usize) {
        self.removed.push(index);
    }

    fn attach_source(&mut self, index: usize, batcher: StageRole, slot: usize) -> anyhow::Result<()> {
        if self.stage(batcher).is_none() {
            anyhow::bail!("batcher missing");
        }
        self.attached.push((index, slot));
        Ok(())
    }

    fn detach_source(&mut self, index: usize, batcher: StageRole, slot: usize) -> anyhow::Result<()> {
        if !self.attached.contains(&(index, slot)) || self.stage(batcher).is_none() {
            anyhow::bail!("source {} is not on slot {}", index, slot);
        }
        self.detached.push((index, slot));
        Ok(())
    }

    fn attach_hook(&mut self, stage: StageRole, hook: Arc<dyn FrameHook>) -> anyhow::Result<()> {
        self.hooks.push((stage, hook));
        Ok(())
    }

    fn start_relay(&mut self, relay: &RelaySpec) -> anyhow::Result<String> {
        self.relays.push(relay.clone());
        Ok(relay.endpoint())
    }

    fn play(&mut self) -> anyhow::Result<GraphEvents> {
        self.played = true;
        // a file sink opens its location when the graph starts
        if let Some(location) = self
            .stages
            .iter()
            .find(|s| s.factory == "filesink")
            .and_then(|s| s.get("location"))
        {
            let path = PathBuf::from(location.to_string());
            std::fs::File::create(&path)?;
            self.created_files.push(path);
        }

        for batch in std::mem::take(&mut self.script) {
            let mut out = RenderOutput::default();
            for (_, hook) in &self.hooks {
                hook.on_batch(&batch, &mut out);
            }
            self.rendered.push(out);
        }

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        for event in std::mem::take(&mut self.pending) {
            let _ = tx.send(event);
        }
        match self.finish_with.clone() {
            Some(event) => {
                let _ = tx.send(event);
            }
            None => self.events = Some(tx),
        }
        Ok(rx)
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        self.stopped = true;
        self.events = None;
        if self.failing_stop {
            anyhow::bail!("state change to NULL failed");
        }
        Ok(())
    }
}
