//! GStreamer/DeepStream implementation of [`GraphBackend`].

mod meta;
mod relay;
mod source_bin;
mod sys;

use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, anyhow};
use futures::StreamExt;
use gstreamer::{self as gst, prelude::*};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    graph::{
        GraphBackend, GraphEvent, GraphEventSender, GraphEvents, RelaySpec, Stage, StageRole,
    },
    hook::{FrameHook, HookStatus},
    platform::PlatformClass,
    source::SourceDescriptor,
};

pub fn init() -> anyhow::Result<()> {
    gst::init().map_err(|e| anyhow!("failed to initialise GStreamer: {}", e))
}

pub struct DeepStreamBackend {
    pipeline: gst::Pipeline,
    stages: HashMap<StageRole, gst::Element>,
    sources: HashMap<usize, gst::Bin>,
    /// Batcher request pad per slot.
    slot_pads: HashMap<usize, gst::Pad>,
    attached: usize,
    frame_size: Option<(u32, u32)>,
    events_tx: GraphEventSender,
    events_rx: Option<GraphEvents>,
    bus_task: Option<JoinHandle<()>>,
    relay: Option<relay::RelayServer>,
}

impl DeepStreamBackend {
    /// `frame_size` is the batcher's output geometry when it scales frames.
    pub fn new(frame_size: Option<(u32, u32)>) -> anyhow::Result<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            pipeline: gst::Pipeline::with_name("ds-pipeline"),
            stages: HashMap::new(),
            sources: HashMap::new(),
            slot_pads: HashMap::new(),
            attached: 0,
            frame_size,
            events_tx,
            events_rx: Some(events_rx),
            bus_task: None,
            relay: None,
        })
    }

    fn stage(&self, role: StageRole) -> anyhow::Result<&gst::Element> {
        self.stages
            .get(&role)
            .ok_or_else(|| anyhow!("stage '{}' not in graph", role.name()))
    }
}

impl GraphBackend for DeepStreamBackend {
    fn add_stage(&mut self, stage: &Stage) -> anyhow::Result<()> {
        let element = gst::ElementFactory::make(stage.factory)
            .name(stage.name())
            .build()
            .map_err(|_| anyhow!("element factory '{}' not available", stage.factory))?;
        source_bin::apply_properties(&element, &stage.props);
        self.pipeline.add(&element)?;
        self.stages.insert(stage.role, element);
        Ok(())
    }

    fn link(&mut self, upstream: StageRole, downstream: StageRole) -> anyhow::Result<()> {
        let up = self.stage(upstream)?;
        let down = self.stage(downstream)?;
        up.link(down)
            .with_context(|| format!("failed to link {} -> {}", upstream.name(), downstream.name()))
    }

    fn add_source(
        &mut self,
        source: &SourceDescriptor,
        platform: PlatformClass,
    ) -> anyhow::Result<()> {
        let bin = source_bin::create(source, platform, self.events_tx.clone())?;
        self.pipeline.add(&bin)?;
        self.sources.insert(source.index, bin);
        Ok(())
    }

    fn remove_source(&mut self, index: usize) {
        if let Some(bin) = self.sources.remove(&index) {
            if let Err(e) = bin.set_state(gst::State::Null) {
                log::warn!("Sources: failed to stop {}: {}", bin.name(), e);
            }
            if let Err(e) = self.pipeline.remove(&bin) {
                log::warn!("Sources: failed to remove {}: {}", bin.name(), e);
            }
        }
    }

    fn attach_source(
        &mut self,
        index: usize,
        batcher: StageRole,
        slot: usize,
    ) -> anyhow::Result<()> {
        let bin = self
            .sources
            .get(&index)
            .ok_or_else(|| anyhow!("source {} was not created", index))?;
        let src = bin
            .static_pad("src")
            .ok_or_else(|| anyhow!("{} has no output pad", bin.name()))?;
        let sink = self
            .stage(batcher)?
            .request_pad_simple(&format!("sink_{}", slot))
            .ok_or_else(|| anyhow!("batcher refused input slot {}", slot))?;
        src.link(&sink)
            .with_context(|| format!("failed to link {} to slot {}", bin.name(), slot))?;
        self.slot_pads.insert(slot, sink);
        self.attached += 1;
        Ok(())
    }

    fn detach_source(
        &mut self,
        index: usize,
        batcher: StageRole,
        slot: usize,
    ) -> anyhow::Result<()> {
        let sink = self.slot_pads.remove(&slot);
        if let (Some(bin), Some(sink)) = (self.sources.get(&index), &sink) {
            if let Some(src) = bin.static_pad("src") {
                if let Err(e) = src.unlink(sink) {
                    log::debug!("Sources: {} was not linked to slot {}: {}", bin.name(), slot, e);
                }
            }
        }
        self.remove_source(index);
        if let Some(sink) = sink {
            self.stage(batcher)?.release_request_pad(&sink);
        }
        Ok(())
    }

    fn attach_hook(&mut self, stage: StageRole, hook: Arc<dyn FrameHook>) -> anyhow::Result<()> {
        let pad = self
            .stage(stage)?
            .static_pad("sink")
            .ok_or_else(|| anyhow!("stage '{}' has no sink pad", stage.name()))?;
        let ctx = meta::ProbeContext {
            stream_count: self.attached,
            frame_size: self.frame_size,
            suppress_builtin: stage != StageRole::Sink,
        };
        pad.add_probe(gst::PadProbeType::BUFFER, move |_, info| {
            if let Some(gst::PadProbeData::Buffer(ref buffer)) = info.data {
                if meta::process_buffer(buffer, hook.as_ref(), &ctx) == HookStatus::Drop {
                    return gst::PadProbeReturn::Drop;
                }
            }
            gst::PadProbeReturn::Ok
        })
        .ok_or_else(|| anyhow!("failed to install probe on '{}'", stage.name()))?;
        Ok(())
    }

    fn start_relay(&mut self, relay: &RelaySpec) -> anyhow::Result<String> {
        self.relay = Some(relay::RelayServer::start(relay)?);
        Ok(relay.endpoint())
    }

    fn play(&mut self) -> anyhow::Result<GraphEvents> {
        let events = self
            .events_rx
            .take()
            .ok_or_else(|| anyhow!("pipeline already started"))?;
        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| anyhow!("pipeline has no bus"))?;
        self.bus_task = Some(tokio::spawn(forward_bus(bus, self.events_tx.clone())));
        self.pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| anyhow!("failed to start pipeline: {}", e))?;
        Ok(events)
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| anyhow!("failed to stop pipeline: {}", e))?;
        if let Some(task) = self.bus_task.take() {
            task.abort();
        }
        self.relay = None;
        Ok(())
    }
}

impl Drop for DeepStreamBackend {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            log::warn!("Graph: failed to stop pipeline on drop: {}", e);
        }
    }
}

async fn forward_bus(bus: gst::Bus, tx: GraphEventSender) {
    let mut messages = bus.stream();
    while let Some(msg) = messages.next().await {
        let origin = msg
            .src()
            .map(|s| s.path_string().to_string())
            .unwrap_or_else(|| "pipeline".to_string());
        let event = match msg.view() {
            gst::MessageView::Eos(_) => GraphEvent::EndOfStream,
            gst::MessageView::Error(err) => GraphEvent::Error {
                origin,
                message: err.error().to_string(),
                debug: err.debug().map(|d| d.to_string()),
            },
            gst::MessageView::Warning(w) => GraphEvent::Warning {
                origin,
                message: w.error().to_string(),
            },
            gst::MessageView::StateChanged(s) => {
                log::trace!("Graph: {} {:?} -> {:?}", origin, s.old(), s.current());
                continue;
            }
            _ => continue,
        };
        if tx.send(event).is_err() {
            break;
        }
    }
}
