//! Pipeline assembly.
//!
//! Order matters: sources are created first so the batch size and tile grid
//! match the sources that actually came up, then stages, slots, links and
//! the hook point. Nothing is written to disk before every step succeeded.

use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDateTime;

use crate::{
    graph::{GraphBackend, StageRole},
    hook::HookChain,
    labels::LabelSet,
    overlay::{OverlayHook, OverlayRenderer},
    platform::PlatformClass,
    settings::{BatcherMode, GraphSettings, ModelSettings, TrackerSettings},
    source::{SourceDescriptor, SourceManager},
    telemetry::{PerfCounters, TelemetryHook},
    topology::{self, OutputMode, OutputTarget, PlanContext, TopologyPlan},
};

/// Everything needed to build one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub output_mode: OutputMode,
    pub platform: PlatformClass,
    pub batcher_mode: BatcherMode,
    pub model: ModelSettings,
    pub tracker: TrackerSettings,
    pub settings: GraphSettings,
    pub labels: LabelSet,
    pub started_at: NaiveDateTime,
}

pub struct PipelineBuilder {
    request: PipelineRequest,
}

impl PipelineBuilder {
    pub fn new(request: PipelineRequest) -> Self {
        Self { request }
    }

    pub fn build<B: GraphBackend>(
        self,
        mut backend: B,
        descriptors: Vec<SourceDescriptor>,
    ) -> anyhow::Result<AssembledPipeline<B>> {
        let request = self.request;
        if descriptors.is_empty() {
            anyhow::bail!("no sources configured");
        }
        request
            .settings
            .validate(request.output_mode, request.batcher_mode)?;

        let mut sources = SourceManager::create(&mut backend, descriptors, request.platform)?;

        let plan = topology::plan(&PlanContext {
            output_mode: request.output_mode,
            platform: request.platform,
            batcher_mode: request.batcher_mode,
            model: &request.model,
            tracker: &request.tracker,
            settings: &request.settings,
            sources: sources.active(),
            started_at: request.started_at,
        })?;

        for stage in &plan.stages {
            backend.add_stage(stage).with_context(|| {
                format!("failed to create stage '{}' ({})", stage.name(), stage.factory)
            })?;
        }
        sources.attach(&mut backend, StageRole::Batcher)?;
        for (upstream, downstream) in plan.links() {
            backend
                .link(upstream, downstream)
                .with_context(|| format!("failed to link {} -> {}", upstream, downstream))?;
        }

        let names = (0..sources.slots().len())
            .map(|slot| sources.stream_name(slot))
            .collect();
        let counters = Arc::new(PerfCounters::new(names));
        let mut hooks = HookChain::new();
        hooks.push(Arc::new(TelemetryHook::new(counters.clone())));
        if plan.renders() {
            hooks.push(Arc::new(OverlayHook::new(OverlayRenderer::new(request.labels))));
        }
        log::debug!("Builder: hooks {:?} on {}", hooks.names(), plan.hook_point);
        backend
            .attach_hook(plan.hook_point, Arc::new(hooks))
            .with_context(|| format!("failed to attach hook to {}", plan.hook_point))?;

        let mut relay_endpoint = None;
        match &plan.output {
            OutputTarget::File(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)
                        .with_context(|| format!("create output directory {}", dir.display()))?;
                }
            }
            OutputTarget::Relay(relay) => {
                relay_endpoint = Some(backend.start_relay(relay)?);
            }
            OutputTarget::Display(_) | OutputTarget::Discard => {}
        }

        log::info!(
            "Builder: {} stages, {} sources, output {}",
            plan.stages.len(),
            sources.active().len(),
            plan.output
        );
        Ok(AssembledPipeline {
            backend,
            plan,
            sources,
            counters,
            relay_endpoint,
        })
    }
}

/// A fully linked graph, ready to play.
pub struct AssembledPipeline<B: GraphBackend> {
    pub(crate) backend: B,
    pub(crate) plan: TopologyPlan,
    pub(crate) sources: SourceManager,
    pub(crate) counters: Arc<PerfCounters>,
    relay_endpoint: Option<String>,
}

impl<B: GraphBackend> AssembledPipeline<B> {
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn plan(&self) -> &TopologyPlan {
        &self.plan
    }

    pub fn sources(&self) -> &SourceManager {
        &self.sources
    }

    pub fn counters(&self) -> &Arc<PerfCounters> {
        &self.counters
    }

    pub fn output(&self) -> &OutputTarget {
        &self.plan.output
    }

    /// RTSP endpoint, once the relay is bound.
    pub fn relay_endpoint(&self) -> Option<&str> {
        self.relay_endpoint.as_deref()
    }
}
