//! Stand-in for the DeepStream backend in builds without the `deepstream`
//! feature. Construction always fails with a hint on how to rebuild.

use std::sync::Arc;

use anyhow::bail;

use crate::{
    graph::{GraphBackend, GraphEvents, RelaySpec, Stage, StageRole},
    hook::FrameHook,
    platform::PlatformClass,
    source::SourceDescriptor,
};

const UNAVAILABLE: &str = "built without DeepStream support; rebuild with `--features deepstream`";

pub fn init() -> anyhow::Result<()> {
    Ok(())
}

pub struct DeepStreamBackend {
    _private: (),
}

impl DeepStreamBackend {
    pub fn new(_frame_size: Option<(u32, u32)>) -> anyhow::Result<Self> {
        bail!(UNAVAILABLE)
    }
}

impl GraphBackend for DeepStreamBackend {
    fn add_stage(&mut self, _stage: &Stage) -> anyhow::Result<()> {
        bail!(UNAVAILABLE)
    }

    fn link(&mut self, _upstream: StageRole, _downstream: StageRole) -> anyhow::Result<()> {
        bail!(UNAVAILABLE)
    }

    fn add_source(
        &mut self,
        _source: &SourceDescriptor,
        _platform: PlatformClass,
    ) -> anyhow::Result<()> {
        bail!(UNAVAILABLE)
    }

    fn remove_source(&mut self, _index: usize) {}

    fn attach_source(
        &mut self,
        _index: usize,
        _batcher: StageRole,
        _slot: usize,
    ) -> anyhow::Result<()> {
        bail!(UNAVAILABLE)
    }

    fn detach_source(
        &mut self,
        _index: usize,
        _batcher: StageRole,
        _slot: usize,
    ) -> anyhow::Result<()> {
        bail!(UNAVAILABLE)
    }

    fn attach_hook(&mut self, _stage: StageRole, _hook: Arc<dyn FrameHook>) -> anyhow::Result<()> {
        bail!(UNAVAILABLE)
    }

    fn start_relay(&mut self, _relay: &RelaySpec) -> anyhow::Result<String> {
        bail!(UNAVAILABLE)
    }

    fn play(&mut self) -> anyhow::Result<GraphEvents> {
        bail!(UNAVAILABLE)
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
