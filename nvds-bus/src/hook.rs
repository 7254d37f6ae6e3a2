//! Frame-processing hook point.
//!
//! Hooks run synchronously on the streaming thread, one batch at a time and
//! in frame order. They receive an immutable view of the batch and append
//! draw commands to the render output.

use std::sync::Arc;

use crate::draw::DrawGroup;

/// Object id assigned by the inference stage before any tracker saw it.
pub const UNTRACKED_OBJECT_ID: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Bottom-center of the box, where the object touches the ground.
    pub fn anchor(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectedObject {
    pub object_id: u64,
    pub class_id: i32,
    pub bbox: BBox,
    pub frame_num: u64,
}

impl DetectedObject {
    pub fn is_tracked(&self) -> bool {
        self.object_id != UNTRACKED_OBJECT_ID
    }
}

/// One frame of a batch. `slot` is the batcher input slot it came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameView {
    pub slot: usize,
    pub frame_num: u64,
    pub width: u32,
    pub height: u32,
    pub objects: Vec<DetectedObject>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchView {
    /// Number of active streams in the pipeline, not frames in this batch.
    pub stream_count: usize,
    pub frames: Vec<FrameView>,
}

/// Draw groups destined for the frame at position `frame` of the batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameDraw {
    pub frame: usize,
    pub groups: Vec<DrawGroup>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderOutput {
    pub frames: Vec<FrameDraw>,
}

impl RenderOutput {
    pub fn frame_mut(&mut self, frame: usize) -> &mut FrameDraw {
        match self.frames.iter().position(|f| f.frame == frame) {
            Some(pos) => &mut self.frames[pos],
            None => {
                self.frames.push(FrameDraw {
                    frame,
                    groups: Vec::new(),
                });
                let last = self.frames.len() - 1;
                &mut self.frames[last]
            }
        }
    }

    pub fn group_count(&self) -> usize {
        self.frames.iter().map(|f| f.groups.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.iter().all(|f| f.groups.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStatus {
    /// Batch consumed, pass it downstream.
    Continue,
    /// Drop the batch.
    Drop,
}

pub trait FrameHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_batch(&self, batch: &BatchView, out: &mut RenderOutput) -> HookStatus;
}

/// Runs hooks in insertion order, stopping at the first that drops the batch.
#[derive(Default, Clone)]
pub struct HookChain {
    hooks: Vec<Arc<dyn FrameHook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: Arc<dyn FrameHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }
}

impl FrameHook for HookChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn on_batch(&self, batch: &BatchView, out: &mut RenderOutput) -> HookStatus {
        for hook in &self.hooks {
            if hook.on_batch(batch, out) == HookStatus::Drop {
                log::debug!("Hook: {} dropped batch", hook.name());
                return HookStatus::Drop;
            }
        }
        HookStatus::Continue
    }
}
