//! Trajectory tracking and overlay rendering.
//!
//! Runs once per batch before tiling. For every object it extends the
//! object's trail, then emits a box, a label and the trail as draw
//! commands. Stale trails of a stream are swept after that stream's frame.

use std::sync::Mutex;

use crate::{
    draw::{self, GroupPacker, LabelCmd, RectCmd, Rgba, TrailStyle, px},
    hook::{BatchView, DetectedObject, FrameHook, FrameView, HookStatus, Point, RenderOutput},
    labels::{ClassColors, LabelSet, capitalize},
    trail::TrailTable,
};

const LABEL_BACKGROUND_ALPHA: f64 = 0.6;
const LABEL_PADDING: u32 = 4;

/// Label font sizing. The ceiling drops by one per stream beyond the first,
/// never below `min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontScale {
    pub min: u32,
    pub base_max: u32,
}

impl Default for FontScale {
    fn default() -> Self {
        Self {
            min: 6,
            base_max: 10,
        }
    }
}

impl FontScale {
    pub fn effective_max(&self, stream_count: usize) -> u32 {
        let shrink = u32::try_from(stream_count.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_max.saturating_sub(shrink).max(self.min)
    }

    /// Grows linearly with box height, reaching the ceiling at 100 px.
    pub fn size_for(&self, bbox_height: f32, stream_count: usize) -> u32 {
        let min = self.min as f32;
        let max = self.effective_max(stream_count) as f32;
        let height = if bbox_height.is_nan() { 0.0 } else { bbox_height };
        let size = min + (max - min) * (height / 100.0);
        size.clamp(min, max).round() as u32
    }
}

pub struct OverlayRenderer {
    labels: LabelSet,
    colors: ClassColors,
    trails: TrailTable,
    font: FontScale,
    trail_style: TrailStyle,
}

impl OverlayRenderer {
    pub fn new(labels: LabelSet) -> Self {
        let colors = ClassColors::for_labels(&labels);
        Self {
            labels,
            colors,
            trails: TrailTable::default(),
            font: FontScale::default(),
            trail_style: TrailStyle::default(),
        }
    }

    pub fn with_trails(mut self, trails: TrailTable) -> Self {
        self.trails = trails;
        self
    }

    pub fn trails(&self) -> &TrailTable {
        &self.trails
    }

    pub fn colors(&self) -> &ClassColors {
        &self.colors
    }

    pub fn render(&mut self, batch: &BatchView, out: &mut RenderOutput) {
        for (pos, frame) in batch.frames.iter().enumerate() {
            let groups = self.render_frame(frame, batch.stream_count);
            if !groups.is_empty() {
                out.frame_mut(pos).groups.extend(groups);
            }
            let expired = self.trails.expire(frame.slot, frame.frame_num);
            if expired > 0 {
                log::debug!(
                    "Overlay: stream {} expired {} trails at frame {}",
                    frame.slot,
                    expired,
                    frame.frame_num
                );
            }
        }
    }

    fn render_frame(&mut self, frame: &FrameView, stream_count: usize) -> Vec<draw::DrawGroup> {
        let mut packer = GroupPacker::default();
        let mut trail_groups = Vec::new();

        for object in &frame.objects {
            let color = self.colors.get(object.class_id);
            let font_size = self.font.size_for(object.bbox.height, stream_count);
            packer.push_object(
                box_command(object, color),
                self.label_command(object, color, font_size, frame),
            );

            if object.is_tracked() {
                let trail = self.trails.record(
                    frame.slot,
                    object.object_id,
                    object.bbox.anchor(),
                    object.frame_num,
                );
                let points: Vec<Point> = trail.points().iter().copied().collect();
                trail_groups.extend(draw::trail_groups(&points, color, self.trail_style));
            }
        }

        let mut groups = packer.finish();
        groups.extend(trail_groups);
        groups
    }

    fn label_command(
        &self,
        object: &DetectedObject,
        color: Rgba,
        font_size: u32,
        frame: &FrameView,
    ) -> LabelCmd {
        let name = match self.labels.get(object.class_id) {
            Some(name) => capitalize(name),
            None => format!("Class {}", object.class_id),
        };
        let text = if object.is_tracked() {
            format!("{} #{}", name, object.object_id)
        } else {
            name
        };
        let (x, y) = label_origin(object, font_size, frame.width, frame.height);
        LabelCmd {
            text,
            x,
            y,
            font_size,
            font_color: Rgba::WHITE,
            background: color.with_alpha(LABEL_BACKGROUND_ALPHA),
        }
    }
}

fn box_command(object: &DetectedObject, color: Rgba) -> RectCmd {
    RectCmd {
        left: object.bbox.left,
        top: object.bbox.top,
        width: object.bbox.width,
        height: object.bbox.height,
        border_width: 1,
        border_color: color,
        fill: None,
    }
}

/// Places the label just above the box, kept inside the frame.
pub fn label_origin(
    object: &DetectedObject,
    font_size: u32,
    frame_width: u32,
    frame_height: u32,
) -> (u32, u32) {
    let label_height = font_size * 2 + LABEL_PADDING;
    let x = px(object.bbox.left).min(frame_width.saturating_sub(1));
    let y = px(object.bbox.top - label_height as f32)
        .min(frame_height.saturating_sub(label_height));
    (x, y)
}

/// Hook adapter owning the renderer for the lifetime of one pipeline.
pub struct OverlayHook {
    renderer: Mutex<OverlayRenderer>,
}

impl OverlayHook {
    pub fn new(renderer: OverlayRenderer) -> Self {
        Self {
            renderer: Mutex::new(renderer),
        }
    }

    pub fn tracked_objects(&self) -> usize {
        self.renderer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .trails()
            .len()
    }
}

impl FrameHook for OverlayHook {
    fn name(&self) -> &'static str {
        "overlay"
    }

    fn on_batch(&self, batch: &BatchView, out: &mut RenderOutput) -> HookStatus {
        // batches arrive one at a time, the lock is never contended
        let mut renderer = self.renderer.lock().unwrap_or_else(|e| e.into_inner());
        renderer.render(batch, out);
        HookStatus::Continue
    }
}

#[cfg(test)]
#[path = "overlay_test.rs"]
mod overlay_test;
