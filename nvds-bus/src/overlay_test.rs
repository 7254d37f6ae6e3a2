use super::{FontScale, OverlayHook, OverlayRenderer, label_origin};
use crate::{
    draw::Rgba,
    hook::{
        BBox, BatchView, DetectedObject, FrameHook, FrameView, HookStatus, RenderOutput,
        UNTRACKED_OBJECT_ID,
    },
    labels::LabelSet,
    trail::MAX_TRAIL_POINTS,
};

fn labels() -> LabelSet {
    LabelSet::parse("person\ncar\n")
}

fn object(object_id: u64, class_id: i32, bbox: BBox, frame_num: u64) -> DetectedObject {
    DetectedObject {
        object_id,
        class_id,
        bbox,
        frame_num,
    }
}

fn frame(slot: usize, frame_num: u64, objects: Vec<DetectedObject>) -> FrameView {
    FrameView {
        slot,
        frame_num,
        width: 1920,
        height: 1080,
        objects,
    }
}

fn batch(stream_count: usize, frames: Vec<FrameView>) -> BatchView {
    BatchView {
        stream_count,
        frames,
    }
}

// ------------------------------------------------------------------------
// Font sizing
// ------------------------------------------------------------------------

#[test]
fn test_font_size_clamps() {
    let scale = FontScale { min: 6, base_max: 10 };
    assert_eq!(scale.size_for(1000.0, 1), 10);
    assert_eq!(scale.size_for(0.0, 1), 6);
    assert_eq!(scale.size_for(50.0, 1), 8);
    assert_eq!(scale.size_for(-20.0, 1), 6);
}

#[test]
fn test_font_ceiling_shrinks_with_streams() {
    let scale = FontScale::default();
    assert_eq!(scale.effective_max(1), 10);
    assert_eq!(scale.effective_max(3), 8);
    assert_eq!(scale.effective_max(16), 6);
    assert_eq!(scale.size_for(1000.0, 4), 7);
}

// ------------------------------------------------------------------------
// Rendering
// ------------------------------------------------------------------------

#[test]
fn test_renders_box_and_label() {
    let mut renderer = OverlayRenderer::new(labels());
    let mut out = RenderOutput::default();
    let bbox = BBox::new(100.0, 200.0, 50.0, 120.0);
    renderer.render(&batch(1, vec![frame(0, 1, vec![object(3, 1, bbox, 1)])]), &mut out);

    assert_eq!(out.frames.len(), 1);
    let groups = &out.frames[0].groups;
    let rect = &groups[0].rects[0];
    assert_eq!(rect.border_width, 1);
    assert!(rect.fill.is_none());
    assert_eq!(rect.border_color, renderer.colors().get(1));

    let label = &groups[0].labels[0];
    assert_eq!(label.text, "Car #3");
    assert_eq!(label.font_color, Rgba::WHITE);
    assert!(label.background.a < 1.0);
    assert_eq!(label.font_size, 10);
    assert_eq!(label.x, 100);
    assert!(label.y < 200);

    // one trail point -> one circle
    assert_eq!(groups[1].circles.len(), 1);
    assert_eq!(groups[1].circles[0].xc, 125);
    assert_eq!(groups[1].circles[0].yc, 320);
}

#[test]
fn test_unknown_class_gets_default_color() {
    let mut renderer = OverlayRenderer::new(labels());
    let mut out = RenderOutput::default();
    let bbox = BBox::new(0.0, 0.0, 10.0, 10.0);
    renderer.render(&batch(1, vec![frame(0, 1, vec![object(1, 42, bbox, 1)])]), &mut out);

    let group = &out.frames[0].groups[0];
    assert_eq!(group.rects[0].border_color, renderer.colors().fallback());
    assert_eq!(group.labels[0].text, "Class 42 #1");
}

#[test]
fn test_label_stays_inside_frame() {
    let obj = object(1, 0, BBox::new(-30.0, 2.0, 40.0, 40.0), 1);
    let (x, y) = label_origin(&obj, 10, 1920, 1080);
    assert_eq!((x, y), (0, 0));

    let obj = object(1, 0, BBox::new(5000.0, 5000.0, 40.0, 40.0), 1);
    let (x, y) = label_origin(&obj, 10, 1920, 1080);
    assert_eq!(x, 1919);
    assert!(y <= 1080 - 24);
}

#[test]
fn test_untracked_objects_have_no_trail() {
    let mut renderer = OverlayRenderer::new(labels());
    let mut out = RenderOutput::default();
    let bbox = BBox::new(10.0, 10.0, 10.0, 10.0);
    renderer.render(
        &batch(1, vec![frame(0, 1, vec![object(UNTRACKED_OBJECT_ID, 0, bbox, 1)])]),
        &mut out,
    );

    let groups = &out.frames[0].groups;
    assert_eq!(groups.len(), 1);
    assert!(groups[0].circles.is_empty());
    assert_eq!(groups[0].labels[0].text, "Person");
    assert!(renderer.trails().is_empty());
}

#[test]
fn test_trail_is_bounded_across_frames() {
    let mut renderer = OverlayRenderer::new(labels());
    for n in 1..=30u64 {
        let mut out = RenderOutput::default();
        let bbox = BBox::new(n as f32 * 4.0, 100.0, 20.0, 40.0);
        renderer.render(&batch(1, vec![frame(0, n, vec![object(9, 0, bbox, n)])]), &mut out);

        let circles: usize = out.frames[0].groups.iter().map(|g| g.circles.len()).sum();
        assert_eq!(circles, (n as usize).min(MAX_TRAIL_POINTS));
    }
    // 20 points -> groups of 16 and 4 after the box/label group
    let mut out = RenderOutput::default();
    let bbox = BBox::new(200.0, 100.0, 20.0, 40.0);
    renderer.render(&batch(1, vec![frame(0, 31, vec![object(9, 0, bbox, 31)])]), &mut out);
    let sizes: Vec<usize> = out.frames[0].groups.iter().map(|g| g.circles.len()).collect();
    assert_eq!(sizes, vec![0, 16, 4]);
}

#[test]
fn test_stale_trails_expire_per_stream() {
    let mut renderer = OverlayRenderer::new(labels());
    let bbox = BBox::new(10.0, 10.0, 10.0, 10.0);
    let mut out = RenderOutput::default();
    renderer.render(
        &batch(
            2,
            vec![
                frame(0, 100, vec![object(1, 0, bbox, 100)]),
                frame(1, 100, vec![object(2, 0, bbox, 100)]),
            ],
        ),
        &mut out,
    );
    assert_eq!(renderer.trails().len(), 2);

    // stream 0 keeps going without the object, stream 1 keeps seeing its own
    renderer.render(
        &batch(
            2,
            vec![
                frame(0, 161, vec![]),
                frame(1, 161, vec![object(2, 0, bbox, 161)]),
            ],
        ),
        &mut out,
    );
    assert!(renderer.trails().get(0, 1).is_none());
    assert!(renderer.trails().get(1, 2).is_some());
}

#[test]
fn test_hook_continues_and_tracks() {
    let hook = OverlayHook::new(OverlayRenderer::new(labels()));
    let mut out = RenderOutput::default();
    let bbox = BBox::new(10.0, 10.0, 10.0, 10.0);
    let status = hook.on_batch(
        &batch(1, vec![frame(0, 1, vec![object(1, 0, bbox, 1), object(2, 1, bbox, 1)])]),
        &mut out,
    );
    assert_eq!(status, HookStatus::Continue);
    assert_eq!(hook.tracked_objects(), 2);
    assert_eq!(hook.name(), "overlay");
}
