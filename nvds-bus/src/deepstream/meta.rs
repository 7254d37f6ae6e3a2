//! Bridges DeepStream batch metadata and the hook types.

use std::{
    ffi::{CString, c_char},
    ptr,
};

use gstreamer as gst;
use gstreamer::glib::ffi::{GList, g_free, g_strdup, gpointer};

use super::sys::{
    NvDsBatchMeta, NvDsDisplayMeta, NvDsFrameMeta, NvDsObjectMeta,
    NvOSD_CircleParams, NvOSD_ColorParams, NvOSD_LineParams, NvOSD_RectParams, NvOSD_TextParams,
    gst_buffer_get_nvds_batch_meta, nvds_acquire_display_meta_from_pool,
    nvds_acquire_meta_lock, nvds_add_display_meta_to_frame, nvds_release_meta_lock,
};
use crate::{
    draw::{DrawGroup, Rgba},
    hook::{BBox, BatchView, DetectedObject, FrameHook, FrameView, HookStatus, RenderOutput},
};

const FONT_NAME: &std::ffi::CStr = c"Serif";

/// Fixed facts about the hook's attachment point.
#[derive(Debug, Clone, Copy)]
pub(super) struct ProbeContext {
    pub stream_count: usize,
    /// Batcher output geometry, `None` when frames keep their source size.
    pub frame_size: Option<(u32, u32)>,
    /// Blank the per-object text and border the overlay stage would draw.
    pub suppress_builtin: bool,
}

/// Runs `hook` on the batch carried by `buffer` and attaches its output.
pub(super) fn process_buffer(
    buffer: &gst::BufferRef,
    hook: &dyn FrameHook,
    ctx: &ProbeContext,
) -> HookStatus {
    // SAFETY: the buffer is alive for the duration of the probe callback.
    let batch = unsafe { gst_buffer_get_nvds_batch_meta(buffer.as_ptr() as *mut _) };
    if batch.is_null() {
        return HookStatus::Continue;
    }

    let _lock = MetaLock::acquire(batch);
    // SAFETY: the batch meta and its lists belong to `buffer` and are locked.
    let (view, frames) = unsafe { read_batch(batch, ctx) };
    let mut out = RenderOutput::default();
    let status = hook.on_batch(&view, &mut out);
    if status == HookStatus::Continue {
        // SAFETY: `frames` were read from this batch under the same lock.
        unsafe { write_output(batch, &frames, &out) };
    }
    status
}

struct MetaLock(*mut NvDsBatchMeta);

impl MetaLock {
    fn acquire(batch: *mut NvDsBatchMeta) -> Self {
        unsafe { nvds_acquire_meta_lock(batch) };
        Self(batch)
    }
}

impl Drop for MetaLock {
    fn drop(&mut self) {
        unsafe { nvds_release_meta_lock(self.0) };
    }
}

/// Yields the `data` pointers of a GList.
///
/// # Safety
///
/// `list` must stay valid and unmodified while the iterator is used.
unsafe fn list_iter<T>(mut list: *mut GList) -> impl Iterator<Item = *mut T> {
    std::iter::from_fn(move || {
        if list.is_null() {
            return None;
        }
        let node = unsafe { &*list };
        list = node.next;
        Some(node.data as *mut T)
    })
}

unsafe fn read_batch(
    batch: *mut NvDsBatchMeta,
    ctx: &ProbeContext,
) -> (BatchView, Vec<*mut NvDsFrameMeta>) {
    let mut view = BatchView {
        stream_count: ctx.stream_count,
        frames: Vec::new(),
    };
    let mut metas = Vec::new();

    for frame_ptr in unsafe { list_iter::<NvDsFrameMeta>((*batch).frame_meta_list) } {
        let frame = unsafe { &*frame_ptr };
        let frame_num = u64::try_from(frame.frame_num).unwrap_or(0);
        let (width, height) = ctx
            .frame_size
            .unwrap_or((frame.source_frame_width, frame.source_frame_height));

        let mut objects = Vec::new();
        for obj_ptr in unsafe { list_iter::<NvDsObjectMeta>(frame.obj_meta_list) } {
            let obj = unsafe { &mut *obj_ptr };
            let rect = &obj.rect_params;
            objects.push(DetectedObject {
                object_id: obj.object_id,
                class_id: obj.class_id,
                bbox: BBox::new(rect.left, rect.top, rect.width, rect.height),
                frame_num,
            });
            if ctx.suppress_builtin {
                unsafe { suppress_builtin(obj) };
            }
        }

        view.frames.push(FrameView {
            slot: frame.pad_index as usize,
            frame_num,
            width,
            height,
            objects,
        });
        metas.push(frame_ptr);
    }
    (view, metas)
}

unsafe fn suppress_builtin(obj: &mut NvDsObjectMeta) {
    obj.rect_params.border_width = 0;
    obj.text_params.set_bg_clr = 0;
    if !obj.text_params.display_text.is_null() {
        unsafe { g_free(obj.text_params.display_text as gpointer) };
        obj.text_params.display_text = ptr::null_mut();
    }
}

unsafe fn write_output(
    batch: *mut NvDsBatchMeta,
    frames: &[*mut NvDsFrameMeta],
    out: &RenderOutput,
) {
    for draw in &out.frames {
        let Some(&frame) = frames.get(draw.frame) else {
            log::warn!("Probe: render output for missing frame {}", draw.frame);
            continue;
        };
        for group in &draw.groups {
            let display = unsafe { nvds_acquire_display_meta_from_pool(batch) };
            if display.is_null() {
                log::warn!("Probe: display meta pool exhausted");
                return;
            }
            unsafe {
                fill_display_meta(&mut *display, group);
                nvds_add_display_meta_to_frame(frame, display);
            }
        }
    }
}

unsafe fn fill_display_meta(meta: &mut NvDsDisplayMeta, group: &DrawGroup) {
    meta.num_rects = 0;
    for (slot, rect) in meta.rect_params.iter_mut().zip(&group.rects) {
        *slot = NvOSD_RectParams {
            left: rect.left,
            top: rect.top,
            width: rect.width,
            height: rect.height,
            border_width: rect.border_width,
            border_color: color(rect.border_color),
            has_bg_color: rect.fill.is_some() as u32,
            reserved: 0,
            bg_color: rect.fill.map(color).unwrap_or_default(),
            has_color_info: 0,
            color_id: 0,
        };
        meta.num_rects += 1;
    }

    meta.num_labels = 0;
    for (slot, label) in meta.text_params.iter_mut().zip(&group.labels) {
        let text = CString::new(label.text.replace('\0', " ")).unwrap_or_default();
        *slot = NvOSD_TextParams {
            // released by the metadata pool with g_free
            display_text: unsafe { g_strdup(text.as_ptr()) },
            x_offset: label.x,
            y_offset: label.y,
            font_params: super::sys::NvOSD_FontParams {
                font_name: FONT_NAME.as_ptr() as *mut c_char,
                font_size: label.font_size,
                font_color: color(label.font_color),
            },
            set_bg_clr: 1,
            text_bg_clr: color(label.background),
        };
        meta.num_labels += 1;
    }

    meta.num_circles = 0;
    for (slot, circle) in meta.circle_params.iter_mut().zip(&group.circles) {
        *slot = NvOSD_CircleParams {
            xc: circle.xc,
            yc: circle.yc,
            radius: circle.radius,
            circle_color: color(circle.color),
            has_bg_color: 1,
            bg_color: color(circle.color),
        };
        meta.num_circles += 1;
    }

    meta.num_lines = 0;
    for (slot, line) in meta.line_params.iter_mut().zip(&group.lines) {
        *slot = NvOSD_LineParams {
            x1: line.x1,
            y1: line.y1,
            x2: line.x2,
            y2: line.y2,
            line_width: line.width,
            line_color: color(line.color),
        };
        meta.num_lines += 1;
    }
}

fn color(c: Rgba) -> NvOSD_ColorParams {
    NvOSD_ColorParams {
        red: c.r,
        green: c.g,
        blue: c.b,
        alpha: c.a,
    }
}
