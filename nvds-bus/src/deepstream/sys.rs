//! Raw bindings to the DeepStream metadata API (nvdsmeta.h, nvll_osd_struct.h,
//! gstnvdsmeta.h). Matches DeepStream 6.x and 7.x headers.
//!
//! Structs that are only ever reached through pointers handed out by the SDK
//! declare the leading fields this crate reads and stop there. Structs the
//! crate writes into (`NvDsDisplayMeta` and its parameter arrays) are laid
//! out in full up to the last field written.
//!
//! # Linking
//!
//! `build.rs` emits `-l nvdsgst_meta` and `-l nvds_meta` from
//! `$DEEPSTREAM_DIR/lib`.

#![allow(non_camel_case_types, non_snake_case, dead_code)]

use std::ffi::c_void;
use std::os::raw::{c_char, c_double, c_float, c_int, c_uint};

use gstreamer::ffi::GstBuffer;
use gstreamer::glib::ffi::{GList, gboolean, gint, gint64, guint, guint64};

pub const MAX_ELEMENTS_IN_DISPLAY_META: usize = 16;
pub const MAX_USER_FIELDS: usize = 4;
pub const MAX_RESERVED_FIELDS: usize = 4;

// nvll_osd_struct.h

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvOSD_ColorParams {
    pub red: c_double,
    pub green: c_double,
    pub blue: c_double,
    pub alpha: c_double,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvOSD_FontParams {
    pub font_name: *mut c_char,
    pub font_size: c_uint,
    pub font_color: NvOSD_ColorParams,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvOSD_TextParams {
    /// Owned by the metadata; released with `g_free`.
    pub display_text: *mut c_char,
    pub x_offset: c_uint,
    pub y_offset: c_uint,
    pub font_params: NvOSD_FontParams,
    pub set_bg_clr: c_int,
    pub text_bg_clr: NvOSD_ColorParams,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvOSD_RectParams {
    pub left: c_float,
    pub top: c_float,
    pub width: c_float,
    pub height: c_float,
    pub border_width: c_uint,
    pub border_color: NvOSD_ColorParams,
    pub has_bg_color: c_uint,
    pub reserved: c_uint,
    pub bg_color: NvOSD_ColorParams,
    pub has_color_info: c_int,
    pub color_id: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvOSD_MaskParams {
    pub data: *mut c_float,
    pub size: c_uint,
    pub threshold: c_float,
    pub width: c_uint,
    pub height: c_uint,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvOSD_LineParams {
    pub x1: c_uint,
    pub y1: c_uint,
    pub x2: c_uint,
    pub y2: c_uint,
    pub line_width: c_uint,
    pub line_color: NvOSD_ColorParams,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvOSD_ArrowParams {
    pub x1: c_uint,
    pub y1: c_uint,
    pub x2: c_uint,
    pub y2: c_uint,
    pub arrow_width: c_uint,
    pub arrow_head: c_int,
    pub arrow_color: NvOSD_ColorParams,
    pub reserved: c_uint,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvOSD_CircleParams {
    pub xc: c_uint,
    pub yc: c_uint,
    pub radius: c_uint,
    pub circle_color: NvOSD_ColorParams,
    pub has_bg_color: c_uint,
    pub bg_color: NvOSD_ColorParams,
}

// nvdsmeta.h

#[repr(C)]
pub struct NvDsBaseMeta {
    pub batch_meta: *mut NvDsBatchMeta,
    pub meta_type: c_int,
    pub uContext: *mut c_void,
    pub copy_func: *mut c_void,
    pub release_func: *mut c_void,
}

/// Leading fields only.
#[repr(C)]
pub struct NvDsBatchMeta {
    pub base_meta: NvDsBaseMeta,
    pub max_frames_in_batch: guint,
    pub num_frames_in_batch: guint,
    pub frame_meta_pool: *mut c_void,
    pub obj_meta_pool: *mut c_void,
    pub classifier_meta_pool: *mut c_void,
    pub display_meta_pool: *mut c_void,
    pub user_meta_pool: *mut c_void,
    pub label_info_meta_pool: *mut c_void,
    pub frame_meta_list: *mut GList,
    pub batch_user_meta_list: *mut GList,
}

/// Leading fields only.
#[repr(C)]
pub struct NvDsFrameMeta {
    pub base_meta: NvDsBaseMeta,
    pub pad_index: guint,
    pub batch_id: guint,
    pub frame_num: gint,
    pub buf_pts: guint64,
    pub ntp_timestamp: guint64,
    pub source_id: guint,
    pub num_surfaces_per_frame: gint,
    pub source_frame_width: guint,
    pub source_frame_height: guint,
    pub surface_type: guint,
    pub surface_index: guint,
    pub num_obj_meta: guint,
    pub bInferDone: gboolean,
    pub obj_meta_list: *mut GList,
    pub display_meta_list: *mut GList,
    pub frame_user_meta_list: *mut GList,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvBbox_Coords {
    pub left: c_float,
    pub top: c_float,
    pub width: c_float,
    pub height: c_float,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvDsComp_BboxInfo {
    pub org_bbox_coords: NvBbox_Coords,
}

/// Leading fields only.
#[repr(C)]
pub struct NvDsObjectMeta {
    pub base_meta: NvDsBaseMeta,
    pub parent: *mut NvDsObjectMeta,
    pub unique_component_id: gint,
    pub class_id: gint,
    pub object_id: guint64,
    pub detector_bbox_info: NvDsComp_BboxInfo,
    pub tracker_bbox_info: NvDsComp_BboxInfo,
    pub confidence: c_float,
    pub tracker_confidence: c_float,
    pub rect_params: NvOSD_RectParams,
    pub mask_params: NvOSD_MaskParams,
    pub text_params: NvOSD_TextParams,
}

#[repr(C)]
pub struct NvDsDisplayMeta {
    pub base_meta: NvDsBaseMeta,
    pub num_rects: guint,
    pub num_labels: guint,
    pub num_lines: guint,
    pub num_arrows: guint,
    pub num_circles: guint,
    pub rect_params: [NvOSD_RectParams; MAX_ELEMENTS_IN_DISPLAY_META],
    pub text_params: [NvOSD_TextParams; MAX_ELEMENTS_IN_DISPLAY_META],
    pub line_params: [NvOSD_LineParams; MAX_ELEMENTS_IN_DISPLAY_META],
    pub arrow_params: [NvOSD_ArrowParams; MAX_ELEMENTS_IN_DISPLAY_META],
    pub circle_params: [NvOSD_CircleParams; MAX_ELEMENTS_IN_DISPLAY_META],
    pub misc_osd_data: [gint64; MAX_USER_FIELDS],
    pub reserved: [gint64; MAX_RESERVED_FIELDS],
}

// gstnvdsmeta.h / nvdsmeta.h functions

unsafe extern "C" {
    /// Batch metadata attached by the batcher, or null.
    pub fn gst_buffer_get_nvds_batch_meta(buffer: *mut GstBuffer) -> *mut NvDsBatchMeta;

    pub fn nvds_acquire_display_meta_from_pool(
        batch_meta: *mut NvDsBatchMeta,
    ) -> *mut NvDsDisplayMeta;

    pub fn nvds_add_display_meta_to_frame(
        frame_meta: *mut NvDsFrameMeta,
        display_meta: *mut NvDsDisplayMeta,
    );

    pub fn nvds_acquire_meta_lock(batch_meta: *mut NvDsBatchMeta);

    pub fn nvds_release_meta_lock(batch_meta: *mut NvDsBatchMeta);
}
