use anyhow::anyhow;
use gstreamer::{self as gst, glib, prelude::*};

use crate::{
    graph::{GraphEvent, GraphEventSender, PropValue, Property},
    platform::PlatformClass,
    source::{Negotiation, SourceDescriptor, child_properties, negotiate},
};

/// Builds the bin that decodes one source. Its `src` ghost pad gets a target
/// once the decoder exposes a video pad in device memory.
pub(super) fn create(
    source: &SourceDescriptor,
    platform: PlatformClass,
    events: GraphEventSender,
) -> anyhow::Result<gst::Bin> {
    let bin = gst::Bin::builder().name(source.name()).build();
    let decoder = gst::ElementFactory::make("uridecodebin")
        .name(format!("uri-decode-bin-{:02}", source.index))
        .property("uri", source.resolved_uri.as_str())
        .build()
        .map_err(|e| anyhow!("failed to create uridecodebin: {}", e))?;
    bin.add(&decoder)?;

    let ghost = gst::GhostPad::builder(gst::PadDirection::Src)
        .name("src")
        .build();
    bin.add_pad(&ghost)?;

    let index = source.index;
    let weak_bin = bin.downgrade();
    decoder.connect_pad_added(move |_, pad| {
        if let Some(bin) = weak_bin.upgrade() {
            on_pad_added(&bin, pad, index, &events);
        }
    });
    watch_children(&decoder, platform);

    Ok(bin)
}

fn on_pad_added(bin: &gst::Bin, pad: &gst::Pad, index: usize, events: &GraphEventSender) {
    let caps = pad.current_caps().unwrap_or_else(|| pad.query_caps(None));
    let Some(structure) = caps.structure(0) else {
        return;
    };
    let features: Vec<String> = caps
        .features(0)
        .map(|f| f.iter().map(|s| s.to_string()).collect())
        .unwrap_or_default();
    let features: Vec<&str> = features.iter().map(String::as_str).collect();

    match negotiate(structure.name().as_str(), &features) {
        Negotiation::Ignore => {}
        Negotiation::Accept => {
            let Some(ghost) = bin
                .static_pad("src")
                .and_then(|p| p.downcast::<gst::GhostPad>().ok())
            else {
                log::error!("Sources: {} has no output pad", bin.name());
                return;
            };
            if let Err(e) = ghost.set_target(Some(pad)) {
                log::error!("Sources: failed to link decoder of {}: {}", bin.name(), e);
            }
        }
        Negotiation::Reject => {
            let reason = format!("decoder chose {} outside device memory", structure.name());
            log::warn!("Sources: stream {} rejected: {}", index, reason);
            if events.send(GraphEvent::SourceRejected { index, reason }).is_err() {
                log::debug!("Sources: runtime gone, rejection of stream {} not delivered", index);
            }
        }
    }
}

/// Tunes decoder internals as uridecodebin creates them, recursing into
/// nested decodebins.
fn watch_children(element: &gst::Element, platform: PlatformClass) {
    element.connect("child-added", false, move |values| {
        let child = values.get(1)?.get::<glib::Object>().ok()?;
        let name = values.get(2)?.get::<String>().ok()?;
        log::debug!("Sources: decoder child '{}' added", name);
        if name.contains("decodebin") {
            if let Some(nested) = child.downcast_ref::<gst::Element>() {
                watch_children(nested, platform);
            }
        }
        apply_properties(&child, &child_properties(&name, platform));
        None
    });
}

/// Sets each property the object knows about; unknown ones are skipped.
pub(super) fn apply_properties(object: &impl IsA<glib::Object>, props: &[Property]) {
    for p in props {
        if object.find_property(p.name).is_none() {
            log::debug!("Graph: property '{}' not supported, skipped", p.name);
            continue;
        }
        match &p.value {
            PropValue::Caps(caps) => match caps.parse::<gst::Caps>() {
                Ok(caps) => object.set_property(p.name, caps),
                Err(e) => log::error!("Graph: invalid caps '{}': {}", caps, e),
            },
            other => object.set_property_from_str(p.name, &other.to_string()),
        }
    }
}
