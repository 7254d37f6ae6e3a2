//! Backend-neutral description of the processing graph.
//!
//! The builder talks to the media framework only through [`GraphBackend`],
//! so the same assembly code drives the DeepStream backend and the
//! in-memory graph used by the tests.

use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};

use crate::{hook::FrameHook, platform::PlatformClass, source::SourceDescriptor};

/// Value of an element property, applied through its string form.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(String),
    /// Serialized caps, e.g. `video/x-raw(memory:NVMM), format=RGBA`.
    Caps(String),
    /// Enum nick.
    Nick(&'static str),
}

impl Display for PropValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PropValue::Bool(v) => write!(f, "{}", v),
            PropValue::Int(v) => write!(f, "{}", v),
            PropValue::UInt(v) => write!(f, "{}", v),
            PropValue::Str(v) | PropValue::Caps(v) => write!(f, "{}", v),
            PropValue::Nick(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<i32> for PropValue {
    fn from(v: i32) -> Self {
        PropValue::Int(v as i64)
    }
}

impl From<u32> for PropValue {
    fn from(v: u32) -> Self {
        PropValue::UInt(v as u64)
    }
}

impl From<u16> for PropValue {
    fn from(v: u16) -> Self {
        PropValue::UInt(v as u64)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Str(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Str(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: &'static str,
    pub value: PropValue,
}

pub fn prop(name: &'static str, value: impl Into<PropValue>) -> Property {
    Property {
        name,
        value: value.into(),
    }
}

/// Position of a stage in the processing graph. Each role appears at most
/// once per graph, so it doubles as the element name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageRole {
    Batcher,
    Inference,
    Tracker,
    Tiler,
    OverlayConvert,
    OverlayCaps,
    Overlay,
    EncoderConvert,
    EncoderCaps,
    Encoder,
    Parser,
    Container,
    Payloader,
    Sink,
}

impl StageRole {
    pub fn name(&self) -> &'static str {
        match self {
            StageRole::Batcher => "stream-muxer",
            StageRole::Inference => "primary-inference",
            StageRole::Tracker => "tracker",
            StageRole::Tiler => "tiler",
            StageRole::OverlayConvert => "osd-convert",
            StageRole::OverlayCaps => "osd-caps",
            StageRole::Overlay => "osd",
            StageRole::EncoderConvert => "encoder-convert",
            StageRole::EncoderCaps => "encoder-caps",
            StageRole::Encoder => "encoder",
            StageRole::Parser => "parser",
            StageRole::Container => "container",
            StageRole::Payloader => "payloader",
            StageRole::Sink => "sink",
        }
    }
}

impl Display for StageRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One element to instantiate: its role, factory name and properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub role: StageRole,
    pub factory: &'static str,
    pub props: Vec<Property>,
}

impl Stage {
    pub fn new(role: StageRole, factory: &'static str) -> Self {
        Self {
            role,
            factory,
            props: Vec::new(),
        }
    }

    pub fn with(mut self, name: &'static str, value: impl Into<PropValue>) -> Self {
        self.props.push(prop(name, value));
        self
    }

    pub fn with_caps(self, caps: &str) -> Self {
        self.with("caps", PropValue::Caps(caps.to_string()))
    }

    pub fn with_nick(self, name: &'static str, nick: &'static str) -> Self {
        self.with(name, PropValue::Nick(nick))
    }

    pub fn name(&self) -> &'static str {
        self.role.name()
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.props.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

/// RTSP server relaying the UDP payload stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaySpec {
    pub host: String,
    pub port: u16,
    pub udp_port: u16,
    pub mount_path: String,
    pub encoding: &'static str,
}

impl RelaySpec {
    pub fn endpoint(&self) -> String {
        format!("rtsp://{}:{}{}", self.host, self.port, self.mount_path)
    }

    /// Launch description for the relay's media factory: it re-serves the
    /// RTP packets the pipeline's UDP sink sends to `udp_port`.
    pub fn launch_line(&self) -> String {
        format!(
            "( udpsrc name=pay0 port={} buffer-size=524288 caps=\"application/x-rtp, media=video, clock-rate=90000, encoding-name=(string){}, payload=96 \" )",
            self.udp_port, self.encoding
        )
    }
}

/// Message from the running graph to the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    EndOfStream,
    Error {
        origin: String,
        message: String,
        debug: Option<String>,
    },
    Warning {
        origin: String,
        message: String,
    },
    SourceRejected {
        index: usize,
        reason: String,
    },
}

pub type GraphEventSender = tokio::sync::mpsc::UnboundedSender<GraphEvent>;
pub type GraphEvents = tokio::sync::mpsc::UnboundedReceiver<GraphEvent>;

/// Media-framework operations needed to assemble and run a pipeline.
///
/// Stage creation failures are fatal for the build; source creation failures
/// only drop that source.
pub trait GraphBackend: Send {
    fn add_stage(&mut self, stage: &Stage) -> anyhow::Result<()>;

    fn link(&mut self, upstream: StageRole, downstream: StageRole) -> anyhow::Result<()>;

    /// Builds the decode sub-graph of one source. It ends in a single
    /// output port that is not yet connected.
    fn add_source(
        &mut self,
        source: &SourceDescriptor,
        platform: PlatformClass,
    ) -> anyhow::Result<()>;

    /// Tears down a source sub-graph that will not be attached.
    fn remove_source(&mut self, index: usize);

    /// Requests input slot `slot` on the batcher and connects the source to it.
    fn attach_source(
        &mut self,
        index: usize,
        batcher: StageRole,
        slot: usize,
    ) -> anyhow::Result<()>;

    /// Disconnects a running source from batcher slot `slot`, releases the
    /// slot and tears the source sub-graph down. The rest of the graph keeps
    /// playing.
    fn detach_source(
        &mut self,
        index: usize,
        batcher: StageRole,
        slot: usize,
    ) -> anyhow::Result<()>;

    /// Installs `hook` on the input of `stage`. It runs once per batch on the
    /// streaming thread.
    fn attach_hook(&mut self, stage: StageRole, hook: Arc<dyn FrameHook>) -> anyhow::Result<()>;

    /// Binds the RTSP relay and returns the endpoint it serves.
    fn start_relay(&mut self, relay: &RelaySpec) -> anyhow::Result<String>;

    fn play(&mut self) -> anyhow::Result<GraphEvents>;

    /// Stops the graph. Returns after in-flight hook invocations finished.
    fn stop(&mut self) -> anyhow::Result<()>;
}
