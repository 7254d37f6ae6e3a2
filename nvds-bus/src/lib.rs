//! Multi-stream DeepStream analytics core.
//!
//! Everything except the [`deepstream`] backend is plain Rust and runs
//! without a GPU. The backend is compiled with the `deepstream` feature; a
//! stub that refuses to construct takes its place otherwise.

pub mod builder;
pub mod draw;
pub mod graph;
pub mod hook;
pub mod labels;
pub mod overlay;
pub mod platform;
pub mod runtime;
pub mod settings;
pub mod source;
pub mod telemetry;
pub mod tiling;
pub mod topology;
pub mod trail;

#[cfg(test)]
#[path = "graph_mock.rs"]
pub(crate) mod graph_mock;

#[cfg(feature = "deepstream")]
pub mod deepstream;
#[cfg(not(feature = "deepstream"))]
#[path = "deepstream_stub.rs"]
pub mod deepstream;

/// Initialises the media framework. Call once at startup before building a
/// pipeline.
pub fn init() -> anyhow::Result<()> {
    deepstream::init()
}
