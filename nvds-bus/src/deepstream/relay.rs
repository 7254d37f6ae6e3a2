use std::thread::JoinHandle;

use anyhow::anyhow;
use gstreamer::glib;
use gstreamer_rtsp_server::{self as rtsp, prelude::*};

use crate::graph::RelaySpec;

/// RTSP server re-serving the pipeline's RTP output. Runs its own main
/// loop on a dedicated thread until dropped.
pub(super) struct RelayServer {
    context: glib::MainContext,
    main_loop: glib::MainLoop,
    source: Option<glib::SourceId>,
    thread: Option<JoinHandle<()>>,
}

impl RelayServer {
    pub fn start(spec: &RelaySpec) -> anyhow::Result<Self> {
        let server = rtsp::RTSPServer::new();
        server.set_service(&spec.port.to_string());
        let mounts = server
            .mount_points()
            .ok_or_else(|| anyhow!("rtsp server has no mount points"))?;

        let factory = rtsp::RTSPMediaFactory::new();
        factory.set_launch(&spec.launch_line());
        factory.set_shared(true);
        mounts.add_factory(&spec.mount_path, factory);

        let context = glib::MainContext::new();
        let source = server
            .attach(Some(&context))
            .map_err(|e| anyhow!("failed to bind rtsp port {}: {}", spec.port, e))?;

        let main_loop = glib::MainLoop::new(Some(&context), false);
        let thread = {
            let context = context.clone();
            let main_loop = main_loop.clone();
            std::thread::Builder::new()
                .name("rtsp-relay".into())
                .spawn(move || {
                    if let Err(e) = context.with_thread_default(|| main_loop.run()) {
                        log::error!("Relay: main loop failed: {}", e);
                    }
                })?
        };
        log::info!("Relay: serving {}", spec.endpoint());

        Ok(Self {
            context,
            main_loop,
            source: Some(source),
            thread: Some(thread),
        })
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        if let Some(source) = self.source.take() {
            source.remove();
        }
        // Queued on the loop's context so a loop that has not started yet
        // still exits.
        let main_loop = self.main_loop.clone();
        self.context.invoke(move || main_loop.quit());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Relay: main loop thread panicked");
            }
        }
    }
}
