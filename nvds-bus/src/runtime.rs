//! Pipeline runtime: play, watch, report, stop.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    builder::AssembledPipeline,
    graph::{GraphBackend, GraphEvent, StageRole},
    telemetry::REPORT_INTERVAL,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    EndOfStream,
    Interrupted,
    /// An upstream error ended the run.
    Failed(String),
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::EndOfStream | RunOutcome::Interrupted => 0,
            RunOutcome::Failed(_) => 2,
        }
    }
}

pub struct PipelineRuntime<B: GraphBackend> {
    pipeline: AssembledPipeline<B>,
    report_interval: Duration,
}

impl<B: GraphBackend> PipelineRuntime<B> {
    pub fn new(pipeline: AssembledPipeline<B>) -> Self {
        Self {
            pipeline,
            report_interval: REPORT_INTERVAL,
        }
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn pipeline(&self) -> &AssembledPipeline<B> {
        &self.pipeline
    }

    /// Plays the graph until end-of-stream, an error, or `cancel`. The graph
    /// is stopped before this returns, in every case.
    pub async fn run(&mut self, cancel: CancellationToken) -> anyhow::Result<RunOutcome> {
        let mut events = match self.pipeline.backend.play() {
            Ok(events) => events,
            Err(e) => {
                if let Err(stop_err) = self.pipeline.backend.stop() {
                    log::warn!("Runtime: stop after failed start: {:#}", stop_err);
                }
                return Err(e.context("failed to start pipeline"));
            }
        };
        log::info!("Runtime: playing, output {}", self.pipeline.plan.output);

        let period = self.report_interval;
        let mut report = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("Runtime: interrupted");
                    break RunOutcome::Interrupted;
                },
                _ = report.tick() => {
                    log::info!("{}", self.pipeline.counters.take());
                },
                event = events.recv() => match event {
                    Some(GraphEvent::EndOfStream) => {
                        log::info!("Runtime: end of stream");
                        break RunOutcome::EndOfStream;
                    }
                    Some(GraphEvent::Error { origin, message, debug }) => {
                        log::error!(
                            "Runtime: error from {}: {} ({})",
                            origin,
                            message,
                            debug.as_deref().unwrap_or("no debug info")
                        );
                        break RunOutcome::Failed(format!("{}: {}", origin, message));
                    }
                    Some(GraphEvent::Warning { origin, message }) => {
                        log::warn!("Runtime: warning from {}: {}", origin, message);
                    }
                    Some(GraphEvent::SourceRejected { index, reason }) => {
                        log::warn!("Runtime: stream {} rejected: {}", index, reason);
                        if self.drop_source(index) == 0 {
                            break RunOutcome::Failed("every source was rejected".to_string());
                        }
                    }
                    None => break RunOutcome::Failed("graph event channel closed".to_string()),
                },
            }
        };

        Ok(self.shutdown(outcome))
    }

    /// Detaches one source while the others keep playing. Returns how many
    /// sources are still active.
    fn drop_source(&mut self, index: usize) -> usize {
        let pipeline = &mut self.pipeline;
        match pipeline
            .sources
            .reject(&mut pipeline.backend, index, StageRole::Batcher)
        {
            Ok(Some(slot)) => pipeline.counters.retire(slot),
            Ok(None) => log::debug!("Runtime: stream {} already dropped", index),
            Err(e) => log::error!("Runtime: failed to drop stream {}: {:#}", index, e),
        }
        pipeline.sources.active().len()
    }

    /// Stops the graph and tears the sources down even when stopping fails.
    /// A failed stop turns a clean outcome into [`RunOutcome::Failed`].
    fn shutdown(&mut self, outcome: RunOutcome) -> RunOutcome {
        let stopped = self.pipeline.backend.stop();
        let report = self.pipeline.counters.take();
        if report.total_frames() > 0 {
            log::info!("{}", report);
        }
        let pipeline = &mut self.pipeline;
        pipeline.sources.teardown(&mut pipeline.backend);

        match stopped {
            Ok(()) => {
                log::info!("Runtime: stopped");
                outcome
            }
            Err(e) => {
                log::error!("Runtime: failed to stop pipeline: {:#}", e);
                match outcome {
                    RunOutcome::Failed(_) => outcome,
                    _ => RunOutcome::Failed(format!("failed to stop pipeline: {:#}", e)),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "runtime_test.rs"]
mod runtime_test;
