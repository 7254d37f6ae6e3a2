//! Per-stream frame-rate counters.
//!
//! The hook increments counters on the streaming thread; the runtime's
//! reporting tick swaps them back to zero. Each counter is read and reset in
//! a single atomic exchange.

use std::{
    fmt::{Display, Formatter},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use crate::hook::{BatchView, FrameHook, HookStatus, RenderOutput};

pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);

pub struct PerfCounters {
    names: Vec<String>,
    frames: Vec<AtomicU64>,
    retired: Vec<AtomicBool>,
    last_report: Mutex<Instant>,
}

impl PerfCounters {
    /// One counter per batcher slot, reported under `names[slot]`.
    pub fn new(names: Vec<String>) -> Self {
        let frames = names.iter().map(|_| AtomicU64::new(0)).collect();
        let retired = names.iter().map(|_| AtomicBool::new(false)).collect();
        Self {
            names,
            frames,
            retired,
            last_report: Mutex::new(Instant::now()),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn record(&self, slot: usize) {
        match self.frames.get(slot) {
            Some(counter) => {
                counter.fetch_add(1, Ordering::Relaxed);
            }
            None => log::warn!("Telemetry: frame from unknown slot {}", slot),
        }
    }

    /// Leaves `slot` out of every later report.
    pub fn retire(&self, slot: usize) {
        if let Some(flag) = self.retired.get(slot) {
            flag.store(true, Ordering::Release);
        }
    }

    /// Slots still reported.
    pub fn active(&self) -> usize {
        self.retired
            .iter()
            .filter(|r| !r.load(Ordering::Acquire))
            .count()
    }

    pub fn take(&self) -> PerfReport {
        self.take_at(Instant::now())
    }

    /// Reads and resets every counter. FPS is computed over the time since
    /// the previous report.
    pub fn take_at(&self, now: Instant) -> PerfReport {
        let elapsed = {
            let mut last = self.last_report.lock().unwrap_or_else(|e| e.into_inner());
            let elapsed = now.saturating_duration_since(*last);
            *last = now;
            elapsed
        };
        let secs = elapsed.as_secs_f64();
        let streams = self
            .names
            .iter()
            .zip(&self.frames)
            .zip(&self.retired)
            .filter_map(|((name, counter), retired)| {
                let frames = counter.swap(0, Ordering::AcqRel);
                if retired.load(Ordering::Acquire) {
                    return None;
                }
                Some(StreamFps {
                    name: name.clone(),
                    frames,
                    fps: if secs > 0.0 { frames as f64 / secs } else { 0.0 },
                })
            })
            .collect();
        PerfReport { streams, elapsed }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamFps {
    pub name: String,
    pub frames: u64,
    pub fps: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerfReport {
    pub streams: Vec<StreamFps>,
    pub elapsed: Duration,
}

impl PerfReport {
    pub fn total_frames(&self) -> u64 {
        self.streams.iter().map(|s| s.frames).sum()
    }
}

impl Display for PerfReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "**PERF: {{")?;
        for (i, stream) in self.streams.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "'{}': {:.2}", stream.name, stream.fps)?;
        }
        write!(f, "}}")
    }
}

/// Counts one frame per batch entry.
pub struct TelemetryHook {
    counters: Arc<PerfCounters>,
}

impl TelemetryHook {
    pub fn new(counters: Arc<PerfCounters>) -> Self {
        Self { counters }
    }
}

impl FrameHook for TelemetryHook {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn on_batch(&self, batch: &BatchView, _out: &mut RenderOutput) -> HookStatus {
        for frame in &batch.frames {
            self.counters.record(frame.slot);
        }
        HookStatus::Continue
    }
}
