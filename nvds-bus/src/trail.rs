//! Bounded per-object path history.

use std::collections::{HashMap, VecDeque};

use crate::hook::Point;

pub const MAX_TRAIL_POINTS: usize = 20;
/// A trail not refreshed for more than this many frames of its stream is dropped.
pub const TRAIL_EXPIRY_FRAMES: u64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct Trail {
    points: VecDeque<Point>,
    last_seen_frame: u64,
}

impl Trail {
    fn new(frame: u64) -> Self {
        Self {
            points: VecDeque::new(),
            last_seen_frame: frame,
        }
    }

    /// Appends `point`, evicting the oldest points beyond `cap`.
    pub fn push(&mut self, point: Point, cap: usize) {
        self.points.push_back(point);
        while self.points.len() > cap {
            self.points.pop_front();
        }
    }

    pub fn points(&self) -> &VecDeque<Point> {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_seen_frame(&self) -> u64 {
        self.last_seen_frame
    }

    pub fn is_expired(&self, current_frame: u64, expiry: u64) -> bool {
        current_frame.saturating_sub(self.last_seen_frame) > expiry
    }
}

/// Trails keyed by stream slot, then object id. Frame numbers are only ever
/// compared within one stream.
#[derive(Debug, Clone)]
pub struct TrailTable {
    streams: HashMap<usize, HashMap<u64, Trail>>,
    max_points: usize,
    expiry_frames: u64,
}

impl Default for TrailTable {
    fn default() -> Self {
        Self::new(MAX_TRAIL_POINTS, TRAIL_EXPIRY_FRAMES)
    }
}

impl TrailTable {
    pub fn new(max_points: usize, expiry_frames: u64) -> Self {
        Self {
            streams: HashMap::new(),
            max_points: max_points.max(1),
            expiry_frames,
        }
    }

    /// Appends the anchor of `object_id` seen at `frame` and returns its trail.
    pub fn record(&mut self, stream: usize, object_id: u64, point: Point, frame: u64) -> &Trail {
        let cap = self.max_points;
        let trail = self
            .streams
            .entry(stream)
            .or_default()
            .entry(object_id)
            .or_insert_with(|| Trail::new(frame));
        trail.push(point, cap);
        trail.last_seen_frame = frame;
        trail
    }

    /// Drops the trails of `stream` not seen for more than the expiry window.
    /// Returns how many were removed.
    pub fn expire(&mut self, stream: usize, current_frame: u64) -> usize {
        let expiry = self.expiry_frames;
        let Some(trails) = self.streams.get_mut(&stream) else {
            return 0;
        };
        let before = trails.len();
        trails.retain(|_, trail| !trail.is_expired(current_frame, expiry));
        let removed = before - trails.len();
        if trails.is_empty() {
            self.streams.remove(&stream);
        }
        removed
    }

    pub fn get(&self, stream: usize, object_id: u64) -> Option<&Trail> {
        self.streams.get(&stream)?.get(&object_id)
    }

    pub fn stream_len(&self, stream: usize) -> usize {
        self.streams.get(&stream).map_or(0, HashMap::len)
    }

    pub fn len(&self) -> usize {
        self.streams.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.streams.clear();
    }
}

#[cfg(test)]
#[path = "trail_test.rs"]
mod trail_test;
