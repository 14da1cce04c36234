//! Frame timing for host loops
//!
//! The scene never reads the clock itself. A host loop owns a [`FrameClock`]
//! and feeds its `(delta, absolute)` pair into `Scene::tick`. All values are
//! milliseconds.

use std::time::Instant;

/// Produces per-frame delta and cumulative time in milliseconds
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_frame: Option<Instant>,
    delta_ms: f64,
    absolute_ms: f64,
    frame_count: u64,
    max_delta_ms: Option<f64>,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self {
            last_frame: None,
            delta_ms: 0.0,
            absolute_ms: 0.0,
            frame_count: 0,
            max_delta_ms: None,
        }
    }

    /// Clamp deltas measured from wall time (e.g. after a debugger pause)
    pub fn with_max_delta(mut self, max_delta_ms: f64) -> Self {
        self.max_delta_ms = Some(max_delta_ms);
        self
    }

    /// Measure wall time since the previous call and advance by it
    ///
    /// The first call yields a zero delta.
    pub fn update(&mut self) -> (f64, f64) {
        let now = Instant::now();
        let measured = self
            .last_frame
            .map_or(0.0, |last| now.duration_since(last).as_secs_f64() * 1000.0);
        self.last_frame = Some(now);
        let delta = self.max_delta_ms.map_or(measured, |max| measured.min(max));
        self.advance(delta)
    }

    /// Advance by a fixed step, for deterministic stepping and tests
    pub fn advance(&mut self, delta_ms: f64) -> (f64, f64) {
        let delta_ms = delta_ms.max(0.0);
        self.delta_ms = delta_ms;
        self.absolute_ms += delta_ms;
        self.frame_count += 1;
        (self.delta_ms, self.absolute_ms)
    }

    /// Milliseconds covered by the last frame
    pub fn delta_ms(&self) -> f64 {
        self.delta_ms
    }

    /// Cumulative milliseconds since the clock started
    pub fn absolute_ms(&self) -> f64 {
        self.absolute_ms
    }

    /// Number of frames advanced so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frames per second since the clock started
    pub fn average_fps(&self) -> f64 {
        if self.absolute_ms > 0.0 {
            self.frame_count as f64 * 1000.0 / self.absolute_ms
        } else {
            0.0
        }
    }
}
