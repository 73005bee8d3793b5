use std::time::Duration;

use web_time::Instant;

/// Snapshot of the time state supplied to the shader uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Time elapsed since the render loop started.
    pub elapsed: Duration,
    /// Monotonic frame counter for the running loop.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(elapsed: Duration, frame_index: u64) -> Self {
        Self {
            elapsed,
            frame_index,
        }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource {
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the monotonic clock (`performance.now()` on wasm).
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.origin.elapsed(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that reports a caller-controlled elapsed time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedTimeSource {
    elapsed: Duration,
    frame: u64,
}

impl FixedTimeSource {
    pub fn new(elapsed: Duration) -> Self {
        Self { elapsed, frame: 0 }
    }

    pub fn advance(&mut self, by: Duration) {
        self.elapsed += by;
    }
}

impl TimeSource for FixedTimeSource {
    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.elapsed, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource>;
