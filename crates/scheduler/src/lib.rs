//! Fixed-cadence periodic tasks for embedded shader instances.
//!
//! Hosts call [`Scheduler::tick`] from whatever timer they own (a browser
//! `setInterval`, a native event loop) and receive the targets whose cadence
//! has elapsed. Each target carries a [`StopHandle`]; once stopped, the target
//! is reported in [`TickReport::stopped`] exactly once and then forgotten.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use web_time::Instant;

/// Default render cadence, roughly 60 Hz.
pub const DEFAULT_INTERVAL: Duration = Duration::from_micros(16_660);

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("target {0} is already scheduled")]
    DuplicateTarget(TargetId),
    #[error("target {0} requested a zero interval")]
    ZeroInterval(TargetId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared cancellation flag for one periodic task.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the task stop; the scheduler drops it on its next tick.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Outcome of one scheduler tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Targets whose cadence elapsed, in ascending id order.
    pub due: Vec<TargetId>,
    /// Targets removed because their stop handle fired.
    pub stopped: Vec<TargetId>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.due.is_empty() && self.stopped.is_empty()
    }
}

#[derive(Default)]
pub struct Scheduler {
    targets: HashMap<TargetId, TargetState>,
}

struct TargetState {
    interval: Duration,
    next_due: Instant,
    handle: StopHandle,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a periodic target. The first run is due immediately.
    pub fn set_target(
        &mut self,
        target: TargetId,
        interval: Duration,
        now: Instant,
    ) -> Result<StopHandle, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval(target));
        }
        if self.targets.contains_key(&target) {
            return Err(SchedulerError::DuplicateTarget(target));
        }
        let handle = StopHandle::new();
        self.targets.insert(
            target,
            TargetState {
                interval,
                next_due: now,
                handle: handle.clone(),
            },
        );
        tracing::trace!(%target, ?interval, "scheduled periodic target");
        Ok(handle)
    }

    /// Removes a target without reporting it as stopped. Returns whether it existed.
    pub fn remove_target(&mut self, target: TargetId) -> bool {
        match self.targets.remove(&target) {
            Some(state) => {
                state.handle.stop();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, target: TargetId) -> bool {
        self.targets.contains_key(&target)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Earliest scheduled run time among live targets. A tick up to half an
    /// interval before it already counts as due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.targets
            .values()
            .filter(|state| !state.handle.is_stopped())
            .map(|state| state.next_due)
            .min()
    }

    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        self.targets.retain(|target, state| {
            if state.handle.is_stopped() {
                report.stopped.push(*target);
                return false;
            }
            if state.is_due(now) {
                report.due.push(*target);
                state.advance(now);
            }
            true
        });
        report.due.sort_unstable();
        report.stopped.sort_unstable();
        report
    }
}

impl TargetState {
    /// Host timers fire with millisecond granularity and some latency, so a
    /// target is due once the scheduled time is less than half an interval away.
    fn is_due(&self, now: Instant) -> bool {
        now + self.interval / 2 >= self.next_due
    }

    /// Advances from the scheduled time, not from `now`, so late ticks do not
    /// push later frames back.
    fn advance(&mut self, now: Instant) {
        self.next_due += self.interval;
        // A stalled host must not trigger a burst of catch-up frames.
        if self.next_due <= now {
            self.next_due = now + self.interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    #[test]
    fn first_tick_is_due_immediately() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        scheduler.set_target(TargetId(1), FRAME, now).unwrap();
        let report = scheduler.tick(now);
        assert_eq!(report.due, vec![TargetId(1)]);
        assert!(report.stopped.is_empty());
    }

    #[test]
    fn target_is_due_once_per_interval() {
        let mut scheduler = Scheduler::new();
        let start = Instant::now();
        scheduler.set_target(TargetId(1), FRAME, start).unwrap();
        assert_eq!(scheduler.tick(start).due.len(), 1);
        assert!(scheduler.tick(start + Duration::from_millis(7)).due.is_empty());
        assert_eq!(scheduler.tick(start + FRAME).due, vec![TargetId(1)]);
        assert!(scheduler.tick(start + FRAME).due.is_empty());
    }

    /// Drives `interval` from a host timer firing every `period`, with
    /// `latency` added to every other callback. Returns (ticks, frames).
    fn run_host_timer(
        interval: Duration,
        period: Duration,
        latency: Duration,
        ticks: u32,
    ) -> (u32, Vec<bool>) {
        let mut scheduler = Scheduler::new();
        let start = Instant::now();
        scheduler.set_target(TargetId(1), interval, start).unwrap();
        let drawn = (0..ticks)
            .map(|k| {
                let late = if k % 2 == 1 { latency } else { Duration::ZERO };
                let now = start + period * k + late;
                !scheduler.tick(now).due.is_empty()
            })
            .collect();
        (ticks, drawn)
    }

    #[test]
    fn jittery_host_timer_draws_every_tick() {
        let (ticks, drawn) = run_host_timer(
            DEFAULT_INTERVAL,
            Duration::from_millis(17),
            Duration::from_micros(600),
            600,
        );
        let frames = drawn.iter().filter(|due| **due).count() as u32;
        assert_eq!(frames, ticks);
    }

    #[test]
    fn timer_rounded_below_interval_skips_rarely() {
        let (ticks, drawn) = run_host_timer(
            Duration::from_micros(33_400),
            Duration::from_millis(33),
            Duration::ZERO,
            300,
        );
        let frames = drawn.iter().filter(|due| **due).count() as u32;
        assert!(frames > ticks - 10, "drew {frames} of {ticks}");
        assert!(
            !drawn.windows(2).any(|pair| !pair[0] && !pair[1]),
            "skipped consecutive ticks"
        );
    }

    #[test]
    fn fast_host_timer_keeps_target_cadence() {
        let (_, drawn) = run_host_timer(
            DEFAULT_INTERVAL,
            Duration::from_millis(10),
            Duration::ZERO,
            600,
        );
        let frames = drawn.iter().filter(|due| **due).count();
        // 6 s of host time at roughly 60 Hz.
        assert!((355..=365).contains(&frames), "drew {frames} frames");
    }

    #[test]
    fn stalled_host_reanchors_instead_of_bursting() {
        let mut scheduler = Scheduler::new();
        let start = Instant::now();
        scheduler.set_target(TargetId(7), FRAME, start).unwrap();
        scheduler.tick(start);
        let late = start + Duration::from_secs(1);
        assert_eq!(scheduler.tick(late).due.len(), 1);
        assert!(scheduler.tick(late).due.is_empty());
        assert_eq!(scheduler.next_deadline(), Some(late + FRAME));
    }

    #[test]
    fn stopped_targets_reported_once() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        let handle = scheduler.set_target(TargetId(2), FRAME, now).unwrap();
        scheduler.set_target(TargetId(3), FRAME, now).unwrap();
        handle.stop();

        let report = scheduler.tick(now);
        assert_eq!(report.stopped, vec![TargetId(2)]);
        assert_eq!(report.due, vec![TargetId(3)]);

        let report = scheduler.tick(now + FRAME);
        assert!(report.stopped.is_empty());
        assert!(!scheduler.contains(TargetId(2)));
    }

    #[test]
    fn rejects_zero_interval_and_duplicates() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        let err = scheduler
            .set_target(TargetId(1), Duration::ZERO, now)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::ZeroInterval(TargetId(1))));

        scheduler.set_target(TargetId(1), FRAME, now).unwrap();
        let err = scheduler.set_target(TargetId(1), FRAME, now).unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateTarget(TargetId(1))));
    }

    #[test]
    fn remove_target_trips_its_handle() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler
            .set_target(TargetId(4), FRAME, Instant::now())
            .unwrap();
        assert!(scheduler.remove_target(TargetId(4)));
        assert!(handle.is_stopped());
        assert!(!scheduler.remove_target(TargetId(4)));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn next_deadline_skips_stopped_targets() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        let early = scheduler.set_target(TargetId(1), FRAME, now).unwrap();
        scheduler
            .set_target(TargetId(2), FRAME, now + Duration::from_millis(5))
            .unwrap();
        early.stop();
        assert_eq!(
            scheduler.next_deadline(),
            Some(now + Duration::from_millis(5))
        );
    }
}
