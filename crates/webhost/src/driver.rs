//! Page-level lifecycle shared by every embed on one page.
//!
//! [`HostDriver`] owns the instance manager and the single repeating timer.
//! The browser binding only forwards events into it, so the ready and timer
//! transitions are the same code natively and on wasm32.

use std::fmt;
use std::time::Duration;

use renderer::{Document, EmbedOptions, InstanceId, InstanceManager};
use web_time::Instant;

/// Repeating timer that calls back into [`HostDriver::tick`].
pub trait FrameTimer {
    type Handle: Copy + fmt::Debug;
    type Error: fmt::Debug;

    fn start(&mut self, period_ms: i32) -> Result<Self::Handle, Self::Error>;
    fn clear(&mut self, handle: Self::Handle);
}

/// Timer period in whole milliseconds for a frame interval, at least 1.
pub fn timer_period(interval: Duration) -> i32 {
    (interval.as_secs_f64() * 1000.0)
        .round()
        .clamp(1.0, f64::from(i32::MAX)) as i32
}

pub struct HostDriver<D: Document, T: FrameTimer> {
    manager: InstanceManager<D>,
    timer: T,
    active: Option<T::Handle>,
    ready: bool,
}

impl<D: Document, T: FrameTimer> HostDriver<D, T> {
    /// `ready` is whether the document has already finished parsing.
    pub fn new(manager: InstanceManager<D>, timer: T, ready: bool) -> Self {
        Self {
            manager,
            timer,
            active: None,
            ready,
        }
    }

    pub fn options(&self) -> &EmbedOptions {
        self.manager.options()
    }

    pub fn manager(&self) -> &InstanceManager<D> {
        &self.manager
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn timer_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn running_count(&self) -> usize {
        self.manager.running_count()
    }

    /// Places a new instance. Once the document is ready it starts at once.
    pub fn embed(&mut self, source: &str, size: (u32, u32), now: Instant) -> InstanceId {
        let id = self.manager.create_instance_with_size(source, size);
        if self.ready {
            self.start_pending(now);
        }
        id
    }

    pub fn document_ready(&mut self, now: Instant) {
        self.ready = true;
        self.start_pending(now);
    }

    pub fn tick(&mut self, now: Instant) -> usize {
        let drawn = self.manager.tick(now);
        self.stop_timer_if_idle();
        drawn
    }

    /// Stops the instance rendering into `element_id`.
    pub fn stop(&mut self, element_id: &str) -> bool {
        let Some(id) = self.manager.find(element_id) else {
            return false;
        };
        let stopped = self.manager.stop(&id);
        self.stop_timer_if_idle();
        stopped
    }

    /// Stops every instance and clears the timer.
    pub fn shutdown(&mut self) {
        self.manager.stop_all();
        self.stop_timer_if_idle();
    }

    // The manager logs each failed instance itself.
    fn start_pending(&mut self, now: Instant) {
        let started = self
            .manager
            .document_ready(now)
            .iter()
            .filter(|outcome| outcome.is_ok())
            .count();
        if started > 0 {
            self.start_timer();
        }
    }

    fn start_timer(&mut self) {
        if self.active.is_some() || self.manager.running_count() == 0 {
            return;
        }
        let period_ms = timer_period(self.manager.options().frame_interval);
        match self.timer.start(period_ms) {
            Ok(handle) => {
                tracing::debug!(period_ms, "frame timer started");
                self.active = Some(handle);
            }
            Err(err) => tracing::error!(error = ?err, "failed to start frame timer"),
        }
    }

    fn stop_timer_if_idle(&mut self) {
        if self.manager.running_count() > 0 {
            return;
        }
        if let Some(handle) = self.active.take() {
            self.timer.clear(handle);
            tracing::debug!("frame timer stopped");
        }
    }
}

impl<D: Document, T: FrameTimer> Drop for HostDriver<D, T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use renderer::gl::fake::{Call, CallLog, RecordingContext};
    use renderer::{InstanceContext, Placeholder, Surface};

    use super::*;

    const GRADIENT: &str =
        "void mainImage(out vec4 c, in vec2 p) { c = vec4(p / iResolution.xy, 0.0, 1.0); }";
    const BROKEN: &str = "void mainImage(out vec4 c, in vec2 p) { c = vec4(1.0);";

    struct TestSurface {
        log: CallLog,
    }

    impl Surface for TestSurface {
        type Context = RecordingContext;

        fn pixel_size(&self) -> (u32, u32) {
            (64, 32)
        }

        fn acquire_context(&self) -> Option<RecordingContext> {
            Some(RecordingContext::with_log(self.log.clone()))
        }
    }

    #[derive(Default)]
    struct TestDocument {
        logs: HashMap<String, CallLog>,
    }

    impl Document for TestDocument {
        type Surface = TestSurface;

        fn insert_placeholder(&mut self, placeholder: &Placeholder) {
            self.logs
                .insert(placeholder.id.element_id().to_string(), CallLog::default());
        }

        fn surface(&self, id: &InstanceId) -> Option<TestSurface> {
            let log = self.logs.get(id.element_id())?.clone();
            Some(TestSurface { log })
        }
    }

    #[derive(Debug, Default)]
    struct Intervals {
        next: i32,
        started: Vec<i32>,
        active: Vec<i32>,
    }

    #[derive(Clone, Default)]
    struct TestTimer(Rc<RefCell<Intervals>>);

    impl TestTimer {
        fn active(&self) -> usize {
            self.0.borrow().active.len()
        }

        fn periods(&self) -> Vec<i32> {
            self.0.borrow().started.clone()
        }
    }

    impl FrameTimer for TestTimer {
        type Handle = i32;
        type Error = String;

        fn start(&mut self, period_ms: i32) -> Result<i32, String> {
            let mut intervals = self.0.borrow_mut();
            intervals.next += 1;
            let handle = intervals.next;
            intervals.started.push(period_ms);
            intervals.active.push(handle);
            Ok(handle)
        }

        fn clear(&mut self, handle: i32) {
            self.0.borrow_mut().active.retain(|active| *active != handle);
        }
    }

    fn driver(ready: bool) -> (HostDriver<TestDocument, TestTimer>, TestTimer) {
        let timer = TestTimer::default();
        let manager = InstanceManager::new(
            InstanceContext::new(),
            TestDocument::default(),
            EmbedOptions::default(),
        );
        (HostDriver::new(manager, timer.clone(), ready), timer)
    }

    fn log(driver: &HostDriver<TestDocument, TestTimer>, element_id: &str) -> CallLog {
        driver.manager().document().logs[element_id].clone()
    }

    #[test]
    fn embeds_before_ready_wait_for_document() {
        let (mut driver, timer) = driver(false);
        let now = Instant::now();
        driver.embed(GRADIENT, (64, 32), now);
        driver.embed(GRADIENT, (64, 32), now);
        assert_eq!(driver.running_count(), 0);
        assert_eq!(driver.manager().pending_count(), 2);
        assert!(!driver.timer_running());

        driver.document_ready(now);
        assert!(driver.is_ready());
        assert_eq!(driver.running_count(), 2);
        assert_eq!(timer.periods(), vec![17]);
        assert_eq!(timer.active(), 1);
    }

    #[test]
    fn embeds_after_ready_start_immediately_on_one_timer() {
        let (mut driver, timer) = driver(true);
        let now = Instant::now();
        let first = driver.embed(GRADIENT, (64, 32), now);
        assert!(driver.manager().is_running(&first));
        assert!(driver.timer_running());

        let second = driver.embed(GRADIENT, (64, 32), now);
        assert!(driver.manager().is_running(&second));
        assert_eq!(timer.periods().len(), 1);

        assert_eq!(driver.tick(now), 2);
        assert_eq!(log(&driver, "shaderblock-1").draw_count(), 1);
    }

    #[test]
    fn failed_instances_do_not_start_timer() {
        let (mut driver, timer) = driver(true);
        let id = driver.embed(BROKEN, (64, 32), Instant::now());
        assert!(!driver.manager().is_running(&id));
        assert!(!driver.timer_running());
        assert!(timer.periods().is_empty());
    }

    #[test]
    fn stopping_last_instance_clears_timer() {
        let (mut driver, timer) = driver(true);
        let now = Instant::now();
        driver.embed(GRADIENT, (64, 32), now);
        driver.embed(GRADIENT, (64, 32), now);

        assert!(driver.stop("shaderblock-0"));
        assert!(driver.timer_running());
        assert!(!driver.stop("shaderblock-0"));
        assert!(!driver.stop("elsewhere"));

        assert!(driver.stop("shaderblock-1"));
        assert!(!driver.timer_running());
        assert_eq!(timer.active(), 0);

        driver.embed(GRADIENT, (64, 32), now);
        assert_eq!(timer.periods().len(), 2);
        assert_eq!(timer.active(), 1);
    }

    #[test]
    fn stop_handle_fired_elsewhere_idles_timer_on_tick() {
        let (mut driver, timer) = driver(true);
        let now = Instant::now();
        let id = driver.embed(GRADIENT, (64, 32), now);
        let handle = driver
            .manager()
            .instance(&id)
            .map(|instance| instance.stop_handle().clone())
            .unwrap();
        handle.stop();
        assert_eq!(driver.tick(now), 0);
        assert_eq!(timer.active(), 0);
    }

    #[test]
    fn dropping_driver_clears_timer_and_releases_gpu() {
        let (mut driver, timer) = driver(true);
        driver.embed(GRADIENT, (64, 32), Instant::now());
        let gpu = log(&driver, "shaderblock-0");
        assert_eq!(timer.active(), 1);

        drop(driver);
        assert_eq!(timer.active(), 0);
        assert_eq!(gpu.count(|call| matches!(call, Call::DeleteProgram(_))), 1);
        assert_eq!(gpu.count(|call| matches!(call, Call::DeleteBuffer(_))), 3);
    }

    #[test]
    fn timer_period_rounds_to_whole_milliseconds() {
        assert_eq!(timer_period(renderer::DEFAULT_INTERVAL), 17);
        assert_eq!(timer_period(Duration::from_micros(33_400)), 33);
        assert_eq!(timer_period(Duration::from_micros(200)), 1);
        assert_eq!(timer_period(Duration::from_secs(u64::MAX)), i32::MAX);
    }
}
