use std::collections::BTreeMap;

use scheduler::{Scheduler, StopHandle, TargetId};
use web_time::Instant;

use crate::compile;
use crate::compose::ComposedSources;
use crate::error::InstanceError;
use crate::frame::RenderLoop;
use crate::geometry::QuadGeometry;
use crate::host::{Document, Surface};
use crate::runtime::{BoxedTimeSource, SystemTimeSource};
use crate::scene::Scene;
use crate::types::{EmbedOptions, InstanceContext, InstanceId, Placeholder};

/// Builds the clock each new render loop samples.
pub type TimeSourceFactory = Box<dyn Fn() -> BoxedTimeSource>;

fn system_clock() -> BoxedTimeSource {
    Box::new(SystemTimeSource::new())
}

/// Returned for every instance that finished initialization.
#[derive(Debug, Clone)]
pub struct InstanceHandle {
    pub id: InstanceId,
    pub stop: StopHandle,
}

/// A running embedded shader: its render loop plus the handle that stops it.
pub struct ShaderInstance<S: Surface> {
    pub id: InstanceId,
    render_loop: RenderLoop<S>,
    stop: StopHandle,
}

impl<S: Surface> ShaderInstance<S> {
    pub fn render_loop(&self) -> &RenderLoop<S> {
        &self.render_loop
    }

    pub fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }
}

struct PendingInstance {
    id: InstanceId,
    source: String,
}

/// Creates, initializes and drives every embedded shader of one document.
///
/// The lifecycle mirrors a page load: `create_instance` runs at each embed
/// point and emits a placeholder, `document_ready` turns placeholders into
/// render loops, and the host calls `tick` from its timer.
pub struct InstanceManager<D: Document> {
    ids: InstanceContext,
    document: D,
    options: EmbedOptions,
    pending: Vec<PendingInstance>,
    running: BTreeMap<u64, ShaderInstance<D::Surface>>,
    scheduler: Scheduler,
    time_source: TimeSourceFactory,
}

impl<D: Document> InstanceManager<D> {
    pub fn new(ids: InstanceContext, document: D, options: EmbedOptions) -> Self {
        Self {
            ids,
            document,
            options,
            pending: Vec::new(),
            running: BTreeMap::new(),
            scheduler: Scheduler::new(),
            time_source: Box::new(system_clock),
        }
    }

    /// Replaces the clock used by render loops started after this call.
    pub fn with_time_source(mut self, factory: impl Fn() -> BoxedTimeSource + 'static) -> Self {
        self.time_source = Box::new(factory);
        self
    }

    /// Emits a placeholder at the current embed point with the default size.
    pub fn create_instance(&mut self, source: impl Into<String>) -> InstanceId {
        let size = self.options.surface_size;
        self.create_instance_with_size(source, size)
    }

    pub fn create_instance_with_size(
        &mut self,
        source: impl Into<String>,
        (width, height): (u32, u32),
    ) -> InstanceId {
        let id = self.ids.next_id();
        let placeholder = Placeholder {
            id: id.clone(),
            class: self.options.canvas_class.clone(),
            width,
            height,
        };
        self.document.insert_placeholder(&placeholder);
        tracing::debug!(id = %id, width, height, "emitted shader placeholder");
        self.pending.push(PendingInstance {
            id: id.clone(),
            source: source.into(),
        });
        id
    }

    /// Initializes every instance created since the previous call.
    ///
    /// Failures are logged and returned per instance; a failed instance never
    /// gets a render loop and does not affect the others.
    pub fn document_ready(&mut self, now: Instant) -> Vec<Result<InstanceHandle, InstanceError>> {
        let pending = std::mem::take(&mut self.pending);
        let mut outcomes = Vec::with_capacity(pending.len());
        for instance in pending {
            let outcome = self
                .initialize(&instance)
                .and_then(|render_loop| self.start(instance.id.clone(), render_loop, now));
            if let Err(err) = &outcome {
                tracing::error!(id = %instance.id, error = %err, "shader instance failed to start");
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    fn initialize(
        &self,
        instance: &PendingInstance,
    ) -> Result<RenderLoop<D::Surface>, InstanceError> {
        let id = &instance.id;
        let surface = self
            .document
            .surface(id)
            .ok_or_else(|| InstanceError::MissingSurface {
                id: id.clone(),
                element: id.element_id().to_string(),
            })?;
        let gl = surface
            .acquire_context()
            .ok_or_else(|| InstanceError::UnsupportedContext { id: id.clone() })?;

        let sources = ComposedSources::new(&instance.source);
        let linked =
            compile::build_program(&gl, id.element_id(), sources.vertex, &sources.fragment)?;
        let scene = Scene::new(&gl, id.element_id(), linked, &QuadGeometry::FULL_VIEWPORT)?;

        Ok(RenderLoop::new(
            surface,
            gl,
            scene,
            (self.time_source)(),
            self.options.time_wrap,
            self.options.clear_colour,
        ))
    }

    fn start(
        &mut self,
        id: InstanceId,
        render_loop: RenderLoop<D::Surface>,
        now: Instant,
    ) -> Result<InstanceHandle, InstanceError> {
        let stop = match self.scheduler.set_target(
            TargetId(id.seq()),
            self.options.frame_interval,
            now,
        ) {
            Ok(stop) => stop,
            Err(source) => {
                render_loop.dispose();
                return Err(InstanceError::Schedule { id, source });
            }
        };
        tracing::info!(id = %id, interval = ?self.options.frame_interval, "shader instance started");
        self.running.insert(
            id.seq(),
            ShaderInstance {
                id: id.clone(),
                render_loop,
                stop: stop.clone(),
            },
        );
        Ok(InstanceHandle { id, stop })
    }

    /// Draws a frame for every instance whose cadence elapsed and disposes
    /// instances whose stop handle fired. Returns the number of frames drawn.
    pub fn tick(&mut self, now: Instant) -> usize {
        let report = self.scheduler.tick(now);
        for target in report.stopped {
            if let Some(instance) = self.running.remove(&target.0) {
                tracing::debug!(id = %instance.id, "disposing stopped shader instance");
                instance.render_loop.dispose();
            }
        }

        let mut drawn = 0;
        for target in report.due {
            if let Some(instance) = self.running.get_mut(&target.0) {
                instance.render_loop.tick();
                drawn += 1;
            }
        }
        drawn
    }

    /// Stops an instance immediately and releases its GPU resources.
    /// Pending instances are simply dropped. Returns whether `id` was known.
    pub fn stop(&mut self, id: &InstanceId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|pending| pending.id != *id);
        if self.pending.len() != before {
            return true;
        }

        self.scheduler.remove_target(TargetId(id.seq()));
        match self.running.remove(&id.seq()) {
            Some(instance) => {
                tracing::debug!(id = %instance.id, "stopped shader instance");
                instance.render_loop.dispose();
                true
            }
            None => false,
        }
    }

    /// Stops every running and pending instance.
    pub fn stop_all(&mut self) {
        self.pending.clear();
        let running = std::mem::take(&mut self.running);
        for (seq, instance) in running {
            self.scheduler.remove_target(TargetId(seq));
            instance.render_loop.dispose();
        }
    }

    /// Looks up a running or pending instance by its element id.
    pub fn find(&self, element_id: &str) -> Option<InstanceId> {
        self.running
            .values()
            .map(|instance| &instance.id)
            .chain(self.pending.iter().map(|pending| &pending.id))
            .find(|id| id.element_id() == element_id)
            .cloned()
    }

    pub fn instance(&self, id: &InstanceId) -> Option<&ShaderInstance<D::Surface>> {
        self.running.get(&id.seq())
    }

    pub fn is_running(&self, id: &InstanceId) -> bool {
        self.running.contains_key(&id.seq())
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// When the earliest running instance is next due, for hosts that sleep.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn options(&self) -> &EmbedOptions {
        &self.options
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;

    use super::*;
    use crate::gl::fake::{Call, CallLog, RecordingContext};
    use crate::gl::ShaderStage;
    use crate::runtime::FixedTimeSource;

    const GRADIENT: &str = "void mainImage(out vec4 fragColor, in vec2 fragCoord){ vec2 uv = fragCoord/iResolution.xy; fragColor = vec4(uv.x, uv.y, 0.0, 1.0); }";
    const BROKEN: &str = "void mainImage(out vec4 c, in vec2 p) { c = vec4(1.0);";

    #[derive(Clone)]
    struct FakeSurface {
        size: (u32, u32),
        log: CallLog,
        webgl2: bool,
    }

    impl Surface for FakeSurface {
        type Context = RecordingContext;

        fn pixel_size(&self) -> (u32, u32) {
            self.size
        }

        fn acquire_context(&self) -> Option<RecordingContext> {
            self.webgl2
                .then(|| RecordingContext::with_log(self.log.clone()))
        }
    }

    #[derive(Default)]
    struct FakeDocument {
        markup: Vec<String>,
        surfaces: HashMap<String, FakeSurface>,
        webgl2: bool,
    }

    impl FakeDocument {
        fn new() -> Self {
            Self {
                webgl2: true,
                ..Self::default()
            }
        }

        fn log(&self, id: &InstanceId) -> CallLog {
            self.surfaces[id.element_id()].log.clone()
        }

        fn detach(&mut self, id: &InstanceId) {
            self.surfaces.remove(id.element_id());
        }
    }

    impl Document for FakeDocument {
        type Surface = FakeSurface;

        fn insert_placeholder(&mut self, placeholder: &Placeholder) {
            self.markup.push(placeholder.to_markup());
            self.surfaces.insert(
                placeholder.id.element_id().to_string(),
                FakeSurface {
                    size: (placeholder.width, placeholder.height),
                    log: CallLog::default(),
                    webgl2: self.webgl2,
                },
            );
        }

        fn surface(&self, id: &InstanceId) -> Option<FakeSurface> {
            self.surfaces.get(id.element_id()).cloned()
        }
    }

    fn manager(document: FakeDocument) -> InstanceManager<FakeDocument> {
        InstanceManager::new(InstanceContext::new(), document, EmbedOptions::default())
            .with_time_source(|| Box::new(FixedTimeSource::new(Duration::from_millis(2_000))))
    }

    fn interval() -> Duration {
        EmbedOptions::default().frame_interval
    }

    #[test]
    fn embeds_emit_unique_increasing_placeholders() {
        let mut manager = manager(FakeDocument::new());
        let ids: Vec<InstanceId> = (0..5).map(|_| manager.create_instance(GRADIENT)).collect();

        let unique: HashSet<&str> = ids.iter().map(|id| id.element_id()).collect();
        assert_eq!(unique.len(), 5);
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        let markup = &manager.document().markup;
        assert_eq!(markup.len(), 5);
        assert_eq!(
            markup[0],
            r#"<canvas id="shaderblock-0" class="shaderblock-canvas" width="640" height="360"></canvas>"#
        );
        assert_eq!(manager.pending_count(), 5);
        assert_eq!(manager.running_count(), 0);
    }

    #[test]
    fn ready_starts_render_loops_at_fixed_cadence() {
        let mut manager = manager(FakeDocument::new());
        let first = manager.create_instance(GRADIENT);
        let second = manager.create_instance_with_size(GRADIENT, (320, 200));

        let start = Instant::now();
        let outcomes = manager.document_ready(start);
        assert!(outcomes.iter().all(Result::is_ok));
        assert_eq!(manager.running_count(), 2);

        assert_eq!(manager.tick(start), 2);
        assert_eq!(manager.tick(start + Duration::from_millis(5)), 0);
        assert_eq!(manager.tick(start + interval()), 2);

        let first_log = manager.document().log(&first);
        assert_eq!(first_log.draw_count(), 2);
        assert_eq!(first_log.last_vec3("iResolution"), Some([640.0, 360.0, 1.0]));
        assert_eq!(first_log.last_f32("iTime"), Some(2.0));
        let second_log = manager.document().log(&second);
        assert_eq!(second_log.last_vec3("iResolution"), Some([320.0, 200.0, 1.0]));
    }

    #[test]
    fn compile_error_is_tagged_and_never_draws() {
        let mut manager = manager(FakeDocument::new());
        let broken = manager.create_instance(BROKEN);
        let healthy = manager.create_instance(GRADIENT);

        let start = Instant::now();
        let mut outcomes = manager.document_ready(start);
        assert!(outcomes[1].is_ok());
        let err = outcomes.remove(0).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(broken.element_id()), "{message}");
        assert!(message.contains("syntax error"), "{message}");
        assert!(matches!(
            err,
            InstanceError::Compile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));

        manager.tick(start);
        manager.tick(start + interval());
        assert!(!manager.is_running(&broken));
        assert_eq!(manager.document().log(&broken).draw_count(), 0);
        assert_eq!(manager.document().log(&healthy).draw_count(), 2);
    }

    #[test]
    fn missing_surface_only_fails_that_instance() {
        let mut manager = manager(FakeDocument::new());
        let gone = manager.create_instance(GRADIENT);
        let kept = manager.create_instance(GRADIENT);
        manager.document_mut().detach(&gone);

        let outcomes = manager.document_ready(Instant::now());
        assert!(matches!(
            &outcomes[0],
            Err(InstanceError::MissingSurface { id, .. }) if *id == gone
        ));
        assert!(outcomes[1].is_ok());
        assert!(manager.is_running(&kept));
    }

    #[test]
    fn unsupported_context_is_fatal_for_instance() {
        let mut manager = manager(FakeDocument::default());
        let id = manager.create_instance(GRADIENT);
        let outcomes = manager.document_ready(Instant::now());
        assert!(matches!(
            &outcomes[0],
            Err(InstanceError::UnsupportedContext { id: failed }) if *failed == id
        ));
        assert_eq!(manager.running_count(), 0);
        assert_eq!(manager.next_deadline(), None);
    }

    #[test]
    fn stop_handle_disposes_on_next_tick() {
        let mut manager = manager(FakeDocument::new());
        let id = manager.create_instance(GRADIENT);
        let start = Instant::now();
        let handle = manager.document_ready(start).remove(0).unwrap();
        assert_eq!(handle.id, id);
        manager.tick(start);

        handle.stop.stop();
        assert_eq!(manager.tick(start + interval()), 0);
        assert!(!manager.is_running(&id));

        let log = manager.document().log(&id);
        assert_eq!(log.draw_count(), 1);
        assert_eq!(log.count(|call| matches!(call, Call::DeleteProgram(_))), 1);
        assert_eq!(log.count(|call| matches!(call, Call::DeleteBuffer(_))), 3);
    }

    #[test]
    fn stop_releases_immediately() {
        let mut manager = manager(FakeDocument::new());
        let id = manager.create_instance(GRADIENT);
        let start = Instant::now();
        let handle = manager.document_ready(start).remove(0).unwrap();

        assert_eq!(manager.find("shaderblock-0"), Some(id.clone()));
        assert!(manager.stop(&id));
        assert!(handle.stop.is_stopped());
        assert_eq!(manager.find("shaderblock-0"), None);
        assert!(!manager.stop(&id));
        assert_eq!(manager.tick(start), 0);
        assert_eq!(manager.document().log(&id).draw_count(), 0);
    }

    #[test]
    fn later_embeds_initialize_on_next_ready() {
        let mut manager = manager(FakeDocument::new());
        manager.create_instance(GRADIENT);
        let start = Instant::now();
        assert_eq!(manager.document_ready(start).len(), 1);

        let late = manager.create_instance(GRADIENT);
        let outcomes = manager.document_ready(start);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].as_ref().unwrap().id, late);
        assert_eq!(manager.running_count(), 2);
        assert!(manager.document_ready(start).is_empty());
    }

    #[test]
    fn stop_all_clears_everything() {
        let mut manager = manager(FakeDocument::new());
        let running = manager.create_instance(GRADIENT);
        manager.document_ready(Instant::now());
        manager.create_instance(GRADIENT);

        manager.stop_all();
        assert_eq!(manager.running_count(), 0);
        assert_eq!(manager.pending_count(), 0);
        let log = manager.document().log(&running);
        assert_eq!(log.count(|call| matches!(call, Call::DeleteProgram(_))), 1);
    }
}
