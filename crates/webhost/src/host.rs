use std::cell::RefCell;
use std::rc::{Rc, Weak};

use renderer::{EmbedOptions, InstanceContext, InstanceManager, DEFAULT_ID_PREFIX};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Window;
use web_time::Instant;

use crate::console;
use crate::dom::WebDocument;
use crate::driver::{FrameTimer, HostDriver};

type Callback = Closure<dyn FnMut()>;

/// Drives every shader embedded on one page.
///
/// ```js
/// const host = new ShaderHost();
/// host.embed(`void mainImage(out vec4 c, in vec2 p) { c = vec4(p / iResolution.xy, 0.0, 1.0); }`);
/// ```
#[wasm_bindgen]
pub struct ShaderHost {
    state: Rc<RefCell<HostState>>,
}

struct HostState {
    driver: HostDriver<WebDocument, IntervalTimer>,
    document: web_sys::Document,
    on_ready: Callback,
    listening: bool,
}

/// `setInterval` on the window, calling back into the host's tick closure.
struct IntervalTimer {
    window: Window,
    on_tick: Callback,
}

impl FrameTimer for IntervalTimer {
    type Handle = i32;
    type Error = JsValue;

    fn start(&mut self, period_ms: i32) -> Result<i32, JsValue> {
        self.window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                self.on_tick.as_ref().unchecked_ref(),
                period_ms,
            )
    }

    fn clear(&mut self, handle: i32) {
        self.window.clear_interval_with_handle(handle);
    }
}

#[wasm_bindgen]
impl ShaderHost {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<ShaderHost, JsValue> {
        Self::with_prefix(DEFAULT_ID_PREFIX)
    }

    /// Like `new`, but numbers canvases as `{prefix}0`, `{prefix}1`, ...
    #[wasm_bindgen(js_name = withPrefix)]
    pub fn with_prefix(prefix: &str) -> Result<ShaderHost, JsValue> {
        console_error_panic_hook::set_once();
        console::initialise_tracing();

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("window has no document"))?;
        let manager = InstanceManager::new(
            InstanceContext::with_prefix(prefix),
            WebDocument::new(document.clone()),
            EmbedOptions::default(),
        );

        let loading = document.ready_state() == "loading";
        let state = Rc::new_cyclic(|weak: &Weak<RefCell<HostState>>| {
            let ready_state = weak.clone();
            let on_ready = Closure::<dyn FnMut()>::new(move || {
                if let Some(state) = ready_state.upgrade() {
                    HostState::document_ready(&state);
                }
            });
            let tick_state = weak.clone();
            let on_tick = Closure::<dyn FnMut()>::new(move || {
                if let Some(state) = tick_state.upgrade() {
                    HostState::tick(&state);
                }
            });
            let timer = IntervalTimer { window, on_tick };
            RefCell::new(HostState {
                driver: HostDriver::new(manager, timer, !loading),
                document: document.clone(),
                on_ready,
                listening: false,
            })
        });

        if loading {
            let mut state = state.borrow_mut();
            document.add_event_listener_with_callback(
                "DOMContentLoaded",
                state.on_ready.as_ref().unchecked_ref(),
            )?;
            state.listening = true;
        }
        tracing::debug!(prefix, loading, "shader host created");
        Ok(ShaderHost { state })
    }

    /// Embeds a shader at the current script position with the default size.
    /// Returns the generated canvas id.
    pub fn embed(&self, source: &str) -> String {
        let size = self.state.borrow().driver.options().surface_size;
        self.embed_sized(source, size.0, size.1)
    }

    #[wasm_bindgen(js_name = embedSized)]
    pub fn embed_sized(&self, source: &str, width: u32, height: u32) -> String {
        let mut state = self.state.borrow_mut();
        let id = state.driver.embed(source, (width, height), Instant::now());
        id.element_id().to_string()
    }

    /// Stops the shader rendering into canvas `id` and frees its GPU objects.
    pub fn stop(&self, id: &str) -> bool {
        self.state.borrow_mut().driver.stop(id)
    }

    #[wasm_bindgen(js_name = runningCount)]
    pub fn running_count(&self) -> usize {
        self.state.borrow().driver.running_count()
    }

    /// Stops every shader and detaches the host from the page.
    pub fn dispose(&self) {
        let mut state = self.state.borrow_mut();
        state.driver.shutdown();
        state.detach_ready_listener();
    }
}

impl HostState {
    fn document_ready(state: &Rc<RefCell<HostState>>) {
        let Ok(mut state) = state.try_borrow_mut() else {
            return;
        };
        state.driver.document_ready(Instant::now());
        state.detach_ready_listener();
    }

    fn tick(state: &Rc<RefCell<HostState>>) {
        let Ok(mut state) = state.try_borrow_mut() else {
            return;
        };
        state.driver.tick(Instant::now());
    }

    fn detach_ready_listener(&mut self) {
        if !self.listening {
            return;
        }
        self.listening = false;
        if let Err(err) = self.document.remove_event_listener_with_callback(
            "DOMContentLoaded",
            self.on_ready.as_ref().unchecked_ref(),
        ) {
            tracing::warn!(error = ?err, "failed to remove DOMContentLoaded listener");
        }
    }
}

// The driver clears its interval and releases GPU objects when dropped,
// before `on_tick` and `on_ready` are freed.
impl Drop for HostState {
    fn drop(&mut self) {
        self.detach_ready_listener();
    }
}
