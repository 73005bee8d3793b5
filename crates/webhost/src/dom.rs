use renderer::{Document, InstanceId, Placeholder, Surface};
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, WebGl2RenderingContext};

/// The live page. Placeholders land just before the script element that is
/// currently executing, or at the end of `<body>` when no script is running.
pub struct WebDocument {
    document: web_sys::Document,
}

impl WebDocument {
    pub fn new(document: web_sys::Document) -> Self {
        Self { document }
    }
}

impl Document for WebDocument {
    type Surface = CanvasSurface;

    fn insert_placeholder(&mut self, placeholder: &Placeholder) {
        let markup = placeholder.to_markup();
        let inserted = match (self.document.current_script(), self.document.body()) {
            (Some(script), _) => script.insert_adjacent_html("beforebegin", &markup),
            (None, Some(body)) => body.insert_adjacent_html("beforeend", &markup),
            (None, None) => {
                tracing::warn!(id = %placeholder.id, "document has no body for placeholder");
                return;
            }
        };
        if let Err(err) = inserted {
            tracing::warn!(id = %placeholder.id, error = ?err, "failed to insert placeholder");
        }
    }

    fn surface(&self, id: &InstanceId) -> Option<CanvasSurface> {
        let element = self.document.get_element_by_id(id.element_id())?;
        let canvas = element.dyn_into::<HtmlCanvasElement>().ok()?;
        Some(CanvasSurface { canvas })
    }
}

/// A `<canvas>` generated for one instance.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
}

impl Surface for CanvasSurface {
    type Context = glow::Context;

    fn pixel_size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn acquire_context(&self) -> Option<glow::Context> {
        let context = self
            .canvas
            .get_context("webgl2")
            .ok()??
            .dyn_into::<WebGl2RenderingContext>()
            .ok()?;
        Some(glow::Context::from_webgl2_context(context))
    }
}
