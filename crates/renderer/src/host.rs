//! Seams to the page that hosts embedded shaders.

use crate::gl::GraphicsContext;
use crate::types::{InstanceId, Placeholder};

/// A drawable element that can hand out a rendering context.
pub trait Surface {
    type Context: GraphicsContext;

    /// Current drawing-buffer size in pixels; may change between frames.
    fn pixel_size(&self) -> (u32, u32);

    /// Acquires a WebGL2-equivalent context, or `None` when the host lacks one.
    fn acquire_context(&self) -> Option<Self::Context>;
}

/// The document that receives placeholders and later resolves them to surfaces.
pub trait Document {
    type Surface: Surface;

    /// Inserts `placeholder` at the current embed point.
    ///
    /// Insertion problems are not reported here; they show up as a missing
    /// surface once the document is ready.
    fn insert_placeholder(&mut self, placeholder: &Placeholder);

    /// Looks up the surface generated for `id`.
    fn surface(&self, id: &InstanceId) -> Option<Self::Surface>;
}

/// Stands in for a surface in documents that never produce one.
#[derive(Debug, Clone, Copy)]
pub enum Detached {}

impl Surface for Detached {
    type Context = glow::Context;

    fn pixel_size(&self) -> (u32, u32) {
        match *self {}
    }

    fn acquire_context(&self) -> Option<glow::Context> {
        match *self {}
    }
}

/// A document rendered ahead of time, e.g. by a server building page markup.
///
/// Placeholders are collected in embed order; no surface ever resolves, so
/// readying such a document reports every instance as missing its surface.
#[derive(Debug, Clone, Default)]
pub struct MarkupDocument {
    fragments: Vec<String>,
}

impl MarkupDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn into_fragments(self) -> Vec<String> {
        self.fragments
    }
}

impl Document for MarkupDocument {
    type Surface = Detached;

    fn insert_placeholder(&mut self, placeholder: &Placeholder) {
        self.fragments.push(placeholder.to_markup());
    }

    fn surface(&self, _id: &InstanceId) -> Option<Detached> {
        None
    }
}
