//! Browser bindings for ShaderBlock.
//!
//! Compiled to `wasm32-unknown-unknown`, this crate exports [`ShaderHost`] to
//! JavaScript. A page creates one host, calls `embed` from each inline script
//! where a shader should appear, and the host takes care of the rest: canvases
//! are inserted immediately, shaders are compiled once the DOM is ready, and a
//! single `setInterval` timer drives every running instance.
//!
//! On other targets only the console logging layer and the [`driver`]
//! lifecycle are built, so the workspace still compiles and tests natively.

pub mod console;
#[cfg(target_arch = "wasm32")]
mod dom;
pub mod driver;
#[cfg(target_arch = "wasm32")]
mod host;

#[cfg(target_arch = "wasm32")]
pub use dom::{CanvasSurface, WebDocument};
#[cfg(target_arch = "wasm32")]
pub use host::ShaderHost;
