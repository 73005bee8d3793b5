//! Renderer crate for ShaderBlock (embedded ShaderToy-style shaders).
//!
//! Each embed point on a page becomes one independent shader instance. The
//! crate owns everything between a `mainImage` body and pixels on a canvas:
//!
//! ```text
//!   embed point ──▶ InstanceManager::create_instance ──▶ <canvas> placeholder
//!                                                            │ document ready
//!                                                            ▼
//!   compose ──▶ compile/link ──▶ Scene (quad buffers + locations)
//!                                     │
//!   host timer ──▶ InstanceManager::tick ──▶ RenderLoop::tick ──▶ draw()
//! ```
//!
//! The page itself is reached through the [`Document`] and [`Surface`] traits
//! and the GPU through [`GraphicsContext`], so the whole pipeline runs the same
//! against WebGL2 in a browser and against a recording context in tests.

pub mod camera;
pub mod compile;
pub mod compose;
mod error;
pub mod frame;
pub mod geometry;
pub mod gl;
mod host;
mod instance;
pub mod runtime;
pub mod scene;
mod types;

pub use camera::Camera;
pub use compose::{fragment_source, vertex_source, ComposedSources};
pub use error::InstanceError;
pub use frame::{FrameUniforms, RenderLoop};
pub use geometry::QuadGeometry;
pub use gl::{BufferTarget, GraphicsContext, ShaderStage};
pub use host::{Detached, Document, MarkupDocument, Surface};
pub use instance::{InstanceHandle, InstanceManager, ShaderInstance, TimeSourceFactory};
pub use runtime::{BoxedTimeSource, FixedTimeSource, SystemTimeSource, TimeSample, TimeSource};
pub use scene::Scene;
pub use types::{
    EmbedOptions, InstanceContext, InstanceId, Placeholder, DEFAULT_CANVAS_CLASS,
    DEFAULT_ID_PREFIX, DEFAULT_SURFACE_SIZE, DEFAULT_TIME_WRAP,
};

pub use scheduler::{StopHandle, DEFAULT_INTERVAL};
