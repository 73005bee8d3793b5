use std::time::Duration;

use crate::camera::Camera;
use crate::geometry::QuadGeometry;
use crate::gl::{BufferTarget, GraphicsContext};
use crate::host::Surface;
use crate::runtime::BoxedTimeSource;
use crate::scene::Scene;

/// Per-draw uniform values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    /// `iTime` in seconds, always within `[0, wrap)`.
    pub time: f32,
    /// `iResolution`: pixel width, height and a pixel aspect of 1.
    pub resolution: [f32; 3],
}

impl FrameUniforms {
    pub fn new(elapsed: Duration, wrap: Duration, size: (u32, u32)) -> Self {
        Self {
            time: wrapped_seconds(elapsed, wrap),
            resolution: [size.0 as f32, size.1 as f32, 1.0],
        }
    }
}

/// Folds `elapsed` into `[0, wrap)` at millisecond precision before
/// converting to seconds, so the float never grows without bound.
pub fn wrapped_seconds(elapsed: Duration, wrap: Duration) -> f32 {
    let wrap_ms = wrap.as_millis().max(1);
    (elapsed.as_millis() % wrap_ms) as f32 / 1000.0
}

/// Issues the draw calls for one frame.
pub fn draw<C: GraphicsContext>(
    gl: &C,
    scene: &Scene<C>,
    camera: &Camera,
    uniforms: &FrameUniforms,
    size: (u32, u32),
    clear_colour: [f32; 4],
) {
    gl.viewport(size.0, size.1);
    gl.disable_depth_test();
    gl.clear(clear_colour);

    let program = &scene.program;
    gl.use_program(Some(program.program()));
    gl.uniform_matrix4(
        program.uniforms.projection.as_ref(),
        &camera.projection_array(),
    );
    gl.uniform_matrix4(
        program.uniforms.model_view.as_ref(),
        &camera.model_view_array(),
    );
    gl.uniform_f32(program.uniforms.time.as_ref(), uniforms.time);
    gl.uniform_vec3(program.uniforms.resolution.as_ref(), uniforms.resolution);

    if let Some(index) = program.attributes.vertex {
        gl.bind_buffer(BufferTarget::Array, Some(scene.geometry.vertices));
        gl.vertex_attrib_f32(index, QuadGeometry::VERTEX_COMPONENTS);
    }
    if let Some(index) = program.attributes.uv {
        gl.bind_buffer(BufferTarget::Array, Some(scene.geometry.uvs));
        gl.vertex_attrib_f32(index, QuadGeometry::UV_COMPONENTS);
    }

    gl.bind_buffer(BufferTarget::ElementArray, Some(scene.geometry.indices));
    gl.draw_triangle_strip_u16(scene.geometry.index_count);
}

/// Owns one instance's surface, context and scene, and draws on demand.
pub struct RenderLoop<S: Surface> {
    surface: S,
    gl: S::Context,
    scene: Scene<S::Context>,
    time: BoxedTimeSource,
    time_wrap: Duration,
    clear_colour: [f32; 4],
    frames: u64,
}

impl<S: Surface> RenderLoop<S> {
    pub fn new(
        surface: S,
        gl: S::Context,
        scene: Scene<S::Context>,
        time: BoxedTimeSource,
        time_wrap: Duration,
        clear_colour: [f32; 4],
    ) -> Self {
        Self {
            surface,
            gl,
            scene,
            time,
            time_wrap,
            clear_colour,
            frames: 0,
        }
    }

    /// Samples the clock and surface size, then draws one frame.
    pub fn tick(&mut self) -> FrameUniforms {
        let size = self.surface.pixel_size();
        let sample = self.time.sample();
        let uniforms = FrameUniforms::new(sample.elapsed, self.time_wrap, size);
        let camera = Camera::fixed();
        draw(
            &self.gl,
            &self.scene,
            &camera,
            &uniforms,
            size,
            self.clear_colour,
        );
        self.frames = sample.frame_index.saturating_add(1);
        uniforms
    }

    /// Number of frames the time source has handed out to this loop.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn context(&self) -> &S::Context {
        &self.gl
    }

    /// Releases the scene's GPU objects. The loop must not tick afterwards.
    pub fn dispose(self) {
        self.scene.dispose(&self.gl);
    }
}
