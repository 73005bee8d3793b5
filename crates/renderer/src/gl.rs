//! The slice of WebGL2 the shader host needs.
//!
//! [`GraphicsContext`] names exactly the calls made by the compiler, scene
//! builder and render loop. It is implemented for [`glow::Context`], which
//! wraps a `WebGl2RenderingContext` on wasm32 and a GL ES 3 context natively.

use glow::HasContext;

/// Programmable pipeline stage of a shader object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Buffer binding point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

pub trait GraphicsContext {
    type Shader: Copy + std::fmt::Debug;
    type Program: Copy + std::fmt::Debug;
    type Buffer: Copy + std::fmt::Debug;
    type UniformLocation: Clone + std::fmt::Debug;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn link_program(&self, program: Self::Program);
    fn program_link_status(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);

    fn uniform_location(&self, program: Self::Program, name: &str)
        -> Option<Self::UniformLocation>;
    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;

    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>);
    /// Uploads `data` to the bound buffer with a static-draw usage hint.
    fn buffer_static_data(&self, target: BufferTarget, data: &[u8]);
    fn delete_buffer(&self, buffer: Self::Buffer);

    fn viewport(&self, width: u32, height: u32);
    fn disable_depth_test(&self);
    fn clear(&self, colour: [f32; 4]);

    fn uniform_matrix4(&self, location: Option<&Self::UniformLocation>, matrix: &[f32; 16]);
    fn uniform_f32(&self, location: Option<&Self::UniformLocation>, value: f32);
    fn uniform_vec3(&self, location: Option<&Self::UniformLocation>, value: [f32; 3]);

    /// Points `index` at tightly packed, non-normalised floats in the bound array buffer.
    fn vertex_attrib_f32(&self, index: u32, components: i32);
    /// Draws `count` `u16` indices from the bound element buffer as a triangle strip.
    fn draw_triangle_strip_u16(&self, count: i32);
}

fn stage_enum(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

fn target_enum(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

// SAFETY (all blocks below): glow marks every call unsafe because handles are
// not checked against the context that produced them. Handles passed here were
// all created by `self`.
impl GraphicsContext for glow::Context {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Buffer = glow::Buffer;
    type UniformLocation = glow::UniformLocation;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        unsafe { HasContext::create_shader(self, stage_enum(stage)) }
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        unsafe { HasContext::shader_source(self, shader, source) }
    }

    fn compile_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::compile_shader(self, shader) }
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> bool {
        unsafe { self.get_shader_compile_status(shader) }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.get_shader_info_log(shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::delete_shader(self, shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { HasContext::create_program(self) }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { HasContext::attach_shader(self, program, shader) }
    }

    fn link_program(&self, program: Self::Program) {
        unsafe { HasContext::link_program(self, program) }
    }

    fn program_link_status(&self, program: Self::Program) -> bool {
        unsafe { self.get_program_link_status(program) }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.get_program_info_log(program) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { HasContext::delete_program(self, program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { HasContext::use_program(self, program) }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.get_uniform_location(program, name) }
    }

    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { self.get_attrib_location(program, name) }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { HasContext::create_buffer(self) }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>) {
        unsafe { HasContext::bind_buffer(self, target_enum(target), buffer) }
    }

    fn buffer_static_data(&self, target: BufferTarget, data: &[u8]) {
        unsafe { self.buffer_data_u8_slice(target_enum(target), data, glow::STATIC_DRAW) }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { HasContext::delete_buffer(self, buffer) }
    }

    fn viewport(&self, width: u32, height: u32) {
        let width = i32::try_from(width).unwrap_or(i32::MAX);
        let height = i32::try_from(height).unwrap_or(i32::MAX);
        unsafe { HasContext::viewport(self, 0, 0, width, height) }
    }

    fn disable_depth_test(&self) {
        unsafe { self.disable(glow::DEPTH_TEST) }
    }

    fn clear(&self, colour: [f32; 4]) {
        unsafe {
            self.clear_color(colour[0], colour[1], colour[2], colour[3]);
            HasContext::clear(self, glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    fn uniform_matrix4(&self, location: Option<&Self::UniformLocation>, matrix: &[f32; 16]) {
        unsafe { self.uniform_matrix_4_f32_slice(location, false, matrix) }
    }

    fn uniform_f32(&self, location: Option<&Self::UniformLocation>, value: f32) {
        unsafe { self.uniform_1_f32(location, value) }
    }

    fn uniform_vec3(&self, location: Option<&Self::UniformLocation>, value: [f32; 3]) {
        unsafe { self.uniform_3_f32(location, value[0], value[1], value[2]) }
    }

    fn vertex_attrib_f32(&self, index: u32, components: i32) {
        unsafe {
            self.enable_vertex_attrib_array(index);
            self.vertex_attrib_pointer_f32(index, components, glow::FLOAT, false, 0, 0);
        }
    }

    fn draw_triangle_strip_u16(&self, count: i32) {
        unsafe { self.draw_elements(glow::TRIANGLE_STRIP, count, glow::UNSIGNED_SHORT, 0) }
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod fake {
    //! Recording stand-in for a WebGL2 context.

    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::{BufferTarget, GraphicsContext, ShaderStage};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        CreateShader(ShaderStage, u32),
        CompileShader(u32),
        DeleteShader(u32),
        CreateProgram(u32),
        Attach(u32, u32),
        Link(u32),
        DeleteProgram(u32),
        UseProgram(Option<u32>),
        CreateBuffer(u32),
        BindBuffer(BufferTarget, Option<u32>),
        BufferData(BufferTarget, Vec<u8>),
        DeleteBuffer(u32),
        Viewport(u32, u32),
        DisableDepth,
        Clear([f32; 4]),
        UniformMatrix(Option<String>, [f32; 16]),
        UniformF32(Option<String>, f32),
        UniformVec3(Option<String>, [f32; 3]),
        VertexAttrib(u32, i32),
        DrawStrip(i32),
    }

    /// Shared, cloneable record of the calls made on a [`RecordingContext`].
    #[derive(Debug, Clone, Default)]
    pub struct CallLog(Rc<RefCell<Vec<Call>>>);

    impl CallLog {
        fn push(&self, call: Call) {
            self.0.borrow_mut().push(call);
        }

        pub fn snapshot(&self) -> Vec<Call> {
            self.0.borrow().clone()
        }

        pub fn len(&self) -> usize {
            self.0.borrow().len()
        }

        pub fn clear(&self) {
            self.0.borrow_mut().clear();
        }

        pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
            self.0.borrow().iter().filter(|call| predicate(call)).count()
        }

        pub fn draw_count(&self) -> usize {
            self.count(|call| matches!(call, Call::DrawStrip(_)))
        }

        pub fn last_vec3(&self, name: &str) -> Option<[f32; 3]> {
            self.0.borrow().iter().rev().find_map(|call| match call {
                Call::UniformVec3(Some(n), value) if n == name => Some(*value),
                _ => None,
            })
        }

        pub fn last_f32(&self, name: &str) -> Option<f32> {
            self.0.borrow().iter().rev().find_map(|call| match call {
                Call::UniformF32(Some(n), value) if n == name => Some(*value),
                _ => None,
            })
        }
    }

    /// Fails compilation when braces are unbalanced, mimicking a driver syntax error.
    #[derive(Debug, Default)]
    pub struct RecordingContext {
        next_handle: Cell<u32>,
        sources: RefCell<Vec<(u32, String)>>,
        log: CallLog,
        fail_link: bool,
        fail_buffer_after: Option<usize>,
        missing_uniforms: Vec<&'static str>,
        buffers_created: Cell<usize>,
    }

    impl RecordingContext {
        pub fn new() -> Self {
            Self::default()
        }

        /// Records into an existing log, so calls stay visible after the context moves.
        pub fn with_log(log: CallLog) -> Self {
            Self {
                log,
                ..Self::default()
            }
        }

        pub fn failing_link() -> Self {
            Self {
                fail_link: true,
                ..Self::default()
            }
        }

        pub fn failing_buffer(after: usize) -> Self {
            Self {
                fail_buffer_after: Some(after),
                ..Self::default()
            }
        }

        pub fn without_uniform(name: &'static str) -> Self {
            Self {
                missing_uniforms: vec![name],
                ..Self::default()
            }
        }

        pub fn log(&self) -> CallLog {
            self.log.clone()
        }

        fn allocate(&self) -> u32 {
            let handle = self.next_handle.get() + 1;
            self.next_handle.set(handle);
            handle
        }

        fn record(&self, call: Call) {
            self.log.push(call);
        }

        fn source_of(&self, shader: u32) -> String {
            self.sources
                .borrow()
                .iter()
                .rev()
                .find(|(handle, _)| *handle == shader)
                .map(|(_, source)| source.clone())
                .unwrap_or_default()
        }

        pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
            self.log.count(predicate)
        }

        pub fn draw_count(&self) -> usize {
            self.log.draw_count()
        }

        pub fn last_vec3(&self, name: &str) -> Option<[f32; 3]> {
            self.log.last_vec3(name)
        }

        pub fn last_f32(&self, name: &str) -> Option<f32> {
            self.log.last_f32(name)
        }

        pub fn clear_calls(&self) {
            self.log.clear();
        }
    }

    impl GraphicsContext for RecordingContext {
        type Shader = u32;
        type Program = u32;
        type Buffer = u32;
        type UniformLocation = String;

        fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
            let handle = self.allocate();
            self.record(Call::CreateShader(stage, handle));
            Ok(handle)
        }

        fn shader_source(&self, shader: u32, source: &str) {
            self.sources.borrow_mut().push((shader, source.to_string()));
        }

        fn compile_shader(&self, shader: u32) {
            self.record(Call::CompileShader(shader));
        }

        fn shader_compile_status(&self, shader: u32) -> bool {
            let source = self.source_of(shader);
            source.matches('{').count() == source.matches('}').count()
        }

        fn shader_info_log(&self, shader: u32) -> String {
            if self.shader_compile_status(shader) {
                String::new()
            } else {
                "ERROR: 0:3: '' : syntax error".to_string()
            }
        }

        fn delete_shader(&self, shader: u32) {
            self.record(Call::DeleteShader(shader));
        }

        fn create_program(&self) -> Result<u32, String> {
            let handle = self.allocate();
            self.record(Call::CreateProgram(handle));
            Ok(handle)
        }

        fn attach_shader(&self, program: u32, shader: u32) {
            self.record(Call::Attach(program, shader));
        }

        fn link_program(&self, program: u32) {
            self.record(Call::Link(program));
        }

        fn program_link_status(&self, _program: u32) -> bool {
            !self.fail_link
        }

        fn program_info_log(&self, _program: u32) -> String {
            if self.fail_link {
                "ERROR: Varyings with the same name but different type".to_string()
            } else {
                String::new()
            }
        }

        fn delete_program(&self, program: u32) {
            self.record(Call::DeleteProgram(program));
        }

        fn use_program(&self, program: Option<u32>) {
            self.record(Call::UseProgram(program));
        }

        fn uniform_location(&self, _program: u32, name: &str) -> Option<String> {
            if self.missing_uniforms.iter().any(|missing| *missing == name) {
                None
            } else {
                Some(name.to_string())
            }
        }

        fn attrib_location(&self, _program: u32, name: &str) -> Option<u32> {
            match name {
                "vertex" => Some(0),
                "uv" => Some(1),
                _ => None,
            }
        }

        fn create_buffer(&self) -> Result<u32, String> {
            let created = self.buffers_created.get();
            if self.fail_buffer_after == Some(created) {
                return Err("out of memory".to_string());
            }
            self.buffers_created.set(created + 1);
            let handle = self.allocate();
            self.record(Call::CreateBuffer(handle));
            Ok(handle)
        }

        fn bind_buffer(&self, target: BufferTarget, buffer: Option<u32>) {
            self.record(Call::BindBuffer(target, buffer));
        }

        fn buffer_static_data(&self, target: BufferTarget, data: &[u8]) {
            self.record(Call::BufferData(target, data.to_vec()));
        }

        fn delete_buffer(&self, buffer: u32) {
            self.record(Call::DeleteBuffer(buffer));
        }

        fn viewport(&self, width: u32, height: u32) {
            self.record(Call::Viewport(width, height));
        }

        fn disable_depth_test(&self) {
            self.record(Call::DisableDepth);
        }

        fn clear(&self, colour: [f32; 4]) {
            self.record(Call::Clear(colour));
        }

        fn uniform_matrix4(&self, location: Option<&String>, matrix: &[f32; 16]) {
            self.record(Call::UniformMatrix(location.cloned(), *matrix));
        }

        fn uniform_f32(&self, location: Option<&String>, value: f32) {
            self.record(Call::UniformF32(location.cloned(), value));
        }

        fn uniform_vec3(&self, location: Option<&String>, value: [f32; 3]) {
            self.record(Call::UniformVec3(location.cloned(), value));
        }

        fn vertex_attrib_f32(&self, index: u32, components: i32) {
            self.record(Call::VertexAttrib(index, components));
        }

        fn draw_triangle_strip_u16(&self, count: i32) {
            self.record(Call::DrawStrip(count));
        }
    }
}
