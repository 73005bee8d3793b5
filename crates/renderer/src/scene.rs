use crate::compile::LinkedProgram;
use crate::error::InstanceError;
use crate::geometry::QuadGeometry;
use crate::gl::{BufferTarget, GraphicsContext};

/// Uniform locations resolved once after linking.
///
/// A `None` entry means the driver optimised the uniform away (or the name
/// does not exist); writes through it are no-ops.
#[derive(Debug, Clone)]
pub struct UniformLocations<L> {
    pub projection: Option<L>,
    pub model_view: Option<L>,
    pub time: Option<L>,
    pub resolution: Option<L>,
}

#[derive(Debug, Clone, Copy)]
pub struct AttributeLocations {
    pub vertex: Option<u32>,
    pub uv: Option<u32>,
}

/// Linked program plus its cached locations.
pub struct CompiledProgram<C: GraphicsContext> {
    pub linked: LinkedProgram<C>,
    pub uniforms: UniformLocations<C::UniformLocation>,
    pub attributes: AttributeLocations,
}

impl<C: GraphicsContext> CompiledProgram<C> {
    pub fn resolve(gl: &C, linked: LinkedProgram<C>) -> Self {
        let program = linked.program;
        let uniform = |name: &str| {
            let location = gl.uniform_location(program, name);
            if location.is_none() {
                tracing::debug!(name, "uniform is not active in program");
            }
            location
        };
        let uniforms = UniformLocations {
            projection: uniform("projection"),
            model_view: uniform("modelView"),
            time: uniform("iTime"),
            resolution: uniform("iResolution"),
        };
        let attribute = |name: &str| {
            let location = gl.attrib_location(program, name);
            if location.is_none() {
                tracing::warn!(name, "vertex attribute is not active in program");
            }
            location
        };
        let attributes = AttributeLocations {
            vertex: attribute("vertex"),
            uv: attribute("uv"),
        };
        Self {
            linked,
            uniforms,
            attributes,
        }
    }

    pub fn program(&self) -> C::Program {
        self.linked.program
    }
}

/// GPU-resident copy of the quad geometry.
#[derive(Debug)]
pub struct GeometryBuffers<C: GraphicsContext> {
    pub vertices: C::Buffer,
    pub uvs: C::Buffer,
    pub indices: C::Buffer,
    pub index_count: i32,
}

impl<C: GraphicsContext> GeometryBuffers<C> {
    /// Allocates the three buffers and uploads `geometry` once.
    pub fn upload(gl: &C, label: &str, geometry: &QuadGeometry) -> Result<Self, InstanceError> {
        let mut created = Vec::with_capacity(3);
        let uploads: [(BufferTarget, &[u8]); 3] = [
            (
                BufferTarget::Array,
                bytemuck::cast_slice(geometry.vertices.as_slice()),
            ),
            (BufferTarget::Array, bytemuck::cast_slice(geometry.uvs.as_slice())),
            (
                BufferTarget::ElementArray,
                bytemuck::cast_slice(geometry.indices.as_slice()),
            ),
        ];
        for (target, bytes) in uploads {
            let buffer = match gl.create_buffer() {
                Ok(buffer) => buffer,
                Err(message) => {
                    for buffer in created {
                        gl.delete_buffer(buffer);
                    }
                    return Err(InstanceError::Allocation {
                        label: label.to_string(),
                        resource: "geometry buffer",
                        message,
                    });
                }
            };
            gl.bind_buffer(target, Some(buffer));
            gl.buffer_static_data(target, bytes);
            created.push(buffer);
        }
        gl.bind_buffer(BufferTarget::Array, None);
        gl.bind_buffer(BufferTarget::ElementArray, None);

        Ok(Self {
            vertices: created[0],
            uvs: created[1],
            indices: created[2],
            index_count: geometry.index_count(),
        })
    }

    pub fn delete(&self, gl: &C) {
        gl.delete_buffer(self.vertices);
        gl.delete_buffer(self.uvs);
        gl.delete_buffer(self.indices);
    }
}

/// Everything a frame needs: program, locations and geometry.
pub struct Scene<C: GraphicsContext> {
    pub program: CompiledProgram<C>,
    pub geometry: GeometryBuffers<C>,
}

impl<C: GraphicsContext> Scene<C> {
    /// Resolves locations and uploads geometry. The program is deleted if the
    /// upload fails.
    pub fn new(
        gl: &C,
        label: &str,
        linked: LinkedProgram<C>,
        geometry: &QuadGeometry,
    ) -> Result<Self, InstanceError> {
        let program = CompiledProgram::resolve(gl, linked);
        let geometry = match GeometryBuffers::upload(gl, label, geometry) {
            Ok(buffers) => buffers,
            Err(err) => {
                program.linked.delete(gl);
                return Err(err);
            }
        };
        Ok(Self { program, geometry })
    }

    /// Releases every GPU object the scene owns.
    pub fn dispose(&self, gl: &C) {
        self.geometry.delete(gl);
        self.program.linked.delete(gl);
    }
}
