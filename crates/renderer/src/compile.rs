use crate::error::InstanceError;
use crate::gl::{GraphicsContext, ShaderStage};

/// Compiles one shader stage.
///
/// On failure the shader object is deleted and the driver's info log is
/// returned untouched, tagged with `label`.
pub fn compile<C: GraphicsContext>(
    gl: &C,
    label: &str,
    stage: ShaderStage,
    source: &str,
) -> Result<C::Shader, InstanceError> {
    let shader = gl
        .create_shader(stage)
        .map_err(|message| InstanceError::Allocation {
            label: label.to_string(),
            resource: "shader object",
            message,
        })?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);

    if gl.shader_compile_status(shader) {
        Ok(shader)
    } else {
        let log = gl.shader_info_log(shader);
        gl.delete_shader(shader);
        Err(InstanceError::Compile {
            label: label.to_string(),
            stage,
            log,
        })
    }
}

/// Attaches `shaders` to a new program and links it.
///
/// The program is deleted if linking fails; the shaders stay with the caller.
pub fn link<C: GraphicsContext>(
    gl: &C,
    label: &str,
    shaders: &[C::Shader],
) -> Result<C::Program, InstanceError> {
    let program = gl
        .create_program()
        .map_err(|message| InstanceError::Allocation {
            label: label.to_string(),
            resource: "program object",
            message,
        })?;
    for shader in shaders {
        gl.attach_shader(program, *shader);
    }
    gl.link_program(program);

    if gl.program_link_status(program) {
        Ok(program)
    } else {
        let log = gl.program_info_log(program);
        gl.delete_program(program);
        Err(InstanceError::Link {
            label: label.to_string(),
            log,
        })
    }
}

/// A linked program together with the shader objects attached to it.
#[derive(Debug)]
pub struct LinkedProgram<C: GraphicsContext> {
    pub program: C::Program,
    pub shaders: [C::Shader; 2],
}

impl<C: GraphicsContext> LinkedProgram<C> {
    pub fn delete(&self, gl: &C) {
        gl.delete_program(self.program);
        for shader in self.shaders {
            gl.delete_shader(shader);
        }
    }
}

/// Compiles both stages and links them, releasing everything on failure.
pub fn build_program<C: GraphicsContext>(
    gl: &C,
    label: &str,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<LinkedProgram<C>, InstanceError> {
    let vertex = compile(gl, label, ShaderStage::Vertex, vertex_source)?;
    let fragment = match compile(gl, label, ShaderStage::Fragment, fragment_source) {
        Ok(shader) => shader,
        Err(err) => {
            gl.delete_shader(vertex);
            return Err(err);
        }
    };
    match link(gl, label, &[vertex, fragment]) {
        Ok(program) => {
            tracing::debug!(label, "linked shader program");
            Ok(LinkedProgram {
                program,
                shaders: [vertex, fragment],
            })
        }
        Err(err) => {
            gl.delete_shader(vertex);
            gl.delete_shader(fragment);
            Err(err)
        }
    }
}
