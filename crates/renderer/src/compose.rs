/// Produces a complete GLSL ES 3.00 fragment shader from ShaderToy-style code.
///
/// The user body is expected to define `mainImage(out vec4, in vec2)`. It is
/// inserted verbatim between [`FRAGMENT_HEADER`] and [`FRAGMENT_FOOTER`]; any
/// mistakes in it surface later as compile errors.
pub fn fragment_source(body: &str) -> String {
    let mut source =
        String::with_capacity(FRAGMENT_HEADER.len() + body.len() + FRAGMENT_FOOTER.len() + 1);
    source.push_str(FRAGMENT_HEADER);
    source.push_str(body);
    if !body.ends_with('\n') {
        source.push('\n');
    }
    source.push_str(FRAGMENT_FOOTER);
    source
}

/// Fixed vertex shader shared by every instance.
pub fn vertex_source() -> &'static str {
    VERTEX_SHADER_GLSL
}

/// Vertex and fragment sources for one embedded shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedSources {
    pub vertex: &'static str,
    pub fragment: String,
}

impl ComposedSources {
    pub fn new(body: &str) -> Self {
        Self {
            vertex: vertex_source(),
            fragment: fragment_source(body),
        }
    }
}

/// GLSL prologue injected ahead of the user body.
///
/// `#line 1` resets the driver's line counter so diagnostics point at the
/// user's own line numbers.
const FRAGMENT_HEADER: &str = r"#version 300 es
precision highp float;

in vec2 vFragCoord;
out vec4 outColour;

uniform float iTime;
uniform vec3 iResolution;

#line 1
";

/// GLSL epilogue that seeds an opaque colour and delegates to `mainImage`.
const FRAGMENT_FOOTER: &str = r"
void main() {
    vec4 colour = vec4(0.0, 0.0, 0.0, 1.0);
    mainImage(colour, vFragCoord);
    outColour = colour;
}
";

/// Full-viewport quad vertex shader. UVs are scaled to pixels so `fragCoord`
/// is in raster units.
const VERTEX_SHADER_GLSL: &str = r"#version 300 es
precision highp float;

in vec3 vertex;
in vec2 uv;

uniform mat4 projection;
uniform mat4 modelView;
uniform vec3 iResolution;

out vec2 vFragCoord;

void main() {
    vFragCoord = uv * iResolution.xy;
    gl_Position = projection * modelView * vec4(vertex, 1.0);
}
";
