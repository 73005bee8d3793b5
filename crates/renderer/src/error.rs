use crate::gl::ShaderStage;
use crate::types::InstanceId;

/// Fatal initialization failures for a single embedded shader.
///
/// Every variant names the instance it belongs to so failures stay traceable
/// when several shaders share one page. Driver logs are kept verbatim.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("[{id}] drawable surface `{element}` is missing from the document")]
    MissingSurface { id: InstanceId, element: String },
    #[error("[{id}] WebGL2 rendering context is not available")]
    UnsupportedContext { id: InstanceId },
    #[error("[{label}] failed to compile {stage} shader:\n{log}")]
    Compile {
        label: String,
        stage: ShaderStage,
        log: String,
    },
    #[error("[{label}] failed to link shader program:\n{log}")]
    Link { label: String, log: String },
    #[error("[{label}] failed to allocate {resource}: {message}")]
    Allocation {
        label: String,
        resource: &'static str,
        message: String,
    },
    #[error("[{id}] failed to schedule render loop: {source}")]
    Schedule {
        id: InstanceId,
        #[source]
        source: scheduler::SchedulerError,
    },
}

impl InstanceError {
    /// True for failures caused by the user's shader text rather than the host.
    pub fn is_shader_error(&self) -> bool {
        matches!(self, InstanceError::Compile { .. } | InstanceError::Link { .. })
    }
}
