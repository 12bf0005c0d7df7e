use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline error taxonomy.
///
/// Only `ContextCreationFailed` and `InvalidConfig` cross the public API.
/// The other two degrade in place (a failed model load downgrades to the
/// classical chain, a bad frame passes through and bumps a counter) and
/// surface via logs and [`crate::Pipeline::frame_errors`] instead of
/// interrupting a live call.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("context creation failed: {0}")]
    ContextCreationFailed(&'static str),

    #[error("noise suppression model failed to load")]
    ModuleLoadFailed,

    #[error("frame processing failed: {0}")]
    FrameProcessingError(&'static str),

    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}
