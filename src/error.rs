use thiserror::Error;

/// Failure taxonomy for one conversion invocation.
///
/// Loader failures are fatal for the request; `InvalidSettings` rejects
/// unusable parameters before any audio work starts; `NoPitchedContent` is
/// a user-visible condition rather than a bug; `DetectionTimeout` and
/// `Cancelled` are recoverable by the caller (retry with coarser settings,
/// or simply abandoned).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("decoded audio is empty")]
    EmptyAudio,

    #[error("no pitched musical content detected")]
    NoPitchedContent,

    #[error("pitch detection exceeded the {budget_secs:.1}s budget")]
    DetectionTimeout { budget_secs: f32 },

    #[error("conversion cancelled")]
    Cancelled,

    #[error("resampling failed: {0}")]
    Resample(String),
}

impl From<symphonia::core::errors::Error> for PipelineError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        PipelineError::UnsupportedFormat(err.to_string())
    }
}
