use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The diff produced an empty delta. User-visible no-op, not a failure;
    /// callers must not invoke the structuring capability in this case.
    #[error("No new content to format")]
    NoChanges,

    /// Structuring response failed schema expectations. Fatal to the cycle;
    /// the persisted task collection is left unmodified.
    #[error("Invalid structuring response: {0}")]
    Validation(String),

    /// The structuring call itself failed (network, process, timeout).
    #[error("Structuring capability failed: {0}")]
    Capability(String),

    /// The result arrived for a project that is no longer the active
    /// target; it was discarded rather than applied.
    #[error("Project is no longer active; result discarded")]
    StaleSession,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
