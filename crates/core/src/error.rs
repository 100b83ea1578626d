#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A builder rejected its parameter set. The message is user-facing.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No builder is registered for the requested job kind.
    #[error("Unknown job kind: {0}")]
    UnknownJobKind(String),

    /// The output directory does not resolve to a path inside the project.
    #[error("Output directory {path} is not inside project root {root}")]
    OutputOutsideProject { path: String, root: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
