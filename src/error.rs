use thiserror::Error;

/// Failures that abort a single recognition call.
///
/// "Nothing recognised" is never an error: it is
/// [`Recognition::NoResult`](crate::recognizer::Recognition::NoResult).
/// Everything here is either bad caller input or an integration defect
/// (model artifacts that do not fit together).
#[derive(Debug, Error)]
pub enum RecognizeError {
    /// Model output does not fit its label table, or a frame grid is degenerate.
    #[error("invalid model output: {0}")]
    InvalidModelOutput(String),

    /// The caller handed in something we cannot rasterize.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backend failed while running a loaded model.
    #[error("inference failed in {backend}: {message}")]
    Inference { backend: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("reference drawings: {0}")]
    References(String),
}

pub type Result<T, E = RecognizeError> = std::result::Result<T, E>;
