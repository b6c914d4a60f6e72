use thiserror::Error;

/// Error taxonomy for the classification pipeline.
///
/// `Inference` failures from individual variant/model calls are swallowed by
/// the pipeline (logged, excluded from aggregation); everything else is
/// reported to the caller and never retried automatically.
#[derive(Debug, Error)]
pub enum Error {
    #[error("model not available: {0}")]
    ModelUnavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A newer classification request was started while this one was still
    /// in flight; the stale result is discarded instead of racing the new one.
    #[error("classification request superseded by a newer one")]
    Superseded,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Ort(#[from] ort::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
