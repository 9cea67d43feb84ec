//! Error types for vocal-id-rs.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Candle tensor/model error.
    #[error("candle: {0}")]
    Candle(#[from] candle_core::Error),

    /// Audio processing error (WAV I/O, sample rate, channel layout).
    #[error("audio: {0}")]
    Audio(String),

    /// Model weight loading error.
    #[error("weight loading: {0}")]
    WeightLoad(String),

    /// Invalid configuration.
    #[error("config: {0}")]
    Config(String),

    /// Dataset manifest error.
    #[error("manifest: {0}")]
    Manifest(String),

    /// Annotation string not in the label vocabulary.
    #[error("unknown label '{label}' for example '{id}'")]
    UnknownLabel { id: String, label: String },

    /// Data pipeline wiring or field error.
    #[error("pipeline: {0}")]
    Pipeline(String),

    /// Temporal pooling domain error.
    #[error("pooling: {0}")]
    Pool(String),

    /// Tensor shape mismatch between streams.
    #[error("shape: {0}")]
    Shape(String),

    /// Precomputed feature store error.
    #[error("features: {0}")]
    Features(String),

    /// I/O error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
}

impl From<hound::Error> for Error {
    fn from(error: hound::Error) -> Self {
        Error::Audio(error.to_string())
    }
}
