/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    /// Unknown engine kind, threshold method or language code
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Backend runtime, sidecar or binary is missing
    #[error("OCR engine not available: {0}")]
    EngineUnavailable(String),

    #[error("OCR processing failed: {0}")]
    Recognition(String),

    #[error("Preprocessing failed: {0}")]
    Preprocessing(String),

    /// Rejected before recognition: file type or size
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    /// Configuration and construction failures abort a call chain; everything
    /// else is recoverable at some layer.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::EngineUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, OcrError>;
