use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Zero-size or corrupt frame/raster. Aborts the current attempt only.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A still image could not be loaded or decoded.
    #[error("image decode error: {0}")]
    ImageDecode(String),

    /// The recognition engine failed to load. Fatal, never retried per frame.
    #[error("OCR engine initialization failed: {0}")]
    EngineInit(String),

    #[error("camera access denied")]
    CameraAccessDenied,

    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    /// Transport failure talking to a remote OCR service. Retried like a
    /// frame that produced no detection.
    #[error("remote OCR request failed: {0}")]
    Remote(String),

    #[error("scan cancelled")]
    Cancelled,

    #[error("no valid MRZ after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl ScanError {
    /// Errors that only spoil one frame. The scan loop swallows these and
    /// moves on to the next attempt; everything else terminates the session.
    pub fn is_attempt_local(&self) -> bool {
        matches!(self, ScanError::InvalidInput(_) | ScanError::Remote(_))
    }
}
