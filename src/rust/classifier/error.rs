use ort::Error as OrtError;
use std::fmt;

/// Represents the different types of errors that can occur while loading or running the image classifier.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// The model capability failed to initialize
    ModelLoadFailed(String),
    /// Classification was requested while the model was not ready (carries the state it was in)
    ModelNotReady(String),
    /// The classify call itself failed, e.g. on a malformed image
    ClassificationFailed(String),
    /// The referenced image could not be read or downloaded
    ImageUnavailable(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelLoadFailed(msg) => write!(f, "Model load failed: {}", msg),
            Self::ModelNotReady(state) => write!(f, "Model not ready (state: {})", state),
            Self::ClassificationFailed(msg) => write!(f, "Classification failed: {}", msg),
            Self::ImageUnavailable(msg) => write!(f, "Image unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::ModelLoadFailed(err.to_string())
    }
}
