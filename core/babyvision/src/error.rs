use thiserror::Error;

#[derive(Debug, Error)]
pub enum BabyVisionError {
    #[error("failed to decode image: {0}")]
    DecodeError(String),

    #[error("failed to encode image: {0}")]
    EncodeError(String),

    #[error("image dimensions are zero")]
    ZeroDimensions,

    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("face detection model is not available")]
    ClassifierUnavailable,

    #[error("failed to load face detection model: {0}")]
    ClassifierLoad(String),

    #[error("failed to fetch {path}: {reason}")]
    AssetFetch { path: String, reason: String },

    #[error("vision backend error: {0}")]
    Vision(String),

    #[error("vision library is not ready")]
    BackendUnavailable,

    #[error("unknown parent {0:?}, expected \"mom\" or \"dad\"")]
    UnknownParent(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("both parents need extracted facial features before generating")]
    GenerationNotReady,

    #[error("a generation is already in progress")]
    GenerationInProgress,
}

impl From<image::ImageError> for BabyVisionError {
    fn from(value: image::ImageError) -> Self {
        match value {
            image::ImageError::Encoding(e) => BabyVisionError::EncodeError(e.to_string()),
            other => BabyVisionError::DecodeError(other.to_string()),
        }
    }
}
