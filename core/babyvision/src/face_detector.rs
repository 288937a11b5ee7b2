use crate::error::BabyVisionError;

/// Bounding box of a detected face within an image.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBounds {
    /// X coordinate of the top-left corner (pixels). May be negative.
    pub x: f64,
    /// Y coordinate of the top-left corner (pixels). May be negative.
    pub y: f64,
    /// Width of the bounding box (pixels).
    pub width: f64,
    /// Height of the bounding box (pixels).
    pub height: f64,
    /// Detection confidence score.
    pub confidence: f64,
}

/// Pluggable face detection engine.
///
/// Detectors are produced by [`crate::VisionBackend::load_classifier`] from
/// the session's classifier bytes. Results are reported in the detector's own
/// order; callers take the first one and never re-rank.
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a row-major grayscale buffer of `width` × `height` bytes.
    fn detect(&self, gray: &[u8], width: u32, height: u32)
        -> Result<Vec<FaceBounds>, BabyVisionError>;
}
