use image::DynamicImage;
use log::debug;

use crate::crop::{clamp_bounds, FaceImage, FaceSource};
use crate::error::BabyVisionError;
use crate::face_detector::FaceDetector;
use crate::vision::VisionBackend;

/// Result of one face location attempt.
#[derive(Debug)]
pub enum DetectionOutcome {
    /// The detector reported at least one face; this is the first one.
    FaceFound(FaceImage),
    /// Detection ran and found nothing.
    NoFaceFound,
    /// Detection could not run or failed part way.
    DetectionError(BabyVisionError),
}

/// Locate a face in `image`.
///
/// Without a detector nothing runs and the outcome is
/// `DetectionError(ClassifierUnavailable)`. When the detector reports several
/// faces the first one wins, in the detector's own order.
pub fn locate_face(
    backend: &dyn VisionBackend,
    detector: Option<&dyn FaceDetector>,
    image: &DynamicImage,
) -> DetectionOutcome {
    let Some(detector) = detector else {
        return DetectionOutcome::DetectionError(BabyVisionError::ClassifierUnavailable);
    };

    match detect_first(backend, detector, image) {
        Ok(Some(face)) => DetectionOutcome::FaceFound(face),
        Ok(None) => DetectionOutcome::NoFaceFound,
        Err(e) => DetectionOutcome::DetectionError(e),
    }
}

fn detect_first(
    backend: &dyn VisionBackend,
    detector: &dyn FaceDetector,
    image: &DynamicImage,
) -> Result<Option<FaceImage>, BabyVisionError> {
    let gray = backend.grayscale(image)?;
    let faces = detector.detect(gray.as_raw(), gray.width(), gray.height())?;

    let Some(first) = faces.first() else {
        return Ok(None);
    };
    debug!(
        "{} reported {} face(s), using ({:.0}, {:.0}, {:.0}x{:.0})",
        backend.name(),
        faces.len(),
        first.x,
        first.y,
        first.width,
        first.height
    );

    let region = clamp_bounds(first, image.width(), image.height()).ok_or_else(|| {
        BabyVisionError::Vision(format!(
            "detected face at ({}, {}) lies outside the {}x{} image",
            first.x,
            first.y,
            image.width(),
            image.height()
        ))
    })?;

    FaceImage::cut(image, region, FaceSource::Detected).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_detector::FaceBounds;
    use crate::vision::ImageprocBackend;
    use image::RgbaImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDetector {
        faces: Result<Vec<FaceBounds>, String>,
        calls: AtomicUsize,
    }

    impl FixedDetector {
        fn new(faces: Result<Vec<FaceBounds>, String>) -> Self {
            Self {
                faces,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl FaceDetector for FixedDetector {
        fn detect(&self, gray: &[u8], width: u32, height: u32) -> Result<Vec<FaceBounds>, BabyVisionError> {
            assert_eq!(gray.len(), (width * height) as usize);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.faces.clone().map_err(BabyVisionError::Vision)
        }
    }

    fn face(x: f64, y: f64, size: f64, confidence: f64) -> FaceBounds {
        FaceBounds {
            x,
            y,
            width: size,
            height: size,
            confidence,
        }
    }

    fn canvas() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::new(120, 80))
    }

    #[test]
    fn first_face_wins_over_higher_score() {
        let detector = FixedDetector::new(Ok(vec![face(10.0, 10.0, 30.0, 1.0), face(60.0, 20.0, 40.0, 9.0)]));
        let outcome = locate_face(&ImageprocBackend, Some(&detector), &canvas());
        match outcome {
            DetectionOutcome::FaceFound(found) => {
                assert_eq!(found.source, FaceSource::Detected);
                assert_eq!((found.region.x, found.region.y), (10, 10));
                assert_eq!((found.image.width(), found.image.height()), (30, 30));
            }
            other => panic!("expected a face, got {other:?}"),
        }
    }

    #[test]
    fn empty_detection_is_no_face() {
        let detector = FixedDetector::new(Ok(Vec::new()));
        let outcome = locate_face(&ImageprocBackend, Some(&detector), &canvas());
        assert!(matches!(outcome, DetectionOutcome::NoFaceFound));
    }

    #[test]
    fn detector_failure_is_detection_error() {
        let detector = FixedDetector::new(Err("boom".to_string()));
        let outcome = locate_face(&ImageprocBackend, Some(&detector), &canvas());
        assert!(matches!(
            outcome,
            DetectionOutcome::DetectionError(BabyVisionError::Vision(_))
        ));
    }

    #[test]
    fn missing_detector_is_classifier_unavailable() {
        let outcome = locate_face(&ImageprocBackend, None, &canvas());
        assert!(matches!(
            outcome,
            DetectionOutcome::DetectionError(BabyVisionError::ClassifierUnavailable)
        ));
    }

    #[test]
    fn detector_runs_once_per_attempt() {
        let detector = FixedDetector::new(Ok(Vec::new()));
        locate_face(&ImageprocBackend, Some(&detector), &canvas());
        locate_face(&ImageprocBackend, Some(&detector), &canvas());
        assert_eq!(detector.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn face_outside_image_is_detection_error() {
        let detector = FixedDetector::new(Ok(vec![face(500.0, 500.0, 10.0, 1.0)]));
        let outcome = locate_face(&ImageprocBackend, Some(&detector), &canvas());
        assert!(matches!(outcome, DetectionOutcome::DetectionError(_)));
    }
}
