use crate::asset::ClassifierBytes;
use crate::config::DetectorTuning;
use crate::error::BabyVisionError;
use crate::face_detector::{FaceBounds, FaceDetector};

/// Face detector backed by the `rustface` crate (SeetaFace engine).
///
/// The model is parsed and checked once, when the classifier is attached;
/// each `detect` call builds a detector from a clone of it.
pub struct RustfaceDetector {
    model: rustface::Model,
    tuning: DetectorTuning,
}

impl RustfaceDetector {
    /// Parse a SeetaFace model from the fetched classifier bytes.
    pub fn from_classifier(
        classifier: &ClassifierBytes,
        tuning: &DetectorTuning,
    ) -> Result<Self, BabyVisionError> {
        tuning.validate()?;
        if classifier.is_empty() {
            return Err(BabyVisionError::ClassifierLoad(
                "classifier file is empty".to_string(),
            ));
        }
        let model = guarded(|| rustface::read_model(std::io::Cursor::new(classifier.as_bytes())))
            .map_err(BabyVisionError::ClassifierLoad)?
            .map_err(|e| BabyVisionError::ClassifierLoad(e.to_string()))?;
        check_model(&model)?;
        Ok(Self {
            model,
            tuning: tuning.clone(),
        })
    }
}

/// The detector indexes the first hierarchy and the first classifier
/// unconditionally.
fn check_model(model: &rustface::Model) -> Result<(), BabyVisionError> {
    if model.get_hierarchy_count() == 0 || model.get_hierarchy_size(0) <= 0 {
        return Err(BabyVisionError::ClassifierLoad(
            "model has no detection hierarchy".to_string(),
        ));
    }
    if model.get_classifiers().is_empty() {
        return Err(BabyVisionError::ClassifierLoad(
            "model has no classifiers".to_string(),
        ));
    }
    Ok(())
}

/// Run `f`, turning a panic inside rustface into an error message.
#[cfg(panic = "unwind")]
fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "rustface panicked".to_string())
    })
}

#[cfg(not(panic = "unwind"))]
fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    Ok(f())
}

impl FaceDetector for RustfaceDetector {
    fn detect(
        &self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceBounds>, BabyVisionError> {
        if gray.len() != (width as usize) * (height as usize) {
            return Err(BabyVisionError::Vision(format!(
                "grayscale buffer holds {} bytes, expected {}x{}",
                gray.len(),
                width,
                height
            )));
        }

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.tuning.min_face_size);
        detector.set_score_thresh(self.tuning.score_threshold);
        detector.set_pyramid_scale_factor(self.tuning.pyramid_scale_factor);
        detector.set_slide_window_step(self.tuning.slide_window_step, self.tuning.slide_window_step);

        let faces = guarded(|| detector.detect(&rustface::ImageData::new(gray, width, height)))
            .map_err(BabyVisionError::Vision)?;

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBounds {
                    x: bbox.x() as f64,
                    y: bbox.y() as f64,
                    width: bbox.width() as f64,
                    height: bbox.height() as f64,
                    confidence: face.score(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_classifier_is_load_error() {
        let result = RustfaceDetector::from_classifier(
            &ClassifierBytes::from(Vec::new()),
            &DetectorTuning::default(),
        );
        assert!(matches!(result, Err(BabyVisionError::ClassifierLoad(_))));
    }

    fn model_bytes(words: &[i32]) -> ClassifierBytes {
        ClassifierBytes::from(
            words
                .iter()
                .flat_map(|w| w.to_le_bytes())
                .collect::<Vec<u8>>(),
        )
    }

    #[test]
    fn unknown_classifier_kind_is_load_error() {
        let result =
            RustfaceDetector::from_classifier(&model_bytes(&[1, 1, 1, 99]), &DetectorTuning::default());
        match result {
            Err(BabyVisionError::ClassifierLoad(reason)) => assert!(reason.contains("99"), "{reason}"),
            Err(other) => panic!("expected ClassifierLoad, got {other:?}"),
            Ok(_) => panic!("model with classifier kind 99 was accepted"),
        }
    }

    #[test]
    fn model_without_hierarchy_is_load_error() {
        let result =
            RustfaceDetector::from_classifier(&model_bytes(&[0, 0, 0, 0]), &DetectorTuning::default());
        assert!(matches!(result, Err(BabyVisionError::ClassifierLoad(_))));
    }

    #[test]
    fn model_without_classifiers_is_load_error() {
        // one hierarchy of one cascade with zero stages and no window sources
        let result =
            RustfaceDetector::from_classifier(&model_bytes(&[1, 1, 0, 0]), &DetectorTuning::default());
        assert!(matches!(result, Err(BabyVisionError::ClassifierLoad(_))));
    }

    #[test]
    fn invalid_tuning_is_rejected_before_parsing() {
        let tuning = DetectorTuning {
            min_face_size: 10,
            ..DetectorTuning::default()
        };
        let result = RustfaceDetector::from_classifier(&model_bytes(&[0]), &tuning);
        assert!(matches!(result, Err(BabyVisionError::InvalidConfig(_))));
    }

    #[test]
    fn truncated_classifier_is_load_error() {
        let result = RustfaceDetector::from_classifier(
            &ClassifierBytes::from(vec![0u8, 0]),
            &DetectorTuning::default(),
        );
        assert!(matches!(result, Err(BabyVisionError::ClassifierLoad(_))));
    }
}
