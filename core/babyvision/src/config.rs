use serde::{Deserialize, Serialize};

use crate::error::BabyVisionError;

/// Default location of the face detection model, relative to the asset root.
pub const DEFAULT_CLASSIFIER_PATH: &str = "models/seeta_fd_frontal_v1.0.bin";

/// Default artificial delay of the simulated generation, in milliseconds.
pub const DEFAULT_GENERATION_DELAY_MS: u64 = 1500;

/// Page-wide settings.
///
/// Every field has a default, so an empty JSON object (or no configuration at
/// all) yields the stock demo behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageConfig {
    /// Path of the classifier asset, fetched once per session.
    pub classifier_path: String,

    /// Fixed delay before the simulated generation completes.
    pub generation_delay_ms: u64,

    /// When set, detection errors are shown in the error banner in addition
    /// to being logged. The upload still falls back to the center crop.
    pub surface_detection_errors: bool,

    /// Face detector tuning.
    pub detector: DetectorTuning,

    /// Feature extraction parameters.
    pub features: FeatureParams,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            classifier_path: DEFAULT_CLASSIFIER_PATH.to_string(),
            generation_delay_ms: DEFAULT_GENERATION_DELAY_MS,
            surface_detection_errors: false,
            detector: DetectorTuning::default(),
            features: FeatureParams::default(),
        }
    }
}

impl PageConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, BabyVisionError> {
        let config: PageConfig = serde_json::from_str(json)
            .map_err(|e| BabyVisionError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), BabyVisionError> {
        if self.classifier_path.trim().is_empty() {
            return Err(BabyVisionError::InvalidConfig(
                "classifierPath must not be empty".to_string(),
            ));
        }
        self.detector.validate()?;
        self.features.validate()
    }
}

/// Multi-scale detection parameters handed to the face detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectorTuning {
    /// Smallest face edge, in pixels, the detector searches for.
    pub min_face_size: u32,
    /// Minimum classifier score for a window to count as a face.
    pub score_threshold: f64,
    /// Ratio between consecutive pyramid levels, in (0, 1).
    pub pyramid_scale_factor: f32,
    /// Sliding window step in pixels (both axes).
    pub slide_window_step: u32,
}

impl Default for DetectorTuning {
    fn default() -> Self {
        Self {
            min_face_size: 20,
            score_threshold: 2.0,
            pyramid_scale_factor: 0.8,
            slide_window_step: 4,
        }
    }
}

/// Smallest face size the SeetaFace detector accepts.
const MIN_DETECTABLE_FACE_SIZE: u32 = 20;

impl DetectorTuning {
    /// Reject settings the detector itself refuses.
    pub(crate) fn validate(&self) -> Result<(), BabyVisionError> {
        if self.min_face_size < MIN_DETECTABLE_FACE_SIZE {
            return Err(BabyVisionError::InvalidConfig(format!(
                "detector.minFaceSize must be at least {MIN_DETECTABLE_FACE_SIZE}, got {}",
                self.min_face_size
            )));
        }
        if self.score_threshold.is_nan() || self.score_threshold <= 0.0 {
            return Err(BabyVisionError::InvalidConfig(format!(
                "detector.scoreThreshold must be > 0, got {}",
                self.score_threshold
            )));
        }
        if !(0.01..=0.99).contains(&self.pyramid_scale_factor) {
            return Err(BabyVisionError::InvalidConfig(format!(
                "detector.pyramidScaleFactor must be in [0.01, 0.99], got {}",
                self.pyramid_scale_factor
            )));
        }
        if self.slide_window_step == 0 {
            return Err(BabyVisionError::InvalidConfig(
                "detector.slideWindowStep must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters of the edge and contour pass in feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureParams {
    /// Sigma of the Gaussian blur. 0.8 is the sigma of a 3x3 kernel.
    pub blur_sigma: f32,
    /// Lower hysteresis threshold of the edge detector.
    pub canny_low: f32,
    /// Upper hysteresis threshold of the edge detector.
    pub canny_high: f32,
    /// Contours with an area at or below this value are dropped as noise.
    pub min_contour_area: f64,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            blur_sigma: 0.8,
            canny_low: 50.0,
            canny_high: 150.0,
            min_contour_area: 100.0,
        }
    }
}

impl FeatureParams {
    fn validate(&self) -> Result<(), BabyVisionError> {
        if self.blur_sigma < 0.0 {
            return Err(BabyVisionError::InvalidConfig(format!(
                "features.blurSigma must be >= 0, got {}",
                self.blur_sigma
            )));
        }
        if self.canny_low > self.canny_high {
            return Err(BabyVisionError::InvalidConfig(format!(
                "features.cannyLow ({}) must not exceed features.cannyHigh ({})",
                self.canny_low, self.canny_high
            )));
        }
        Ok(())
    }
}
