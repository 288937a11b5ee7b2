//! The computer-vision capability used by face location and feature
//! extraction.
//!
//! Callers receive a [`VisionBackend`] explicitly (usually from the
//! [`crate::LibraryLoader`]) rather than reaching for global state, so tests
//! can hand in a scripted implementation.

use image::{DynamicImage, GrayImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

use crate::asset::ClassifierBytes;
use crate::config::DetectorTuning;
use crate::error::BabyVisionError;
use crate::face_detector::FaceDetector;

/// Image operations and face classifier loading.
///
/// All intermediate rasters are owned values, so whatever a call allocated is
/// released when it returns, on success and on error alike.
pub trait VisionBackend: Send + Sync {
    /// Human-readable backend name, for logs.
    fn name(&self) -> &str;

    /// Build a face detector from the session's classifier bytes.
    fn load_classifier(
        &self,
        classifier: &ClassifierBytes,
        tuning: &DetectorTuning,
    ) -> Result<Box<dyn FaceDetector>, BabyVisionError>;

    /// Luma conversion. Alpha is ignored.
    fn grayscale(&self, image: &DynamicImage) -> Result<GrayImage, BabyVisionError> {
        Ok(image.to_luma8())
    }

    fn gaussian_blur(&self, gray: &GrayImage, sigma: f32) -> Result<GrayImage, BabyVisionError>;

    fn canny(&self, gray: &GrayImage, low: f32, high: f32) -> Result<GrayImage, BabyVisionError>;

    /// Outermost contours of the non-zero regions of `edges`. Straight runs
    /// are reduced to their end points.
    fn find_external_contours(
        &self,
        edges: &GrayImage,
    ) -> Result<Vec<Vec<Point<i32>>>, BabyVisionError>;
}

/// Built-in backend on `imageproc`, with `rustface` for detection.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageprocBackend;

impl VisionBackend for ImageprocBackend {
    fn name(&self) -> &str {
        "imageproc"
    }

    #[cfg(feature = "rustface")]
    fn load_classifier(
        &self,
        classifier: &ClassifierBytes,
        tuning: &DetectorTuning,
    ) -> Result<Box<dyn FaceDetector>, BabyVisionError> {
        let detector = crate::rustface_backend::RustfaceDetector::from_classifier(classifier, tuning)?;
        Ok(Box::new(detector))
    }

    #[cfg(not(feature = "rustface"))]
    fn load_classifier(
        &self,
        _classifier: &ClassifierBytes,
        _tuning: &DetectorTuning,
    ) -> Result<Box<dyn FaceDetector>, BabyVisionError> {
        Err(BabyVisionError::ClassifierLoad(
            "built without the rustface feature".to_string(),
        ))
    }

    fn gaussian_blur(&self, gray: &GrayImage, sigma: f32) -> Result<GrayImage, BabyVisionError> {
        // gaussian_blur_f32 panics on a non-positive sigma
        if sigma <= 0.0 {
            return Ok(gray.clone());
        }
        Ok(imageproc::filter::gaussian_blur_f32(gray, sigma))
    }

    fn canny(&self, gray: &GrayImage, low: f32, high: f32) -> Result<GrayImage, BabyVisionError> {
        if low > high {
            return Err(BabyVisionError::Vision(format!(
                "canny thresholds out of order: {low} > {high}"
            )));
        }
        Ok(imageproc::edges::canny(gray, low, high))
    }

    fn find_external_contours(
        &self,
        edges: &GrayImage,
    ) -> Result<Vec<Vec<Point<i32>>>, BabyVisionError> {
        Ok(find_contours::<i32>(edges)
            .into_iter()
            .filter(|c| c.parent.is_none() && c.border_type == BorderType::Outer)
            .map(|c| compress_straight_runs(&c.points))
            .collect())
    }
}

/// Drop every point of a closed contour that continues the previous step's
/// direction, keeping only the corners.
pub fn compress_straight_runs(points: &[Point<i32>]) -> Vec<Point<i32>> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let n = points.len();
    let step = |a: Point<i32>, b: Point<i32>| ((b.x - a.x).signum(), (b.y - a.y).signum());

    let corners: Vec<Point<i32>> = points
        .iter()
        .enumerate()
        .filter(|&(i, &p)| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, p) != step(p, next)
        })
        .map(|(_, &p)| p)
        .collect();

    if corners.is_empty() {
        vec![points[0]]
    } else {
        corners
    }
}

/// Area enclosed by a closed polygon (shoelace formula), always non-negative.
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    (twice as f64 / 2.0).abs()
}
