//! Heuristic facial regions and their visualization.
//!
//! Eye, nose and mouth rectangles are fixed fractions of the face image, not
//! detected landmarks. Contour points come from the edge map and only serve as
//! decoration.

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use log::debug;
use serde::Serialize;

use crate::codec::{encode_png, EncodedImage};
use crate::config::FeatureParams;
use crate::crop::FaceImage;
use crate::error::BabyVisionError;
use crate::vision::{contour_area, VisionBackend};

const EYE_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);
const MOUTH_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const NOSE_COLOR: Rgba<u8> = Rgba([0, 128, 0, 255]);
const CONTOUR_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);

const CONTOUR_POINT_RADIUS: i32 = 1;

/// Axis-aligned rectangle in face-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// `(x, y, width, height)` as fractions of a `width` × `height` image,
    /// each rounded down.
    fn fraction_of(width: u32, height: u32, fx: f64, fy: f64, fw: f64, fh: f64) -> Self {
        let scale = |len: u32, f: f64| (len as f64 * f).floor() as u32;
        Self {
            x: scale(width, fx),
            y: scale(height, fy),
            width: scale(width, fw),
            height: scale(height, fh),
        }
    }
}

/// Eye, nose and mouth regions plus the merged contour points of a face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacialFeatures {
    /// Points of every retained contour, concatenated in contour order.
    pub contour: Vec<[i32; 2]>,
    /// Left eye, then right eye.
    pub eyes: [Region; 2],
    pub mouth: Region,
    pub nose: Region,
}

impl FacialFeatures {
    /// Fixed-proportion layout for a `width` × `height` face, with no contour.
    pub fn heuristic(width: u32, height: u32) -> Self {
        Self {
            contour: Vec::new(),
            eyes: [
                Region::fraction_of(width, height, 0.2, 0.2, 0.25, 0.2),
                Region::fraction_of(width, height, 0.55, 0.2, 0.25, 0.2),
            ],
            mouth: Region::fraction_of(width, height, 0.3, 0.6, 0.4, 0.25),
            nose: Region::fraction_of(width, height, 0.4, 0.4, 0.2, 0.2),
        }
    }
}

/// Output of [`extract_features`].
#[derive(Debug, Clone)]
pub struct FeatureExtraction {
    pub features: FacialFeatures,
    /// The face image with regions and contour points drawn on top.
    pub visualization: EncodedImage,
}

/// Grayscale, blur, edge and contour pass over `face`, followed by the
/// heuristic region layout and its visualization.
///
/// Either everything succeeds or an error is returned; there is no partial
/// result.
pub fn extract_features(
    backend: &dyn VisionBackend,
    face: &FaceImage,
    params: &FeatureParams,
) -> Result<FeatureExtraction, BabyVisionError> {
    let (width, height) = face.image.dimensions();
    if width == 0 || height == 0 {
        return Err(BabyVisionError::ZeroDimensions);
    }

    let gray = backend.grayscale(&DynamicImage::ImageRgba8(face.image.clone()))?;
    let blurred = backend.gaussian_blur(&gray, params.blur_sigma)?;
    let edges = backend.canny(&blurred, params.canny_low, params.canny_high)?;
    let contours = backend.find_external_contours(&edges)?;

    let mut features = FacialFeatures::heuristic(width, height);
    let mut kept = 0;
    for contour in &contours {
        if contour_area(contour) > params.min_contour_area {
            features
                .contour
                .extend(contour.iter().map(|p| [p.x, p.y]));
            kept += 1;
        }
    }
    debug!(
        "kept {kept} of {} contours ({} points) on a {width}x{height} face",
        contours.len(),
        features.contour.len()
    );

    let visualization = encode_png(&render(&face.image, &features))?;
    Ok(FeatureExtraction {
        features,
        visualization,
    })
}

/// Draw the regions and contour points onto a copy of `face`.
pub fn render(face: &RgbaImage, features: &FacialFeatures) -> RgbaImage {
    let mut canvas = face.clone();

    for eye in &features.eyes {
        stroke_region(&mut canvas, eye, EYE_COLOR);
    }
    stroke_region(&mut canvas, &features.mouth, MOUTH_COLOR);
    stroke_region(&mut canvas, &features.nose, NOSE_COLOR);

    for &[x, y] in &features.contour {
        draw_filled_circle_mut(&mut canvas, (x, y), CONTOUR_POINT_RADIUS, CONTOUR_COLOR);
    }
    canvas
}

/// Two pixel wide outline. Degenerate regions are skipped.
fn stroke_region(canvas: &mut RgbaImage, region: &Region, color: Rgba<u8>) {
    if region.width == 0 || region.height == 0 {
        return;
    }
    let (x, y) = (region.x as i32, region.y as i32);
    draw_hollow_rect_mut(
        canvas,
        Rect::at(x, y).of_size(region.width, region.height),
        color,
    );
    if region.width > 2 && region.height > 2 {
        draw_hollow_rect_mut(
            canvas,
            Rect::at(x + 1, y + 1).of_size(region.width - 2, region.height - 2),
            color,
        );
    }
}
