use image::{DynamicImage, RgbaImage};
use serde::Serialize;

use crate::codec::{encode_png, EncodedImage};
use crate::error::BabyVisionError;
use crate::face_detector::FaceBounds;

/// Crop region within the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// How a face image was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FaceSource {
    /// Cropped to the first rectangle reported by the detector.
    Detected,
    /// Centered square substitute used when no face was found.
    Fallback,
}

/// A face sub-image cut out of an upload.
#[derive(Debug, Clone)]
pub struct FaceImage {
    /// The cropped raster.
    pub image: RgbaImage,
    /// The same raster, PNG encoded.
    pub encoded: EncodedImage,
    /// Where the crop sits in the uploaded image.
    pub region: CropRegion,
    pub source: FaceSource,
}

impl FaceImage {
    pub(crate) fn cut(
        source_image: &DynamicImage,
        region: CropRegion,
        source: FaceSource,
    ) -> Result<Self, BabyVisionError> {
        let image = source_image
            .crop_imm(region.x, region.y, region.width, region.height)
            .to_rgba8();
        let encoded = encode_png(&image)?;
        Ok(Self {
            image,
            encoded,
            region,
            source,
        })
    }
}

/// Largest square centered in a `source_width` × `source_height` image.
///
/// The side is `min(width, height)`; offsets are the halved slack, rounded
/// down.
pub fn center_square(source_width: u32, source_height: u32) -> CropRegion {
    let side = source_width.min(source_height);
    CropRegion {
        x: (source_width - side) / 2,
        y: (source_height - side) / 2,
        width: side,
        height: side,
    }
}

/// Center-crop fallback: the largest centered square of `image`.
pub fn center_crop(image: &DynamicImage) -> Result<FaceImage, BabyVisionError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(BabyVisionError::ZeroDimensions);
    }
    let region = center_square(image.width(), image.height());
    FaceImage::cut(image, region, FaceSource::Fallback)
}

/// Intersect a detector rectangle with the image bounds.
///
/// Returns `None` when nothing of the rectangle lies inside the image.
pub fn clamp_bounds(bounds: &FaceBounds, image_width: u32, image_height: u32) -> Option<CropRegion> {
    let x0 = bounds.x.max(0.0).floor();
    let y0 = bounds.y.max(0.0).floor();
    let x1 = (bounds.x + bounds.width).min(image_width as f64).floor();
    let y1 = (bounds.y + bounds.height).min(image_height as f64).floor();

    if !(x1 > x0 && y1 > y0) {
        return None;
    }

    Some(CropRegion {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(x: f64, y: f64, width: f64, height: f64) -> FaceBounds {
        FaceBounds {
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }

    #[test]
    fn landscape_source_centers_horizontally() {
        let crop = center_square(300, 200);
        assert_eq!(crop.width, 200);
        assert_eq!(crop.height, 200);
        assert_eq!(crop.x, 50);
        assert_eq!(crop.y, 0);
    }

    #[test]
    fn portrait_source_centers_vertically() {
        let crop = center_square(120, 400);
        assert_eq!(crop.width, 120);
        assert_eq!(crop.height, 120);
        assert_eq!(crop.x, 0);
        assert_eq!(crop.y, 140); // (400 - 120) / 2
    }

    #[test]
    fn square_source_is_unchanged() {
        let crop = center_square(64, 64);
        assert_eq!(
            crop,
            CropRegion {
                x: 0,
                y: 0,
                width: 64,
                height: 64
            }
        );
    }

    #[test]
    fn odd_slack_rounds_down() {
        // 101 px of slack: offset 50, not 51
        let crop = center_square(201, 100);
        assert_eq!(crop.x, 50);
        assert_eq!(crop.width, 100);
    }

    #[test]
    fn center_crop_produces_square_png() {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(90, 40));
        let face = center_crop(&image).unwrap();
        assert_eq!(face.source, FaceSource::Fallback);
        assert_eq!((face.image.width(), face.image.height()), (40, 40));
        assert_eq!(face.region.x, 25);
        assert_eq!((face.encoded.width, face.encoded.height), (40, 40));
    }

    #[test]
    fn clamp_keeps_inner_rectangle() {
        let region = clamp_bounds(&bounds(10.0, 20.0, 30.0, 40.0), 100, 100).unwrap();
        assert_eq!(
            region,
            CropRegion {
                x: 10,
                y: 20,
                width: 30,
                height: 40
            }
        );
    }

    #[test]
    fn clamp_trims_overhanging_rectangle() {
        let region = clamp_bounds(&bounds(-5.0, 80.0, 20.0, 40.0), 100, 100).unwrap();
        assert_eq!(region.x, 0);
        assert_eq!(region.width, 15);
        assert_eq!(region.y, 80);
        assert_eq!(region.height, 20);
    }

    #[test]
    fn clamp_rejects_rectangle_outside_image() {
        assert!(clamp_bounds(&bounds(150.0, 10.0, 20.0, 20.0), 100, 100).is_none());
        assert!(clamp_bounds(&bounds(10.0, 10.0, 0.0, 20.0), 100, 100).is_none());
    }
}
