use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, RgbaImage};

use crate::error::BabyVisionError;

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// An image held in its encoded form, ready to be shown as a data URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Encoded bytes.
    pub data: Vec<u8>,
    /// MIME type of `data`, e.g. `image/png`.
    pub mime: String,
    /// Width of the decoded image in pixels.
    pub width: u32,
    /// Height of the decoded image in pixels.
    pub height: u32,
}

impl EncodedImage {
    /// Render as a `data:<mime>;base64,...` URL.
    pub fn to_data_url(&self) -> String {
        format!(
            "{DATA_URL_PREFIX}{}{BASE64_MARKER}{}",
            self.mime,
            BASE64.encode(&self.data)
        )
    }
}

/// A user upload: the decoded raster plus the bytes it came from.
#[derive(Debug, Clone)]
pub struct Upload {
    pub image: DynamicImage,
    pub encoded: EncodedImage,
}

/// Split a base64 data URL into its MIME type and payload bytes.
pub fn parse_data_url(url: &str) -> Result<(String, Vec<u8>), BabyVisionError> {
    let rest = url
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or_else(|| BabyVisionError::InvalidDataUrl("missing data: prefix".to_string()))?;
    let (mime, payload) = rest
        .split_once(BASE64_MARKER)
        .ok_or_else(|| BabyVisionError::InvalidDataUrl("payload is not base64".to_string()))?;
    let data = BASE64
        .decode(payload.trim())
        .map_err(|e| BabyVisionError::InvalidDataUrl(e.to_string()))?;
    Ok((mime.to_string(), data))
}

/// Decode an upload given either as raw image bytes (JPEG, PNG, WebP) or as
/// a base64 data URL.
pub fn decode_upload(input: &[u8]) -> Result<Upload, BabyVisionError> {
    let data = if input.starts_with(DATA_URL_PREFIX.as_bytes()) {
        let url = std::str::from_utf8(input)
            .map_err(|e| BabyVisionError::InvalidDataUrl(e.to_string()))?;
        parse_data_url(url)?.1
    } else {
        input.to_vec()
    };

    let format =
        image::guess_format(&data).map_err(|e| BabyVisionError::DecodeError(e.to_string()))?;
    let image = image::load_from_memory_with_format(&data, format)
        .map_err(|e| BabyVisionError::DecodeError(e.to_string()))?;

    if image.width() == 0 || image.height() == 0 {
        return Err(BabyVisionError::ZeroDimensions);
    }

    let encoded = EncodedImage {
        mime: format.to_mime_type().to_string(),
        width: image.width(),
        height: image.height(),
        data,
    };
    Ok(Upload { image, encoded })
}

/// Encode an RGBA raster as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<EncodedImage, BabyVisionError> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| BabyVisionError::EncodeError(e.to_string()))?;

    Ok(EncodedImage {
        data: buffer,
        mime: "image/png".to_string(),
        width: image.width(),
        height: image.height(),
    })
}
