//! PNG / data-URI conversion between [`Image`] tensors and the strings the
//! editor exchanges with us.
//!
//! Encoding quantizes the first image of the batch to 8 bits. Decoding accepts
//! anything the `image` crate can read and always yields a `(1, H, W, 3)`
//! tensor: grey expands to three channels and alpha is dropped.

use std::io::Cursor;

use base64::Engine as _;
use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};
use ndarray::{Array4, s};

use crate::error::{Error, Result};
use crate::Image;

pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Channel layout of a decoded raster before normalization to RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Grey,
    GreyAlpha,
    Rgb,
    Rgba,
}

impl ChannelLayout {
    fn from_channel_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(Self::Grey),
            2 => Some(Self::GreyAlpha),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    fn color_type(self) -> ExtendedColorType {
        match self {
            Self::Grey => ExtendedColorType::L8,
            Self::GreyAlpha => ExtendedColorType::La8,
            Self::Rgb => ExtendedColorType::Rgb8,
            Self::Rgba => ExtendedColorType::Rgba8,
        }
    }
}

/// Encodes the first image of the batch as PNG bytes.
///
/// # Errors
///
/// Returns an error for an empty batch, an unsupported channel count, or a
/// failure inside the PNG encoder.
pub fn encode_png(image: &Image) -> Result<Vec<u8>> {
    let (batch, height, width, channels) = image.dim();
    if batch == 0 {
        return Err(Error::ShapeMismatch {
            expected: "at least one image in the batch".to_string(),
            actual: "empty batch".to_string(),
        });
    }
    let layout = ChannelLayout::from_channel_count(channels).ok_or_else(|| Error::ShapeMismatch {
        expected: "1, 2, 3 or 4 channels".to_string(),
        actual: format!("{channels} channels"),
    })?;
    let (w, h) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(Error::ShapeMismatch {
                expected: "dimensions that fit in u32".to_string(),
                actual: format!("{width}x{height}"),
            });
        }
    };

    let raw: Vec<u8> = image.slice(s![0, .., .., ..]).iter().map(|&v| quantize(v)).collect();

    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer).write_image(&raw, w, h, layout.color_type())?;
    Ok(buffer)
}

/// Encodes the first image of the batch as a `data:image/png;base64,` URI.
///
/// # Errors
///
/// See [`encode_png`].
pub fn encode_data_uri(image: &Image) -> Result<String> {
    let png = encode_png(image)?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(png);
    Ok(format!("{PNG_DATA_URI_PREFIX}{b64}"))
}

/// Decodes a data URI (or bare base64) into a `(1, H, W, 3)` tensor.
///
/// # Errors
///
/// Returns an error if the string is not base64 or the bytes are not an image.
pub fn decode_payload(payload: &str) -> Result<Image> {
    let b64 = match payload.strip_prefix("data:") {
        Some(uri) => {
            uri.split_once(',')
                .ok_or_else(|| Error::Decode {
                    reason: "data URI has no ',' separator".to_string(),
                })?
                .1
        }
        None => payload,
    };

    let bytes = base64::engine::general_purpose::STANDARD.decode(b64.trim())?;
    decode_bytes(&bytes)
}

/// Decodes raw encoded image bytes into a `(1, H, W, 3)` tensor.
///
/// # Errors
///
/// Returns an error if the bytes are not a recognised raster format.
pub fn decode_bytes(bytes: &[u8]) -> Result<Image> {
    let decoded = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::Decode {
            reason: e.to_string(),
        })?
        .decode()?;

    let channels = usize::from(decoded.color().channel_count());
    let layout = ChannelLayout::from_channel_count(channels).ok_or_else(|| Error::Decode {
        reason: format!("unsupported channel count {channels}"),
    })?;
    if layout != ChannelLayout::Rgb {
        tracing::debug!("normalizing decoded {layout:?} raster to rgb");
    }

    // Grey expands to three channels, alpha is dropped.
    let rgb = decoded.to_rgb32f();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);

    Array4::from_shape_vec((1, height, width, 3), rgb.into_raw()).map_err(|e| Error::Decode {
        reason: e.to_string(),
    })
}

/// Maps a [0, 1] sample to 8 bits, truncating like a plain `as u8` cast.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantize(value: f32) -> u8 {
    (value * 255.0).clamp(0.0, 255.0) as u8
}
