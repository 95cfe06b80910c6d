use std::io::Cursor;

use base64::Engine;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Represents a base64-encoded inline image.
///
/// The media_type must be one of the supported image formats: "image/jpeg", "image/png",
/// "image/gif", or "image/webp".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Base64ImageSource {
    /// The base64-encoded data of the image
    pub data: String,

    /// The media type of the image (jpeg, png, gif, or webp)
    pub media_type: ImageMediaType,

    /// The source type (always "base64" for this struct)
    #[serde(default = "default_type")]
    pub r#type: String,
}

/// Supported image media types
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMediaType {
    #[serde(rename = "image/jpeg")]
    Jpeg,

    #[serde(rename = "image/png")]
    Png,

    #[serde(rename = "image/gif")]
    Gif,

    #[serde(rename = "image/webp")]
    Webp,
}

impl ImageMediaType {
    /// Maps a detected image format onto a supported media type.
    pub fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(ImageMediaType::Jpeg),
            ImageFormat::Png => Some(ImageMediaType::Png),
            ImageFormat::Gif => Some(ImageMediaType::Gif),
            ImageFormat::WebP => Some(ImageMediaType::Webp),
            _ => None,
        }
    }

    /// The image format used to encode this media type.
    pub fn format(self) -> ImageFormat {
        match self {
            ImageMediaType::Jpeg => ImageFormat::Jpeg,
            ImageMediaType::Png => ImageFormat::Png,
            ImageMediaType::Gif => ImageFormat::Gif,
            ImageMediaType::Webp => ImageFormat::WebP,
        }
    }

    /// The MIME string for this media type.
    pub fn as_str(self) -> &'static str {
        match self {
            ImageMediaType::Jpeg => "image/jpeg",
            ImageMediaType::Png => "image/png",
            ImageMediaType::Gif => "image/gif",
            ImageMediaType::Webp => "image/webp",
        }
    }
}

fn default_type() -> String {
    "base64".to_string()
}

impl Base64ImageSource {
    /// Create a new Base64ImageSource from a base64-encoded string
    pub fn new(data: String, media_type: ImageMediaType) -> Self {
        Self {
            data,
            media_type,
            r#type: "base64".to_string(),
        }
    }

    /// Re-encodes a decoded image in `media_type`'s format and wraps it as base64.
    pub fn from_image(image: &DynamicImage, media_type: ImageMediaType) -> Result<Self> {
        let mut buffer = Cursor::new(Vec::new());
        // JPEG carries no alpha channel.
        let encoded = if media_type == ImageMediaType::Jpeg {
            DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut buffer, media_type.format())
        } else {
            image.write_to(&mut buffer, media_type.format())
        };
        encoded.map_err(|e| {
            Error::encoding(
                format!("failed to encode {}: {e}", media_type.as_str()),
                Some(Box::new(e)),
            )
        })?;
        let data = base64::engine::general_purpose::STANDARD.encode(buffer.into_inner());
        Ok(Self::new(data, media_type))
    }

    /// Decodes the payload back into an image.
    pub fn decode(&self) -> Result<DynamicImage> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(self.data.as_bytes())?;
        image::load_from_memory_with_format(&bytes, self.media_type.format()).map_err(|e| {
            Error::encoding(
                format!("invalid {} payload: {e}", self.media_type.as_str()),
                Some(Box::new(e)),
            )
        })
    }
}
