use serde::{Deserialize, Serialize};

use crate::types::{Base64ImageSource, ImageMediaType};

/// A unit of message content: text or an inline image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// A run of text.
    Text {
        /// The text itself.
        text: String,
    },

    /// An inline base64 image.
    Image {
        /// Where the image bytes live.
        source: Base64ImageSource,
    },
}

impl ContentBlock {
    /// Create a text block.
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// Create an image block from an encoded source.
    pub fn image(source: Base64ImageSource) -> Self {
        ContentBlock::Image { source }
    }

    /// Returns the text if this is a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Image { .. } => None,
        }
    }

    /// Returns the image source if this is an image block.
    pub fn as_image(&self) -> Option<&Base64ImageSource> {
        match self {
            ContentBlock::Text { .. } => None,
            ContentBlock::Image { source } => Some(source),
        }
    }

    /// Returns the media type if this is an image block.
    pub fn media_type(&self) -> Option<ImageMediaType> {
        self.as_image().map(|source| source.media_type)
    }
}
