//! Image attachments and the tracker that decides which of them ride along with the next
//! prompt.
//!
//! An upload stays in the upload widget after it has been sent; what marks it consumed is
//! its identifier appearing in some user message's `images`.  [`scan_attachments`] is a pure
//! function of the message log and the widget contents, so calling it twice yields the same
//! answer and consumes nothing.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::{GenericImageView, ImageReader};

use crate::error::{Error, Result};
use crate::observability::{ATTACHMENTS_SKIPPED, ATTACHMENTS_SCANNED};
use crate::types::{
    AttachmentId, Base64ImageSource, ChatMessage, ContentBlock, ImageMediaType, MessageRole,
};

/// Thumbnails per grid row.
pub const THUMBNAIL_COLUMNS: usize = 10;

/// Display width of a thumbnail, in pixels.
pub const THUMBNAIL_WIDTH: u32 = 75;

////////////////////////////////////////// Attachment //////////////////////////////////////////

/// An uploaded file, as held by the upload widget.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    id: AttachmentId,
    name: String,
    bytes: Arc<[u8]>,
}

impl Attachment {
    /// Wrap uploaded bytes, assigning a fresh identifier.
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::with_id(AttachmentId::generate(), name, bytes)
    }

    /// Wrap uploaded bytes under a known identifier.
    pub fn with_id(id: AttachmentId, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id,
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk as an upload.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn id(&self) -> AttachmentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn decode_error(&self, message: impl Into<String>, err: Option<image::ImageError>) -> Error {
        Error::attachment_decode(
            message,
            self.name.clone(),
            err.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        )
    }

    fn media_type(&self) -> Result<ImageMediaType> {
        let format = image::guess_format(&self.bytes)
            .map_err(|err| self.decode_error("not a recognizable image", Some(err)))?;
        ImageMediaType::from_format(format).ok_or_else(|| {
            self.decode_error(format!("unsupported image format {format:?}"), None)
        })
    }

    /// Decode the upload and re-encode it as an inline base64 content block.
    pub fn encode(&self) -> Result<(ContentBlock, Thumbnail)> {
        let media_type = self.media_type()?;
        let decoded = image::load_from_memory_with_format(&self.bytes, media_type.format())
            .map_err(|err| self.decode_error("failed to decode image", Some(err)))?;
        let source = Base64ImageSource::from_image(&decoded, media_type).map_err(|err| {
            Error::attachment_decode(err.to_string(), self.name.clone(), Some(Box::new(err)))
        })?;
        let (width, height) = decoded.dimensions();
        let thumbnail = Thumbnail::new(self, media_type, width, height);
        Ok((ContentBlock::image(source), thumbnail))
    }

    /// Describe the upload for display without decoding the pixel data.
    pub fn thumbnail(&self) -> Result<Thumbnail> {
        let media_type = self.media_type()?;
        let (width, height) = ImageReader::with_format(Cursor::new(&self.bytes[..]), media_type.format())
            .into_dimensions()
            .map_err(|err| self.decode_error("failed to read image header", Some(err)))?;
        Ok(Thumbnail::new(self, media_type, width, height))
    }
}

////////////////////////////////////////// Thumbnails //////////////////////////////////////////

/// Display descriptor for one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub id: AttachmentId,
    pub name: String,
    pub media_type: ImageMediaType,
    /// Pixel dimensions of the original upload.
    pub width: u32,
    pub height: u32,
    /// Dimensions the thumbnail is drawn at.
    pub display_width: u32,
    pub display_height: u32,
}

impl Thumbnail {
    fn new(attachment: &Attachment, media_type: ImageMediaType, width: u32, height: u32) -> Self {
        let display_height = if width == 0 {
            0
        } else {
            ((u64::from(height) * u64::from(THUMBNAIL_WIDTH)) / u64::from(width)).max(1) as u32
        };
        Self {
            id: attachment.id,
            name: attachment.name.clone(),
            media_type,
            width,
            height,
            display_width: THUMBNAIL_WIDTH,
            display_height,
        }
    }
}

/// Thumbnails laid out [`THUMBNAIL_COLUMNS`] to a row, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailGrid {
    rows: Vec<Vec<Thumbnail>>,
}

impl ThumbnailGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a thumbnail in the next cell, wrapping after the last column.
    pub fn push(&mut self, thumbnail: Thumbnail) {
        match self.rows.last_mut() {
            Some(row) if row.len() < THUMBNAIL_COLUMNS => row.push(thumbnail),
            _ => self.rows.push(vec![thumbnail]),
        }
    }

    pub fn rows(&self) -> &[Vec<Thumbnail>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All thumbnails in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Thumbnail> {
        self.rows.iter().flatten()
    }
}

//////////////////////////////////////////// Scanning ////////////////////////////////////////////

/// An upload that could not be turned into an image block.
#[derive(Debug, Clone)]
pub struct SkippedAttachment {
    pub id: AttachmentId,
    pub name: String,
    pub error: Error,
}

/// What [`scan_attachments`] found in the upload widget.
#[derive(Debug, Clone, Default)]
pub struct AttachmentScan {
    /// Image blocks for the unconsumed uploads, in upload order.
    pub blocks: Vec<ContentBlock>,
    /// Identifiers matching `blocks`, to be recorded on the next user message.
    pub ids: Vec<AttachmentId>,
    /// Thumbnails for the unconsumed uploads.
    pub grid: ThumbnailGrid,
    /// Uploads that failed to decode; they stay unconsumed.
    pub skipped: Vec<SkippedAttachment>,
}

impl AttachmentScan {
    /// True when nothing is waiting to be attached.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Every attachment identifier already carried by a user message.
pub fn consumed_ids(messages: &[ChatMessage]) -> HashSet<AttachmentId> {
    messages
        .iter()
        .filter(|message| message.role == MessageRole::User)
        .flat_map(|message| message.images.iter().copied())
        .collect()
}

/// Compute the unconsumed uploads and encode them.  Call at most once per event.
pub fn scan_attachments(messages: &[ChatMessage], uploads: &[Attachment]) -> AttachmentScan {
    let consumed = consumed_ids(messages);
    let mut scan = AttachmentScan::default();
    for upload in uploads.iter().filter(|u| !consumed.contains(&u.id)) {
        ATTACHMENTS_SCANNED.click();
        match upload.encode() {
            Ok((block, thumbnail)) => {
                scan.blocks.push(block);
                scan.ids.push(upload.id);
                scan.grid.push(thumbnail);
            }
            Err(error) => {
                ATTACHMENTS_SKIPPED.click();
                scan.skipped.push(SkippedAttachment {
                    id: upload.id,
                    name: upload.name.clone(),
                    error,
                });
            }
        }
    }
    scan
}

/// Thumbnails for the uploads a past message carried, skipping ones no longer in the widget.
pub fn message_thumbnails(message: &ChatMessage, uploads: &[Attachment]) -> ThumbnailGrid {
    let mut grid = ThumbnailGrid::new();
    for id in &message.images {
        if let Some(upload) = uploads.iter().find(|u| u.id == *id)
            && let Ok(thumbnail) = upload.thumbnail()
        {
            grid.push(thumbnail);
        }
    }
    grid
}
