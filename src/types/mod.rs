// Public modules
pub mod attachment_id;
pub mod base64_image_source;
pub mod content_block;
pub mod message;
pub mod response_metadata;

// Re-exports
pub use attachment_id::AttachmentId;
pub use base64_image_source::{Base64ImageSource, ImageMediaType};
pub use content_block::ContentBlock;
pub use message::{ChatMessage, GREETING, MessageContent, MessageRole};
pub use response_metadata::ResponseMetadata;
