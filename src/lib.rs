// Public modules
pub mod adapter;
pub mod attachment;
pub mod chat;
pub mod client;
pub mod config_store;
pub mod error;
pub mod memory;
pub mod params;
pub mod sse;
pub mod turn_logger;
pub mod types;

mod observability;

// Re-exports
pub use adapter::{DisplayBuffer, InvokeRequest, ModelAdapter, ModelResponse, TokenSink};
pub use attachment::{
    Attachment, AttachmentScan, SkippedAttachment, Thumbnail, ThumbnailGrid, scan_attachments,
};
pub use client::MessagesClient;
pub use config_store::{Bounds, ConfigStore, ModelConfig, ParameterRanges};
pub use error::{Error, Result};
pub use memory::{ContextMessage, ConversationMemory, MemoryContent, MemoryEntry};
pub use observability::register_biometrics;
pub use params::{InferenceParameters, ParameterChange, WidgetValues, resolve_parameters};
pub use sse::StreamEvent;
pub use turn_logger::TurnLogger;
pub use types::*;
