use serde::{Deserialize, Serialize};

/// Metadata a backend returns alongside the generated text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// The backend model that produced the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Why generation stopped, as reported by the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,

    /// The number of input tokens which were used.
    pub input_tokens: u64,

    /// The number of output tokens which were used.
    pub output_tokens: u64,
}

impl ResponseMetadata {
    /// Create metadata with the given token counts.
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            model: None,
            stop_reason: None,
            input_tokens,
            output_tokens,
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the stop reason.
    pub fn with_stop_reason(mut self, stop_reason: impl Into<String>) -> Self {
        self.stop_reason = Some(stop_reason.into());
        self
    }
}
