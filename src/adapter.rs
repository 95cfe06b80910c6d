//! The seam between the orchestrator and a model backend.
//!
//! A [`ModelAdapter`] turns user text into the backend's content shape and runs a streaming
//! invocation.  Tokens flow out through a [`TokenSink`], which is all the adapter knows about
//! the display.

use crate::config_store::ModelConfig;
use crate::error::Result;
use crate::memory::ContextMessage;
use crate::params::InferenceParameters;
use crate::types::{ContentBlock, ResponseMetadata};

/// Receives incremental text while a response streams.
///
/// Called synchronously on the invoking task; implementations must update their display
/// before returning.
pub trait TokenSink: Send {
    fn on_token(&mut self, text: &str);
}

impl TokenSink for String {
    fn on_token(&mut self, text: &str) {
        self.push_str(text);
    }
}

/// Everything a backend needs for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct InvokeRequest<'a> {
    pub model: &'a ModelConfig,
    /// Memory window followed by the new user turn.
    pub context: &'a [ContextMessage],
    pub parameters: &'a InferenceParameters,
}

/// The aggregated result of a completed stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub metadata: Option<ResponseMetadata>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A model backend.
#[async_trait::async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Shape raw user text for this backend.  The default is a single text block.
    fn format_prompt(&self, _model: &ModelConfig, text: &str) -> Vec<ContentBlock> {
        vec![ContentBlock::text(text)]
    }

    /// Stream a response, calling `sink` for every text fragment before returning.
    async fn invoke(
        &self,
        request: InvokeRequest<'_>,
        sink: &mut dyn TokenSink,
    ) -> Result<ModelResponse>;
}

#[async_trait::async_trait]
impl<A: ModelAdapter + ?Sized> ModelAdapter for Box<A> {
    fn format_prompt(&self, model: &ModelConfig, text: &str) -> Vec<ContentBlock> {
        (**self).format_prompt(model, text)
    }

    async fn invoke(
        &self,
        request: InvokeRequest<'_>,
        sink: &mut dyn TokenSink,
    ) -> Result<ModelResponse> {
        (**self).invoke(request, sink).await
    }
}

/// Accumulates streamed tokens while forwarding each one to the view.
///
/// Holds the partial text if the stream fails; stops forwarding once `silenced`.
pub struct DisplayBuffer<'a> {
    text: String,
    tokens: u64,
    view: &'a mut dyn TokenSink,
    silenced: Box<dyn Fn() -> bool + Send + 'a>,
}

impl<'a> DisplayBuffer<'a> {
    pub fn new(view: &'a mut dyn TokenSink) -> Self {
        Self::with_silencer(view, || false)
    }

    /// Forward tokens only while `silenced` returns false.
    pub fn with_silencer(
        view: &'a mut dyn TokenSink,
        silenced: impl Fn() -> bool + Send + 'a,
    ) -> Self {
        Self {
            text: String::new(),
            tokens: 0,
            view,
            silenced: Box::new(silenced),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl TokenSink for DisplayBuffer<'_> {
    fn on_token(&mut self, text: &str) {
        self.text.push_str(text);
        self.tokens += 1;
        if !(self.silenced)() {
            self.view.on_token(text);
        }
    }
}
