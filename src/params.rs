//! Inference parameter resolution.
//!
//! Sidebar widgets hold whatever the user last set; the model's configuration record says
//! what is allowed.  [`resolve_parameters`] combines the two into the values sent with the
//! next turn.

use serde::Serialize;

use crate::config_store::ModelConfig;

/// Live values of the sidebar widgets.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetValues {
    pub system_prompt: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
    pub memory_window: usize,
}

impl WidgetValues {
    /// Widget values as a freshly rendered sidebar shows them for `model`.
    pub fn from_config(model: &ModelConfig) -> Self {
        Self {
            system_prompt: model.default_system_prompt().to_string(),
            temperature: model.default_temperature(),
            top_p: model.default_top_p(),
            top_k: model.default_top_k(),
            max_tokens: model.default_max_tokens(),
            memory_window: model.default_memory_window(),
        }
    }
}

/// A single sidebar adjustment.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterChange {
    SystemPrompt(String),
    Temperature(f32),
    TopP(f32),
    TopK(u32),
    MaxTokens(u32),
    MemoryWindow(usize),
}

impl ParameterChange {
    /// Apply this change to the widget values, unclamped; clamping happens at resolve time.
    pub fn apply(self, widgets: &mut WidgetValues) {
        match self {
            ParameterChange::SystemPrompt(prompt) => widgets.system_prompt = prompt,
            ParameterChange::Temperature(value) => widgets.temperature = value,
            ParameterChange::TopP(value) => widgets.top_p = value,
            ParameterChange::TopK(value) => widgets.top_k = value,
            ParameterChange::MaxTokens(value) => widgets.max_tokens = value,
            ParameterChange::MemoryWindow(value) => widgets.memory_window = value,
        }
    }
}

/// Parameters for one model invocation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InferenceParameters {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
    /// Absent, not empty, when the model does not support a system prompt.
    #[serde(rename = "system", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Prior exchanges to include; consumed by the memory, never sent to the backend.
    #[serde(skip_serializing)]
    pub memory_window: usize,
}

/// Resolve live widget values against the model's declared ranges and feature flags.
pub fn resolve_parameters(model: &ModelConfig, widgets: &WidgetValues) -> InferenceParameters {
    let system_prompt = if model.system_prompt_disabled {
        None
    } else {
        Some(widgets.system_prompt.clone())
    };
    InferenceParameters {
        temperature: model.temperature_bounds().clamp(widgets.temperature),
        top_p: model.top_p_bounds().clamp(widgets.top_p),
        top_k: model.top_k_bounds().clamp(widgets.top_k),
        max_tokens: model.max_tokens_bounds().clamp(widgets.max_tokens),
        system_prompt,
        memory_window: model.memory_window_bounds().clamp(widgets.memory_window),
    }
}
