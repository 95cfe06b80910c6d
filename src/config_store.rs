//! The model configuration store.
//!
//! A read-only table mapping a model identifier (what the selector shows) to that model's
//! default inference parameters, slider ranges, and feature flags.  It is loaded once at
//! process start, either from the built-in table or from a YAML file with the same shape:
//!
//! ```yaml
//! models:
//!   claude-haiku-4-5:
//!     model_id: claude-haiku-4-5
//!     temperature: 1.0
//!     max_top_k: 500
//!     system_prompt_disabled: false
//!     ranges:
//!       max_tokens: { min: 0, max: 8192 }
//! ```
//!
//! `model_id` is the only required key.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const BUILTIN_MODELS: &str = include_str!("models.yaml");

/// Hard temperature default when a model declares none.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
/// Hard top-p default when a model declares none.
pub const DEFAULT_TOP_P: f32 = 1.0;
/// Hard top-k default when a model declares none.
pub const DEFAULT_TOP_K: u32 = 500;
/// Hard max-tokens default when a model declares none.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
/// Hard memory-window default when a model declares none.
pub const DEFAULT_MEMORY_WINDOW: usize = 10;

/////////////////////////////////////////// Bounds ///////////////////////////////////////////

/// An inclusive `[min, max]` range a slider is confined to.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bounds<T> {
    /// Smallest permitted value.
    pub min: T,
    /// Largest permitted value.
    pub max: T,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    /// Create a new range.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// Clamp `value` into the range.  Values that compare with neither end (NaN) land on `min`.
    pub fn clamp(&self, value: T) -> T {
        if value > self.max {
            self.max
        } else if value >= self.min {
            value
        } else {
            self.min
        }
    }

    /// True when `value` lies inside the range.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }

    fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

/// Per-model range overrides.  Missing entries fall back to the hard defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ParameterRanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Bounds<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<Bounds<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<Bounds<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<Bounds<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_window: Option<Bounds<usize>>,
}

///////////////////////////////////////// ModelConfig ////////////////////////////////////////

/// Configuration record for one selectable model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// The identifier sent to the backend.
    pub model_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Upper bound of the top-k slider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_window: Option<usize>,

    /// The backend ignores or rejects a system prompt for this model.
    #[serde(default)]
    pub system_prompt_disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_system_prompt: Option<String>,
    /// The model cannot take image input.
    #[serde(default)]
    pub image_upload_disabled: bool,

    #[serde(default)]
    pub ranges: ParameterRanges,
}

impl ModelConfig {
    /// Create a record with only a backend identifier; everything else takes the defaults.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            temperature: None,
            top_p: None,
            top_k: None,
            max_top_k: None,
            max_tokens: None,
            memory_window: None,
            system_prompt_disabled: false,
            default_system_prompt: None,
            image_upload_disabled: false,
            ranges: ParameterRanges::default(),
        }
    }

    pub fn temperature_bounds(&self) -> Bounds<f32> {
        self.ranges.temperature.unwrap_or(Bounds::new(0.0, 1.0))
    }

    pub fn top_p_bounds(&self) -> Bounds<f32> {
        self.ranges.top_p.unwrap_or(Bounds::new(0.0, 1.0))
    }

    pub fn top_k_bounds(&self) -> Bounds<u32> {
        self.ranges
            .top_k
            .unwrap_or(Bounds::new(1, self.max_top_k.unwrap_or(DEFAULT_TOP_K)))
    }

    pub fn max_tokens_bounds(&self) -> Bounds<u32> {
        self.ranges
            .max_tokens
            .unwrap_or(Bounds::new(0, DEFAULT_MAX_TOKENS))
    }

    pub fn memory_window_bounds(&self) -> Bounds<usize> {
        self.ranges
            .memory_window
            .unwrap_or(Bounds::new(0, DEFAULT_MEMORY_WINDOW))
    }

    pub fn default_temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn default_top_p(&self) -> f32 {
        self.top_p.unwrap_or(DEFAULT_TOP_P)
    }

    pub fn default_top_k(&self) -> u32 {
        self.top_k.unwrap_or(DEFAULT_TOP_K)
    }

    pub fn default_max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn default_memory_window(&self) -> usize {
        self.memory_window.unwrap_or(DEFAULT_MEMORY_WINDOW)
    }

    /// The system prompt the sidebar starts with.
    pub fn default_system_prompt(&self) -> &str {
        self.default_system_prompt.as_deref().unwrap_or("")
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(Error::config("model_id must not be empty", Some(name.to_string())));
        }
        let inverted = [
            ("temperature", self.temperature_bounds().is_ordered()),
            ("top_p", self.top_p_bounds().is_ordered()),
            ("top_k", self.top_k_bounds().is_ordered()),
            ("max_tokens", self.max_tokens_bounds().is_ordered()),
            ("memory_window", self.memory_window_bounds().is_ordered()),
        ];
        for (param, ordered) in inverted {
            if !ordered {
                return Err(Error::config(
                    format!("range for {param} has min greater than max"),
                    Some(name.to_string()),
                ));
            }
        }
        Ok(())
    }
}

///////////////////////////////////////// ConfigStore ////////////////////////////////////////

#[derive(Deserialize)]
struct RawStore {
    models: serde_yaml::Mapping,
}

/// Read-only table of model configurations, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigStore {
    models: Vec<(String, ModelConfig)>,
}

impl ConfigStore {
    /// The table shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_MODELS)
    }

    /// Load a store from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::io(format!("failed to read {}", path.display()), err)
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse a store from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: RawStore = serde_yaml::from_str(content)
            .map_err(|err| Error::config(format!("unreadable model table: {err}"), None))?;
        let mut models = Vec::with_capacity(raw.models.len());
        for (key, value) in raw.models {
            let Some(name) = key.as_str().map(str::to_string) else {
                return Err(Error::config(
                    format!("model identifiers must be strings, found {key:?}"),
                    None,
                ));
            };
            let config: ModelConfig = serde_yaml::from_value(value)
                .map_err(|err| Error::config(err.to_string(), Some(name.clone())))?;
            config.validate(&name)?;
            models.push((name, config));
        }
        Self::from_models(models)
    }

    /// Build a store from already-constructed records.
    pub fn from_models(models: Vec<(String, ModelConfig)>) -> Result<Self> {
        if models.is_empty() {
            return Err(Error::config("the model table is empty", None));
        }
        for (name, config) in &models {
            config.validate(name)?;
        }
        Ok(Self { models })
    }

    /// Look up a model by identifier.
    pub fn get(&self, name: &str) -> Result<&ModelConfig> {
        self.models
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, config)| config)
            .ok_or_else(|| Error::unknown_model(name))
    }

    /// True when the store knows `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.models.iter().any(|(candidate, _)| candidate == name)
    }

    /// Model identifiers in declaration order.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|(name, _)| name.as_str())
    }

    /// The first declared model, which the selector starts on.
    pub fn default_model(&self) -> &str {
        // from_models refuses an empty table
        &self.models[0].0
    }

    /// The number of models in the table.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Always false; an empty table is rejected at load time.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
models:
  alpha:
    model_id: backend-alpha
    temperature: 0.3
    max_top_k: 200
  beta:
    model_id: backend-beta
    system_prompt_disabled: true
    image_upload_disabled: true
    ranges:
      max_tokens: { min: 16, max: 8192 }
"#;

    #[test]
    fn builtin_table_loads() {
        let store = ConfigStore::builtin().unwrap();
        assert!(!store.is_empty());
        assert_eq!(store.default_model(), "claude-sonnet-4-5");
        let text_only = store.get("claude-haiku-4-5-text").unwrap();
        assert!(text_only.system_prompt_disabled);
        assert!(text_only.image_upload_disabled);
    }

    #[test]
    fn declaration_order_is_kept() {
        let store = ConfigStore::from_yaml_str(TABLE).unwrap();
        let names: Vec<_> = store.model_names().collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(store.default_model(), "alpha");
    }

    #[test]
    fn defaults_and_ranges() {
        let store = ConfigStore::from_yaml_str(TABLE).unwrap();
        let alpha = store.get("alpha").unwrap();
        assert_eq!(alpha.default_temperature(), 0.3);
        assert_eq!(alpha.default_top_p(), DEFAULT_TOP_P);
        assert_eq!(alpha.top_k_bounds(), Bounds::new(1, 200));
        assert_eq!(alpha.max_tokens_bounds(), Bounds::new(0, 4096));
        assert_eq!(alpha.memory_window_bounds(), Bounds::new(0, 10));
        assert_eq!(alpha.default_system_prompt(), "");

        let beta = store.get("beta").unwrap();
        assert_eq!(beta.max_tokens_bounds(), Bounds::new(16, 8192));
        assert_eq!(beta.top_k_bounds(), Bounds::new(1, 500));
    }

    #[test]
    fn unknown_model_is_a_config_error() {
        let store = ConfigStore::from_yaml_str(TABLE).unwrap();
        let err = store.get("gamma").unwrap_err();
        assert!(err.is_config());
        assert_eq!(err.model(), Some("gamma"));
    }

    #[test]
    fn missing_model_id_is_rejected() {
        let err = ConfigStore::from_yaml_str("models:\n  broken:\n    temperature: 0.5\n")
            .unwrap_err();
        assert!(err.is_config());
        assert_eq!(err.model(), Some("broken"));
    }

    #[test]
    fn misspelled_key_is_rejected() {
        let table = "models:\n  x:\n    model_id: x\n    max_topk: 40\n";
        let err = ConfigStore::from_yaml_str(table).unwrap_err();
        assert!(err.is_config());
        assert_eq!(err.model(), Some("x"));
        assert!(err.to_string().contains("max_topk"));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let table = "models:\n  x:\n    model_id: x\n    ranges:\n      top_p: { min: 0.9, max: 0.1 }\n";
        let err = ConfigStore::from_yaml_str(table).unwrap_err();
        assert!(err.to_string().contains("top_p"));
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(ConfigStore::from_yaml_str("models: {}\n").unwrap_err().is_config());
        assert!(ConfigStore::from_yaml_str("not: a store\n").unwrap_err().is_config());
    }

    #[test]
    fn clamp_handles_nan() {
        let bounds = Bounds::new(0.0f32, 1.0);
        assert_eq!(bounds.clamp(1.5), 1.0);
        assert_eq!(bounds.clamp(-0.5), 0.0);
        assert_eq!(bounds.clamp(0.25), 0.25);
        assert_eq!(bounds.clamp(f32::NAN), 0.0);
        assert!(bounds.contains(0.0));
        assert!(!bounds.contains(1.01));
    }
}
