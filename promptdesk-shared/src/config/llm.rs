//! # Language model and pricing configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::usage::pricing::{ModelPrice, builtin_prices};

/// Connection and sampling settings for the completion provider.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider kind. Only `openai` (and compatible gateways) is supported.
    pub provider: String,

    /// Bearer credential. When absent the chat endpoint reports a server error.
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API, without the trailing path.
    pub base_url: String,

    /// Model used when neither the request nor the assistant names one.
    pub default_model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Upper bound on generated tokens per reply.
    pub max_tokens: u32,

    /// Timeout for establishing the upstream request, in seconds.
    pub request_timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            default_model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            request_timeout_seconds: 60,
        }
    }
}

impl LlmConfig {
    /// Whether a non-blank credential is configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub(crate) fn validate(&self, errors: &mut Vec<String>) {
        if self.provider != "openai" {
            errors.push(format!("Unsupported LLM provider: {}", self.provider));
        }
        if url::Url::parse(&self.base_url).is_err() {
            errors.push(format!("Invalid LLM base URL: {}", self.base_url));
        }
        if self.default_model.trim().is_empty() {
            errors.push("LLM default model must not be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            errors.push(format!(
                "LLM temperature must be within 0.0..=2.0, got {}",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            errors.push("LLM max_tokens must be greater than 0".to_string());
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

/// Price table and display currency used for cost estimates.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PricingConfig {
    /// Model whose prices apply to unknown model ids and aggregate views.
    pub default_model: String,

    /// Display currency units per USD.
    pub fx_rate: f64,

    /// Suffix for amounts of one major unit or more.
    pub currency_symbol: String,

    /// Suffix for amounts shown in minor units.
    pub minor_unit_suffix: String,

    /// Per-model prices keyed by model id.
    pub models: BTreeMap<String, ModelPrice>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o-mini".to_string(),
            fx_rate: 100.0,
            currency_symbol: "₽".to_string(),
            minor_unit_suffix: "коп.".to_string(),
            models: builtin_prices(),
        }
    }
}

impl PricingConfig {
    pub(crate) fn validate(&self, errors: &mut Vec<String>) {
        if !(self.fx_rate.is_finite() && self.fx_rate > 0.0) {
            errors.push(format!("Pricing fx_rate must be positive, got {}", self.fx_rate));
        }
        if !self.models.contains_key(&self.default_model) {
            errors.push(format!(
                "Pricing default model '{}' has no entry in the price table",
                self.default_model
            ));
        }
        for (model, price) in &self.models {
            if price.input_per_million < 0.0 || price.output_per_million < 0.0 {
                errors.push(format!("Pricing for '{model}' must not be negative"));
            }
        }
    }
}
