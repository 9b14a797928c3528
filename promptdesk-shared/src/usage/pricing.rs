//! Cost estimation for model usage.
//!
//! Prices are quoted in USD per one million tokens and converted to the
//! display currency with a fixed exchange rate. The figures are estimates for
//! dashboards and are never used to enforce limits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::config::llm::PricingConfig;

const TOKENS_PER_PRICE_UNIT: f64 = 1_000_000.0;

/// Which side of a completion the tokens were spent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Prompt tokens sent to the model.
    Input,
    /// Completion tokens produced by the model.
    Output,
}

/// Price of one model, USD per million tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    /// Price per million prompt tokens.
    pub input_per_million: f64,
    /// Price per million completion tokens.
    pub output_per_million: f64,
    /// Human readable model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ModelPrice {
    #[must_use]
    pub fn new(input_per_million: f64, output_per_million: f64, display_name: &str) -> Self {
        Self {
            input_per_million,
            output_per_million,
            display_name: Some(display_name.to_string()),
        }
    }

    fn per_million(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Input => self.input_per_million,
            Direction::Output => self.output_per_million,
        }
    }
}

/// Prices shipped with the service.
#[must_use]
pub fn builtin_prices() -> BTreeMap<String, ModelPrice> {
    BTreeMap::from([
        (
            "gpt-4o-mini".to_string(),
            ModelPrice::new(0.15, 0.60, "GPT-4o Mini"),
        ),
        ("gpt-4o".to_string(), ModelPrice::new(2.50, 10.00, "GPT-4o")),
        ("gpt-4".to_string(), ModelPrice::new(30.00, 60.00, "GPT-4")),
    ])
}

/// Input, output and total cost for a batch of usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    /// `total_cost` rendered for display.
    pub formatted: String,
}

/// Lookup table from model id to price, plus the display currency.
#[derive(Debug, Clone)]
pub struct PriceTable {
    prices: BTreeMap<String, ModelPrice>,
    default_model: String,
    fx_rate: f64,
    currency_symbol: String,
    minor_unit_suffix: String,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::from_config(&PricingConfig::default())
    }
}

impl PriceTable {
    /// Builds a table from configuration. The configured default model must
    /// be present in `models`; [`PricingConfig`] validation checks this.
    #[must_use]
    pub fn from_config(config: &PricingConfig) -> Self {
        Self {
            prices: config.models.clone(),
            default_model: config.default_model.clone(),
            fx_rate: config.fx_rate,
            currency_symbol: config.currency_symbol.clone(),
            minor_unit_suffix: config.minor_unit_suffix.clone(),
        }
    }

    /// Model whose prices are used for unknown ids and for aggregate views.
    #[must_use]
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn price_for(&self, model: &str) -> Option<&ModelPrice> {
        if let Some(price) = self.prices.get(model) {
            return Some(price);
        }
        warn!(
            model,
            fallback = %self.default_model,
            "unknown model in price table, using default pricing"
        );
        self.prices.get(&self.default_model)
    }

    /// Cost of `tokens` in the display currency.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn calculate_cost(&self, tokens: u64, direction: Direction, model: &str) -> f64 {
        let Some(price) = self.price_for(model) else {
            return 0.0;
        };
        tokens as f64 * price.per_million(direction) / TOKENS_PER_PRICE_UNIT * self.fx_rate
    }

    /// Costs of one prompt/completion pair.
    #[must_use]
    pub fn estimate(&self, input_tokens: u64, output_tokens: u64, model: &str) -> CostEstimate {
        let input_cost = self.calculate_cost(input_tokens, Direction::Input, model);
        let output_cost = self.calculate_cost(output_tokens, Direction::Output, model);
        let total_cost = input_cost + output_cost;
        CostEstimate {
            input_cost,
            output_cost,
            total_cost,
            formatted: self.format_cost(total_cost),
        }
    }

    /// Renders a cost. Amounts below one major unit are shown in minor units.
    #[must_use]
    pub fn format_cost(&self, cost: f64) -> String {
        if cost < 1.0 {
            format!("{:.2} {}", cost * 100.0, self.minor_unit_suffix)
        } else {
            format!("{cost:.2} {}", self.currency_symbol)
        }
    }

    /// Human readable name for a model id, or the id itself when unknown.
    #[must_use]
    pub fn display_name<'a>(&'a self, model: &'a str) -> &'a str {
        self.prices
            .get(model)
            .and_then(|price| price.display_name.as_deref())
            .unwrap_or(model)
    }
}
