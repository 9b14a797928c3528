//! # Configuration
//!
//! This module contains the service configuration, including the language
//! model and pricing sections.

pub mod llm;
pub mod server;

pub use llm::{LlmConfig, PricingConfig};
pub use server::{Config, ConfigError, LogFormat, Profile};
