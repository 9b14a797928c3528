//! # Usage accounting
//!
//! Token estimation and cost calculation shared by the server and any Rust
//! client that wants to show live figures while a reply streams.

pub mod estimator;
pub mod pricing;

pub use estimator::{TokenTally, estimate_tokens};
pub use pricing::{CostEstimate, Direction, ModelPrice, PriceTable};
