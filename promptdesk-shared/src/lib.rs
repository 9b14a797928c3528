#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(warnings, clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)]

//! Types and logic shared between the `PromptDesk` server and its clients.

pub mod config;
pub mod llms;
pub mod models;
pub mod usage;
