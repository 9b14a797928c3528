#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(warnings, clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)]

//! `PromptDesk` HTTP server: assistants, chats, streaming completions and
//! admin analytics.

pub mod app_state;
pub mod db;
mod handlers;
pub mod http;
mod middleware;
pub mod openapi;
mod routes;
pub mod server;
pub mod services;
mod tracer;
