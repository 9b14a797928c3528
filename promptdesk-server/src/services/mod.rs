//! Domain services and the storage backends behind them.

pub mod analytics;
pub mod chat_service;
pub mod chat_stream;
pub mod memory_store;
pub mod message_service;
pub mod pg_store;
pub mod store;

pub use chat_service::ChatService;
pub use message_service::MessageService;
