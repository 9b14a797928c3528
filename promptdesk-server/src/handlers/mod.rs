pub mod admin;
pub mod assistants;
pub mod chat;
pub mod conversations;
