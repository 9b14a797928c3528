pub mod admin_auth;
pub mod request_context;
