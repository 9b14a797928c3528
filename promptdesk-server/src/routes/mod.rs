pub mod api;
pub mod health;
pub mod openapi;

#[cfg(test)]
mod openapi_tests;
