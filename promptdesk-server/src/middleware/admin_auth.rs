use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::config::Config;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::http::error::ApiError;

/// Optional bearer token protecting the admin routes.
#[derive(Clone, Default)]
pub struct AdminTokenState {
    token: Option<Arc<str>>,
}

impl std::fmt::Debug for AdminTokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminTokenState")
            .field("enabled", &self.token.is_some())
            .finish()
    }
}

impl AdminTokenState {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let token = config
            .admin
            .api_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(Arc::from);
        Self { token }
    }

    fn accepts(&self, authorization: Option<&str>) -> bool {
        let Some(expected) = self.token.as_deref() else {
            return true;
        };
        authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|presented| token_matches(presented.trim(), expected))
    }
}

/// Compares in time independent of where the first differing byte is.
fn token_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Rejects admin requests without the configured bearer token. A no-op when
/// no token is configured.
pub async fn require_admin_token(
    State(state): State<AdminTokenState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if !state.accepts(authorization) {
        warn!(path = %request.uri().path(), "admin request rejected");
        return ApiError::unauthorized("Admin token required").into_response();
    }

    next.run(request).await
}
