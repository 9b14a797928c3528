use std::sync::Arc;

use axum::{Router, middleware};
use shared::config::Config;
use tracing::debug;

use crate::{
    app_state::AppState,
    handlers::{admin, assistants, chat, conversations},
    middleware::admin_auth::{AdminTokenState, require_admin_token},
};

/// Routes mounted under `/api`.
pub fn create_api_router(config: &Config) -> Router<Arc<AppState>> {
    let admin_state = AdminTokenState::from_config(config);
    debug!(admin = ?admin_state, "creating api router");

    Router::new()
        .merge(chat::routes())
        .merge(assistants::routes())
        .merge(conversations::routes())
        .merge(
            admin::routes()
                .route_layer(middleware::from_fn_with_state(admin_state, require_admin_token)),
        )
}
