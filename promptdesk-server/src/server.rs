use std::{
    str::FromStr,
    sync::{Arc, OnceLock},
    time::Duration,
};

use anyhow::Context;
use axum::{
    Extension, Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::get,
    serve,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use shared::{
    config::server::{Config, DatabaseConfig, LogFormat},
    llms::{LLMProvider, OpenAiProvider},
    usage::PriceTable,
};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
};
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    app_state::AppState,
    db::bootstrap,
    http::error::{ApiError, panic_response},
    middleware::request_context::{self, RequestIdState},
    routes::{self, openapi::openapi_routes},
    services::{memory_store::MemoryStore, pg_store::PgChatStore, store::ChatStore},
    tracer,
};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Process-wide Prometheus recorder. Installed on first use; when another
/// recorder is already installed, a detached handle is returned instead.
#[must_use]
pub fn metrics_handle() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let recorder = builder.build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                warn!("metrics recorder already installed");
            }
            handle
        })
        .clone()
}

async fn metrics_endpoint(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        handle.render(),
    )
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

/// Initializes the tracing subscriber using the provided configuration.
/// Returns the configured default level.
#[must_use]
pub fn initialize_tracing(config: &Config) -> String {
    let env_filter = build_env_filter(config);

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let installed = if matches!(config.logging.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).try_init()
    } else {
        fmt_builder.with_ansi(true).try_init()
    };
    if installed.is_err() {
        warn!("tracing subscriber already installed");
    }

    config.logging.level.clone()
}

fn build_env_filter(config: &Config) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}

/// Creates a connection pool with the configured statement timeout applied
/// to every session.
///
/// # Errors
/// Returns an error if the URL is malformed or no connection can be made.
pub async fn create_database_pool(db: &DatabaseConfig, url: &str) -> anyhow::Result<sqlx::PgPool> {
    let options = PgConnectOptions::from_str(url)
        .context("invalid database URL")?
        .options([("statement_timeout", db.statement_timeout_ms.to_string())]);

    let pool = PgPoolOptions::new()
        .max_connections(db.max_connections)
        .connect_with(options)
        .await
        .context("failed to connect to the database")?;

    metrics::gauge!("db_pool_max_connections").set(f64::from(db.max_connections));
    Ok(pool)
}

/// Picks the storage backend: Postgres when a URL is configured, otherwise
/// the in-memory store.
///
/// # Errors
/// Returns an error if the database is unreachable or bootstrap fails.
pub async fn create_store(config: &Config) -> anyhow::Result<Arc<dyn ChatStore>> {
    let Some(url) = config.db.url.as_deref() else {
        warn!("no database URL configured, using the in-memory store; data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = create_database_pool(&config.db, url).await?;
    bootstrap::ensure_liveness(&pool)
        .await
        .context("database liveness check failed")?;

    if config.db.run_bootstrap {
        bootstrap::run(&pool, &config.db).await?;
    }

    bootstrap::ensure_readiness(&pool)
        .await
        .context("database schema is not ready")?;

    info!(max_connections = config.db.max_connections, "connected to Postgres");
    Ok(Arc::new(PgChatStore::new(pool)))
}

/// Builds the language model client when a credential is configured.
///
/// # Errors
/// Returns an error if the provider configuration is invalid.
pub fn create_provider(config: &Config) -> anyhow::Result<Option<Arc<dyn LLMProvider>>> {
    if !config.llm.has_credentials() {
        warn!("no language model API key configured; /api/chat will answer 500");
        return Ok(None);
    }

    let provider = OpenAiProvider::from_config(&config.llm)
        .context("invalid language model configuration")?;
    info!(
        provider = %config.llm.provider,
        endpoint = provider.endpoint(),
        model = %config.llm.default_model,
        "language model provider configured"
    );
    Ok(Some(Arc::new(provider)))
}

/// Creates the CORS layer. No configured origins means any origin.
#[must_use]
pub fn create_cors_layer(config: &Config) -> CorsLayer {
    let methods = vec![
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let cors = CorsLayer::new()
        .allow_methods(AllowMethods::list(methods))
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(config.server.cors.allow_credentials)
        .max_age(Duration::from_secs(config.server.cors.max_age_seconds));

    if config.server.cors.allowed_origins.is_empty() {
        // A wildcard origin cannot be combined with credentials.
        if config.server.cors.allow_credentials {
            cors.allow_origin(AllowOrigin::mirror_request())
        } else {
            cors.allow_origin(AllowOrigin::any())
        }
    } else {
        let origins = config
            .server
            .cors
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect::<Vec<_>>();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

/// Creates the application router with all middleware and routes.
#[must_use]
pub fn create_app_router(
    state: Arc<AppState>,
    config: Arc<Config>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let cors = create_cors_layer(&config);
    let request_id_state = RequestIdState::from_config(&config);

    Router::new()
        .nest("/api", routes::api::create_api_router(&config))
        .merge(routes::health::create_health_router())
        .merge(openapi_routes())
        .route("/metrics", get(metrics_endpoint))
        .fallback(route_not_found)
        .with_state(state)
        .layer(Extension(config))
        .layer(Extension(metrics_handle))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(tracer::create_trace_layer())
        .layer(middleware::from_fn_with_state(
            request_id_state,
            request_context::assign_request_id,
        ))
}

/// Resolves when the process receives Ctrl+C.
pub async fn create_shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}

/// Starts the server with a fully resolved configuration.
///
/// # Errors
/// Returns an error if a backend cannot be initialized or the listener
/// cannot be bound.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let level = initialize_tracing(&config);
    info!(profile = ?config.profile, %level, "Starting server...");

    let metrics_handle = metrics_handle();
    let config = Arc::new(config);

    let store = create_store(&config).await?;
    let provider = create_provider(&config)?;
    let state = Arc::new(AppState::new(
        store,
        provider,
        PriceTable::from_config(&config.pricing),
    ));

    let app = create_app_router(state, config.clone(), metrics_handle);

    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?;
    info!(address = %listener.local_addr()?, "Listening");

    serve(listener, app)
        .with_graceful_shutdown(create_shutdown_signal())
        .await?;

    Ok(())
}
