//! Papershelf REST API
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Registration, login, and bearer-token authorization
//! - The paper catalog (CRUD, search, listings, aggregates)
//! - Admin management of users and papers
//! - Observability (logging, metrics, request tracing)

mod handlers;
mod middleware;

use axum::{
    extract::Request,
    middleware::Next,
    routing::{delete, get, post, put},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use papershelf_common::{
    auth::JwtManager,
    config::{AppConfig, ObservabilityConfig},
    db::DbPool,
    errors::AppError,
    metrics,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone, axum::extract::FromRef)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub jwt: Arc<JwtManager>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration, then log through it
    let config = Arc::new(AppConfig::load()?);
    init_tracing(&config.observability);

    info!("Starting Papershelf API v{}", papershelf_common::VERSION);

    // Initialize metrics and the Prometheus scrape endpoint
    metrics::register_metrics();

    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            metrics::LATENCY_BUCKETS,
        )?
        .install()?;
    info!("Metrics exporter listening on {}", metrics_addr);

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    // Token signing requires an explicit secret
    let jwt_secret = config.auth.jwt_secret.clone().ok_or_else(|| {
        AppError::Configuration {
            message: "auth.jwt_secret is not set".to_string(),
        }
    })?;
    let jwt = Arc::new(JwtManager::new(&jwt_secret, config.auth.jwt_expiration_secs));

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        jwt,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber from the observability config
///
/// RUST_LOG overrides the configured level when set.
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Auth endpoints
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        // Paper endpoints
        .route("/papers", get(handlers::papers::list_papers))
        .route("/papers", post(handlers::papers::create_paper))
        .route("/papers/{id}", get(handlers::papers::get_paper))
        .route("/papers/{id}", put(handlers::papers::update_paper))
        .route("/papers/{id}", delete(handlers::papers::delete_paper))
        .route("/papers/search/{keyword}", get(handlers::papers::search_papers))
        .route("/papers/tag/{tag_name}", get(handlers::papers::papers_by_tag))
        // User endpoints
        .route("/users/{id}/papers", get(handlers::users::user_papers))
        // Catalog endpoints
        .route("/tags", get(handlers::catalog::list_tags))
        .route("/authors", get(handlers::catalog::list_authors))
        .route("/statistics", get(handlers::catalog::statistics))
        .route(
            "/functions/count-user-papers/{id}",
            get(handlers::catalog::count_user_papers),
        )
        .route(
            "/functions/count-papers-by-tag/{tag_name}",
            get(handlers::catalog::count_papers_by_tag),
        )
        .route(
            "/functions/recent-papers/{days}",
            get(handlers::catalog::recent_papers),
        )
        .route("/queries/papers-by-year", get(handlers::catalog::papers_by_year))
        .route(
            "/queries/papers-with-many-authors",
            get(handlers::catalog::papers_with_many_authors),
        )
        // Admin endpoints
        .route("/admin/users", get(handlers::admin::list_users))
        .route("/admin/users", post(handlers::admin::create_user))
        .route("/admin/users/{id}", put(handlers::admin::update_user))
        .route("/admin/users/{id}", delete(handlers::admin::delete_user))
        .route("/admin/papers", get(handlers::admin::list_papers))
        .route("/admin/papers/{id}", put(handlers::admin::update_paper))
        .route("/admin/papers/{id}", delete(handlers::admin::delete_paper));

    // Compose the app
    let mut app = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .layer(TimeoutLayer::new(state.config.request_timeout()));

    if state.config.rate_limit.enabled {
        let limit = state.config.rate_limit.requests_per_second;
        let limiter = middleware::rate_limit::create_rate_limiter(
            limit,
            state.config.rate_limit.burst,
        );
        app = app.layer(axum::middleware::from_fn(move |request: Request, next: Next| {
            let limiter = limiter.clone();
            async move {
                middleware::rate_limit::rate_limit_middleware(request, next, limiter, limit).await
            }
        }));
    }

    app.layer(axum::middleware::from_fn(middleware::metrics::track_requests))
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
