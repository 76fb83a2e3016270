//! Marginalia Server - shared PDF library with role-scoped annotations
//!
//! Callers pick a role per request with the `X-User-Role` header.

mod config;
mod state;

use anyhow::Result;
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::state::DatabaseBackend;

#[derive(Debug, Parser)]
#[command(name = "marginalia-server", version, about = "Marginalia document library server")]
struct Cli {
    /// TOML configuration file; environment variables are used when absent
    #[arg(short, long, env = "MARGINALIA_CONFIG")]
    config: Option<String>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,
}

/// Shared state for the public routes
struct ServerState {
    backend: DatabaseBackend,
    backend_name: &'static str,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "marginalia=info,marginalia_server=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = match cli.config.as_deref() {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    info!("Starting Marginalia Server on {}:{}", config.host, config.port);

    let backend = DatabaseBackend::connect(&config).await?;
    let app = build_router(&config, backend);

    let addr = SocketAddr::new(config.host.parse()?, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(config: &Config, backend: DatabaseBackend) -> Router {
    let storage = backend.storage(config);
    let server_state = Arc::new(ServerState {
        backend_name: storage.backend(),
        backend,
    });
    let library_state = Arc::new(marginalia::AppState::new(storage, config.library.clone()));

    let public_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .with_state(server_state);

    Router::new()
        .merge(public_routes)
        .merge(marginalia::configure(library_state))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config))
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> &'static str {
    "Marginalia Server"
}

async fn health_check(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if state.backend.is_healthy().await {
        Ok(Json(serde_json::json!({
            "status": "healthy",
            "database": state.backend_name,
            "version": env!("CARGO_PKG_VERSION")
        })))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseType;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn memory_config() -> Config {
        Config {
            database_type: DatabaseType::Memory,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let config = memory_config();
        let app = build_router(&config, DatabaseBackend::Memory);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["database"], "memory");
    }

    #[tokio::test]
    async fn test_health_needs_no_role() {
        let config = memory_config();
        let app = build_router(&config, DatabaseBackend::Memory);

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/api/files").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
