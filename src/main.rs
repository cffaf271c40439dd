use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;

use stepflow::assignment::{AssignmentRouteState, assignment_routes};
use stepflow::auth::{AuthRouteState, auth_routes};
use stepflow::config::Config;
use stepflow::form::{FormRouteState, form_routes};
use stepflow::listing::{ListingRouteState, listing_routes};
use stepflow::refresh::RefreshBus;
use stepflow::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    eprintln!("stepflow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);
    eprintln!("   Database: {}", config.db_path);

    // ── Database ─────────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&config.db_path);
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(db_path).await?);

    // ── Startup sweep: drop sessions that expired while we were down ────
    match db.prune_expired_sessions().await {
        Ok(0) => {}
        Ok(count) => tracing::info!(count, "Pruned expired sessions at startup"),
        Err(e) => tracing::warn!(error = %e, "Session prune at startup failed"),
    }

    let refresh = RefreshBus::new();

    // ── Routes ───────────────────────────────────────────────────────────
    let app = Router::new()
        .merge(auth_routes(AuthRouteState {
            db: Arc::clone(&db),
            session_ttl: config.session_ttl,
        }))
        .merge(assignment_routes(AssignmentRouteState {
            db: Arc::clone(&db),
            refresh: refresh.clone(),
        }))
        .merge(form_routes(FormRouteState {
            db: Arc::clone(&db),
            refresh: refresh.clone(),
        }))
        .merge(listing_routes(ListingRouteState {
            db: Arc::clone(&db),
            refresh: refresh.clone(),
        }))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
