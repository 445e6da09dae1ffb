use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use career_api::config::Config;
use career_api::db::directory::PgDirectory;
use career_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing, env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let db = career_api::db::pool::build(&config.database_url, 20)
        .expect("failed to build database pool");
    let users = Arc::new(PgDirectory::new(db.clone()));

    tracing::info!(
        worker_id = config.worker_id,
        ws_url = %config.ws_url(),
        "career-api configured"
    );

    let (state, dispatcher) = AppState::new(config, db, users);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(career_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "career-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // Open gateway sessions still hold state clones; don't wait on them.
    match tokio::time::timeout(Duration::from_secs(5), dispatcher).await {
        Ok(Err(e)) => tracing::error!(?e, "event dispatcher panicked"),
        Err(_) => tracing::warn!("event dispatcher still running at shutdown"),
        Ok(Ok(())) => {}
    }
    tracing::info!("career-api stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(?e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
