//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the corridor REST API server (with OpenAPI/Swagger UI) on its own.
//!
//! ## Intended use
//! Development and debugging. Deployments use the workspace's `corridor-run` binary, which
//! serves the same router.

use corridor_api_rest::{router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the corridor REST API server
///
/// # Environment Variables
/// - `CORRIDOR_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - see [`AppState::from_env`] for storage and advisory settings
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("corridor_api_rest=info".parse()?)
                .add_directive("corridor_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CORRIDOR_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting corridor REST API on {}", addr);

    let app = router(AppState::from_env()?);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
