use corridor_api_rest::{router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the corridor tracker
///
/// Serves the REST API (with Swagger UI at `/swagger-ui/`) until interrupted.
///
/// # Environment Variables
/// - `CORRIDOR_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `PATIENT_DATA_DIR`: Directory for patient data storage (default: "patient_data")
/// - `CORRIDOR_ADVISORY_URL`: Advisory service base URL (optional)
///
/// # Returns
/// * `Ok(())` - If the server starts and shuts down cleanly
/// * `Err(anyhow::Error)` - If startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("corridor_run=info".parse()?)
                .add_directive("corridor_core=info".parse()?)
                .add_directive("corridor_api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CORRIDOR_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let state = AppState::from_env()?;
    let app = router(state);

    tracing::info!("-- Starting corridor REST server on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("-- Corridor REST server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {:?}", e);
        std::future::pending::<()>().await;
    }
}
