use std::net::SocketAddr;
use tracing::info;
use travel_concierge::api::{create_router, AppState};
use travel_concierge::bootstrap;
use travel_concierge::infrastructure::{telemetry, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    telemetry::init_tracing(&config.config.logging);

    let services = bootstrap::build_services(&config)?;

    let summary = services.index.ensure_ready().await?;
    info!(
        origin = ?summary.origin,
        documents = summary.documents,
        chunks = summary.chunks,
        storage = %summary.storage,
        "index ready"
    );

    let addr = SocketAddr::new(
        config.config.server.host.parse()?,
        config.config.server.port,
    );
    let app = create_router(AppState::new(services, config));

    info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
