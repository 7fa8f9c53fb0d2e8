//! Rebuilds the vector index from the documents directory, replacing any
//! stored copy.

use tracing::info;
use travel_concierge::bootstrap;
use travel_concierge::infrastructure::{telemetry, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    telemetry::init_tracing(&config.config.logging);

    info!(
        documents = %config.config.rag.documents_dir.display(),
        storage = %config.config.rag.storage_dir.display(),
        "rebuilding index"
    );

    let (index, _) = bootstrap::build_index(&config)?;
    let summary = index.rebuild().await?;

    info!(
        documents = summary.documents,
        chunks = summary.chunks,
        dimension = summary.dimension,
        embedding_model = %summary.embedding_model,
        "index rebuilt"
    );
    Ok(())
}
