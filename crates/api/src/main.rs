use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use flowgraph_api::app;
use flowgraph_infra::config::AppConfig;
use flowgraph_infra::outbox::{NoopEventPublisher, OutboxProcessor, PostgresOutboxStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    flowgraph_observability::init();

    let config = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    let store = Arc::new(PostgresOutboxStore::new(pool.clone()));
    let processor = OutboxProcessor::new(
        store.clone(),
        store,
        Arc::new(NoopEventPublisher),
        config.outbox.clone(),
    );
    let processor_handle = processor.start();

    let services = Arc::new(app::services::build_services(pool, config.outbox.clone()));
    let router = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    processor_handle.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
