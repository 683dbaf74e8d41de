use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use receipt_numbering::{admin, InMemoryDocumentStore, Numbering, NumberingConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("receipt_numbering=info".parse()?),
        )
        .init();

    let config = NumberingConfig::from_env()?;
    let addr = std::env::var("RECEIPT_ADMIN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!(
        prefix = %config.prefix,
        fallback = ?config.fallback,
        max_retries = config.retry.max_retries,
        lock_timeout_ms = config.lock_timeout_ms,
        "starting receipt numbering admin surface"
    );

    let numbering = Arc::new(Numbering::new(InMemoryDocumentStore::new(), config));
    admin::serve(numbering, &addr).await?;
    Ok(())
}
