//! Scripted authority and client sessions over replicated item stores.
mod config;
mod script;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use config::SimConfig;
use items_runtime::{DefinitionOracleImpl, FileStoreRepository, Runtime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const BUNDLED_CATALOG: &str = include_str!("../data/items.ron");

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = SimConfig::from_env();
    setup_logging(config.log_dir.as_deref())?;

    let definitions = match &config.catalog_path {
        Some(path) => DefinitionOracleImpl::from_file(path)?,
        None => DefinitionOracleImpl::from_ron_str(BUNDLED_CATALOG)
            .context("bundled catalog is invalid")?,
    };
    tracing::info!(definitions = definitions.len(), "catalog loaded");

    let mut builder = Runtime::builder()
        .config(config.runtime.clone())
        .definitions(Arc::new(definitions))
        .stores([script::INVENTORY, script::STASH]);

    if config.enable_persistence {
        let repository = FileStoreRepository::new(&config.runtime.save_dir)?;
        tracing::info!(dir = %repository.base_dir().display(), "persistence enabled");
        builder = builder.repository(Arc::new(repository));
    }

    let runtime = builder.build().await?;
    let events = script::run(&runtime, config.enable_persistence).await?;
    tracing::info!(events, "session finished");

    runtime.shutdown().await?;
    Ok(())
}

/// Log to stderr, and to `items-sim.log` under `log_dir` when given
fn setup_logging(log_dir: Option<&Path>) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::never(dir, "items-sim.log");
            let (non_blocking_file, _guard) = tracing_appender::non_blocking(file_appender);

            // Leak the guard to keep file writer alive
            std::mem::forget(_guard);

            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking_file)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(dir) = log_dir {
        tracing::info!("Log file: {}/items-sim.log", dir.display());
    }

    Ok(())
}
