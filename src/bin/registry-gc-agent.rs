//! Thin process entry point: wires up the blob and manifest agents and
//! runs them until the process receives a shutdown signal.
//!
//! Deliberately minimal. CLI argument parsing and configuration loading
//! are the surrounding registry service's job; this binary reads a
//! single environment variable so the core can be exercised standalone.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use registry_gc::agent::{Agent, AgentConfig};
use registry_gc::clock::SystemClock;
use registry_gc::config::{GcConfig, PoolConfig};
use registry_gc::db;
use registry_gc::migration::Migrator;
use registry_gc::storage::StorageDriver;
use registry_gc::worker::blob::BlobWorker;
use registry_gc::worker::manifest::ManifestWorker;

/// A no-op [`StorageDriver`] so this binary runs without a real blob
/// store wired in. The surrounding service supplies its own driver when
/// it embeds this crate as a library instead of running this binary.
struct NoopStorageDriver;

#[async_trait::async_trait]
impl StorageDriver for NoopStorageDriver {
    async fn delete(&self, _digest: &registry_gc::model::Digest) -> Result<(), registry_gc::error::StorageError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let database_url =
        std::env::var("REGISTRY_GC_DATABASE_URL").context("REGISTRY_GC_DATABASE_URL must be set")?;

    let pool = db::connect(&database_url, &PoolConfig::default())
        .await
        .context("failed to connect to the database")?;

    let migrator = Migrator::new(pool.clone());
    migrator
        .ensure_schema_migrations_table()
        .await
        .context("failed to prepare schema_migrations")?;
    let applied = migrator
        .up(false)
        .await
        .context("failed to apply pending migrations")?;
    tracing::info!(applied, "migrations up to date");

    let gc_config = GcConfig::default();
    let clock = Arc::new(SystemClock);
    let cancellation = CancellationToken::new();

    let blob_worker = Arc::new(BlobWorker::new(pool.clone(), Arc::new(NoopStorageDriver), clock.clone()));
    let manifest_worker = Arc::new(ManifestWorker::new(pool.clone(), clock.clone()));

    let agent_config = AgentConfig {
        jitter_max_seconds: gc_config.jitter_max_seconds,
        no_idle_backoff: gc_config.no_idle_backoff,
    };

    let blob_agent = Agent::new(blob_worker, clock.clone(), agent_config, cancellation.clone());
    let manifest_agent = Agent::new(manifest_worker, clock, agent_config, cancellation.clone());

    let shutdown = cancellation.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });

    let (blob_result, manifest_result) = tokio::join!(blob_agent.run(), manifest_agent.run());
    blob_result.context("blob agent stopped on an unrecoverable error")?;
    manifest_result.context("manifest agent stopped on an unrecoverable error")?;

    pool.close().await;
    Ok(())
}
