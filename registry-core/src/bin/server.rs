//! Registry node binary

use anyhow::Context;
use axum::Router;
use registry_core::{
    api::{self, ApiState},
    metrics::Metrics,
    spawn_sequencer, ChallengeRegistry, Config, ControlledRegistry, Journal, MemoryList,
    MirroredRegistry, RecipientSource, RegistryKind, SystemClock, Vault,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting recipient registry node");

    let config = match std::env::var("REGISTRY_CONFIG") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("loading config from {}", path))?,
        Err(_) => Config::from_env().context("loading config from environment")?,
    };

    let journal = Arc::new(Journal::open(&config).context("opening event journal")?);
    let metrics = Metrics::new()?;

    let settings = &config.registry;
    match settings.kind {
        RegistryKind::Controlled => {
            let mut registry = ControlledRegistry::new(settings.address, settings.controller);
            if settings.max_recipients > 0 {
                registry.set_max_recipients(settings.controller, settings.max_recipients)?;
            }
            run(registry, &config, journal, metrics, api::controlled_router).await
        }
        RegistryKind::Mirrored => {
            // List fed in-process; no upstream adapter is wired here
            let list = Arc::new(MemoryList::new());
            let mut registry = MirroredRegistry::new(
                settings.address,
                settings.controller,
                list,
                config.mirror.address_column,
            );
            if settings.max_recipients > 0 {
                registry.set_max_recipients(settings.controller, settings.max_recipients)?;
            }
            run(registry, &config, journal, metrics, api::mirrored_router).await
        }
        RegistryKind::Challenge => {
            let mut registry = ChallengeRegistry::new(
                settings.address,
                settings.controller,
                config.challenge.base_deposit,
                config.challenge.challenge_period_secs,
                Vault::new(),
            );
            if settings.max_recipients > 0 {
                registry.set_max_recipients(settings.controller, settings.max_recipients)?;
            }
            run(registry, &config, journal, metrics, api::challenge_router).await
        }
    }
}

/// Run the sequencer and serve its HTTP API until Ctrl-C
async fn run<R>(
    registry: R,
    config: &Config,
    journal: Arc<Journal>,
    metrics: Metrics,
    router: fn(ApiState<R>) -> Router,
) -> anyhow::Result<()>
where
    R: RecipientSource + Send + 'static,
{
    let (handle, task) = spawn_sequencer(
        registry,
        SystemClock,
        Some(journal.clone()),
        Some(metrics.clone()),
        config.sequencer.mailbox_capacity,
    );

    let app = router(ApiState::new(handle.clone(), metrics, journal.clone()));
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding HTTP listener on {}", config.listen_addr))?;

    tracing::info!(
        kind = ?config.registry.kind,
        registry = %config.registry.address,
        controller = %config.registry.controller,
        max_recipients = handle.max_recipients().await?,
        journal_sequence = journal.last_sequence(),
        addr = %config.listen_addr,
        "Registry node ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    tracing::info!("Shutting down registry node");
    handle.shutdown().await?;
    let registry = task.await?;

    tracing::info!(
        recipients = registry.recipient_count(),
        journal_sequence = journal.last_sequence(),
        "Registry node stopped"
    );
    Ok(())
}
