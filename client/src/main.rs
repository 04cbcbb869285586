//! harbor-flush - replay the local outbox against the remote service once.
//!
//! Reads configuration from the environment (and `.env`), opens the
//! file-backed store, drains every pending mutation in order and exits
//! non-zero if the drain halted on a remote failure.

use harbor_client::{
    telemetry, Config, ConfigError, ConnectivityMonitor, ConnectivityState, FileBackend,
    HttpRecordService, SyncCoordinator,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let remote_url = config
        .remote_url
        .clone()
        .ok_or(ConfigError::MissingRemoteUrl)?;

    tracing::info!(
        data_dir = %config.data_dir.display(),
        "Flushing outbox to {}",
        remote_url
    );

    let backend = Arc::new(FileBackend::new(&config.data_dir));
    let remote = Arc::new(HttpRecordService::from_config(&config)?);

    // Running this binary is the manual trigger; treat the network as up.
    let monitor = ConnectivityMonitor::new(ConnectivityState::Online);
    let coordinator = SyncCoordinator::open(backend, config.schema(), monitor, remote).await?;

    let report = coordinator.drain().await?;
    coordinator.dispose().await;

    if let Some(failure) = &report.halted {
        tracing::error!(
            op_id = %failure.op_id,
            collection = %failure.collection,
            record_id = %failure.record_id,
            remaining = report.remaining,
            "Flush halted: {}",
            failure.message
        );
        std::process::exit(1);
    }

    tracing::info!(replayed = report.replayed.len(), "Outbox flushed");
    Ok(())
}
