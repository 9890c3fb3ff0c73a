//! Run command implementation.

use crate::settings::Settings;
use tally_agent::{HttpCoordinator, Orchestrator, PgStore, ReqwestClient, RunReport, SyncResult};
use tracing::info;

/// Connects to the hub and the ledger and performs one sync run.
pub async fn run(settings: &Settings) -> SyncResult<RunReport> {
    let client = ReqwestClient::new(&settings.hub)?;
    let coordinator = HttpCoordinator::new(settings.hub.base_url.clone(), client);

    let store = PgStore::connect(&settings.ledger).await?;
    info!(
        host = %settings.ledger.host,
        port = settings.ledger.port,
        database = %settings.ledger.database,
        "connected to ledger"
    );

    let orchestrator = Orchestrator::new(settings.agent.clone(), coordinator, store);
    let report = orchestrator.run().await?;

    info!(
        outcome = ?report.outcome,
        updates_applied = report.updates_applied,
        queries_executed = report.queries_executed,
        queries_failed = report.queries_failed,
        elapsed_sec = report.duration.as_secs_f64(),
        "sync complete"
    );
    Ok(report)
}
