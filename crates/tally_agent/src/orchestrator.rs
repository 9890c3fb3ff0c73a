//! Sync orchestrator state machine.

use crate::config::AgentConfig;
use crate::coordinator::Coordinator;
use crate::error::{SyncError, SyncResult};
use crate::store::Store;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tally_protocol::{Batch, ExecutedQuery, Query, QueryOutcome, QueryResult, Update};
use tracing::{debug, error, info, warn};

/// The current state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not started.
    Init,
    /// Applying updates from the hub.
    UpdateSync,
    /// Asking the hub whether any queries are pending.
    ProbeQueries,
    /// Preparing the ledger for query workloads.
    Prepare,
    /// Executing and reporting queries.
    QuerySync,
    /// Finished successfully.
    Done,
    /// Finished with a fatal error.
    Error,
}

impl RunState {
    /// Returns true if the run is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunState::UpdateSync | RunState::ProbeQueries | RunState::Prepare | RunState::QuerySync
        )
    }

    /// Returns true for `Done` and `Error`. Neither can be left.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Error)
    }

    /// Returns true if `next` may follow this state.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Done, _) | (Error, _) => false,
            (_, Error) => true,
            (Init, UpdateSync)
            | (UpdateSync, ProbeQueries)
            | (ProbeQueries, Prepare)
            | (ProbeQueries, Done)
            | (Prepare, QuerySync)
            | (QuerySync, Done) => true,
            _ => false,
        }
    }
}

/// Counters kept while a run progresses.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Updates applied to the ledger.
    pub updates_applied: u64,
    /// Non-empty update batches received.
    pub update_batches: u64,
    /// Queries executed, failed ones included.
    pub queries_executed: u64,
    /// Queries whose result carries an error.
    pub queries_failed: u64,
    /// Query batches reported to the hub.
    pub query_batches: u64,
    /// Last fatal error message.
    pub last_error: Option<String>,
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Both loops drained their backlog.
    Completed,
    /// The query probe found nothing; the ledger was not prepared.
    NoQueries,
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Updates applied.
    pub updates_applied: u64,
    /// Update batches applied.
    pub update_batches: u64,
    /// Queries executed.
    pub queries_executed: u64,
    /// Queries that failed.
    pub queries_failed: u64,
    /// Query batches reported.
    pub query_batches: u64,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

/// Drives the ledger to convergence with the hub.
///
/// One orchestrator performs one run: `Init → UpdateSync → ProbeQueries →
/// Prepare → QuerySync → Done`, or `Error` from any active state. Scheduling
/// the next run is left to the caller.
pub struct Orchestrator<C: Coordinator, S: Store> {
    config: AgentConfig,
    coordinator: Arc<C>,
    store: Arc<S>,
    state: RwLock<RunState>,
    stats: RwLock<SyncStats>,
}

impl<C: Coordinator, S: Store> Orchestrator<C, S> {
    /// Creates a new orchestrator.
    pub fn new(config: AgentConfig, coordinator: C, store: S) -> Self {
        Self::with_shared(config, Arc::new(coordinator), Arc::new(store))
    }

    /// Creates an orchestrator over collaborators the caller keeps handles to.
    pub fn with_shared(config: AgentConfig, coordinator: Arc<C>, store: Arc<S>) -> Self {
        Self {
            config,
            coordinator,
            store,
            state: RwLock::new(RunState::Init),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> RunState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// The coordinator in use.
    pub fn coordinator(&self) -> &C {
        &self.coordinator
    }

    /// The store in use.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn transition(&self, next: RunState) -> SyncResult<()> {
        let mut state = self.state.write();
        if !state.can_transition_to(next) {
            return Err(SyncError::InvalidStateTransition {
                from: format!("{:?}", *state),
                to: format!("{:?}", next),
            });
        }
        debug!(from = ?*state, to = ?next, "run state transition");
        *state = next;
        Ok(())
    }

    /// Performs a full run: updates, query probe, preparation, queries.
    ///
    /// Any error is fatal: the orchestrator ends in [`RunState::Error`] and
    /// cannot be run again.
    pub async fn run(&self) -> SyncResult<RunReport> {
        let start = Instant::now();
        let max_parallel = self.config.max_parallel_queries;
        info!(max_parallel = max_parallel.get(), "sync run started");

        self.transition(RunState::UpdateSync)?;

        match self.drive(max_parallel).await {
            Ok(outcome) => {
                self.transition(RunState::Done)?;
                let stats = self.stats();
                let report = RunReport {
                    outcome,
                    updates_applied: stats.updates_applied,
                    update_batches: stats.update_batches,
                    queries_executed: stats.queries_executed,
                    queries_failed: stats.queries_failed,
                    query_batches: stats.query_batches,
                    duration: start.elapsed(),
                };
                info!(
                    outcome = ?report.outcome,
                    elapsed_sec = report.duration.as_secs_f64(),
                    "sync run finished"
                );
                Ok(report)
            }
            Err(e) => {
                self.handle_error(&e);
                error!(
                    state = ?self.state(),
                    error = %e,
                    elapsed_sec = start.elapsed().as_secs_f64(),
                    "sync run failed"
                );
                Err(e)
            }
        }
    }

    async fn drive(&self, max_parallel: NonZeroUsize) -> SyncResult<RunOutcome> {
        self.sync_updates().await?;

        self.transition(RunState::ProbeQueries)?;
        let first_batch = match self.coordinator.request_queries().await? {
            Batch::Empty => {
                info!("no queries pending, skipping preparation");
                return Ok(RunOutcome::NoQueries);
            }
            Batch::Items(queries) => queries,
        };

        self.transition(RunState::Prepare)?;
        let start = Instant::now();
        self.store.prepare_for_queries().await?;
        info!(elapsed_sec = start.elapsed().as_secs_f64(), "ledger prepared for queries");

        self.transition(RunState::QuerySync)?;
        self.query_loop(max_parallel, Some(first_batch)).await?;

        Ok(RunOutcome::Completed)
    }

    /// Applies update batches until the hub has none left.
    ///
    /// Returns the number of updates applied. A failing update aborts the
    /// loop; updates applied before it stay committed and nothing after it
    /// is attempted.
    pub async fn sync_updates(&self) -> SyncResult<u64> {
        let start = Instant::now();
        info!("update sync started");

        let mut applied = 0u64;
        loop {
            match self.update_batch().await {
                Ok(Some(count)) => applied += count,
                Ok(None) => break,
                Err(e) => {
                    error!(
                        error = %e,
                        applied,
                        elapsed_sec = start.elapsed().as_secs_f64(),
                        "update sync failed"
                    );
                    return Err(e);
                }
            }
        }

        info!(applied, elapsed_sec = start.elapsed().as_secs_f64(), "update sync finished");
        Ok(applied)
    }

    /// Performs one update batch. Returns `None` when the hub has no updates.
    async fn update_batch(&self) -> SyncResult<Option<u64>> {
        let start = Instant::now();

        let version = self.store.current_version().await?;
        let updates = match self.coordinator.request_updates(version).await? {
            Batch::Empty => {
                info!(%version, elapsed_sec = start.elapsed().as_secs_f64(), "no updates pending");
                return Ok(None);
            }
            Batch::Items(updates) => updates,
        };

        info!(%version, num_updates = updates.len(), "applying update batch");
        self.apply_updates(&updates).await?;
        self.stats.write().update_batches += 1;

        info!(
            %version,
            num_updates = updates.len(),
            elapsed_sec = start.elapsed().as_secs_f64(),
            "update batch applied"
        );
        Ok(Some(updates.len() as u64))
    }

    /// Applies updates one at a time in the order given.
    async fn apply_updates(&self, updates: &[Update]) -> SyncResult<()> {
        for update in updates {
            debug!(version = %update.version, "applying update");
            self.store
                .apply_update(update)
                .await
                .map_err(|source| SyncError::UpdateFailed {
                    version: update.version,
                    source: Box::new(source),
                })?;
            self.stats.write().updates_applied += 1;
        }
        Ok(())
    }

    /// Executes and reports query batches until the hub has none left.
    ///
    /// At most `max_parallel` queries of a batch run at once. Returns the
    /// number of queries executed.
    pub async fn sync_queries(&self, max_parallel: NonZeroUsize) -> SyncResult<u64> {
        self.query_loop(max_parallel, None).await
    }

    /// Query loop. `pending` is a batch already fetched by the probe; it is
    /// executed first instead of being requested again.
    async fn query_loop(
        &self,
        max_parallel: NonZeroUsize,
        mut pending: Option<Vec<Query>>,
    ) -> SyncResult<u64> {
        let start = Instant::now();
        info!(max_parallel = max_parallel.get(), "query sync started");

        let mut executed = 0u64;
        loop {
            match self.query_batch(max_parallel, pending.take()).await {
                Ok(Some(count)) => executed += count,
                Ok(None) => break,
                Err(e) => {
                    error!(
                        error = %e,
                        executed,
                        elapsed_sec = start.elapsed().as_secs_f64(),
                        "query sync failed"
                    );
                    return Err(e);
                }
            }
        }

        info!(executed, elapsed_sec = start.elapsed().as_secs_f64(), "query sync finished");
        Ok(executed)
    }

    /// Performs one query batch: read version, fetch, execute, stamp, report.
    /// Returns `None` when the hub has no queries.
    async fn query_batch(
        &self,
        max_parallel: NonZeroUsize,
        pending: Option<Vec<Query>>,
    ) -> SyncResult<Option<u64>> {
        let start = Instant::now();

        let version = self.store.current_version().await?;
        let queries = match pending {
            Some(queries) => queries,
            None => match self.coordinator.request_queries().await? {
                Batch::Empty => {
                    info!(elapsed_sec = start.elapsed().as_secs_f64(), "no queries pending");
                    return Ok(None);
                }
                Batch::Items(queries) => queries,
            },
        };

        info!(%version, num_queries = queries.len(), "executing query batch");
        let results: Vec<QueryResult> = self
            .execute_queries(queries, max_parallel)
            .await
            .into_iter()
            .map(|executed| executed.stamp(version))
            .collect();

        let failed = results.iter().filter(|result| result.is_error()).count() as u64;
        let count = results.len() as u64;

        self.coordinator.send_results(&results).await?;

        {
            let mut stats = self.stats.write();
            stats.queries_executed += count;
            stats.queries_failed += failed;
            stats.query_batches += 1;
        }

        info!(
            %version,
            num_results = count,
            failed,
            elapsed_sec = start.elapsed().as_secs_f64(),
            "query batch reported"
        );
        Ok(Some(count))
    }

    /// Runs every query with at most `max_parallel` in flight. Results come
    /// back in completion order.
    async fn execute_queries(
        &self,
        queries: Vec<Query>,
        max_parallel: NonZeroUsize,
    ) -> Vec<ExecutedQuery> {
        stream::iter(queries)
            .map(|query| self.execute_query(query))
            .buffer_unordered(max_parallel.get())
            .collect::<Vec<_>>()
            .await
    }

    /// Runs one query. Failures are captured in the outcome so that one bad
    /// query does not stop the batch.
    async fn execute_query(&self, query: Query) -> ExecutedQuery {
        let started = Utc::now();
        let outcome = match self.store.run_aggregate_query(&query).await {
            Ok(aggregate) => QueryOutcome::from_aggregate(aggregate),
            Err(e) => {
                warn!(query_id = %query.id, indicator = %query.indicator, error = %e, "query failed");
                QueryOutcome::failed(e.to_string())
            }
        };
        ExecutedQuery::new(query.id, outcome, started, Utc::now())
    }

    /// Handles an error by updating state and stats.
    fn handle_error(&self, error: &SyncError) {
        *self.state.write() = RunState::Error;
        self.stats.write().last_error = Some(error.to_string());
    }
}
