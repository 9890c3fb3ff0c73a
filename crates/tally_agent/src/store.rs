//! Ledger abstraction used by the orchestrator.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tally_protocol::{Aggregate, Query, Update, Version};

/// Versioned read/write primitives over the ledger.
///
/// The orchestrator holds one store for the whole run and passes it into
/// every call; implementations own their connection or pool.
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads the ledger's current version.
    async fn current_version(&self) -> SyncResult<Version>;

    /// Applies one update. Callers sequence these calls.
    async fn apply_update(&self, update: &Update) -> SyncResult<()>;

    /// One-time preparation before queries run (e.g. refreshing views).
    async fn prepare_for_queries(&self) -> SyncResult<()>;

    /// Evaluates one aggregate query. Zero matching rows is a valid
    /// aggregate, not an error.
    async fn run_aggregate_query(&self, query: &Query) -> SyncResult<Aggregate>;
}

/// A call observed by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `current_version`.
    CurrentVersion,
    /// `apply_update` for the given version.
    ApplyUpdate(Version),
    /// `prepare_for_queries`.
    Prepare,
    /// `run_aggregate_query` for the given query id.
    Aggregate(String),
}

/// An in-memory ledger for testing.
///
/// Applying an update records it and advances the version. Failures,
/// latency and mid-batch version drift can be injected; the number of
/// concurrently running aggregate queries is tracked.
#[derive(Debug)]
pub struct MemoryStore {
    version: Mutex<Version>,
    applied: Mutex<Vec<Update>>,
    aggregates: Mutex<HashMap<String, Aggregate>>,
    failing_updates: Mutex<HashMap<Version, String>>,
    failing_queries: Mutex<HashMap<String, String>>,
    version_failure: Mutex<Option<String>>,
    prepare_failure: Mutex<Option<String>>,
    query_latency: Mutex<Duration>,
    drift_on_query: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<StoreCall>>,
}

impl MemoryStore {
    /// Creates a store at version 0.
    pub fn new() -> Self {
        Self::at_version(Version::new(0))
    }

    /// Creates a store at the given version.
    pub fn at_version(version: Version) -> Self {
        Self {
            version: Mutex::new(version),
            applied: Mutex::new(Vec::new()),
            aggregates: Mutex::new(HashMap::new()),
            failing_updates: Mutex::new(HashMap::new()),
            failing_queries: Mutex::new(HashMap::new()),
            version_failure: Mutex::new(None),
            prepare_failure: Mutex::new(None),
            query_latency: Mutex::new(Duration::ZERO),
            drift_on_query: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sets the aggregate returned for a query id. Unknown ids evaluate to
    /// a count of zero.
    pub fn set_aggregate(&self, query_id: impl Into<String>, aggregate: Aggregate) {
        self.aggregates.lock().insert(query_id.into(), aggregate);
    }

    /// Makes the update for `version` fail.
    pub fn fail_update(&self, version: Version, reason: impl Into<String>) {
        self.failing_updates.lock().insert(version, reason.into());
    }

    /// Makes the query with `query_id` fail.
    pub fn fail_query(&self, query_id: impl Into<String>, reason: impl Into<String>) {
        self.failing_queries.lock().insert(query_id.into(), reason.into());
    }

    /// Makes version reads fail.
    pub fn fail_version(&self, reason: impl Into<String>) {
        *self.version_failure.lock() = Some(reason.into());
    }

    /// Makes preparation fail.
    pub fn fail_prepare(&self, reason: impl Into<String>) {
        *self.prepare_failure.lock() = Some(reason.into());
    }

    /// Delays every aggregate query by `latency`.
    pub fn set_query_latency(&self, latency: Duration) {
        *self.query_latency.lock() = latency;
    }

    /// Advances the version by one on every aggregate query.
    pub fn drift_version_on_query(&self, enabled: bool) {
        self.drift_on_query.store(enabled, Ordering::SeqCst);
    }

    /// Current version without recording a call.
    pub fn version(&self) -> Version {
        *self.version.lock()
    }

    /// Updates applied so far, in order.
    pub fn applied_updates(&self) -> Vec<Update> {
        self.applied.lock().clone()
    }

    /// Highest number of aggregate queries observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Calls observed so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Number of `prepare_for_queries` calls observed.
    pub fn prepare_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| **call == StoreCall::Prepare)
            .count()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().push(call);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn current_version(&self) -> SyncResult<Version> {
        self.record(StoreCall::CurrentVersion);
        if let Some(reason) = self.version_failure.lock().clone() {
            return Err(SyncError::Ledger(reason));
        }
        Ok(self.version())
    }

    async fn apply_update(&self, update: &Update) -> SyncResult<()> {
        self.record(StoreCall::ApplyUpdate(update.version));
        if let Some(reason) = self.failing_updates.lock().get(&update.version).cloned() {
            return Err(SyncError::Ledger(reason));
        }

        self.applied.lock().push(update.clone());
        let mut version = self.version.lock();
        *version = (*version).max(update.version);
        Ok(())
    }

    async fn prepare_for_queries(&self) -> SyncResult<()> {
        self.record(StoreCall::Prepare);
        match self.prepare_failure.lock().clone() {
            Some(reason) => Err(SyncError::Ledger(reason)),
            None => Ok(()),
        }
    }

    async fn run_aggregate_query(&self, query: &Query) -> SyncResult<Aggregate> {
        self.record(StoreCall::Aggregate(query.id.clone()));

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let latency = *self.query_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.drift_on_query.load(Ordering::SeqCst) {
            let mut version = self.version.lock();
            *version = Version::new(version.get() + 1);
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(reason) = self.failing_queries.lock().get(&query.id).cloned() {
            return Err(SyncError::Ledger(reason));
        }
        Ok(self
            .aggregates
            .lock()
            .get(&query.id)
            .copied()
            .unwrap_or_else(|| Aggregate::count(0)))
    }
}
