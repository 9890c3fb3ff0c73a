//! Hub abstraction used by the orchestrator.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tally_protocol::{Batch, Query, QueryResult, Update, Version};

/// A coordinator hands out work from the hub and accepts results.
///
/// This trait abstracts the hub transport, allowing for different
/// implementations (HTTP, loopback, mock for testing, etc.). An empty batch
/// is returned as [`Batch::Empty`], never as an error.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Requests the next updates for a ledger at `version`.
    async fn request_updates(&self, version: Version) -> SyncResult<Batch<Update>>;

    /// Requests the next batch of queries.
    async fn request_queries(&self) -> SyncResult<Batch<Query>>;

    /// Reports the results of one query batch.
    async fn send_results(&self, results: &[QueryResult]) -> SyncResult<()>;
}

/// A call observed by [`MockCoordinator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorCall {
    /// `request_updates` for the given version.
    RequestUpdates(Version),
    /// `request_queries`.
    RequestQueries,
    /// `send_results` with this many results.
    SendResults(usize),
}

/// A scripted coordinator for testing.
///
/// Responses are consumed in the order they were queued. Once a queue runs
/// dry the mock answers with the empty-batch sentinel.
#[derive(Debug, Default)]
pub struct MockCoordinator {
    updates: Mutex<VecDeque<SyncResult<Vec<Update>>>>,
    queries: Mutex<VecDeque<SyncResult<Vec<Query>>>>,
    send_failure: Mutex<Option<String>>,
    sent: Mutex<Vec<Vec<QueryResult>>>,
    calls: Mutex<Vec<CoordinatorCall>>,
}

impl MockCoordinator {
    /// Creates a mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a batch of updates.
    pub fn push_updates(&self, updates: Vec<Update>) {
        self.updates.lock().push_back(Ok(updates));
    }

    /// Queues a failing update request.
    pub fn push_update_error(&self, error: SyncError) {
        self.updates.lock().push_back(Err(error));
    }

    /// Queues a batch of queries.
    pub fn push_queries(&self, queries: Vec<Query>) {
        self.queries.lock().push_back(Ok(queries));
    }

    /// Queues a failing query request.
    pub fn push_query_error(&self, error: SyncError) {
        self.queries.lock().push_back(Err(error));
    }

    /// Makes every following `send_results` fail with a transport error.
    pub fn fail_sends(&self, message: impl Into<String>) {
        *self.send_failure.lock() = Some(message.into());
    }

    /// Result batches received so far, in arrival order.
    pub fn sent_batches(&self) -> Vec<Vec<QueryResult>> {
        self.sent.lock().clone()
    }

    /// All results received so far.
    pub fn sent_results(&self) -> Vec<QueryResult> {
        self.sent.lock().iter().flatten().cloned().collect()
    }

    /// Calls observed so far.
    pub fn calls(&self) -> Vec<CoordinatorCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: CoordinatorCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Coordinator for MockCoordinator {
    async fn request_updates(&self, version: Version) -> SyncResult<Batch<Update>> {
        self.record(CoordinatorCall::RequestUpdates(version));
        let next = self.updates.lock().pop_front();
        match next {
            Some(response) => response.map(Batch::from_vec),
            None => Ok(Batch::Empty),
        }
    }

    async fn request_queries(&self) -> SyncResult<Batch<Query>> {
        self.record(CoordinatorCall::RequestQueries);
        let next = self.queries.lock().pop_front();
        match next {
            Some(response) => response.map(Batch::from_vec),
            None => Ok(Batch::Empty),
        }
    }

    async fn send_results(&self, results: &[QueryResult]) -> SyncResult<()> {
        self.record(CoordinatorCall::SendResults(results.len()));
        if let Some(message) = self.send_failure.lock().clone() {
            return Err(SyncError::transport_retryable(message));
        }
        self.sent.lock().push(results.to_vec());
        Ok(())
    }
}
