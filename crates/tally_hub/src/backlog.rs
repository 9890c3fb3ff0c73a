//! Hub-side work backlog.

use crate::error::{HubError, HubResult};
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use tally_protocol::{Query, QueryResult, Update, Version};

/// Work the hub holds for an agent.
///
/// The backlog maintains:
/// - All published updates in version order
/// - Queries not yet handed out, in arrival order
/// - Queries handed out but not yet answered
/// - Every result received
#[derive(Debug, Default)]
pub struct WorkBacklog {
    updates: RwLock<Vec<Update>>,
    queries: RwLock<VecDeque<Query>>,
    outstanding: RwLock<HashSet<String>>,
    results: RwLock<Vec<QueryResult>>,
}

impl WorkBacklog {
    /// Creates an empty backlog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes an update. Versions must strictly increase.
    pub fn publish_update(&self, update: Update) -> HubResult<()> {
        let mut updates = self.updates.write();
        if let Some(last) = updates.last() {
            if update.version <= last.version {
                return Err(HubError::InvalidRequest(format!(
                    "update {} is not newer than {}",
                    update.version, last.version
                )));
            }
        }
        updates.push(update);
        Ok(())
    }

    /// Latest published version, if any.
    pub fn latest_version(&self) -> Option<Version> {
        self.updates.read().last().map(|u| u.version)
    }

    /// Returns up to `limit` updates newer than `version`, oldest first.
    pub fn updates_after(&self, version: Version, limit: usize) -> Vec<Update> {
        self.updates
            .read()
            .iter()
            .filter(|u| u.version > version)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Adds a query to the back of the backlog.
    pub fn enqueue_query(&self, query: Query) {
        self.queries.write().push_back(query);
    }

    /// Hands out up to `limit` queries from the front of the backlog.
    pub fn take_queries(&self, limit: usize) -> Vec<Query> {
        let mut queries = self.queries.write();
        let count = limit.min(queries.len());
        let batch: Vec<Query> = queries.drain(..count).collect();

        let mut outstanding = self.outstanding.write();
        outstanding.extend(batch.iter().map(|q| q.id.clone()));
        batch
    }

    /// Stores results. Results for queries that were never handed out, or
    /// were already answered, are rejected as a whole.
    pub fn record_results(&self, results: Vec<QueryResult>) -> HubResult<usize> {
        let mut outstanding = self.outstanding.write();

        let mut seen = HashSet::new();
        for result in &results {
            let id = result.query_id();
            if !outstanding.contains(id) || !seen.insert(id) {
                return Err(HubError::InvalidRequest(format!(
                    "unexpected result for query {}",
                    id
                )));
            }
        }

        for result in &results {
            outstanding.remove(result.query_id());
        }
        let received = results.len();
        self.results.write().extend(results);
        Ok(received)
    }

    /// Number of queries not yet handed out.
    pub fn pending_queries(&self) -> usize {
        self.queries.read().len()
    }

    /// Ids of queries handed out but not answered.
    pub fn outstanding_queries(&self) -> Vec<String> {
        self.outstanding.read().iter().cloned().collect()
    }

    /// Every result received so far.
    pub fn results(&self) -> Vec<QueryResult> {
        self.results.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tally_protocol::{Aggregate, ExecutedQuery, QueryOutcome};

    fn query(id: &str) -> Query {
        Query::new(id, "indicator", "clinic", "provider", "2024-01-01")
    }

    fn result(id: &str) -> QueryResult {
        let now = Utc::now();
        ExecutedQuery::new(id, QueryOutcome::Aggregate(Aggregate::count(1)), now, now)
            .stamp(Version::new(1))
    }

    #[test]
    fn updates_served_after_version() {
        let backlog = WorkBacklog::new();
        for v in 1..=5i64 {
            backlog.publish_update(Update::new(v, format!("s{}", v), "")).unwrap();
        }

        let batch = backlog.updates_after(Version::new(2), 2);
        let versions: Vec<_> = batch.iter().map(|u| u.version.get()).collect();
        assert_eq!(versions, vec![3, 4]);
        assert!(backlog.updates_after(Version::new(5), 10).is_empty());
        assert_eq!(backlog.latest_version(), Some(Version::new(5)));
    }

    #[test]
    fn stale_update_rejected() {
        let backlog = WorkBacklog::new();
        backlog.publish_update(Update::new(3, "A", "")).unwrap();
        assert!(backlog.publish_update(Update::new(3, "B", "")).is_err());
    }

    #[test]
    fn queries_handed_out_fifo() {
        let backlog = WorkBacklog::new();
        for id in ["a", "b", "c"] {
            backlog.enqueue_query(query(id));
        }

        let batch = backlog.take_queries(2);
        assert_eq!(batch, vec![query("a"), query("b")]);
        assert_eq!(backlog.pending_queries(), 1);
        assert_eq!(backlog.outstanding_queries().len(), 2);
    }

    #[test]
    fn results_close_outstanding_queries() {
        let backlog = WorkBacklog::new();
        backlog.enqueue_query(query("a"));
        backlog.take_queries(1);

        assert_eq!(backlog.record_results(vec![result("a")]).unwrap(), 1);
        assert!(backlog.outstanding_queries().is_empty());
        assert_eq!(backlog.results().len(), 1);

        // Answering twice is rejected.
        assert!(backlog.record_results(vec![result("a")]).is_err());
    }
}
