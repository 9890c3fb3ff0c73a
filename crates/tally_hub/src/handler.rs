//! Request handlers for hub endpoints.

use crate::backlog::WorkBacklog;
use crate::config::ServerConfig;
use crate::error::HubResult;
use std::sync::Arc;
use tally_protocol::{Query, QueryResult, ResultsAck, Update, UpdatesRequest};
use tracing::debug;

/// Context for request handling.
pub struct HandlerContext {
    /// Hub configuration.
    pub config: ServerConfig,
    /// Work backlog (shared across all handlers).
    pub backlog: Arc<WorkBacklog>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, backlog: Arc<WorkBacklog>) -> Self {
        Self { config, backlog }
    }
}

/// Handler for hub requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles an updates request.
    pub fn handle_updates(&self, request: UpdatesRequest) -> HubResult<Vec<Update>> {
        let limit = self.context.config.max_update_batch.get();
        let updates = self.context.backlog.updates_after(request.version, limit);
        debug!(version = request.version.get(), served = updates.len(), "updates requested");
        Ok(updates)
    }

    /// Handles a queries request.
    pub fn handle_queries(&self) -> HubResult<Vec<Query>> {
        let limit = self.context.config.max_query_batch.get();
        let queries = self.context.backlog.take_queries(limit);
        debug!(served = queries.len(), "queries requested");
        Ok(queries)
    }

    /// Handles a results report.
    pub fn handle_results(&self, results: Vec<QueryResult>) -> HubResult<ResultsAck> {
        let received = self.context.backlog.record_results(results)?;
        debug!(received, "results recorded");
        Ok(ResultsAck { received })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_protocol::Version;

    fn handler(config: ServerConfig) -> (RequestHandler, Arc<WorkBacklog>) {
        let backlog = Arc::new(WorkBacklog::new());
        let context = Arc::new(HandlerContext::new(config, Arc::clone(&backlog)));
        (RequestHandler::new(context), backlog)
    }

    #[test]
    fn updates_limited_by_config() {
        let (handler, backlog) = handler(ServerConfig::new().with_max_update_batch(2).unwrap());
        for v in 1..=3i64 {
            backlog.publish_update(Update::new(v, "stmt", "sig")).unwrap();
        }

        let request = UpdatesRequest {
            version: Version::new(0),
        };
        assert_eq!(handler.handle_updates(request).unwrap().len(), 2);
    }

    #[test]
    fn drained_backlog_serves_empty() {
        let (handler, _) = handler(ServerConfig::default());
        assert!(handler.handle_queries().unwrap().is_empty());
    }

    #[test]
    fn unknown_results_rejected() {
        use chrono::Utc;
        use tally_protocol::{ExecutedQuery, QueryOutcome};

        let (handler, _) = handler(ServerConfig::default());
        let now = Utc::now();
        let result = ExecutedQuery::new("ghost", QueryOutcome::failed("x"), now, now)
            .stamp(Version::new(1));

        assert!(handler.handle_results(vec![result]).is_err());
    }
}
