//! In-memory hub server.

use crate::backlog::WorkBacklog;
use crate::config::ServerConfig;
use crate::error::{HubError, HubResult};
use crate::handler::{HandlerContext, RequestHandler};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tally_protocol::{Query, QueryResult, ResultsAck, Update, UpdatesRequest};
use tracing::warn;

/// Status and body of an endpoint reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubReply {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: Vec<u8>,
}

impl HubReply {
    fn error(error: &HubError) -> Self {
        let body = serde_json::json!({ "error": error.to_string() });
        Self {
            status: error.status_code(),
            body: body.to_string().into_bytes(),
        }
    }
}

/// The hub server.
///
/// Serves updates and queries to agents and stores their results. Endpoint
/// bodies are JSON; see [`HubServer::handle_post`].
///
/// # Example
///
/// ```
/// use tally_hub::{HubServer, ServerConfig};
///
/// let server = HubServer::new(ServerConfig::default());
/// let reply = server.handle_post("/queries", b"{}");
/// assert_eq!(reply.status, 200);
/// assert_eq!(reply.body, b"[]");
/// ```
pub struct HubServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
    requests: AtomicU64,
}

impl HubServer {
    /// Creates a new hub server.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_backlog(config, Arc::new(WorkBacklog::new()))
    }

    /// Creates a hub server with an existing backlog.
    pub fn with_backlog(config: ServerConfig, backlog: Arc<WorkBacklog>) -> Self {
        let context = Arc::new(HandlerContext::new(config, backlog));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self {
            handler,
            context,
            requests: AtomicU64::new(0),
        }
    }

    /// Handles an updates request.
    pub fn handle_updates(&self, request: UpdatesRequest) -> Result<Vec<Update>, String> {
        self.handler
            .handle_updates(request)
            .map_err(|e| e.to_string())
    }

    /// Handles a queries request.
    pub fn handle_queries(&self) -> Result<Vec<Query>, String> {
        self.handler.handle_queries().map_err(|e| e.to_string())
    }

    /// Handles a results report.
    pub fn handle_results(&self, results: Vec<QueryResult>) -> Result<ResultsAck, String> {
        self.handler
            .handle_results(results)
            .map_err(|e| e.to_string())
    }

    /// Dispatches a JSON `POST` to the endpoint at `path`.
    ///
    /// `/updates` and `/queries` answer with a JSON array, empty when there
    /// is no work. `/results` answers with a [`ResultsAck`]. Failures carry
    /// the status of the [`HubError`] and a JSON `error` body.
    pub fn handle_post(&self, path: &str, body: &[u8]) -> HubReply {
        self.requests.fetch_add(1, Ordering::Relaxed);

        let outcome = match path.trim_end_matches('/') {
            "/updates" => decode(body)
                .and_then(|request| self.handler.handle_updates(request))
                .and_then(|updates| encode(&updates)),
            "/queries" => self.handler.handle_queries().and_then(|q| encode(&q)),
            "/results" => decode(body)
                .and_then(|results| self.handler.handle_results(results))
                .and_then(|ack| encode(&ack)),
            other => Err(HubError::UnknownEndpoint(other.to_string())),
        };

        match outcome {
            Ok(body) => HubReply { status: 200, body },
            Err(e) => {
                warn!(path, error = %e, "hub request failed");
                HubReply::error(&e)
            }
        }
    }

    /// Returns the shared backlog.
    pub fn backlog(&self) -> &Arc<WorkBacklog> {
        &self.context.backlog
    }

    /// Returns the number of results stored.
    pub fn result_count(&self) -> usize {
        self.context.backlog.results().len()
    }

    /// Returns the number of endpoint requests dispatched.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> HubResult<T> {
    serde_json::from_slice(body).map_err(|e| HubError::InvalidRequest(e.to_string()))
}

fn encode<T: Serialize>(value: &T) -> HubResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| HubError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tally_protocol::{Aggregate, ExecutedQuery, QueryOutcome, Version};

    #[test]
    fn server_lifecycle() {
        let server = HubServer::new(ServerConfig::default());
        assert_eq!(server.result_count(), 0);
        assert_eq!(server.request_count(), 0);
    }

    #[test]
    fn full_exchange() {
        let server = HubServer::new(ServerConfig::default());
        server
            .backlog()
            .publish_update(Update::new(1, "CREATE VIEW v AS SELECT 1", "sig"))
            .unwrap();
        server.backlog().enqueue_query(Query::new(
            "q1",
            "indicator",
            "clinic",
            "provider",
            "2024-01-01",
        ));

        // 1. Updates after the agent's version
        let reply = server.handle_post("/updates", br#"{"version":0}"#);
        assert_eq!(reply.status, 200);
        let updates: Vec<Update> = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(updates.len(), 1);

        // 2. Queries
        let reply = server.handle_post("/queries", b"{}");
        let queries: Vec<Query> = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(queries[0].id, "q1");

        // 3. Results
        let now = Utc::now();
        let result = ExecutedQuery::new("q1", QueryOutcome::Aggregate(Aggregate::ratio(1, 2)), now, now)
            .stamp(Version::new(1));
        let body = serde_json::to_vec(&vec![result]).unwrap();
        let reply = server.handle_post("/results", &body);
        assert_eq!(reply.status, 200);
        let ack: ResultsAck = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(ack.received, 1);

        assert_eq!(server.result_count(), 1);
        assert_eq!(server.request_count(), 3);
    }

    #[test]
    fn unknown_path_is_not_found() {
        let server = HubServer::new(ServerConfig::default());
        assert_eq!(server.handle_post("/nope", b"{}").status, 404);
    }

    #[test]
    fn malformed_body_is_bad_request() {
        let server = HubServer::new(ServerConfig::default());
        let reply = server.handle_post("/updates", b"not json");
        assert_eq!(reply.status, 400);
        assert!(String::from_utf8_lossy(&reply.body).contains("error"));
    }

    #[test]
    fn shared_backlog() {
        let backlog = Arc::new(WorkBacklog::new());
        let server = HubServer::with_backlog(ServerConfig::default(), Arc::clone(&backlog));

        backlog.enqueue_query(Query::new("q", "i", "c", "p", "2024-01-01"));
        assert_eq!(server.handle_queries().unwrap().len(), 1);
        assert_eq!(backlog.pending_queries(), 0);
    }
}
