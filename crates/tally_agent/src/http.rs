//! HTTP coordinator implementation.
//!
//! This module provides an HTTP-based coordinator for the orchestrator.
//! The actual HTTP client is abstracted via a trait so the hub can also be
//! reached through a loopback in tests.

use crate::config::HubConfig;
use crate::coordinator::Coordinator;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tally_protocol::{
    Batch, QueriesRequest, Query, QueryResult, ResultsAck, Update, UpdatesRequest, Version,
};
use tracing::{debug, info};

/// A raw HTTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body and returns the reply.
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, String>;
}

#[async_trait]
impl<T: HttpClient + ?Sized> HttpClient for Arc<T> {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, String> {
        (**self).post_json(url, body).await
    }
}

/// HTTP-based coordinator.
///
/// Talks to three hub endpoints, each a JSON `POST`: `updates`, `queries`
/// and `results`. An empty array answer is the "nothing left" sentinel.
pub struct HttpCoordinator<C: HttpClient> {
    /// Base URL of the hub.
    base_url: String,
    /// HTTP client implementation.
    client: C,
}

impl<C: HttpClient> HttpCoordinator<C> {
    /// Creates a new HTTP coordinator.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }

    /// Posts `request` and returns the body of a 200 reply.
    async fn send<Req>(&self, name: &str, request: &Req) -> SyncResult<Vec<u8>>
    where
        Req: Serialize + Sync + ?Sized,
    {
        let body = serde_json::to_vec(request)
            .map_err(|e| SyncError::Protocol(format!("failed to encode request: {}", e)))?;

        let url = self.endpoint(name);
        debug!(%url, "posting to hub");
        let reply = self
            .client
            .post_json(&url, body)
            .await
            .map_err(SyncError::transport_retryable)?;

        if reply.status != 200 {
            return Err(SyncError::Server {
                status: reply.status,
                body: String::from_utf8_lossy(&reply.body).into_owned(),
            });
        }
        Ok(reply.body)
    }

    async fn post<Req, Res>(&self, name: &str, request: &Req) -> SyncResult<Res>
    where
        Req: Serialize + Sync + ?Sized,
        Res: DeserializeOwned,
    {
        let body = self.send(name, request).await?;
        serde_json::from_slice(&body)
            .map_err(|e| SyncError::Protocol(format!("failed to decode {} response: {}", name, e)))
    }
}

#[async_trait]
impl<C: HttpClient> Coordinator for HttpCoordinator<C> {
    async fn request_updates(&self, version: Version) -> SyncResult<Batch<Update>> {
        let updates: Option<Vec<Update>> =
            self.post("updates", &UpdatesRequest { version }).await?;
        let updates = updates.unwrap_or_default();
        info!(%version, num_updates = updates.len(), "updates received");
        Ok(Batch::from_vec(updates))
    }

    async fn request_queries(&self) -> SyncResult<Batch<Query>> {
        let queries: Option<Vec<Query>> = self.post("queries", &QueriesRequest {}).await?;
        let queries = queries.unwrap_or_default();
        info!(num_queries = queries.len(), "queries received");
        Ok(Batch::from_vec(queries))
    }

    async fn send_results(&self, results: &[QueryResult]) -> SyncResult<()> {
        let body = self.send("results", results).await?;
        // Older hubs answer with an arbitrary body; only the status matters.
        let received = serde_json::from_slice::<ResultsAck>(&body)
            .ok()
            .map(|ack| ack.received);
        info!(num_results = results.len(), ?received, "results accepted");
        Ok(())
    }
}

/// `reqwest`-backed HTTP client with optional mutual TLS.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Builds a client from the hub configuration.
    ///
    /// Reads the CA certificate and the client identity from disk when they
    /// are configured. Certificate and key may live in separate PEM files.
    pub fn new(config: &HubConfig) -> SyncResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);

        if let Some(path) = &config.ca_file {
            let pem = read_pem(path)?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| SyncError::Config(format!("invalid CA certificate {}: {}", path.display(), e)))?;
            builder = builder.add_root_certificate(cert);
        }

        match (&config.cert_file, &config.key_file) {
            (Some(cert), Some(key)) => {
                let mut pem = read_pem(cert)?;
                pem.push(b'\n');
                pem.extend(read_pem(key)?);
                let identity = reqwest::Identity::from_pem(&pem)
                    .map_err(|e| SyncError::Config(format!("invalid client identity: {}", e)))?;
                builder = builder.identity(identity);
            }
            (None, None) => {}
            _ => {
                return Err(SyncError::Config(
                    "client certificate and key must be configured together".into(),
                ))
            }
        }

        let client = builder
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wraps an existing `reqwest` client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn read_pem(path: &std::path::Path) -> SyncResult<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| SyncError::Config(format!("cannot read {}: {}", path.display(), e)))
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, String> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(HttpReply {
            status,
            body: body.to_vec(),
        })
    }
}

/// Trait for hubs that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a POST to `path` (e.g. "/updates") and returns the reply.
    fn handle_post(&self, path: &str, body: &[u8]) -> HttpReply;
}

/// A loopback HTTP client that routes requests directly to a hub.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given hub.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

#[async_trait]
impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, String> {
        let path = url
            .rfind('/')
            .map(|i| &url[i..])
            .unwrap_or(url);

        Ok(self.server.handle_post(path, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tally_protocol::{Aggregate, ExecutedQuery, QueryOutcome};

    struct TestClient {
        reply: Mutex<Option<Result<HttpReply, String>>>,
        requests: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                reply: Mutex::new(None),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn reply_with(&self, status: u16, body: &str) {
            *self.reply.lock() = Some(Ok(HttpReply {
                status,
                body: body.as_bytes().to_vec(),
            }));
        }

        fn fail_with(&self, message: &str) {
            *self.reply.lock() = Some(Err(message.to_string()));
        }
    }

    #[async_trait]
    impl HttpClient for TestClient {
        async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, String> {
            let json = serde_json::from_slice(&body).unwrap();
            self.requests.lock().push((url.to_string(), json));
            self.reply
                .lock()
                .clone()
                .unwrap_or_else(|| Err("no reply set".into()))
        }
    }

    #[tokio::test]
    async fn request_updates_posts_version() {
        let client = Arc::new(TestClient::new());
        client.reply_with(200, r#"[{"version":3,"statement":"A","signature":"s"}]"#);

        let coordinator = HttpCoordinator::new("https://hub.example.org/", Arc::clone(&client));
        let batch = coordinator.request_updates(Version::new(2)).await.unwrap();

        assert_eq!(batch.into_items().unwrap(), vec![Update::new(3, "A", "s")]);
        let requests = client.requests.lock().clone();
        assert_eq!(requests[0].0, "https://hub.example.org/updates");
        assert_eq!(requests[0].1["version"], 2);
    }

    #[tokio::test]
    async fn empty_and_null_answers_are_sentinels() {
        let client = Arc::new(TestClient::new());
        let coordinator = HttpCoordinator::new("https://hub.example.org", Arc::clone(&client));

        client.reply_with(200, "[]");
        assert!(coordinator.request_queries().await.unwrap().is_empty());

        client.reply_with(200, "null");
        assert!(coordinator.request_updates(Version::new(0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_server_error() {
        let client = Arc::new(TestClient::new());
        client.reply_with(503, "maintenance");

        let coordinator = HttpCoordinator::new("https://hub.example.org", Arc::clone(&client));
        let err = coordinator.request_queries().await.unwrap_err();
        assert!(matches!(err, SyncError::Server { status: 503, ref body } if body == "maintenance"));
    }

    #[tokio::test]
    async fn malformed_body_is_protocol_error() {
        let client = Arc::new(TestClient::new());
        client.reply_with(200, r#"{"unexpected": true}"#);

        let coordinator = HttpCoordinator::new("https://hub.example.org", Arc::clone(&client));
        let err = coordinator.request_queries().await.unwrap_err();
        assert!(matches!(err, SyncError::Protocol(_)));
    }

    #[tokio::test]
    async fn client_failure_is_transport_error() {
        let client = Arc::new(TestClient::new());
        client.fail_with("connection refused");

        let coordinator = HttpCoordinator::new("https://hub.example.org", Arc::clone(&client));
        let err = coordinator.request_queries().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn send_results_posts_array() {
        let client = Arc::new(TestClient::new());
        client.reply_with(200, r#"{"received":1}"#);

        let now = chrono::Utc::now();
        let result = ExecutedQuery::new(
            "q",
            QueryOutcome::from_aggregate(Aggregate::count(4)),
            now,
            now,
        )
        .stamp(Version::new(5));

        let coordinator = HttpCoordinator::new("https://hub.example.org", Arc::clone(&client));
        coordinator.send_results(&[result]).await.unwrap();

        let requests = client.requests.lock().clone();
        assert_eq!(requests[0].0, "https://hub.example.org/results");
        assert_eq!(requests[0].1[0]["count"], 4);
        assert_eq!(requests[0].1[0]["reported_version"], 5);
    }

    #[test]
    fn identity_requires_both_files() {
        let mut config = HubConfig::new("https://hub.example.org");
        config.cert_file = Some("client.pem".into());

        let err = ReqwestClient::new(&config).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn missing_ca_file_is_config_error() {
        let config = HubConfig::new("https://hub.example.org").with_ca_file("/nonexistent/ca.crt");
        let err = ReqwestClient::new(&config).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ca.crt"));
    }
}
