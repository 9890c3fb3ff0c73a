//! Configuration for the sync agent.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// Default ceiling on concurrently executing queries.
pub const DEFAULT_MAX_PARALLEL_QUERIES: usize = 5;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of queries executing at once within a batch.
    pub max_parallel_queries: NonZeroUsize,
}

impl AgentConfig {
    /// Creates a configuration with the given concurrency ceiling.
    pub fn new(max_parallel_queries: NonZeroUsize) -> Self {
        Self {
            max_parallel_queries,
        }
    }

    /// Sets the concurrency ceiling.
    pub fn with_max_parallel_queries(mut self, max: NonZeroUsize) -> Self {
        self.max_parallel_queries = max;
        self
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_MAX_PARALLEL_QUERIES).unwrap_or(NonZeroUsize::MIN))
    }
}

/// Connection settings for the hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Base URL of the hub (e.g., "https://hub.example.org/api").
    pub base_url: String,
    /// Extra root certificate (PEM) trusted for the hub.
    pub ca_file: Option<PathBuf>,
    /// Client certificate (PEM) presented to the hub.
    pub cert_file: Option<PathBuf>,
    /// Private key (PEM) for the client certificate.
    pub key_file: Option<PathBuf>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HubConfig {
    /// Creates a hub configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ca_file: None,
            cert_file: None,
            key_file: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Trusts an additional root certificate.
    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    /// Presents a client identity for mutual TLS.
    pub fn with_identity(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.cert_file = Some(cert.into());
        self.key_file = Some(key.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Connection settings for the ledger database.
#[derive(Clone)]
pub struct LedgerConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Login role.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Time allowed to acquire a connection.
    pub connect_timeout: Duration,
}

impl LedgerConfig {
    /// Creates a ledger configuration for `localhost:5432`.
    pub fn new(
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            database: database.into(),
            user: user.into(),
            password: password.into(),
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Sets host and port.
    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Sets the pool size.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the connection acquire timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_config_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_parallel_queries.get(), DEFAULT_MAX_PARALLEL_QUERIES);

        let config = config.with_max_parallel_queries(NonZeroUsize::new(2).unwrap());
        assert_eq!(config.max_parallel_queries.get(), 2);
    }

    #[test]
    fn hub_config_builder() {
        let config = HubConfig::new("https://hub.example.org")
            .with_ca_file("certs/ca.crt")
            .with_identity("certs/client.pem", "certs/client-key.pem")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.base_url, "https://hub.example.org");
        assert_eq!(config.ca_file, Some(PathBuf::from("certs/ca.crt")));
        assert_eq!(config.cert_file, Some(PathBuf::from("certs/client.pem")));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn ledger_config_hides_password() {
        let config = LedgerConfig::new("vault", "agent", "hunter2").with_address("db", 6543);
        assert_eq!(config.port, 6543);

        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
