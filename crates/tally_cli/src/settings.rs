//! Layered configuration: CLI flags, environment, TOML file, defaults.

use serde::Deserialize;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::logging::LogFile;
use tally_agent::{AgentConfig, HubConfig, LedgerConfig};
use thiserror::Error;
use url::Url;

/// Prefix of every environment variable read by the agent.
pub const ENV_PREFIX: &str = "TALLY_";

const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required value was not set by any source.
    #[error("missing required setting `{key}` (set it in the config file or {env})")]
    Missing {
        /// Dotted key in the config file.
        key: &'static str,
        /// Environment variable that also sets it.
        env: String,
    },

    /// A value was set but could not be used.
    #[error("invalid setting `{key}`: {reason}")]
    Invalid {
        /// Dotted key in the config file.
        key: &'static str,
        /// What is wrong with the value.
        reason: String,
    },

    /// The config file could not be read.
    #[error("failed to read configuration {path}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse configuration {path}")]
    Parse {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// The `.env` file exists but is malformed.
    #[error("failed to load .env file")]
    Dotenv(#[from] dotenvy::Error),
}

/// Raw configuration as written in the TOML file.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Orchestrator settings.
    #[serde(default)]
    pub agent: FileAgentConfig,
    /// Ledger database settings.
    #[serde(default)]
    pub ledger: FileLedgerConfig,
    /// Hub settings.
    #[serde(default)]
    pub hub: FileHubConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: FileLogConfig,
}

/// `[agent]` table.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileAgentConfig {
    /// Concurrency ceiling for query execution.
    pub max_parallel_queries: Option<usize>,
}

/// `[ledger]` table.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileLedgerConfig {
    /// Database host.
    pub host: Option<String>,
    /// Database port.
    pub port: Option<u16>,
    /// Database name.
    pub database: Option<String>,
    /// Login role.
    pub user: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Pool size.
    pub max_connections: Option<u32>,
    /// Connection acquire timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
}

/// `[hub]` table.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileHubConfig {
    /// Base URL of the hub endpoints.
    pub base_url: Option<String>,
    /// Extra trusted root certificate.
    pub ca_file: Option<PathBuf>,
    /// Client certificate.
    pub cert_file: Option<PathBuf>,
    /// Client private key.
    pub key_file: Option<PathBuf>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// `[log]` table.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileLogConfig {
    /// Default filter directive, e.g. `info` or `tally_agent=debug`.
    pub level: Option<String>,
    /// Log file written next to the console output.
    pub file: Option<PathBuf>,
    /// Size at which the log file is rotated.
    pub max_size_bytes: Option<u64>,
    /// Log files kept, the active one included.
    pub max_files: Option<usize>,
}

impl FileConfig {
    /// Reads and parses a TOML config file.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Values taken from `TALLY_*` environment variables.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    /// `TALLY_CONFIG`
    pub config_path: Option<PathBuf>,
    /// `TALLY_LOG_LEVEL`
    pub log_level: Option<String>,
    /// `TALLY_LOG_FILE`
    pub log_file: Option<PathBuf>,
    /// `TALLY_MAX_PARALLEL_QUERIES`
    pub max_parallel_queries: Option<String>,
    /// `TALLY_LEDGER_HOST`
    pub ledger_host: Option<String>,
    /// `TALLY_LEDGER_PORT`
    pub ledger_port: Option<String>,
    /// `TALLY_LEDGER_DATABASE`
    pub ledger_database: Option<String>,
    /// `TALLY_LEDGER_USER`
    pub ledger_user: Option<String>,
    /// `TALLY_LEDGER_PASSWORD`
    pub ledger_password: Option<String>,
    /// `TALLY_LEDGER_MAX_CONNECTIONS`
    pub ledger_max_connections: Option<String>,
    /// `TALLY_LEDGER_CONNECT_TIMEOUT_SECS`
    pub ledger_connect_timeout_secs: Option<String>,
    /// `TALLY_HUB_BASE_URL`
    pub hub_base_url: Option<String>,
    /// `TALLY_HUB_CA_FILE`
    pub hub_ca_file: Option<PathBuf>,
    /// `TALLY_HUB_CERT_FILE`
    pub hub_cert_file: Option<PathBuf>,
    /// `TALLY_HUB_KEY_FILE`
    pub hub_key_file: Option<PathBuf>,
    /// `TALLY_HUB_TIMEOUT_SECS`
    pub hub_timeout_secs: Option<String>,
}

impl EnvConfig {
    /// Reads the process environment.
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads variables through `lookup`, which receives the full variable
    /// name. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, suffix)).filter(|value| !value.trim().is_empty())
        };

        Self {
            config_path: var("CONFIG").map(PathBuf::from),
            log_level: var("LOG_LEVEL"),
            log_file: var("LOG_FILE").map(PathBuf::from),
            max_parallel_queries: var("MAX_PARALLEL_QUERIES"),
            ledger_host: var("LEDGER_HOST"),
            ledger_port: var("LEDGER_PORT"),
            ledger_database: var("LEDGER_DATABASE"),
            ledger_user: var("LEDGER_USER"),
            ledger_password: var("LEDGER_PASSWORD"),
            ledger_max_connections: var("LEDGER_MAX_CONNECTIONS"),
            ledger_connect_timeout_secs: var("LEDGER_CONNECT_TIMEOUT_SECS"),
            hub_base_url: var("HUB_BASE_URL"),
            hub_ca_file: var("HUB_CA_FILE").map(PathBuf::from),
            hub_cert_file: var("HUB_CERT_FILE").map(PathBuf::from),
            hub_key_file: var("HUB_KEY_FILE").map(PathBuf::from),
            hub_timeout_secs: var("HUB_TIMEOUT_SECS"),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// `--config`
    pub config_path: Option<PathBuf>,
    /// `--max-parallel`
    pub max_parallel_queries: Option<usize>,
    /// `--verbose`
    pub verbose: bool,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Orchestrator settings.
    pub agent: AgentConfig,
    /// Ledger connection.
    pub ledger: LedgerConfig,
    /// Hub connection.
    pub hub: HubConfig,
    /// Default log filter directive.
    pub log_level: String,
    /// Log file written next to the console, if any.
    pub log_file: Option<LogFile>,
    /// Config file the settings were read from, if any.
    pub source: Option<PathBuf>,
}

impl Settings {
    /// Loads `.env`, the environment and the config file, then applies the
    /// command line on top.
    pub fn load(cli: &CliOverrides) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) | Err(dotenvy::Error::Io(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let env = EnvConfig::gather();
        let path = cli.config_path.clone().or_else(|| env.config_path.clone());
        let file = match &path {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };

        let mut settings = Self::resolve(cli, &env, file)?;
        settings.source = path;
        Ok(settings)
    }

    /// Merges the sources. Command line wins over the environment, which
    /// wins over the file, which wins over defaults.
    pub fn resolve(
        cli: &CliOverrides,
        env: &EnvConfig,
        file: FileConfig,
    ) -> Result<Self, ConfigError> {
        let FileConfig {
            agent: file_agent,
            ledger: file_ledger,
            hub: file_hub,
            log: file_log,
        } = file;

        let max_parallel = match cli.max_parallel_queries {
            Some(n) => Some(n),
            None => parse_env("agent.max_parallel_queries", &env.max_parallel_queries)?
                .or(file_agent.max_parallel_queries),
        };
        let agent = match max_parallel {
            Some(n) => AgentConfig::new(NonZeroUsize::new(n).ok_or(ConfigError::Invalid {
                key: "agent.max_parallel_queries",
                reason: "must be at least 1".into(),
            })?),
            None => AgentConfig::default(),
        };

        let database = required(
            "ledger.database",
            "LEDGER_DATABASE",
            env.ledger_database.clone().or(file_ledger.database),
        )?;
        let user = required(
            "ledger.user",
            "LEDGER_USER",
            env.ledger_user.clone().or(file_ledger.user),
        )?;
        let password = required(
            "ledger.password",
            "LEDGER_PASSWORD",
            env.ledger_password.clone().or(file_ledger.password),
        )?;

        let mut ledger = LedgerConfig::new(database, user, password);
        let host = env
            .ledger_host
            .clone()
            .or(file_ledger.host)
            .unwrap_or_else(|| ledger.host.clone());
        let port = parse_env::<u16>("ledger.port", &env.ledger_port)?
            .or(file_ledger.port)
            .unwrap_or(ledger.port);
        ledger = ledger.with_address(host, port);
        // Every parallel query holds a pooled connection.
        let max_parallel = agent.max_parallel_queries.get();
        match parse_env::<u32>("ledger.max_connections", &env.ledger_max_connections)?
            .or(file_ledger.max_connections)
        {
            Some(max) if (max as usize) < max_parallel => {
                return Err(ConfigError::Invalid {
                    key: "ledger.max_connections",
                    reason: format!(
                        "{} connections cannot serve {} parallel queries",
                        max, max_parallel
                    ),
                });
            }
            Some(max) => ledger = ledger.with_max_connections(max),
            None if (ledger.max_connections as usize) < max_parallel => {
                let max = u32::try_from(max_parallel).unwrap_or(u32::MAX);
                ledger = ledger.with_max_connections(max);
            }
            None => {}
        }
        if let Some(secs) = parse_env::<u64>(
            "ledger.connect_timeout_secs",
            &env.ledger_connect_timeout_secs,
        )?
        .or(file_ledger.connect_timeout_secs)
        {
            ledger = ledger.with_connect_timeout(Duration::from_secs(secs));
        }

        let base_url = required(
            "hub.base_url",
            "HUB_BASE_URL",
            env.hub_base_url.clone().or(file_hub.base_url),
        )?;
        validate_base_url(&base_url)?;

        let mut hub = HubConfig::new(base_url);
        hub.ca_file = env.hub_ca_file.clone().or(file_hub.ca_file);
        hub.cert_file = env.hub_cert_file.clone().or(file_hub.cert_file);
        hub.key_file = env.hub_key_file.clone().or(file_hub.key_file);
        if hub.cert_file.is_some() != hub.key_file.is_some() {
            return Err(ConfigError::Invalid {
                key: "hub.cert_file",
                reason: "cert_file and key_file must be set together".into(),
            });
        }
        if let Some(secs) =
            parse_env::<u64>("hub.timeout_secs", &env.hub_timeout_secs)?.or(file_hub.timeout_secs)
        {
            hub = hub.with_timeout(Duration::from_secs(secs));
        }

        let log_level = if cli.verbose {
            "debug".to_string()
        } else {
            env.log_level
                .clone()
                .or(file_log.level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
        };

        let log_file = match env.log_file.clone().or(file_log.file) {
            Some(path) => {
                let mut log_file = LogFile::new(path);
                if let Some(bytes) = file_log.max_size_bytes {
                    log_file.max_size_bytes = bytes;
                }
                if let Some(files) = file_log.max_files {
                    if files == 0 {
                        return Err(ConfigError::Invalid {
                            key: "log.max_files",
                            reason: "must be at least 1".into(),
                        });
                    }
                    log_file.max_files = files;
                }
                Some(log_file)
            }
            None => None,
        };

        Ok(Self {
            agent,
            ledger,
            hub,
            log_level,
            log_file,
            source: None,
        })
    }
}

impl fmt::Display for Settings {
    /// Renders the settings as TOML with the password redacted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = |p: &Option<PathBuf>| match p {
            Some(p) => format!("{:?}", p.display().to_string()),
            None => "(unset)".to_string(),
        };

        writeln!(f, "[agent]")?;
        writeln!(f, "max_parallel_queries = {}", self.agent.max_parallel_queries)?;
        writeln!(f)?;
        writeln!(f, "[ledger]")?;
        writeln!(f, "host = {:?}", self.ledger.host)?;
        writeln!(f, "port = {}", self.ledger.port)?;
        writeln!(f, "database = {:?}", self.ledger.database)?;
        writeln!(f, "user = {:?}", self.ledger.user)?;
        writeln!(f, "password = \"<redacted>\"")?;
        writeln!(f, "max_connections = {}", self.ledger.max_connections)?;
        writeln!(f, "connect_timeout_secs = {}", self.ledger.connect_timeout.as_secs())?;
        writeln!(f)?;
        writeln!(f, "[hub]")?;
        writeln!(f, "base_url = {:?}", self.hub.base_url)?;
        writeln!(f, "ca_file = {}", path(&self.hub.ca_file))?;
        writeln!(f, "cert_file = {}", path(&self.hub.cert_file))?;
        writeln!(f, "key_file = {}", path(&self.hub.key_file))?;
        writeln!(f, "timeout_secs = {}", self.hub.timeout.as_secs())?;
        writeln!(f)?;
        writeln!(f, "[log]")?;
        writeln!(f, "level = {:?}", self.log_level)?;
        match &self.log_file {
            Some(log) => {
                writeln!(f, "file = {:?}", log.path.display().to_string())?;
                writeln!(f, "max_size_bytes = {}", log.max_size_bytes)?;
                write!(f, "max_files = {}", log.max_files)
            }
            None => write!(f, "file = (unset)"),
        }
    }
}

fn required(
    key: &'static str,
    env_suffix: &str,
    value: Option<String>,
) -> Result<String, ConfigError> {
    value.ok_or_else(|| ConfigError::Missing {
        key,
        env: format!("{}{}", ENV_PREFIX, env_suffix),
    })
}

fn parse_env<T>(key: &'static str, value: &Option<String>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value
        .as_deref()
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: format!("{:?}: {}", raw, e),
            })
        })
        .transpose()
}

fn validate_base_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        key: "hub.base_url",
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid {
            key: "hub.base_url",
            reason: format!("unsupported scheme `{}`", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> EnvConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConfig::from_lookup(|name| vars.get(name).cloned())
    }

    fn minimal_file() -> FileConfig {
        toml::from_str(
            r#"
            [ledger]
            database = "tally"
            user = "agent"
            password = "secret"

            [hub]
            base_url = "https://hub.example.org/api"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_fill_optional_values() {
        let settings = Settings::resolve(&CliOverrides::default(), &env(&[]), minimal_file()).unwrap();

        assert_eq!(settings.agent.max_parallel_queries.get(), 5);
        assert_eq!(settings.ledger.host, "localhost");
        assert_eq!(settings.ledger.port, 5432);
        assert_eq!(settings.ledger.max_connections, 10);
        assert_eq!(settings.hub.timeout, Duration::from_secs(30));
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn missing_required_value_names_key_and_variable() {
        let mut file = minimal_file();
        file.ledger.password = None;

        let err = Settings::resolve(&CliOverrides::default(), &env(&[]), file).unwrap_err();
        match err {
            ConfigError::Missing { key, env } => {
                assert_eq!(key, "ledger.password");
                assert_eq!(env, "TALLY_LEDGER_PASSWORD");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn environment_overrides_file() {
        let env = env(&[
            ("TALLY_LEDGER_HOST", "db.internal"),
            ("TALLY_LEDGER_PORT", "6432"),
            ("TALLY_MAX_PARALLEL_QUERIES", "8"),
            ("TALLY_LOG_LEVEL", "warn"),
        ]);
        let settings = Settings::resolve(&CliOverrides::default(), &env, minimal_file()).unwrap();

        assert_eq!(settings.ledger.host, "db.internal");
        assert_eq!(settings.ledger.port, 6432);
        assert_eq!(settings.agent.max_parallel_queries.get(), 8);
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn command_line_overrides_environment() {
        let cli = CliOverrides {
            max_parallel_queries: Some(2),
            verbose: true,
            ..Default::default()
        };
        let env = env(&[("TALLY_MAX_PARALLEL_QUERIES", "8"), ("TALLY_LOG_LEVEL", "warn")]);
        let settings = Settings::resolve(&cli, &env, minimal_file()).unwrap();

        assert_eq!(settings.agent.max_parallel_queries.get(), 2);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn environment_alone_is_enough() {
        let env = env(&[
            ("TALLY_LEDGER_DATABASE", "tally"),
            ("TALLY_LEDGER_USER", "agent"),
            ("TALLY_LEDGER_PASSWORD", "secret"),
            ("TALLY_HUB_BASE_URL", "http://localhost:8080"),
        ]);
        let settings = Settings::resolve(&CliOverrides::default(), &env, FileConfig::default()).unwrap();
        assert_eq!(settings.ledger.database, "tally");
        assert_eq!(settings.hub.base_url, "http://localhost:8080");
    }

    #[test]
    fn invalid_values_rejected() {
        let cli = CliOverrides {
            max_parallel_queries: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            Settings::resolve(&cli, &env(&[]), minimal_file()),
            Err(ConfigError::Invalid { key: "agent.max_parallel_queries", .. })
        ));

        let env_port = env(&[("TALLY_LEDGER_PORT", "not-a-port")]);
        assert!(matches!(
            Settings::resolve(&CliOverrides::default(), &env_port, minimal_file()),
            Err(ConfigError::Invalid { key: "ledger.port", .. })
        ));

        let env_url = env(&[("TALLY_HUB_BASE_URL", "ftp://hub")]);
        assert!(matches!(
            Settings::resolve(&CliOverrides::default(), &env_url, minimal_file()),
            Err(ConfigError::Invalid { key: "hub.base_url", .. })
        ));
    }

    #[test]
    fn identity_requires_cert_and_key() {
        let env = env(&[("TALLY_HUB_CERT_FILE", "/certs/client.pem")]);
        assert!(matches!(
            Settings::resolve(&CliOverrides::default(), &env, minimal_file()),
            Err(ConfigError::Invalid { key: "hub.cert_file", .. })
        ));
    }

    #[test]
    fn reads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [agent]
            max_parallel_queries = 3

            [ledger]
            database = "tally"
            user = "agent"
            password = "secret"
            connect_timeout_secs = 5

            [hub]
            base_url = "https://hub.example.org"
            timeout_secs = 10

            [log]
            level = "tally_agent=debug"
            "#
        )
        .unwrap();

        let parsed = FileConfig::read(file.path()).unwrap();
        let settings = Settings::resolve(&CliOverrides::default(), &env(&[]), parsed).unwrap();

        assert_eq!(settings.agent.max_parallel_queries.get(), 3);
        assert_eq!(settings.ledger.connect_timeout, Duration::from_secs(5));
        assert_eq!(settings.hub.timeout, Duration::from_secs(10));
        assert_eq!(settings.log_level, "tally_agent=debug");
    }

    #[test]
    fn unknown_keys_and_missing_files_fail() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ledger]\ndatabse = \"typo\"").unwrap();
        assert!(matches!(
            FileConfig::read(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FileConfig::read(&dir.path().join("absent.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn pool_grows_to_parallel_queries() {
        let cli = CliOverrides {
            max_parallel_queries: Some(20),
            ..Default::default()
        };
        let settings = Settings::resolve(&cli, &env(&[]), minimal_file()).unwrap();
        assert_eq!(settings.ledger.max_connections, 20);

        // Below the default pool size the default stays.
        let settings = Settings::resolve(&CliOverrides::default(), &env(&[]), minimal_file()).unwrap();
        assert_eq!(settings.ledger.max_connections, 10);
    }

    #[test]
    fn explicit_pool_smaller_than_parallelism_rejected() {
        let cli = CliOverrides {
            max_parallel_queries: Some(20),
            ..Default::default()
        };
        let mut file = minimal_file();
        file.ledger.max_connections = Some(4);
        assert!(matches!(
            Settings::resolve(&cli, &env(&[]), file),
            Err(ConfigError::Invalid { key: "ledger.max_connections", .. })
        ));

        let env_pool = env(&[("TALLY_LEDGER_MAX_CONNECTIONS", "10")]);
        assert!(matches!(
            Settings::resolve(&cli, &env_pool, minimal_file()),
            Err(ConfigError::Invalid { key: "ledger.max_connections", .. })
        ));

        let env_pool = env(&[("TALLY_LEDGER_MAX_CONNECTIONS", "20")]);
        let settings = Settings::resolve(&cli, &env_pool, minimal_file()).unwrap();
        assert_eq!(settings.ledger.max_connections, 20);
    }

    #[test]
    fn connect_timeout_from_environment() {
        let mut file = minimal_file();
        file.ledger.connect_timeout_secs = Some(5);
        let env = env(&[("TALLY_LEDGER_CONNECT_TIMEOUT_SECS", "12")]);

        let settings = Settings::resolve(&CliOverrides::default(), &env, file).unwrap();
        assert_eq!(settings.ledger.connect_timeout, Duration::from_secs(12));
    }

    #[test]
    fn log_file_from_file_and_environment() {
        let mut file = minimal_file();
        file.log.file = Some(PathBuf::from("logs/tally.log"));
        file.log.max_files = Some(3);

        let settings = Settings::resolve(&CliOverrides::default(), &env(&[]), file.clone()).unwrap();
        let log = settings.log_file.unwrap();
        assert_eq!(log.path, PathBuf::from("logs/tally.log"));
        assert_eq!(log.max_files, 3);
        assert_eq!(log.max_size_bytes, crate::logging::DEFAULT_MAX_SIZE_BYTES);

        let log_env = env(&[("TALLY_LOG_FILE", "/var/log/tally/agent.log")]);
        let settings = Settings::resolve(&CliOverrides::default(), &log_env, file.clone()).unwrap();
        assert_eq!(
            settings.log_file.unwrap().path,
            PathBuf::from("/var/log/tally/agent.log")
        );

        file.log.max_files = Some(0);
        assert!(matches!(
            Settings::resolve(&CliOverrides::default(), &env(&[]), file),
            Err(ConfigError::Invalid { key: "log.max_files", .. })
        ));

        let settings = Settings::resolve(&CliOverrides::default(), &env(&[]), minimal_file()).unwrap();
        assert!(settings.log_file.is_none());
    }

    #[test]
    fn display_redacts_password() {
        let settings = Settings::resolve(&CliOverrides::default(), &env(&[]), minimal_file()).unwrap();
        let rendered = settings.to_string();

        assert!(rendered.contains("password = \"<redacted>\""));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("base_url = \"https://hub.example.org/api\""));
    }
}
