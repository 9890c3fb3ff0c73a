//! PostgreSQL-backed store.
//!
//! The ledger exposes its operations as stored functions in the `api`
//! schema; this store only calls those functions and never touches tables
//! directly.

use crate::config::LedgerConfig;
use crate::error::{SyncError, SyncResult};
use crate::store::Store;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use tally_protocol::{Aggregate, Query, Update, Version};
use tracing::debug;

const VERSION_SQL: &str = "SELECT api.version()::bigint";
const CHANGE_SQL: &str =
    "SELECT api.change(p_change_id := $1, p_statement := $2, p_signature := $3)";
const PREPARE_SQL: &str = "SELECT api.prepare()";
const AGGREGATE_SQL: &str = "SELECT numerator::bigint AS numerator, \
     denominator::bigint AS denominator, \
     count::bigint AS count \
     FROM api.aggregate(p_indicator := $1, p_clinic := $2, p_provider := $3, p_effective_date := $4::date)";

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Ledger(err.to_string())
    }
}

/// A store backed by a PostgreSQL connection pool.
///
/// The pool is the session shared by every call of a run; aggregate
/// queries running in parallel each borrow their own connection.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool for the given ledger.
    pub async fn connect(config: &LedgerConfig) -> SyncResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(connect_options(config))
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn connect_options(config: &LedgerConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .password(&config.password)
        .application_name("tally")
}

#[async_trait]
impl Store for PgStore {
    async fn current_version(&self) -> SyncResult<Version> {
        let version: Option<i64> = sqlx::query_scalar(VERSION_SQL)
            .fetch_one(&self.pool)
            .await?;
        debug!(?version, "ledger version read");
        version
            .map(Version::new)
            .ok_or_else(|| SyncError::Ledger("ledger reported no version".into()))
    }

    async fn apply_update(&self, update: &Update) -> SyncResult<()> {
        let accepted: Option<bool> = sqlx::query_scalar(CHANGE_SQL)
            .bind(update.version.get())
            .bind(&update.statement)
            .bind(&update.signature)
            .fetch_one(&self.pool)
            .await?;
        debug!(version = %update.version, ?accepted, "ledger change applied");

        match accepted {
            Some(true) => Ok(()),
            _ => Err(SyncError::Ledger(format!(
                "ledger rejected update {}",
                update.version
            ))),
        }
    }

    async fn prepare_for_queries(&self) -> SyncResult<()> {
        sqlx::query(PREPARE_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn run_aggregate_query(&self, query: &Query) -> SyncResult<Aggregate> {
        let rows = sqlx::query(AGGREGATE_SQL)
            .bind(&query.indicator)
            .bind(&query.clinic)
            .bind(&query.provider)
            .bind(&query.effective_date)
            .fetch_all(&self.pool)
            .await?;

        // api.aggregate signals failure by returning no rows.
        match rows.as_slice() {
            [row] => Ok(Aggregate {
                numerator: row.try_get("numerator")?,
                denominator: row.try_get("denominator")?,
                count: row.try_get("count")?,
            }),
            [] => Err(SyncError::Ledger(format!(
                "aggregate for indicator {} returned no rows",
                query.indicator
            ))),
            more => Err(SyncError::Ledger(format!(
                "aggregate for indicator {} returned {} rows",
                query.indicator,
                more.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_options_follow_config() {
        let config = LedgerConfig::new("vault", "agent", "secret").with_address("ledger.local", 6432);
        let options = connect_options(&config);

        assert_eq!(options.get_host(), "ledger.local");
        assert_eq!(options.get_port(), 6432);
        assert_eq!(options.get_database(), Some("vault"));
        assert_eq!(options.get_username(), "agent");
    }

    #[test]
    fn sqlx_errors_become_ledger_errors() {
        let err: SyncError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, SyncError::Ledger(_)));
    }
}
