//! Aggregate queries and their results.

use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of aggregate work issued by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    /// Hub-assigned query identifier.
    pub id: String,
    /// Name of the indicator function to evaluate.
    pub indicator: String,
    /// Clinic the indicator is evaluated for.
    pub clinic: String,
    /// Provider the indicator is evaluated for.
    pub provider: String,
    /// Effective date of the evaluation (ISO 8601 date).
    pub effective_date: String,
}

impl Query {
    /// Creates a new query.
    pub fn new(
        id: impl Into<String>,
        indicator: impl Into<String>,
        clinic: impl Into<String>,
        provider: impl Into<String>,
        effective_date: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            indicator: indicator.into(),
            clinic: clinic.into(),
            provider: provider.into(),
            effective_date: effective_date.into(),
        }
    }
}

/// Numbers produced by a successful aggregate evaluation.
///
/// A ratio indicator fills `numerator` and `denominator`, a count indicator
/// fills `count`. Zero matching rows is a valid aggregate of zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Ratio numerator.
    pub numerator: Option<i64>,
    /// Ratio denominator.
    pub denominator: Option<i64>,
    /// Plain count.
    pub count: Option<i64>,
}

impl Aggregate {
    /// A ratio aggregate.
    pub fn ratio(numerator: i64, denominator: i64) -> Self {
        Self {
            numerator: Some(numerator),
            denominator: Some(denominator),
            count: None,
        }
    }

    /// A count aggregate.
    pub fn count(count: i64) -> Self {
        Self {
            numerator: None,
            denominator: None,
            count: Some(count),
        }
    }

    /// Returns true if no field carries a value.
    pub fn is_blank(&self) -> bool {
        self.numerator.is_none() && self.denominator.is_none() && self.count.is_none()
    }
}

/// Outcome of running one query against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The ledger produced an aggregate.
    Aggregate(Aggregate),
    /// The ledger failed to evaluate the query.
    Failed(String),
}

impl QueryOutcome {
    /// Wraps an aggregate. A blank aggregate carries no answer and is
    /// reported as a failure so that results never have neither numbers nor
    /// an error.
    pub fn from_aggregate(aggregate: Aggregate) -> Self {
        if aggregate.is_blank() {
            QueryOutcome::Failed("aggregate produced no values".into())
        } else {
            QueryOutcome::Aggregate(aggregate)
        }
    }

    /// Creates a failed outcome.
    pub fn failed(message: impl Into<String>) -> Self {
        QueryOutcome::Failed(message.into())
    }

    /// Returns true for a failed outcome.
    pub fn is_failed(&self) -> bool {
        matches!(self, QueryOutcome::Failed(_))
    }
}

/// A query that has run but has not been stamped with a ledger version yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedQuery {
    /// Identifier of the query that ran.
    pub query_id: String,
    /// What the ledger returned.
    pub outcome: QueryOutcome,
    /// When execution started.
    pub execution_start: DateTime<Utc>,
    /// When execution finished.
    pub execution_end: DateTime<Utc>,
}

impl ExecutedQuery {
    /// Creates an executed query record.
    pub fn new(
        query_id: impl Into<String>,
        outcome: QueryOutcome,
        execution_start: DateTime<Utc>,
        execution_end: DateTime<Utc>,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            outcome,
            execution_start,
            execution_end,
        }
    }

    /// Stamps the record with the ledger version of its batch, producing the
    /// result reported to the hub.
    pub fn stamp(self, reported_version: Version) -> QueryResult {
        let (aggregate, error) = match self.outcome {
            QueryOutcome::Aggregate(aggregate) => (aggregate, None),
            QueryOutcome::Failed(message) => (Aggregate::default(), Some(message)),
        };

        QueryResult {
            query_id: self.query_id,
            reported_version,
            numerator: aggregate.numerator,
            denominator: aggregate.denominator,
            count: aggregate.count,
            error,
            execution_start_time: self.execution_start,
            execution_end_time: self.execution_end,
        }
    }
}

/// The result of one query as reported to the hub.
///
/// Built only through [`ExecutedQuery::stamp`]: `error` is set exactly when
/// all numeric fields are null.
///
/// Decoding enforces the same rule, so a result carrying both an error and
/// numbers, or neither, is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QueryResultWire")]
pub struct QueryResult {
    query_id: String,
    reported_version: Version,
    numerator: Option<i64>,
    denominator: Option<i64>,
    count: Option<i64>,
    error: Option<String>,
    execution_start_time: DateTime<Utc>,
    execution_end_time: DateTime<Utc>,
}

impl QueryResult {
    /// Identifier of the query this result answers.
    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    /// Ledger version at the start of the batch that produced this result.
    pub fn reported_version(&self) -> Version {
        self.reported_version
    }

    /// Ratio numerator.
    pub fn numerator(&self) -> Option<i64> {
        self.numerator
    }

    /// Ratio denominator.
    pub fn denominator(&self) -> Option<i64> {
        self.denominator
    }

    /// Plain count.
    pub fn count(&self) -> Option<i64> {
        self.count
    }

    /// Execution error, if the query failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns true if the query failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// When execution started.
    pub fn execution_start_time(&self) -> DateTime<Utc> {
        self.execution_start_time
    }

    /// When execution finished.
    pub fn execution_end_time(&self) -> DateTime<Utc> {
        self.execution_end_time
    }
}

#[derive(Deserialize)]
struct QueryResultWire {
    query_id: String,
    reported_version: Version,
    numerator: Option<i64>,
    denominator: Option<i64>,
    count: Option<i64>,
    error: Option<String>,
    execution_start_time: DateTime<Utc>,
    execution_end_time: DateTime<Utc>,
}

impl TryFrom<QueryResultWire> for QueryResult {
    type Error = String;

    fn try_from(wire: QueryResultWire) -> Result<Self, Self::Error> {
        let numbers_null =
            wire.numerator.is_none() && wire.denominator.is_none() && wire.count.is_none();
        if wire.error.is_some() != numbers_null {
            return Err(format!(
                "result for query {} must carry either an error or numbers",
                wire.query_id
            ));
        }

        Ok(Self {
            query_id: wire.query_id,
            reported_version: wire.reported_version,
            numerator: wire.numerator,
            denominator: wire.denominator,
            count: wire.count,
            error: wire.error,
            execution_start_time: wire.execution_start_time,
            execution_end_time: wire.execution_end_time,
        })
    }
}
