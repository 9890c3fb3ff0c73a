//! Request and acknowledgement bodies of the hub endpoints.

use crate::version::Version;
use serde::{Deserialize, Serialize};

/// Body of `POST /updates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatesRequest {
    /// Current ledger version of the requesting agent.
    pub version: Version,
}

/// Body of `POST /queries`. Carries no fields today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueriesRequest {}

/// Answer to `POST /results`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsAck {
    /// Number of results the hub stored.
    pub received: usize,
}
