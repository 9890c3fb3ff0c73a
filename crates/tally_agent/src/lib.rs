//! # Tally Agent
//!
//! Sync agent that reconciles a local ledger with a remote hub.
//!
//! This crate provides:
//! - The `Orchestrator` state machine (init → update sync → query probe →
//!   prepare → query sync → done)
//! - `Coordinator` and `Store` abstractions over the hub and the ledger
//! - An HTTP coordinator (`reqwest`, optional mutual TLS)
//! - A PostgreSQL store (`sqlx`, feature `postgres`)
//! - Test doubles: `MockCoordinator` and `MemoryStore`
//!
//! ## Architecture
//!
//! A run first pulls schema updates from the hub and applies them to the
//! ledger strictly in order, one batch per ledger version, until the hub
//! answers with an empty batch. It then drains the hub's query backlog:
//! every batch is executed with bounded concurrency and its results are
//! stamped with the ledger version read at the start of the batch before
//! being reported.
//!
//! ## Key Invariants
//!
//! - Updates are applied sequentially and never retried; a failing update
//!   stops the run, earlier updates stay committed
//! - An empty batch ends a loop cleanly and is never an error
//! - Every query yields exactly one result, failed queries included
//! - At most `max_parallel_queries` queries run at once

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

/// Agent crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod config;
mod coordinator;
mod error;
mod http;
mod orchestrator;
#[cfg(feature = "postgres")]
mod postgres;
mod store;

pub use config::{AgentConfig, HubConfig, LedgerConfig};
pub use coordinator::{Coordinator, CoordinatorCall, MockCoordinator};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpCoordinator, HttpReply, LoopbackClient, LoopbackServer, ReqwestClient};
pub use orchestrator::{Orchestrator, RunOutcome, RunReport, RunState, SyncStats};
#[cfg(feature = "postgres")]
pub use postgres::PgStore;
pub use store::{MemoryStore, Store, StoreCall};

pub use tally_protocol::{
    Aggregate, Batch, ExecutedQuery, Query, QueryOutcome, QueryResult, Update, Version,
};
