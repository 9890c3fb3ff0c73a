//! # Tally Protocol
//!
//! Data types shared by the tally agent, the hub and the ledger.
//!
//! This crate provides:
//! - `Version` for ledger state markers
//! - `Update` for schema mutations pulled from the hub
//! - `Query`, `ExecutedQuery` and `QueryResult` for aggregate work
//! - `Batch` for the "items or nothing left" answer of a hub request
//! - Request and acknowledgement bodies of the hub endpoints
//!
//! This is a pure protocol crate with no I/O operations. All wire shapes are
//! JSON, encoded with `serde`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod messages;
mod query;
mod update;
mod version;

pub use batch::Batch;
pub use messages::{QueriesRequest, ResultsAck, UpdatesRequest};
pub use query::{Aggregate, ExecutedQuery, Query, QueryOutcome, QueryResult};
pub use update::Update;
pub use version::Version;
