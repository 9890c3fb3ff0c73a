//! # Tally Hub
//!
//! Reference in-memory hub for the tally agent.
//!
//! This crate provides:
//! - An ordered update log served by ledger version
//! - A FIFO query backlog handed out in bounded batches
//! - Storage for reported results
//! - JSON endpoint dispatch (`/updates`, `/queries`, `/results`)
//!
//! # Protocol
//!
//! 1. The agent posts its ledger version to `/updates` and receives the
//!    updates after it, or an empty array when it is current
//! 2. The agent posts to `/queries` and receives the next batch of queries,
//!    or an empty array when the backlog is drained
//! 3. The agent posts the stamped results of each batch to `/results`

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod backlog;
mod config;
mod error;
mod handler;
mod server;

pub use backlog::WorkBacklog;
pub use config::ServerConfig;
pub use error::{HubError, HubResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::{HubReply, HubServer};
