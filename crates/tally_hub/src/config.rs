//! Hub configuration.

use crate::error::{HubError, HubResult};
use std::num::NonZeroUsize;

/// Configuration for the hub.
///
/// Batch limits are never zero: a zero limit would make every answer empty,
/// which agents read as "no work pending".
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum updates returned per `/updates` request.
    pub max_update_batch: NonZeroUsize,
    /// Maximum queries handed out per `/queries` request.
    pub max_query_batch: NonZeroUsize,
}

impl ServerConfig {
    /// Creates a new hub configuration.
    pub fn new() -> Self {
        Self {
            max_update_batch: NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN),
            max_query_batch: NonZeroUsize::new(50).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Sets the maximum update batch size.
    pub fn with_max_update_batch(mut self, size: usize) -> HubResult<Self> {
        self.max_update_batch = batch_limit("max_update_batch", size)?;
        Ok(self)
    }

    /// Sets the maximum query batch size.
    pub fn with_max_query_batch(mut self, size: usize) -> HubResult<Self> {
        self.max_query_batch = batch_limit("max_query_batch", size)?;
        Ok(self)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn batch_limit(name: &str, size: usize) -> HubResult<NonZeroUsize> {
    NonZeroUsize::new(size).ok_or_else(|| HubError::Config(format!("{} must be at least 1", name)))
}
