//! Execution configuration

use bach_scheduler::ConflictPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for batch execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Per-batch deadline in milliseconds. When it passes, outstanding
    /// workers are cancelled and unreported transactions time out.
    /// Absent means no deadline.
    #[serde(default)]
    pub batch_timeout_ms: Option<u64>,

    /// Upper bound on groups executing at once; 0 runs every group concurrently
    #[serde(default)]
    pub max_parallel_groups: usize,

    /// Capacity of the worker → coordinator channel
    #[serde(default = "default_result_channel_capacity")]
    pub result_channel_capacity: usize,

    /// Conflict policy handed to the grouper
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

fn default_result_channel_capacity() -> usize {
    1024
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            batch_timeout_ms: None,
            max_parallel_groups: 0,
            result_channel_capacity: default_result_channel_capacity(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl ExecutionConfig {
    /// Deadline as a duration
    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_ms.map(Duration::from_millis)
    }

    /// Set the deadline
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the concurrency bound
    pub fn with_max_parallel_groups(mut self, n: usize) -> Self {
        self.max_parallel_groups = n;
        self
    }

    /// Parse from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Channel capacity, never zero
    pub(crate) fn channel_capacity(&self) -> usize {
        self.result_channel_capacity.max(1)
    }
}
