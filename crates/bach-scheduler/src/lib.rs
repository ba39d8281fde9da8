//! # bach-scheduler
//!
//! Conflict-aware grouping of a batch's transactions.
//!
//! Transactions that share a state resource key land in the same
//! [`TransactionGroup`]; distinct groups touch disjoint state and may run
//! concurrently. Grouping is pure and deterministic so every node replays the
//! same partition for the same input order.
//!
//! - [`ResourceKey`] / [`AccessSet`]: the state cells a transaction touches
//! - [`ResourceOracle`]: host-supplied mapping from transaction to access set
//! - [`Grouper`]: union-find partitioning into ordered groups

#![warn(missing_docs)]
#![warn(clippy::all)]

mod access;
mod error;
mod grouper;
mod oracle;
mod resource;

pub use access::{AccessSet, ConflictPolicy};
pub use error::{SchedulerError, SchedulerResult};
pub use grouper::{GroupId, Grouper, GroupingStats, TransactionGroup};
pub use oracle::{AccountAccess, CombinedAccess, DeclaredAccess, ResourceOracle};
pub use resource::ResourceKey;
