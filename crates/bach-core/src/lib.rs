//! # bach-core
//!
//! Parallel execution of a block's transactions.
//!
//! A batch is partitioned by the [`bach_scheduler::Grouper`] into
//! conflict-free groups. Each group gets its own worker
//! ([`JobExecutor`]) that runs the group's transactions in order through the
//! host's [`TransactionExecutor`]. A single coordinator task owns all batch
//! state: it gates worker start on an explicit start signal, records exactly
//! one [`TransactionResult`](bach_types::TransactionResult) per transaction,
//! forwards results to a [`ResultSink`], supervises worker faults and retires
//! once every transaction has a result.
//!
//! ```text
//! ParallelExecutor::spawn_batch ──► BatchDriver (tokio task)
//!                                     │  BatchCoordinator (pure state machine)
//!                                     ├── JobExecutor g0 ──┐
//!                                     ├── JobExecutor g1 ──┼─► WorkerEvent channel
//!                                     └── JobExecutor gN ──┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod coordinator;
mod driver;
mod error;
mod executor;
mod job;
mod sink;

pub use config::ExecutionConfig;
pub use coordinator::{BatchCommand, BatchCoordinator, BatchState, WorkerExit};
pub use driver::{BatchHandle, BatchReport, ParallelExecutor};
pub use error::{BatchError, BatchResult, ExecutionError, SinkError, WorkerError};
pub use executor::TransactionExecutor;
pub use job::{JobExecutor, WorkerEvent};
pub use sink::{ChannelSink, CollectingSink, NullSink, ResultSink};
