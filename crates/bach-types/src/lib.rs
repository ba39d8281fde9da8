//! # bach-types
//!
//! Data carried through a parallel execution batch:
//! - [`Transaction`]: an admitted, immutable call with a content hash
//! - [`TransactionResult`]: the single outcome recorded per transaction
//! - [`ChainContext`]: the read-only chain snapshot shared by all workers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod result;
pub mod transaction;

pub use context::ChainContext;
pub use result::{Log, StateChange, TransactionResult, TxStatus};
pub use transaction::{AccessItem, Transaction};
