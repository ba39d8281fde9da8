//! # bach-primitives
//!
//! Fixed-size byte types shared by every BachLedger execution crate.
//!
//! - [`H256`]: 32-byte hashes (transaction ids, state roots, storage slots)
//! - [`Address`]: 20-byte account and contract addresses
//! - [`keccak256`]: the hash function used to derive transaction ids

#![warn(missing_docs)]
#![warn(clippy::all)]

#[macro_use]
mod fixed;
mod address;
mod hash;

pub use address::Address;
pub use hash::{keccak256, H256};

use thiserror::Error;

/// Block height type
pub type BlockHeight = u64;

/// Errors raised while decoding primitive values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// Input was not valid hex
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    /// Input decoded to the wrong number of bytes
    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Required byte length
        expected: usize,
        /// Actual byte length
        got: usize,
    },
}

/// Result type for primitive decoding
pub type PrimitiveResult<T> = Result<T, PrimitiveError>;
