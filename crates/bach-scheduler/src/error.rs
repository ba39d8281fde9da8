//! Error types for grouping

use bach_primitives::H256;
use thiserror::Error;

/// Grouping errors.
///
/// Grouping itself cannot fail; these are raised by input validation at the
/// batch boundary, before any worker exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The same transaction hash appears twice in one batch
    #[error("duplicate transaction {0} in batch")]
    DuplicateTransaction(H256),

    /// More transactions than group ids can address
    #[error("batch of {0} transactions exceeds the supported size")]
    BatchTooLarge(usize),
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::DuplicateTransaction(H256::from_low_u64_be(42));
        assert!(err.to_string().contains("duplicate"));
        assert!(err.to_string().contains("2a"));

        let err = SchedulerError::BatchTooLarge(10);
        assert!(err.to_string().contains("10"));
    }
}
