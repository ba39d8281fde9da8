//! Result sinks

use crate::error::SinkError;
use bach_types::TransactionResult;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Receives every result the coordinator records, in arrival order.
///
/// Called from the coordinator task, so implementations must not block.
/// Ordering by input position, if needed, is the consumer's job.
pub trait ResultSink: Send + Sync {
    /// Accept one result
    fn forward(&self, result: &TransactionResult) -> Result<(), SinkError>;
}

impl<F> ResultSink for F
where
    F: Fn(&TransactionResult) -> Result<(), SinkError> + Send + Sync,
{
    fn forward(&self, result: &TransactionResult) -> Result<(), SinkError> {
        self(result)
    }
}

/// Streams results into an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TransactionResult>,
}

impl ChannelSink {
    /// Create a sink and the receiver draining it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransactionResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ResultSink for ChannelSink {
    fn forward(&self, result: &TransactionResult) -> Result<(), SinkError> {
        self.tx.send(result.clone()).map_err(|_| SinkError::Closed)
    }
}

/// Keeps every result in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    results: Mutex<Vec<TransactionResult>>,
}

impl CollectingSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what has arrived so far
    pub fn results(&self) -> Vec<TransactionResult> {
        self.results.lock().clone()
    }

    /// Number of results received
    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    /// True if nothing has arrived
    pub fn is_empty(&self) -> bool {
        self.results.lock().is_empty()
    }
}

impl ResultSink for CollectingSink {
    fn forward(&self, result: &TransactionResult) -> Result<(), SinkError> {
        self.results.lock().push(result.clone());
        Ok(())
    }
}

/// Discards results
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ResultSink for NullSink {
    fn forward(&self, _result: &TransactionResult) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bach_primitives::H256;

    fn result(n: u64) -> TransactionResult {
        TransactionResult::success(H256::from_low_u64_be(n))
    }

    #[test]
    fn test_collecting_sink_keeps_arrival_order() {
        let sink = CollectingSink::new();
        assert!(sink.is_empty());
        sink.forward(&result(2)).unwrap();
        sink.forward(&result(1)).unwrap();
        let hashes: Vec<_> = sink.results().iter().map(|r| r.tx_hash).collect();
        assert_eq!(hashes, vec![H256::from_low_u64_be(2), H256::from_low_u64_be(1)]);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_channel_sink_delivers_and_reports_close() {
        let (sink, mut rx) = ChannelSink::new();
        sink.forward(&result(1)).unwrap();
        assert_eq!(rx.try_recv().unwrap().tx_hash, H256::from_low_u64_be(1));

        drop(rx);
        assert_eq!(sink.forward(&result(2)), Err(SinkError::Closed));
    }

    #[test]
    fn test_closure_sink() {
        let sink = |r: &TransactionResult| {
            Err(SinkError::Rejected {
                tx_hash: r.tx_hash,
                reason: "full".into(),
            })
        };
        assert!(matches!(
            sink.forward(&result(1)),
            Err(SinkError::Rejected { .. })
        ));
        assert!(NullSink.forward(&result(1)).is_ok());
    }
}
