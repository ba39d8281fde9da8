//! Chain snapshot shared by every worker in a batch

use bach_primitives::{BlockHeight, H256};

/// Immutable view of the chain a batch executes against.
///
/// The coordinator owns it behind an `Arc`; workers only ever hold shared,
/// read-only references.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainContext {
    /// Chain id
    pub chain_id: u64,
    /// Height of the block being built or replayed
    pub block_height: BlockHeight,
    /// Hash of the parent block
    pub parent_hash: H256,
    /// State root the batch starts from
    pub state_root: H256,
}

impl ChainContext {
    /// Create a context
    pub fn new(chain_id: u64, block_height: BlockHeight, parent_hash: H256, state_root: H256) -> Self {
        Self {
            chain_id,
            block_height,
            parent_hash,
            state_root,
        }
    }

    /// Context for the first block of a chain
    pub fn genesis(chain_id: u64) -> Self {
        Self::new(chain_id, 0, H256::ZERO, H256::ZERO)
    }
}
