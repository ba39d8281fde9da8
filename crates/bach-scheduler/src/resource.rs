//! State resource keys

use bach_primitives::{Address, H256};
use std::fmt;

/// Identifies one unit of state; two transactions touching the same key conflict
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    /// Account or contract owning the cell
    pub address: Address,
    /// Slot within the owner
    pub slot: H256,
}

impl ResourceKey {
    const BALANCE_SLOT: H256 = H256::ZERO;
    const NONCE_SLOT: H256 = H256::from_bytes([0x01; 32]);
    const CODE_SLOT: H256 = H256::from_bytes([0x02; 32]);
    const CONTRACT_SLOT: H256 = H256::from_bytes([0xff; 32]);

    /// Arbitrary storage slot
    pub fn storage(address: Address, slot: H256) -> Self {
        Self { address, slot }
    }

    /// Account balance cell
    pub fn balance(address: Address) -> Self {
        Self::storage(address, Self::BALANCE_SLOT)
    }

    /// Account nonce cell
    pub fn nonce(address: Address) -> Self {
        Self::storage(address, Self::NONCE_SLOT)
    }

    /// Contract code cell
    pub fn code(address: Address) -> Self {
        Self::storage(address, Self::CODE_SLOT)
    }

    /// Coarse key standing for a contract's whole storage
    pub fn contract(address: Address) -> Self {
        Self::storage(address, Self::CONTRACT_SLOT)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.slot.short())
    }
}
