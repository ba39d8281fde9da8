//! Transaction type

use bach_primitives::{keccak256, Address, H256};
use bytes::Bytes;

/// One entry of a transaction's declared state access list
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessItem {
    /// Account or contract owning the slot
    pub address: Address,
    /// Storage slot
    pub slot: H256,
    /// Whether the transaction may write the slot
    pub write: bool,
}

impl AccessItem {
    /// Declared read of `slot` under `address`
    pub fn read(address: Address, slot: H256) -> Self {
        Self {
            address,
            slot,
            write: false,
        }
    }

    /// Declared write of `slot` under `address`
    pub fn write(address: Address, slot: H256) -> Self {
        Self {
            address,
            slot,
            write: true,
        }
    }
}

/// A transaction admitted to an execution batch.
///
/// Fields are private so the cached hash can never go stale; build with
/// [`Transaction::new`] and the `with_*` helpers, which rehash.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Transaction {
    from: Address,
    to: Address,
    method: String,
    params: Bytes,
    nonce: u64,
    access_list: Vec<AccessItem>,
    hash: H256,
}

impl Transaction {
    /// Create a transaction calling `method` on contract `to`
    pub fn new(
        from: Address,
        to: Address,
        method: impl Into<String>,
        params: impl Into<Bytes>,
        nonce: u64,
    ) -> Self {
        let mut tx = Self {
            from,
            to,
            method: method.into(),
            params: params.into(),
            nonce,
            access_list: Vec::new(),
            hash: H256::ZERO,
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// Attach a declared access list
    pub fn with_access_list(mut self, access_list: Vec<AccessItem>) -> Self {
        self.access_list = access_list;
        self.hash = self.compute_hash();
        self
    }

    /// Transaction id
    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// Sender
    pub fn from(&self) -> Address {
        self.from
    }

    /// Target contract
    pub fn to(&self) -> Address {
        self.to
    }

    /// Method name
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Encoded call parameters
    pub fn params(&self) -> &Bytes {
        &self.params
    }

    /// Sender nonce
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Declared state accesses (may be empty)
    pub fn access_list(&self) -> &[AccessItem] {
        &self.access_list
    }

    /// Length-prefixed encoding of every field, hashed with Keccak-256
    fn compute_hash(&self) -> H256 {
        let mut buf = Vec::with_capacity(
            88 + self.method.len() + self.params.len() + self.access_list.len() * 53,
        );
        buf.extend_from_slice(self.from.as_bytes());
        buf.extend_from_slice(self.to.as_bytes());
        buf.extend_from_slice(&(self.method.len() as u64).to_be_bytes());
        buf.extend_from_slice(self.method.as_bytes());
        buf.extend_from_slice(&(self.params.len() as u64).to_be_bytes());
        buf.extend_from_slice(&self.params);
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(&(self.access_list.len() as u64).to_be_bytes());
        for item in &self.access_list {
            buf.extend_from_slice(item.address.as_bytes());
            buf.extend_from_slice(item.slot.as_bytes());
            buf.push(item.write as u8);
        }
        keccak256(&buf)
    }
}
