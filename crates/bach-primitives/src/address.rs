//! 20-byte account address

fixed_bytes!(
    /// Account or contract address
    Address,
    20
);

impl Address {
    /// Address whose every byte is `b`; mostly for fixtures
    pub const fn repeat_byte(b: u8) -> Self {
        Address::from_bytes([b; 20])
    }
}
