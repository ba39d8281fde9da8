//! 32-byte hash type and Keccak-256

use sha3::{Digest, Keccak256};

fixed_bytes!(
    /// 256-bit hash
    H256,
    32
);

impl H256 {
    /// Build a hash whose last eight bytes hold `n` big-endian.
    ///
    /// Handy for synthetic ids in tests and workload generators.
    pub fn from_low_u64_be(n: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        H256::from_bytes(bytes)
    }
}

/// Keccak-256 of `data`
pub fn keccak256(data: &[u8]) -> H256 {
    let digest = Keccak256::digest(data);
    H256::from_bytes(digest.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrimitiveError;

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            keccak256(&[]).to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak256_hello() {
        assert_eq!(
            keccak256(b"hello").to_hex(),
            "0x1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    #[test]
    fn test_from_hex_roundtrip_with_and_without_prefix() {
        let hex = "0x00000000000000000000000000000000000000000000000000000000000000ff";
        let a = H256::from_hex(hex).unwrap();
        let b = H256::from_hex(&hex[2..]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_hex(), hex);
        assert_eq!(a.as_bytes()[31], 0xff);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(matches!(
            H256::from_hex("0xzz"),
            Err(PrimitiveError::InvalidHex(_))
        ));
        assert_eq!(
            H256::from_hex("0x"),
            Err(PrimitiveError::InvalidLength { expected: 32, got: 0 })
        );
    }

    #[test]
    fn test_from_slice_length_checked() {
        assert!(H256::from_slice(&[1u8; 32]).is_ok());
        assert_eq!(
            H256::from_slice(&[1u8; 31]),
            Err(PrimitiveError::InvalidLength { expected: 32, got: 31 })
        );
    }

    #[test]
    fn test_from_low_u64_be() {
        let h = H256::from_low_u64_be(0x0102);
        assert_eq!(h.as_bytes()[30], 0x01);
        assert_eq!(h.as_bytes()[31], 0x02);
        assert!(h.as_bytes()[..24].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_zero_and_ordering() {
        assert!(H256::ZERO.is_zero());
        assert!(H256::from_low_u64_be(1) < H256::from_low_u64_be(2));
    }

    #[test]
    fn test_display_and_short() {
        let h = H256::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", h), h.to_hex());
        assert_eq!(h.short(), "0xabababab");
        assert!(format!("{:?}", h).starts_with("H256(0x"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_as_hex_string() {
        let h = H256::from_low_u64_be(7);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h.to_hex()));
        let back: H256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
