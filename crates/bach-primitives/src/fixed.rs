//! Shared implementation for fixed-width byte newtypes

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Width in bytes
            pub const LEN: usize = $len;

            /// All-zero value
            pub const ZERO: $name = $name([0u8; $len]);

            /// Wrap raw bytes
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                $name(bytes)
            }

            /// Copy from a slice, which must be exactly `LEN` bytes long
            pub fn from_slice(slice: &[u8]) -> $crate::PrimitiveResult<Self> {
                let bytes: [u8; $len] =
                    slice
                        .try_into()
                        .map_err(|_| $crate::PrimitiveError::InvalidLength {
                            expected: $len,
                            got: slice.len(),
                        })?;
                Ok($name(bytes))
            }

            /// Parse a hex string, `0x` prefix optional
            pub fn from_hex(s: &str) -> $crate::PrimitiveResult<Self> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s)
                    .map_err(|e| $crate::PrimitiveError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes)
            }

            /// Borrow the raw bytes
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// True when every byte is zero
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// Lowercase hex with `0x` prefix
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// First four bytes as hex, for compact log lines
            pub fn short(&self) -> String {
                format!("0x{}", hex::encode(&self.0[..4]))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::PrimitiveError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                $name(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        #[cfg(feature = "serde")]
        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        #[cfg(feature = "serde")]
        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}
