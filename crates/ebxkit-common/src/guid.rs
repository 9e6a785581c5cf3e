//! 16-byte GUID type used throughout EBX payloads.
//!
//! Partition headers, instance identities and import references all carry
//! GUIDs as 16 raw bytes in field order. Unlike standard UUIDs there is no
//! variant or version semantics; the bytes are opaque identity.

use std::fmt;
use std::str::FromStr;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::Error;

/// A 16-byte GUID as stored in EBX payloads.
///
/// Format: `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`, with the bytes serialized
/// in string order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct EbxGuid {
    bytes: [u8; 16],
}

impl EbxGuid {
    /// Empty GUID (all zeros).
    pub const EMPTY: Self = Self { bytes: [0; 16] };

    /// Create a new GUID from raw bytes.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes of the GUID.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.bytes
    }

    /// Check if the GUID is empty (all zeros).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes == [0; 16]
    }
}

impl fmt::Debug for EbxGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EbxGuid({})", self)
    }
}

impl fmt::Display for EbxGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.bytes.iter().enumerate() {
            if i == 4 || i == 6 || i == 8 || i == 10 {
                write!(f, "-")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl FromStr for EbxGuid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 36 {
            return Err(Error::InvalidGuid(format!(
                "expected 36 characters, got {}",
                s.len()
            )));
        }

        let chars: Vec<char> = s.chars().collect();

        if chars[8] != '-' || chars[13] != '-' || chars[18] != '-' || chars[23] != '-' {
            return Err(Error::InvalidGuid("invalid hyphen positions".into()));
        }

        let parse_hex = |start: usize| -> Result<u8, Error> {
            let hex_str: String = chars[start..start + 2].iter().collect();
            u8::from_str_radix(&hex_str, 16)
                .map_err(|_| Error::InvalidGuid(format!("invalid hex at position {}", start)))
        };

        // String positions of each byte pair, skipping the hyphens.
        const POSITIONS: [usize; 16] = [
            0, 2, 4, 6, 9, 11, 14, 16, 19, 21, 24, 26, 28, 30, 32, 34,
        ];

        let mut bytes = [0u8; 16];
        for (byte, &pos) in bytes.iter_mut().zip(POSITIONS.iter()) {
            *byte = parse_hex(pos)?;
        }

        Ok(Self { bytes })
    }
}
