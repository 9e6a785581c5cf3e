//! CRC32C name hashing.
//!
//! EBX descriptor tables identify types and fields by a 32-bit hash of their
//! name. The type-names region of a partition carries the plain strings, and
//! readers rebuild the hash-to-name index from it.

/// Compute the 32-bit hash of a byte slice.
///
/// Uses hardware acceleration when available (SSE4.2 on x86).
#[inline]
pub fn hash_bytes(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// Compute the 32-bit hash of a name string.
///
/// The string is encoded as UTF-8 before hashing.
#[inline]
pub fn hash_str(s: &str) -> u32 {
    hash_bytes(s.as_bytes())
}
