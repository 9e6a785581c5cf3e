//! Common utilities for ebxkit.
//!
//! This crate provides foundational types used across the ebxkit crates:
//!
//! - [`BinaryReader`] - Positional binary reading from byte slices
//! - [`BinaryWriter`] - Positional binary emission with in-place patching
//! - [`EbxGuid`] - The 16-byte GUID type carried by EBX payloads
//! - [`hash`] - CRC32C name hashing used by descriptor tables

mod error;
mod guid;
mod reader;
mod writer;

pub mod hash;

pub use error::{Error, Result};
pub use guid::EbxGuid;
pub use reader::BinaryReader;
pub use writer::BinaryWriter;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Re-export memchr for SIMD-accelerated byte searching
pub use memchr;
