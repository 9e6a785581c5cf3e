//! ebxkit - EBX object-graph codec toolkit.
//!
//! This crate provides a unified interface to the ebxkit library ecosystem
//! for working with Frostbite-family EBX payloads.
//!
//! # Crates
//!
//! - [`ebxkit_common`] - Common utilities (binary streams, GUIDs, hashing)
//! - [`ebxkit_ebx`] - The EBX codec (Partition reader/writer, schema tables)
//!
//! # Example
//!
//! ```no_run
//! use ebxkit::prelude::*;
//!
//! let schema: SchemaRegistry = todo!("built from the game's type metadata");
//! let data = std::fs::read("asset.ebx")?;
//!
//! let asset = PartitionReader::new(&data, &schema)?.read_asset()?;
//! println!("partition {}", asset.file_guid());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use ebxkit_common as common;
pub use ebxkit_ebx as ebx;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use ebxkit_common::{hash, BinaryReader, BinaryWriter, EbxGuid};
    pub use ebxkit_ebx::{
        Dialect, EbxAsset, Object, PartitionReader, PartitionWriter, PointerRef, SchemaBuilder,
        SchemaRegistry, TypeKind, Value,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
