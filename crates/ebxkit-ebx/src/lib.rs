//! EBX object-graph codec.
//!
//! EBX is the typed-object serialization format carried by Frostbite-family
//! game data. A payload encodes an *asset*: a GUID-identified cluster of
//! schema-typed instances whose fields may be primitives, nested value
//! types, ordered collections, intra-asset pointers, inter-asset imports,
//! and dynamically-typed boxed values. This crate reads and writes the
//! Partition dialect (magic 2 and 4) and carries the dispatch seam for the
//! RIFF dialect (version 6).
//!
//! # Reading
//!
//! ```no_run
//! use ebxkit_ebx::{PartitionReader, SchemaRegistry};
//!
//! let schema: SchemaRegistry = todo!("built from the game's type metadata");
//! let data = std::fs::read("asset.ebx")?;
//!
//! let asset = PartitionReader::new(&data, &schema)?.read_asset()?;
//! println!("{} instances, {} imports", asset.objects().len(), asset.imports().len());
//!
//! for object in asset.objects() {
//!     println!("type {:#010x}", object.type_hash);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Writing
//!
//! ```
//! use ebxkit_common::EbxGuid;
//! use ebxkit_ebx::schema::SchemaBuilder;
//! use ebxkit_ebx::types::TypeKind;
//! use ebxkit_ebx::{EbxAsset, PartitionReader, PartitionWriter, Value};
//!
//! let mut sb = SchemaBuilder::new();
//! let weapon = sb.class("Weapon");
//! sb.field(weapon, "damage", TypeKind::Float32);
//! let schema = sb.build();
//!
//! let hash = schema.type_by_name("Weapon").unwrap().name_hash;
//! let mut obj = schema.new_instance(hash).unwrap();
//! obj.set("damage", Value::Float32(150.0));
//!
//! let mut asset = EbxAsset::new(EbxGuid::from_bytes([1; 16]));
//! asset.add_exported_object(EbxGuid::from_bytes([2; 16]), obj);
//!
//! let bytes = PartitionWriter::new(&schema, 2)?.write_asset(&asset)?;
//! let reloaded = PartitionReader::new(&bytes, &schema)?.read_asset()?;
//! assert_eq!(reloaded.objects()[0].get("damage"), Some(&Value::Float32(150.0)));
//! # Ok::<(), ebxkit_ebx::Error>(())
//! ```

mod asset;
mod error;
mod object;
mod resolver;
mod value;

pub mod dialect;
pub mod partition;
pub mod riff;
pub mod schema;
pub mod structs;
pub mod types;

// Primary API
pub use asset::EbxAsset;
pub use dialect::{read_asset, write_asset, Dialect};
pub use error::{Error, Result};
pub use object::{AssetClassGuid, Object, ObjectField};
pub use partition::{PartitionReader, PartitionWriter};
pub use resolver::{TypeIx, TypeResolver};
pub use schema::{SchemaBuilder, SchemaRegistry};
pub use types::TypeKind;
pub use value::{BoxedValue, PointerRef, TypeRefValue, Value};
