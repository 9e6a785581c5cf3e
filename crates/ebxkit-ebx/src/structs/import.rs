//! Import reference rows.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use ebxkit_common::EbxGuid;

/// Identifies an exported object in another asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct EbxImportReference {
    /// Partition GUID of the asset holding the target.
    pub file_guid: EbxGuid,
    /// Instance GUID of the target object.
    pub class_guid: EbxGuid,
}
