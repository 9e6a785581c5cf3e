//! Array and boxed-value table rows.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// One entry of the array table.
///
/// An array-valued field on the wire is a single i32 index into this table;
/// the elements live in the array region at `offset`.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct EbxArray {
    /// Byte offset of the first element, relative to the array region.
    pub offset: u32,
    /// Number of elements.
    pub count: u32,
    /// Reference to the array type's descriptor.
    pub type_ref: i32,
}

/// One entry of the boxed-value table.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct EbxBoxedValue {
    /// Byte offset of the payload, relative to the boxed-value region.
    pub offset: u32,
    /// Reference to the payload type's descriptor.
    pub type_ref: u16,
    /// The payload's raw type kind.
    pub kind: u16,
}
