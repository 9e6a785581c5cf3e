//! Instance table rows.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// One run of the instance table: `count` consecutive instances of the type
/// at `type_ref`.
///
/// Exported instances are not flagged in the row; they are the first
/// `exportedCount` instances in table order.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct EbxInstanceEntry {
    /// Reference to the instance type's descriptor.
    pub type_ref: u16,
    /// Number of consecutive instances of that type.
    pub count: u16,
}
