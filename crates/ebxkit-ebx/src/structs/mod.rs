//! Fixed-size wire rows of the Partition descriptor tables.

mod array;
mod descriptor;
mod import;
mod instance;

pub use array::{EbxArray, EbxBoxedValue};
pub use descriptor::{EbxFieldDescriptor, EbxTypeDescriptor};
pub use import::EbxImportReference;
pub use instance::EbxInstanceEntry;
