//! Dialect selection by profile version.
//!
//! The version is an explicit parameter, not process-global state; callers
//! thread it through from whatever profile configuration they carry.

use crate::asset::EbxAsset;
use crate::error::Result;
use crate::partition::{PartitionReader, PartitionWriter};
use crate::riff::{self, RiffReader, RiffWriter};
use crate::schema::SchemaRegistry;

/// The two known wire dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Magic values 2 and 4.
    Partition,
    /// Version 6.
    Riff,
}

impl Dialect {
    /// Select the dialect for a profile's EBX version.
    #[inline]
    pub fn for_version(version: u32) -> Self {
        if version == riff::RIFF_VERSION {
            Self::Riff
        } else {
            Self::Partition
        }
    }
}

/// Read an asset from a payload, selecting the dialect by version.
pub fn read_asset(data: &[u8], schema: &SchemaRegistry, version: u32) -> Result<EbxAsset> {
    match Dialect::for_version(version) {
        Dialect::Partition => PartitionReader::new(data, schema)?.read_asset(),
        Dialect::Riff => RiffReader::new(data, schema)?.read_asset(),
    }
}

/// Write an asset to a payload, selecting the dialect by version.
pub fn write_asset(asset: &EbxAsset, schema: &SchemaRegistry, version: u32) -> Result<Vec<u8>> {
    match Dialect::for_version(version) {
        Dialect::Partition => PartitionWriter::new(schema, version)?.write_asset(asset),
        Dialect::Riff => RiffWriter::new(schema)?.write_asset(asset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection() {
        assert_eq!(Dialect::for_version(2), Dialect::Partition);
        assert_eq!(Dialect::for_version(4), Dialect::Partition);
        assert_eq!(Dialect::for_version(6), Dialect::Riff);
    }

    #[test]
    fn test_riff_is_unsupported() {
        let schema = SchemaRegistry::default();
        let asset = EbxAsset::default();
        assert!(write_asset(&asset, &schema, 6).is_err());
        assert!(read_asset(&[], &schema, 6).is_err());
    }
}
