//! The RIFF wire dialect (version 6).
//!
//! RIFF-framed EBX shares the object-graph shape with the Partition dialect
//! but containers it differently (chunked `RIFF`/`EBX ` framing with its own
//! tables). Only the dispatch seam is carried here; the framing itself is
//! not implemented.

use crate::asset::EbxAsset;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::schema::SchemaRegistry;

/// Version number selecting the RIFF dialect.
pub const RIFF_VERSION: u32 = 6;

/// Chunk tag opening a RIFF-framed payload.
pub const RIFF_MAGIC: [u8; 4] = *b"RIFF";

/// Reader stub for RIFF payloads.
pub struct RiffReader;

impl RiffReader {
    pub fn new(_data: &[u8], _schema: &SchemaRegistry) -> Result<Self> {
        Err(Error::Unsupported("RIFF dialect"))
    }

    pub fn read_asset(self) -> Result<EbxAsset> {
        Err(Error::Unsupported("RIFF dialect"))
    }

    pub fn read_objects(self) -> Result<Vec<Object>> {
        Err(Error::Unsupported("RIFF dialect"))
    }
}

/// Writer stub for RIFF payloads.
pub struct RiffWriter;

impl RiffWriter {
    pub fn new(_schema: &SchemaRegistry) -> Result<Self> {
        Err(Error::Unsupported("RIFF dialect"))
    }

    pub fn write_asset(&self, _asset: &EbxAsset) -> Result<Vec<u8>> {
        Err(Error::Unsupported("RIFF dialect"))
    }
}
