use std::convert::TryInto;

use crate::alloc::blocks_needed;
use crate::catalog::{Catalog, FileEntry, ENTRY_LEN};
use crate::chain::{BlockNode, NodeTable, NODE_LEN};
use crate::fs::FsError;
use crate::io::BlockStorage;

/// Identifies a blockfs metadata image. "BFSM" in ASCII.
pub const META_MAGIC: u32 = 0x4246_534D;
pub const META_VERSION: u16 = 1;

/// Bytes in the persisted header: magic, version, and the three geometry
/// fields.
pub const HEADER_LEN: usize = 12;

/// Dimensions of the file system: catalog capacity, block pool size, and
/// block size in bytes. Fixed at creation and recorded in the image header;
/// an opened image must match the configured geometry exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub max_files: usize,
    pub total_blocks: usize,
    pub block_size: usize,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            max_files: 5,
            total_blocks: 10,
            block_size: 128,
        }
    }
}

impl Geometry {
    /// Every dimension must fit its persisted header width, and block
    /// indices must fit the catalog's i16 head-block field.
    pub fn validate(&self) -> Result<(), FsError> {
        if self.max_files == 0 || self.total_blocks == 0 || self.block_size == 0 {
            return Err(FsError::InvalidGeometry("dimensions must be nonzero"));
        }
        if self.max_files > u16::MAX as usize || self.block_size > u16::MAX as usize {
            return Err(FsError::InvalidGeometry(
                "dimension exceeds persisted field width",
            ));
        }
        if self.total_blocks > i16::MAX as usize {
            return Err(FsError::InvalidGeometry(
                "block count exceeds head-block range",
            ));
        }
        Ok(())
    }

    /// Length of the serialized metadata image before block padding.
    pub fn image_len(&self) -> usize {
        HEADER_LEN + self.max_files * ENTRY_LEN + self.total_blocks * NODE_LEN
    }

    /// Device blocks the metadata image occupies.
    pub fn meta_blocks(&self) -> usize {
        blocks_needed(self.image_len(), self.block_size)
    }
}

/// First bytes of the image. Without this the store would silently misread
/// foreign or stale files as valid state; any mismatch is a load failure.
#[derive(Debug, PartialEq)]
pub struct Header {
    pub magic: u32,
    pub version: u16,
    pub max_files: u16,
    pub total_blocks: u16,
    pub block_size: u16,
}

impl Header {
    pub fn for_geometry(geom: &Geometry) -> Self {
        Self {
            magic: META_MAGIC,
            version: META_VERSION,
            max_files: geom.max_files as u16,
            total_blocks: geom.total_blocks as u16,
            block_size: geom.block_size as u16,
        }
    }

    /// Serializes the header as a series of big-endian fields.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.magic.to_be_bytes());
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.max_files.to_be_bytes());
        out.extend_from_slice(&self.total_blocks.to_be_bytes());
        out.extend_from_slice(&self.block_size.to_be_bytes());
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FsError> {
        if buf.len() < HEADER_LEN {
            return Err(FsError::InvalidImage("header truncated"));
        }
        let header = Self {
            magic: u32::from_be_bytes(buf[0..4].try_into().unwrap()),
            version: u16::from_be_bytes(buf[4..6].try_into().unwrap()),
            max_files: u16::from_be_bytes(buf[6..8].try_into().unwrap()),
            total_blocks: u16::from_be_bytes(buf[8..10].try_into().unwrap()),
            block_size: u16::from_be_bytes(buf[10..12].try_into().unwrap()),
        };
        if header.magic != META_MAGIC {
            return Err(FsError::InvalidImage("bad magic"));
        }
        if header.version != META_VERSION {
            return Err(FsError::InvalidImage("unsupported version"));
        }
        Ok(header)
    }

    pub fn matches(&self, geom: &Geometry) -> bool {
        self.max_files as usize == geom.max_files
            && self.total_blocks as usize == geom.total_blocks
            && self.block_size as usize == geom.block_size
    }
}

/// Serializes the full metadata region — header, catalog records, node
/// records, in fixed field order — and rewrites it from block zero.
/// Idempotent: the image is never appended to.
pub fn save<T: BlockStorage>(
    dev: &mut T,
    geom: &Geometry,
    catalog: &Catalog,
    nodes: &NodeTable,
) -> Result<(), FsError> {
    let mut image = Vec::with_capacity(geom.meta_blocks() * geom.block_size);
    Header::for_geometry(geom).encode(&mut image);
    for entry in catalog.entries() {
        entry.encode(&mut image);
    }
    for node in nodes.nodes() {
        node.encode(&mut image);
    }
    // Pad to a whole number of device blocks.
    image.resize(geom.meta_blocks() * geom.block_size, 0);

    for (blocknr, chunk) in image.chunks(geom.block_size).enumerate() {
        dev.write_block(blocknr, chunk)?;
    }
    dev.sync_disk()?;
    Ok(())
}

/// Reads the metadata image back, validating the header against the
/// configured geometry before trusting a single record.
pub fn load<T: BlockStorage>(
    dev: &mut T,
    geom: &Geometry,
) -> Result<(Catalog, NodeTable), FsError> {
    let mut image = vec![0u8; geom.meta_blocks() * geom.block_size];
    for blocknr in 0..geom.meta_blocks() {
        let start = blocknr * geom.block_size;
        dev.read_block(blocknr, &mut image[start..start + geom.block_size])?;
    }

    let header = Header::decode(&image)?;
    if !header.matches(geom) {
        return Err(FsError::InvalidImage(
            "image geometry does not match configuration",
        ));
    }

    let mut offset = HEADER_LEN;
    let mut entries = Vec::with_capacity(geom.max_files);
    for _ in 0..geom.max_files {
        entries.push(FileEntry::decode(&image[offset..offset + ENTRY_LEN])?);
        offset += ENTRY_LEN;
    }
    let mut nodes = Vec::with_capacity(geom.total_blocks);
    for _ in 0..geom.total_blocks {
        nodes.push(BlockNode::decode(&image[offset..offset + NODE_LEN])?);
        offset += NODE_LEN;
    }
    Ok((Catalog::from_entries(entries), NodeTable::from_nodes(nodes)))
}
