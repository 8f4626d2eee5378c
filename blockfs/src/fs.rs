use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::Path;

use log::{debug, info};
use thiserror::Error;

use crate::alloc::{blocks_needed, BlockTable};
use crate::catalog::{Catalog, NO_BLOCK};
use crate::chain::NodeTable;
use crate::io::{BlockStorage, FileBlockEmulator, FileBlockEmulatorBuilder};
use crate::meta::{self, Geometry};

#[derive(Error, Debug)]
pub enum FsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("filename too large")]
    NameTooLong,
    #[error("file already exists")]
    AlreadyExists,
    #[error("file {0} does not exist")]
    NotFound(String),
    #[error("no space")]
    NoSpace,
    #[error("not enough free blocks")]
    InsufficientSpace,
    #[error("block chain is corrupt")]
    ChainCorrupt,
    #[error("invalid metadata image: {0}")]
    InvalidImage(&'static str),
    #[error("unsupported geometry: {0}")]
    InvalidGeometry(&'static str),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] std::io::Error),
}

/// A fixed-geometry, user-level block file system. Blocks account for
/// reserved capacity; the payload itself lives in the content store, keyed
/// by file name. Metadata (catalog + node table) is rewritten to the backing
/// store after every mutation, so a reopened store sees the last completed
/// operation.
///
/// Callers that share a `BlockFs` across threads serialize every operation
/// behind one lock; each method is a complete, all-or-nothing unit.
pub struct BlockFs<T: BlockStorage> {
    dev: T,
    geom: Geometry,
    catalog: Catalog,
    nodes: NodeTable,
    blocks: BlockTable,
    contents: HashMap<String, Vec<u8>>,
}

impl BlockFs<FileBlockEmulator> {
    /// Opens the backing store at `path`, initializing a fresh file system
    /// when the store is empty and loading the persisted state otherwise.
    pub fn mount<P: AsRef<Path>>(path: P, geom: Geometry) -> Result<Self, FsError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let fresh = file.metadata()?.len() == 0;
        let dev = FileBlockEmulatorBuilder::from(file)
            .with_block_len(geom.block_size)
            .with_block_count(geom.meta_blocks())
            .clear_medium(fresh)
            .build()?;
        if fresh {
            Self::create(dev, geom)
        } else {
            Self::open(dev, geom)
        }
    }
}

impl<T: BlockStorage> BlockFs<T> {
    /// Initializes a fresh file system onto owned block storage and writes
    /// the default metadata image out immediately.
    pub fn create(mut dev: T, geom: Geometry) -> Result<Self, FsError> {
        geom.validate()?;
        let catalog = Catalog::new(geom.max_files);
        let nodes = NodeTable::new(geom.total_blocks);
        meta::save(&mut dev, &geom, &catalog, &nodes)?;
        info!(
            "file system initialized: {} file slots, {} blocks of {} bytes",
            geom.max_files, geom.total_blocks, geom.block_size
        );
        Ok(Self {
            dev,
            geom,
            catalog,
            nodes,
            blocks: BlockTable::new(geom.total_blocks),
            contents: HashMap::new(),
        })
    }

    /// Loads a previously initialized file system, rebuilding the free table
    /// from the node table.
    pub fn open(mut dev: T, geom: Geometry) -> Result<Self, FsError> {
        geom.validate()?;
        let (catalog, nodes) = meta::load(&mut dev, &geom)?;
        let mut blocks = BlockTable::new(geom.total_blocks);
        for (blocknr, node) in nodes.nodes().enumerate() {
            if node.is_in_use() {
                blocks.reserve(blocknr);
            }
        }
        info!(
            "file system loaded: {} files, {} free blocks",
            catalog.names().len(),
            blocks.free_count()
        );
        Ok(Self {
            dev,
            geom,
            catalog,
            nodes,
            blocks,
            contents: HashMap::new(),
        })
    }

    pub fn create_file(&mut self, name: &str) -> Result<(), FsError> {
        self.catalog.create(name)?;
        self.persist()?;
        info!("created {}", name);
        Ok(())
    }

    pub fn delete_file(&mut self, name: &str) -> Result<(), FsError> {
        let slot = self.lookup(name)?;
        let head = self.catalog.get(slot).head_block();
        if head != NO_BLOCK {
            self.nodes.release_chain(head, &mut self.blocks)?;
        }
        self.contents.remove(name);
        self.catalog.remove(slot);
        self.persist()?;
        info!("deleted {}", name);
        Ok(())
    }

    /// Returns the stored payload verbatim. The block chain is walked only
    /// to check that the reserved capacity still matches the recorded size;
    /// the content store is the source of truth for bytes. A file whose
    /// metadata outlived its payload (a remount) reads back as `size` zero
    /// bytes.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>, FsError> {
        let slot = self.lookup(name)?;
        let entry = self.catalog.get(slot);
        if entry.head_block() == NO_BLOCK {
            return Ok(Vec::new());
        }
        let reserved = self.nodes.chain_len(entry.head_block())?;
        if reserved != blocks_needed(entry.size() as usize, self.geom.block_size) {
            return Err(FsError::ChainCorrupt);
        }
        debug!("read {} ({} bytes)", name, entry.size());
        Ok(self
            .contents
            .get(name)
            .cloned()
            .unwrap_or_else(|| vec![0; entry.size() as usize]))
    }

    /// Replaces the file's payload wholesale. The free-block check happens
    /// before the old chain is released, so a failed write leaves the prior
    /// content and chain untouched.
    pub fn write_file(&mut self, name: &str, content: &[u8]) -> Result<(), FsError> {
        let slot = self.lookup(name)?;
        if content.len() > u16::MAX as usize {
            // Entry sizes persist as u16.
            return Err(FsError::InsufficientSpace);
        }
        let needed = blocks_needed(content.len(), self.geom.block_size);
        if needed > self.blocks.free_count() {
            return Err(FsError::InsufficientSpace);
        }
        let old_head = self.catalog.get(slot).head_block();
        if old_head != NO_BLOCK {
            self.nodes.release_chain(old_head, &mut self.blocks)?;
        }
        let head = self.nodes.allocate_chain(needed, &mut self.blocks)?;
        self.catalog
            .get_mut(slot)
            .set_extent(content.len() as u16, head);
        if content.is_empty() {
            self.contents.remove(name);
        } else {
            self.contents.insert(name.to_string(), content.to_vec());
        }
        self.persist()?;
        info!("wrote {} bytes to {}", content.len(), name);
        Ok(())
    }

    /// In-use names in catalog slot order.
    pub fn list_files(&self) -> Vec<String> {
        self.catalog.names()
    }

    pub fn free_blocks(&self) -> usize {
        self.blocks.free_count()
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geom
    }

    fn lookup(&self, name: &str) -> Result<usize, FsError> {
        self.catalog
            .find(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }

    fn persist(&mut self) -> Result<(), FsError> {
        meta::save(&mut self.dev, &self.geom, &self.catalog, &self.nodes)
    }
}
