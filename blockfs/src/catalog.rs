use std::convert::TryInto;

use crate::fs::FsError;

/// Upper bound on file name length in bytes, fixed by the 11-byte name field
/// in the persisted catalog record.
pub const MAX_NAME_LEN: usize = 11;

/// Head-block sentinel for a file with no allocated blocks.
pub const NO_BLOCK: i16 = -1;

/// Bytes per persisted catalog record: name field, size, head block.
pub const ENTRY_LEN: usize = MAX_NAME_LEN + 2 + 2;

/// One slot in the file catalog. An empty name marks the slot free.
///
/// Steady state after every completed write: `head_block == NO_BLOCK` exactly
/// when `size == 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    name: String,
    size: u16,
    head_block: i16,
}

impl FileEntry {
    fn vacant() -> Self {
        Self {
            name: String::new(),
            size: 0,
            head_block: NO_BLOCK,
        }
    }

    fn occupied(name: &str) -> Self {
        Self {
            name: name.to_string(),
            size: 0,
            head_block: NO_BLOCK,
        }
    }

    pub fn is_in_use(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn head_block(&self) -> i16 {
        self.head_block
    }

    pub(crate) fn set_extent(&mut self, size: u16, head_block: i16) {
        self.size = size;
        self.head_block = head_block;
    }

    /// Appends the fixed 15-byte record: NUL-padded name, then size and head
    /// block, big endian.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut name = [0u8; MAX_NAME_LEN];
        name[..self.name.len()].copy_from_slice(self.name.as_bytes());
        out.extend_from_slice(&name);
        out.extend_from_slice(&self.size.to_be_bytes());
        out.extend_from_slice(&self.head_block.to_be_bytes());
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FsError> {
        if buf.len() < ENTRY_LEN {
            return Err(FsError::InvalidImage("catalog record truncated"));
        }
        let name_field = &buf[..MAX_NAME_LEN];
        let end = name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_LEN);
        let name = std::str::from_utf8(&name_field[..end])
            .map_err(|_| FsError::InvalidImage("catalog name is not UTF-8"))?
            .to_string();
        let size = u16::from_be_bytes(buf[11..13].try_into().unwrap());
        let head_block = i16::from_be_bytes(buf[13..15].try_into().unwrap());
        Ok(Self {
            name,
            size,
            head_block,
        })
    }
}

/// Fixed-capacity table of file entries, addressed by slot index.
pub struct Catalog {
    entries: Vec<FileEntry>,
}

impl Catalog {
    pub fn new(max_files: usize) -> Self {
        Self {
            entries: vec![FileEntry::vacant(); max_files],
        }
    }

    pub(crate) fn from_entries(entries: Vec<FileEntry>) -> Self {
        Self { entries }
    }

    /// Occupies the first free slot with a zero-length entry and returns its
    /// index.
    pub fn create(&mut self, name: &str) -> Result<usize, FsError> {
        if name.is_empty() {
            // An empty name is the free-slot sentinel.
            return Err(FsError::InvalidArgument("file name cannot be empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(FsError::NameTooLong);
        }
        if self.find(name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        match self.entries.iter().position(|entry| !entry.is_in_use()) {
            Some(slot) => {
                self.entries[slot] = FileEntry::occupied(name);
                Ok(slot)
            }
            None => Err(FsError::NoSpace),
        }
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.is_in_use() && entry.name == name)
    }

    pub fn get(&self, slot: usize) -> &FileEntry {
        &self.entries[slot]
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> &mut FileEntry {
        &mut self.entries[slot]
    }

    /// Resets a slot to the free-slot sentinel values. Releasing the block
    /// chain and the content record is the caller's job.
    pub fn remove(&mut self, slot: usize) {
        self.entries[slot] = FileEntry::vacant();
    }

    /// In-use names in slot order (stable, not alphabetical).
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.is_in_use())
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter()
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }
}
