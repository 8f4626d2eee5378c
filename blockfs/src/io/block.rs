/// The block number to access, ranging from 0 (the first block) to n - 1
/// (the last block) where n is the number of blocks available.
pub type BlockNumber = usize;

/// Seam between the metadata store and the medium backing it. The device's
/// block length and count are fixed when the device is built; callers are
/// expected to read and write whole blocks of that length.
pub trait BlockStorage {
    /// Reads disk block `blocknr` into the provided buffer.
    ///
    /// # Errors
    ///
    /// Attempting to read a block out of range returns an error.
    fn read_block(&mut self, blocknr: BlockNumber, buf: &mut [u8]) -> std::io::Result<()>;

    /// Writes the provided buffer into the specified block number. A buffer
    /// shorter than a block leaves the remainder of the block zeroed.
    ///
    /// # Errors
    ///
    /// Attempting to write a block out of range returns an error.
    fn write_block(&mut self, blocknr: BlockNumber, buf: &[u8]) -> std::io::Result<()>;

    /// Flushes any buffered disk I/O. Metadata is only considered persisted
    /// once this returns.
    fn sync_disk(&mut self) -> std::io::Result<()>;
}
