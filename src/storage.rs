use log::debug;
use thiserror::Error;

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::block::Block;
use crate::codec::{self, DecodeError};

/// Errors that can occur during chain-file operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("chain file has {0} trailing bytes after the block list")]
    TrailingBytes(usize),

    #[error("chain file block count would overflow")]
    CountOverflow,
}

/// The on-disk chain: a single file holding the length-prefixed block
/// list
///
/// The file starts with a u64 block count; appending writes the new
/// block's bytes at end-of-file and rewrites the count in place, so a
/// decoded list always has the most recently appended block at its
/// head.
#[derive(Debug)]
pub struct ChainFile {
    path: PathBuf,
}

impl ChainFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ChainFile {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and decodes the whole chain file
    ///
    /// # Returns
    ///
    /// `None` when no chain file exists yet; otherwise the decoded
    /// block list, newest first.
    pub fn load(&self) -> Result<Option<Vec<Block>>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut bytes = Vec::new();
        File::open(&self.path)?.read_to_end(&mut bytes)?;

        let (blocks, rest) = codec::decode_list(&bytes, Block::decode)?;
        if !rest.is_empty() {
            return Err(StorageError::TrailingBytes(rest.len()));
        }

        debug!("loaded {} blocks from {}", blocks.len(), self.path.display());
        Ok(Some(blocks))
    }

    /// Appends one block to the chain file
    ///
    /// Creates the file with a count of one on first use; otherwise
    /// writes the block at end-of-file and rewrites the leading count.
    pub fn append(&self, block: &Block) -> Result<(), StorageError> {
        if !self.path.exists() {
            let mut file = File::create(&self.path)?;
            file.write_all(&1u64.to_be_bytes())?;
            file.write_all(&block.to_bytes())?;
            file.sync_all()?;
            return Ok(());
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;

        let mut count_bytes = [0u8; 8];
        file.read_exact(&mut count_bytes)?;
        let count = u64::from_be_bytes(count_bytes);
        let count = count.checked_add(1).ok_or(StorageError::CountOverflow)?;

        file.seek(SeekFrom::End(0))?;
        file.write_all(&block.to_bytes())?;

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&count.to_be_bytes())?;
        file.sync_all()?;

        Ok(())
    }
}
