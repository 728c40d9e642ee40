// Minix File Operations
// Read-only file handles over regular-file inodes

use log::{debug, trace};
use minix_core::MinixError;
use std::io::{Read, Seek};
use std::str::FromStr;

use super::core::constants::BLOCK_SIZE;
use super::core::structures::{FileType, Inode};
use super::reader::MinixReader;

type MinixResult<T> = Result<T, MinixError>;

/// Access requested by an open mode string such as `"rb"` or `"w+"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub read: bool,
    pub write: bool,
}

impl OpenMode {
    pub const READ: OpenMode = OpenMode { read: true, write: false };
}

impl FromStr for OpenMode {
    type Err = MinixError;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        let invalid = || MinixError::InvalidInput(format!("Invalid mode: '{}'", mode));

        let mut base = None;
        let mut update = false;
        let mut kind = None;
        for c in mode.chars() {
            match c {
                'r' | 'w' | 'a' | 'x' if base.is_none() => base = Some(c),
                '+' if !update => update = true,
                'b' | 't' if kind.is_none() => kind = Some(c),
                _ => return Err(invalid()),
            }
        }

        match base {
            Some('r') => Ok(OpenMode { read: true, write: update }),
            Some(_) => Ok(OpenMode { read: update, write: true }),
            None => Err(invalid()),
        }
    }
}

/// Reference point for [`FileHandle::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

/// Capability queries for file-like objects.
pub trait FileLike {
    fn readable(&self) -> MinixResult<bool>;
    fn seekable(&self) -> MinixResult<bool>;
    fn writable(&self) -> MinixResult<bool>;
    fn closed(&self) -> bool;
}

/// An open regular file.
///
/// Reads are served one block at a time: a request must fit inside the block
/// holding the current position.
pub struct FileHandle<'a, R> {
    reader: &'a MinixReader<R>,
    path: String,
    inode: Inode,
    position: u64,
    closed: bool,
}

impl<'a, R: Read + Seek> FileHandle<'a, R> {
    pub fn open(reader: &'a MinixReader<R>, path: &str, mode: &str) -> MinixResult<Self> {
        let mode: OpenMode = mode.parse()?;
        if mode.write {
            return Err(MinixError::NotSupported(format!(
                "Filesystem is read-only, cannot open '{}' for writing",
                path
            )));
        }

        let inode = reader.resolve(path)?;
        match inode.file_type() {
            FileType::Directory => return Err(MinixError::IsADirectory(path.to_string())),
            FileType::Regular => {}
            other => {
                return Err(MinixError::UnsupportedType(format!(
                    "{} is a {}",
                    path,
                    other.name()
                )))
            }
        }

        if inode.uses_indirect_zones() {
            return Err(MinixError::NotSupported(format!(
                "{} uses indirect zones",
                path
            )));
        }

        debug!("Opened {} (inode {}, {} bytes)", path, inode.number, inode.file_size);
        Ok(FileHandle {
            reader,
            path: path.to_string(),
            inode,
            position: 0,
            closed: false,
        })
    }

    /// Read up to `size` bytes from the current position.
    ///
    /// Returns an empty buffer at or past the end of the file.
    pub fn read(&mut self, size: usize) -> MinixResult<Vec<u8>> {
        self.ensure_open()?;

        let remaining = self.size().saturating_sub(self.position);
        let count = (size as u64).min(remaining) as usize;
        if count == 0 {
            return Ok(Vec::new());
        }

        let offset_in_block = (self.position % BLOCK_SIZE as u64) as usize;
        if offset_in_block + count > BLOCK_SIZE {
            return Err(MinixError::NotSupported(format!(
                "Reading {} bytes at offset {} of {} crosses a block boundary",
                count, self.position, self.path
            )));
        }

        let block_number = self.reader.position_to_block(&self.inode, self.position)?;
        trace!("{}: offset {} is in block {}", self.path, self.position, block_number);
        let block = self.reader.read_block(block_number)?;

        self.position += count as u64;
        Ok(block[offset_in_block..offset_in_block + count].to_vec())
    }

    /// Read everything from the current position to the end of the file.
    pub fn read_to_end(&mut self) -> MinixResult<Vec<u8>> {
        self.ensure_open()?;
        let remaining = self.size().saturating_sub(self.position);
        self.read(remaining as usize)
    }

    /// Move the cursor. Only absolute, non-negative positions are supported.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> MinixResult<u64> {
        self.ensure_open()?;

        if whence != Whence::Start {
            return Err(MinixError::NotSupported(format!(
                "Seeking relative to {:?} is not implemented",
                whence
            )));
        }
        if offset < 0 {
            return Err(MinixError::NotSupported(format!(
                "Negative seek position {}",
                offset
            )));
        }

        self.position = offset as u64;
        Ok(self.position)
    }

    pub fn tell(&self) -> MinixResult<u64> {
        self.ensure_open()?;
        Ok(self.position)
    }
}

impl<'a, R> FileHandle<'a, R> {
    /// Mark the handle closed. Closing twice is fine.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn size(&self) -> u64 {
        self.inode.file_size as u64
    }

    /// The path the handle was opened with.
    pub fn name(&self) -> &str {
        &self.path
    }

    pub fn inode(&self) -> &Inode {
        &self.inode
    }

    fn ensure_open(&self) -> MinixResult<()> {
        if self.closed {
            return Err(MinixError::ClosedHandle);
        }
        Ok(())
    }
}

impl<'a, R> FileLike for FileHandle<'a, R> {
    fn readable(&self) -> MinixResult<bool> {
        self.ensure_open()?;
        Ok(true)
    }

    fn seekable(&self) -> MinixResult<bool> {
        self.ensure_open()?;
        Ok(true)
    }

    fn writable(&self) -> MinixResult<bool> {
        self.ensure_open()?;
        Ok(false)
    }

    fn closed(&self) -> bool {
        self.closed
    }
}

impl<R: Read + Seek> MinixReader<R> {
    /// Open a regular file for reading.
    pub fn open(&self, path: &str, mode: &str) -> MinixResult<FileHandle<'_, R>> {
        FileHandle::open(self, path, mode)
    }

    /// Read a whole file in one request.
    pub fn read_file(&self, path: &str) -> MinixResult<Vec<u8>> {
        let mut file = self.open(path, "rb")?;
        let data = file.read_to_end()?;
        file.close();
        Ok(data)
    }
}
