// Minix V1 on-disk structures
// All multi-byte fields are little-endian.

use super::constants::*;
use byteorder::{LittleEndian, ReadBytesExt};
use minix_core::MinixError;
use serde::Serialize;
use std::io::{Cursor, Read};

/// Largest zone shift accepted from a superblock (zones of 64 MiB).
pub const MAX_LOG_ZONE_SIZE: u16 = 16;

/// File system geometry, read from the block at offset 1024.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuperBlock {
    pub inode_count: u16,
    /// Total number of zones, including the ones taken by metadata.
    pub zone_count: u16,
    pub inode_map_block_count: u16,
    pub zone_map_block_count: u16,
    /// First zone holding data.
    pub first_zone: u16,
    /// log2 of blocks per zone
    pub log_zone_size: u16,
    pub file_size_max: u32,
    pub magic: u16,
    /// Bit 0 set when the file system was cleanly unmounted.
    pub state: u16,
}

impl SuperBlock {
    /// Decode the fields in on-disk order. Does not validate.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self, MinixError> {
        Ok(SuperBlock {
            inode_count: reader.read_u16::<LittleEndian>()?,
            zone_count: reader.read_u16::<LittleEndian>()?,
            inode_map_block_count: reader.read_u16::<LittleEndian>()?,
            zone_map_block_count: reader.read_u16::<LittleEndian>()?,
            first_zone: reader.read_u16::<LittleEndian>()?,
            log_zone_size: reader.read_u16::<LittleEndian>()?,
            file_size_max: reader.read_u32::<LittleEndian>()?,
            magic: reader.read_u16::<LittleEndian>()?,
            state: reader.read_u16::<LittleEndian>()?,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MinixError> {
        Self::from_reader(&mut Cursor::new(bytes))
    }

    /// Check the magic number and the fields the read path depends on.
    pub fn validate(&self) -> Result<(), MinixError> {
        if self.magic != MINIX_SUPER_MAGIC {
            return Err(match MinixVersion::from_magic(self.magic) {
                Some(version) => MinixError::Format(format!(
                    "{} (magic 0x{:04X}) is not supported, only Minix v1 (0x{:04X})",
                    version.name(),
                    self.magic,
                    MINIX_SUPER_MAGIC
                )),
                None => MinixError::Format(format!(
                    "Invalid Minix magic: 0x{:04X} (expected 0x{:04X})",
                    self.magic, MINIX_SUPER_MAGIC
                )),
            });
        }

        if self.log_zone_size > MAX_LOG_ZONE_SIZE {
            return Err(MinixError::Format(format!(
                "Zone size shift {} is out of range",
                self.log_zone_size
            )));
        }

        Ok(())
    }

    pub fn cleanly_unmounted(&self) -> bool {
        self.state & MINIX_VALID_FS != 0
    }

    /// Zone size in bytes.
    pub fn zone_size(&self) -> u64 {
        (BLOCK_SIZE as u64) << self.log_zone_size
    }

    pub fn blocks_per_zone(&self) -> u32 {
        1 << self.log_zone_size
    }

    pub fn inode_table_block_count(&self) -> u32 {
        (self.inode_count as u32).div_ceil(INODES_PER_BLOCK as u32)
    }

    /// Block holding inode #1: after the boot block, the superblock and both bitmaps.
    pub fn first_inode_table_block(&self) -> u32 {
        FIRST_MAP_BLOCK + self.inode_map_block_count as u32 + self.zone_map_block_count as u32
    }

    pub fn version(&self) -> Option<MinixVersion> {
        MinixVersion::from_magic(self.magic)
    }
}

/// Inode type, taken from the `I_TYPE` bits of the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileType {
    Unknown,
    Regular,
    Directory,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
    Symlink,
}

impl FileType {
    pub fn from_mode(mode: u16) -> Self {
        match mode & I_TYPE {
            I_REGULAR => FileType::Regular,
            I_DIRECTORY => FileType::Directory,
            I_CHAR_SPECIAL => FileType::CharDevice,
            I_BLOCK_SPECIAL => FileType::BlockDevice,
            I_NAMED_PIPE => FileType::Fifo,
            I_SOCKET => FileType::Socket,
            I_SYMBOLIC_LINK => FileType::Symlink,
            _ => FileType::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FileType::Unknown => "unknown",
            FileType::Regular => "file",
            FileType::Directory => "directory",
            FileType::CharDevice => "character device",
            FileType::BlockDevice => "block device",
            FileType::Fifo => "fifo",
            FileType::Socket => "socket",
            FileType::Symlink => "symlink",
        }
    }
}

/// A decoded 32-byte inode, tagged with its own inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Inode {
    /// Not stored on disk; the 1-based number this record was loaded from.
    pub number: u32,
    pub mode: u16,
    pub uid: u16,
    pub file_size: u32,
    /// Seconds since the epoch.
    pub mtime: u32,
    pub gid: u8,
    pub links: u8,
    /// Direct zones; 0 means no zone.
    pub zone_numbers: [u16; NR_DIRECT_ZONES],
    pub indirect: u16,
    pub double_indirect: u16,
}

impl Inode {
    /// Decode the record at the start of `bytes`.
    pub fn decode(number: u32, bytes: &[u8]) -> Result<Self, MinixError> {
        let mut cursor = Cursor::new(bytes);

        let mode = cursor.read_u16::<LittleEndian>()?;
        let uid = cursor.read_u16::<LittleEndian>()?;
        let file_size = cursor.read_u32::<LittleEndian>()?;
        let mtime = cursor.read_u32::<LittleEndian>()?;
        let gid = cursor.read_u8()?;
        let links = cursor.read_u8()?;
        let mut zone_numbers = [0u16; NR_DIRECT_ZONES];
        cursor.read_u16_into::<LittleEndian>(&mut zone_numbers)?;
        let indirect = cursor.read_u16::<LittleEndian>()?;
        let double_indirect = cursor.read_u16::<LittleEndian>()?;

        Ok(Inode {
            number,
            mode,
            uid,
            file_size,
            mtime,
            gid,
            links,
            zone_numbers,
            indirect,
            double_indirect,
        })
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_mode(self.mode)
    }

    pub fn is_directory(&self) -> bool {
        self.mode & I_TYPE == I_DIRECTORY
    }

    pub fn is_regular(&self) -> bool {
        self.mode & I_TYPE == I_REGULAR
    }

    /// Permission bits, including setuid/setgid/sticky.
    pub fn permissions(&self) -> u16 {
        self.mode & ALL_MODES
    }

    pub fn uses_indirect_zones(&self) -> bool {
        self.indirect != 0 || self.double_indirect != 0
    }

    /// Direct zones that are actually allocated, in order.
    pub fn direct_zones(&self) -> impl Iterator<Item = u16> + '_ {
        self.zone_numbers.iter().copied().filter(|&zone| zone != 0)
    }

    /// Translate a byte offset in this file into the physical block holding it.
    ///
    /// Only the seven direct zones are addressable. A zero zone number is a
    /// hole, which is refused rather than read back as zeros.
    pub fn position_to_block(&self, position: u64, log_zone_size: u16) -> Result<u32, MinixError> {
        if log_zone_size > MAX_LOG_ZONE_SIZE {
            return Err(MinixError::Format(format!(
                "Zone size shift {} is out of range",
                log_zone_size
            )));
        }

        let block_index = position / BLOCK_SIZE as u64;
        let zone_index = block_index >> log_zone_size;
        let block_offset = block_index - (zone_index << log_zone_size);

        if zone_index >= NR_DIRECT_ZONES as u64 {
            return Err(MinixError::NotSupported(format!(
                "inode {}: offset {} is past the direct zones (indirect zones are not supported)",
                self.number, position
            )));
        }

        let zone = self.zone_numbers[zone_index as usize];
        if zone == 0 {
            return Err(MinixError::NotSupported(format!(
                "inode {}: offset {} falls in a sparse zone",
                self.number, position
            )));
        }

        let block = ((zone as u64) << log_zone_size) + block_offset;
        u32::try_from(block).map_err(|_| {
            MinixError::Format(format!("inode {}: block number {} is out of range", self.number, block))
        })
    }
}

/// One 16-byte directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub inode_number: u16,
    /// Raw name bytes, without the null padding.
    pub name: Vec<u8>,
}

impl DirectoryEntry {
    /// Decode a record. The name ends at the first null byte, or uses all 14
    /// bytes when there is none.
    pub fn decode(record: &[u8]) -> Result<Self, MinixError> {
        if record.len() < DIR_ENTRY_SIZE {
            return Err(MinixError::Format(format!(
                "Directory record is {} bytes, expected {}",
                record.len(),
                DIR_ENTRY_SIZE
            )));
        }

        let inode_number = u16::from_le_bytes([record[0], record[1]]);
        let raw_name = &record[2..DIR_ENTRY_SIZE];
        let name_len = raw_name.iter().position(|&b| b == 0).unwrap_or(MAX_NAME_LEN);

        Ok(DirectoryEntry {
            inode_number,
            name: raw_name[..name_len].to_vec(),
        })
    }

    /// Decode every used record of a directory block, skipping empty slots.
    pub fn decode_block(block: &[u8]) -> Result<Vec<Self>, MinixError> {
        let mut entries = Vec::new();
        for record in block.chunks_exact(DIR_ENTRY_SIZE) {
            let entry = Self::decode(record)?;
            if entry.inode_number != 0 {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).to_string()
    }

    pub fn is_dot_or_dot_dot(&self) -> bool {
        self.name == DOT || self.name == DOT_DOT
    }
}

/// A directory inode together with its entries.
#[derive(Debug, Clone)]
pub struct Directory {
    pub inode: Inode,
    pub entries: Vec<DirectoryEntry>,
}

impl Directory {
    pub fn find(&self, name: &[u8]) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Entries other than "." and "..".
    pub fn children(&self) -> impl Iterator<Item = &DirectoryEntry> + '_ {
        self.entries.iter().filter(|entry| !entry.is_dot_or_dot_dot())
    }
}
