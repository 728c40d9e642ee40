// Minix V1 on-disk constants

use static_assertions::const_assert_eq;

/// Size of a block in bytes. Every on-disk I/O is one block.
pub const BLOCK_SIZE: usize = 1024;

/// Size of an inode record on disk.
pub const INODE_SIZE: usize = 32;

pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

/// Size of a directory record: 2-byte inode number plus the name.
pub const DIR_ENTRY_SIZE: usize = 16;
pub const MAX_NAME_LEN: usize = 14;
pub const DIR_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;

/// Number of direct zone slots in an inode.
pub const NR_DIRECT_ZONES: usize = 7;

pub const ROOT_INODE: u32 = 1;

/// Byte offset of the superblock; the first block is left for the boot loader.
pub const SUPERBLOCK_OFFSET: u64 = 1024;
pub const SUPERBLOCK_SIZE: usize = 1024;

/// Well-known block numbers
pub const BOOT_BLOCK: u32 = 0;
pub const SUPER_BLOCK: u32 = 1;
/// First bitmap block; the inode map comes first, the zone map right after.
pub const FIRST_MAP_BLOCK: u32 = SUPER_BLOCK + 1;

/// Number of bits tracked by one bitmap block.
pub const BITS_PER_BLOCK: usize = BLOCK_SIZE * 8;

// Superblock magic numbers
pub const MINIX_SUPER_MAGIC: u16 = 0x137F;
pub const MINIX_SUPER_MAGIC2: u16 = 0x138F;
pub const MINIX2_SUPER_MAGIC: u16 = 0x2468;
pub const MINIX2_SUPER_MAGIC2: u16 = 0x2478;
pub const MINIX3_SUPER_MAGIC: u16 = 0x4D5A;

/// Superblock state flag set when the file system was cleanly unmounted.
pub const MINIX_VALID_FS: u16 = 0x0001;

// Inode mode bits
pub const I_TYPE: u16 = 0o170000;
pub const I_SOCKET: u16 = 0o140000;
pub const I_SYMBOLIC_LINK: u16 = 0o120000;
pub const I_REGULAR: u16 = 0o100000;
pub const I_BLOCK_SPECIAL: u16 = 0o060000;
pub const I_DIRECTORY: u16 = 0o040000;
pub const I_CHAR_SPECIAL: u16 = 0o020000;
pub const I_NAMED_PIPE: u16 = 0o010000;
pub const I_SET_UID_BIT: u16 = 0o004000;
pub const I_SET_GID_BIT: u16 = 0o002000;
pub const I_STICKY_BIT: u16 = 0o001000;
pub const ALL_MODES: u16 = 0o007777;
pub const RWX_MODES: u16 = 0o000777;

/// Names a directory always carries for itself and its parent.
pub const DOT: &[u8] = b".";
pub const DOT_DOT: &[u8] = b"..";

const_assert_eq!(INODES_PER_BLOCK * INODE_SIZE, BLOCK_SIZE);
const_assert_eq!(DIR_ENTRIES_PER_BLOCK * DIR_ENTRY_SIZE, BLOCK_SIZE);
const_assert_eq!(DIR_ENTRY_SIZE, 2 + MAX_NAME_LEN);
const_assert_eq!(INODE_SIZE, 2 + 2 + 4 + 4 + 1 + 1 + 2 * NR_DIRECT_ZONES + 2 + 2);

/// Minix on-disk variants, told apart by the superblock magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinixVersion {
    V1,
    V1LongNames,
    V2,
    V2LongNames,
    V3,
}

impl MinixVersion {
    pub fn from_magic(magic: u16) -> Option<Self> {
        match magic {
            MINIX_SUPER_MAGIC => Some(MinixVersion::V1),
            MINIX_SUPER_MAGIC2 => Some(MinixVersion::V1LongNames),
            MINIX2_SUPER_MAGIC => Some(MinixVersion::V2),
            MINIX2_SUPER_MAGIC2 => Some(MinixVersion::V2LongNames),
            MINIX3_SUPER_MAGIC => Some(MinixVersion::V3),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MinixVersion::V1 => "Minix v1",
            MinixVersion::V1LongNames => "Minix v1 (30 character names)",
            MinixVersion::V2 => "Minix v2",
            MinixVersion::V2LongNames => "Minix v2 (30 character names)",
            MinixVersion::V3 => "Minix v3",
        }
    }
}
