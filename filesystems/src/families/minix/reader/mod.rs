// Minix filesystem reader
// Loads the superblock, bitmaps and root inode of a V1 image and reads
// inodes, blocks and directories from it on demand.

use log::{debug, info, trace, warn};
use minix_core::{Device, MinixError};
use serde::Serialize;
use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::core::{
    constants::*,
    structures::*,
};

/// A loaded Minix file system.
///
/// Nothing is cached beyond the superblock, the bitmaps and the root inode:
/// every inode and directory lookup goes back to the source and relies on the
/// host's page cache instead.
pub struct MinixReader<R> {
    source: RefCell<R>,
    superblock: SuperBlock,
    inode_map_blocks: Vec<Vec<u8>>,
    zone_map_blocks: Vec<Vec<u8>>,
    root_inode: Inode,
}

impl MinixReader<File> {
    /// Open an image file on the host file system.
    pub fn open_image<P: AsRef<Path>>(path: P) -> Result<Self, MinixError> {
        let device = Device::from_image_path(path.as_ref())?;
        Self::from_device(&device)
    }

    pub fn from_device(device: &Device) -> Result<Self, MinixError> {
        info!("Opening Minix filesystem on device: {}", device.name);
        let file = crate::utils::open_device_read(device)?;
        Self::from_reader(file)
    }
}

impl<R: Read + Seek> MinixReader<R> {
    /// Load the file system from a byte source positioned anywhere.
    pub fn from_reader(mut source: R) -> Result<Self, MinixError> {
        source.seek(SeekFrom::Start(SUPERBLOCK_OFFSET))?;
        let superblock = SuperBlock::from_reader(&mut source)?;
        superblock.validate()?;

        info!(
            "Minix v1: {} inodes, {} zones, first data zone {}, zone size {}",
            superblock.inode_count,
            superblock.zone_count,
            superblock.first_zone,
            superblock.zone_size()
        );
        if !superblock.cleanly_unmounted() {
            warn!("Filesystem was not cleanly unmounted");
        }

        // The inode map comes first, the zone map right after it.
        let inode_maps = superblock.inode_map_block_count as u32;
        let zone_maps = superblock.zone_map_block_count as u32;
        let inode_map_blocks = read_blocks(&mut source, FIRST_MAP_BLOCK, inode_maps)?;
        let zone_map_blocks = read_blocks(&mut source, FIRST_MAP_BLOCK + inode_maps, zone_maps)?;
        debug!(
            "Loaded {} inode map and {} zone map blocks",
            inode_map_blocks.len(),
            zone_map_blocks.len()
        );

        let root_inode = read_inode(&mut source, &superblock, ROOT_INODE)?;
        if !root_inode.is_directory() {
            return Err(MinixError::Format(format!(
                "Root inode is not a directory (mode 0o{:o})",
                root_inode.mode
            )));
        }

        Ok(MinixReader {
            source: RefCell::new(source),
            superblock,
            inode_map_blocks,
            zone_map_blocks,
            root_inode,
        })
    }

    /// Read one 1024-byte block.
    pub fn read_block(&self, block_number: u32) -> Result<Vec<u8>, MinixError> {
        let mut source = self.source.borrow_mut();
        read_fs_block(&mut *source, block_number)
    }

    /// Read and decode inode `inode_number` from the inode table.
    pub fn get_inode(&self, inode_number: u32) -> Result<Inode, MinixError> {
        let mut source = self.source.borrow_mut();
        read_inode(&mut *source, &self.superblock, inode_number)
    }

    /// Physical block holding byte `position` of the inode's data.
    pub fn position_to_block(&self, inode: &Inode, position: u64) -> Result<u32, MinixError> {
        inode.position_to_block(position, self.superblock.log_zone_size)
    }

    /// Read every entry of a directory inode, in on-disk order.
    pub fn read_directory(&self, inode: &Inode) -> Result<Directory, MinixError> {
        if !inode.is_directory() {
            return Err(MinixError::NotADirectory(format!("inode {}", inode.number)));
        }
        if inode.indirect != 0 {
            return Err(MinixError::NotSupported(format!(
                "Directory inode {} uses an indirect zone",
                inode.number
            )));
        }
        if inode.double_indirect != 0 {
            return Err(MinixError::NotSupported(format!(
                "Directory inode {} uses a double indirect zone",
                inode.number
            )));
        }

        debug!("Reading directory inode {}", inode.number);

        let blocks_per_zone = self.superblock.blocks_per_zone();
        let mut entries = Vec::new();
        for zone in inode.direct_zones() {
            let first_block = (zone as u32) << self.superblock.log_zone_size;
            for offset in 0..blocks_per_zone {
                let block = self.read_block(first_block + offset)?;
                entries.extend(DirectoryEntry::decode_block(&block)?);
            }
        }

        trace!("Directory inode {} has {} entries", inode.number, entries.len());
        Ok(Directory { inode: *inode, entries })
    }

    /// Summarise geometry and allocation, counting bits in the bitmaps.
    pub fn info(&self) -> MinixInfo {
        let sb = &self.superblock;

        // Bit 0 of each map is reserved; bit n tracks inode n and zone first_zone + n - 1.
        let inode_bits = sb.inode_count as usize;
        let zone_bits = (sb.zone_count as usize).saturating_sub(sb.first_zone as usize);
        let used_inodes = count_set_bits(&self.inode_map_blocks, 1, inode_bits);
        let used_zones = count_set_bits(&self.zone_map_blocks, 1, zone_bits);

        MinixInfo {
            filesystem_type: sb.version().map(|v| v.name()).unwrap_or("unknown").to_string(),
            block_size: BLOCK_SIZE as u32,
            zone_size: sb.zone_size(),
            total_inodes: sb.inode_count as u32,
            free_inodes: (inode_bits - used_inodes) as u32,
            total_zones: sb.zone_count as u32,
            free_zones: (zone_bits - used_zones) as u32,
            first_data_zone: sb.first_zone as u32,
            max_file_size: sb.file_size_max,
            cleanly_unmounted: sb.cleanly_unmounted(),
        }
    }

    /// Inode #1, loaded and checked when the image was opened.
    pub fn root_inode(&self) -> Inode {
        self.root_inode
    }
}

impl<R> MinixReader<R> {
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn inode_map_blocks(&self) -> &[Vec<u8>] {
        &self.inode_map_blocks
    }

    pub fn zone_map_blocks(&self) -> &[Vec<u8>] {
        &self.zone_map_blocks
    }

    /// Give back the byte source.
    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }
}

fn read_fs_block<R: Read + Seek>(source: &mut R, block_number: u32) -> Result<Vec<u8>, MinixError> {
    trace!("Reading block {}", block_number);
    crate::utils::read_block(source, block_number as u64 * BLOCK_SIZE as u64, BLOCK_SIZE)
}

fn read_blocks<R: Read + Seek>(source: &mut R, first: u32, count: u32) -> Result<Vec<Vec<u8>>, MinixError> {
    (first..first + count)
        .map(|block_number| read_fs_block(&mut *source, block_number))
        .collect()
}

/// Locate inode `inode_number` in the inode table and decode it.
fn read_inode<R: Read + Seek>(
    source: &mut R,
    superblock: &SuperBlock,
    inode_number: u32,
) -> Result<Inode, MinixError> {
    if inode_number == 0 || inode_number > superblock.inode_count as u32 {
        return Err(MinixError::InvalidInput(format!(
            "Invalid inode number: {} (filesystem has {})",
            inode_number, superblock.inode_count
        )));
    }

    let index = inode_number - 1;
    let block_number = index / INODES_PER_BLOCK as u32 + superblock.first_inode_table_block();
    let offset = (index as usize % INODES_PER_BLOCK) * INODE_SIZE;

    let block = read_fs_block(source, block_number)?;
    Inode::decode(inode_number, &block[offset..offset + INODE_SIZE])
}

/// Count set bits `first..first + count` across a run of bitmap blocks.
fn count_set_bits(blocks: &[Vec<u8>], first: usize, count: usize) -> usize {
    let last = (first + count).min(blocks.len() * BITS_PER_BLOCK);
    (first..last)
        .filter(|&bit| {
            let block = &blocks[bit / BITS_PER_BLOCK];
            let within = bit % BITS_PER_BLOCK;
            block[within / 8] & (1 << (within % 8)) != 0
        })
        .count()
}

/// Information about a Minix filesystem
#[derive(Debug, Clone, Serialize)]
pub struct MinixInfo {
    pub filesystem_type: String,
    pub block_size: u32,
    pub zone_size: u64,
    pub total_inodes: u32,
    pub free_inodes: u32,
    pub total_zones: u32,
    pub free_zones: u32,
    pub first_data_zone: u32,
    pub max_file_size: u32,
    pub cleanly_unmounted: bool,
}
