// Test image builder
// Lays out Minix V1 images in memory the same way mkfs.minix does
#![allow(dead_code)]

use minix_filesystems::MinixReader;
use std::collections::HashMap;
use std::io::Cursor;

pub const BLOCK_SIZE: usize = 1024;
const INODE_SIZE: usize = 32;
const BITS_PER_BLOCK: usize = BLOCK_SIZE * 8;
pub const MINIX_MAGIC: u16 = 0x137F;

pub const S_IFDIR: u16 = 0o040000;
pub const S_IFREG: u16 = 0o100000;
pub const S_IFCHR: u16 = 0o020000;
pub const S_IFLNK: u16 = 0o120000;

pub const MTIME: u32 = 1_700_000_000;

#[derive(Debug, Clone, Default)]
pub struct RawInode {
    pub mode: u16,
    pub uid: u16,
    pub size: u32,
    pub mtime: u32,
    pub gid: u8,
    pub links: u8,
    pub zones: [u16; 7],
    pub indirect: u16,
    pub double_indirect: u16,
}

impl RawInode {
    fn encode(&self) -> [u8; INODE_SIZE] {
        let mut out = [0u8; INODE_SIZE];
        out[0..2].copy_from_slice(&self.mode.to_le_bytes());
        out[2..4].copy_from_slice(&self.uid.to_le_bytes());
        out[4..8].copy_from_slice(&self.size.to_le_bytes());
        out[8..12].copy_from_slice(&self.mtime.to_le_bytes());
        out[12] = self.gid;
        out[13] = self.links;
        for (i, zone) in self.zones.iter().enumerate() {
            out[14 + i * 2..16 + i * 2].copy_from_slice(&zone.to_le_bytes());
        }
        out[28..30].copy_from_slice(&self.indirect.to_le_bytes());
        out[30..32].copy_from_slice(&self.double_indirect.to_le_bytes());
        out
    }
}

pub struct ImageBuilder {
    image: Vec<u8>,
    inode_count: u16,
    zone_count: u16,
    imap_blocks: u16,
    zmap_blocks: u16,
    first_zone: u16,
    log_zone_size: u16,
    magic: u16,
    state: u16,
    /// inodes[0] is inode #1
    inodes: Vec<RawInode>,
    allocated_zones: Vec<u16>,
    next_zone: u16,
    paths: HashMap<String, u16>,
}

impl ImageBuilder {
    pub fn new(total_blocks: u16, inode_count: u16) -> Self {
        Self::with_zone_shift(total_blocks, inode_count, 0)
    }

    pub fn with_zone_shift(total_blocks: u16, inode_count: u16, log_zone_size: u16) -> Self {
        let blocks_per_zone = 1usize << log_zone_size;
        let zone_count = (total_blocks as usize / blocks_per_zone) as u16;
        let imap_blocks = (inode_count as usize + 1).div_ceil(BITS_PER_BLOCK);
        let itable_blocks = (inode_count as usize).div_ceil(BLOCK_SIZE / INODE_SIZE);

        let mut zmap_blocks = 1;
        let first_zone = loop {
            let meta_blocks = 2 + imap_blocks + zmap_blocks + itable_blocks;
            let first_zone = meta_blocks.div_ceil(blocks_per_zone);
            let needed = (zone_count as usize - first_zone + 1).div_ceil(BITS_PER_BLOCK);
            if needed <= zmap_blocks {
                break first_zone;
            }
            zmap_blocks = needed;
        };

        let mut builder = ImageBuilder {
            image: vec![0u8; zone_count as usize * blocks_per_zone * BLOCK_SIZE],
            inode_count,
            zone_count,
            imap_blocks: imap_blocks as u16,
            zmap_blocks: zmap_blocks as u16,
            first_zone: first_zone as u16,
            log_zone_size,
            magic: MINIX_MAGIC,
            state: 1,
            inodes: Vec::new(),
            allocated_zones: Vec::new(),
            next_zone: first_zone as u16,
            paths: HashMap::new(),
        };

        let root = builder.alloc_inode(S_IFDIR | 0o755);
        builder.inodes[0].links = 2;
        builder.add_dir_entry(root, b".", root);
        builder.add_dir_entry(root, b"..", root);
        builder.paths.insert("/".to_string(), root);
        builder
    }

    /// The 25 MB geometry mkfs.minix picks by default: 8544 inodes, 25600 blocks.
    pub fn default_25mb() -> Self {
        Self::new(25600, 8544)
    }

    pub fn first_zone(&self) -> u16 {
        self.first_zone
    }

    fn zone_bytes(&self) -> usize {
        BLOCK_SIZE << self.log_zone_size
    }

    fn zone_offset(&self, zone: u16) -> usize {
        zone as usize * self.zone_bytes()
    }

    fn alloc_inode(&mut self, mode: u16) -> u16 {
        assert!(self.inodes.len() < self.inode_count as usize, "out of inodes");
        self.inodes.push(RawInode {
            mode,
            mtime: MTIME,
            links: 1,
            ..Default::default()
        });
        self.inodes.len() as u16
    }

    fn alloc_zone(&mut self) -> u16 {
        let zone = self.next_zone;
        assert!(zone < self.zone_count, "out of zones");
        self.next_zone += 1;
        self.allocated_zones.push(zone);
        zone
    }

    pub fn inode_mut(&mut self, inode_number: u16) -> &mut RawInode {
        &mut self.inodes[inode_number as usize - 1]
    }

    /// Append a raw record to a directory inode, growing it by 16 bytes.
    pub fn add_dir_entry(&mut self, dir: u16, name: &[u8], child: u16) {
        assert!(name.len() <= 14, "name too long");
        let zone_bytes = self.zone_bytes();
        let size = self.inode_mut(dir).size as usize;
        let zone_index = size / zone_bytes;
        assert!(zone_index < 7, "directory is full");

        if self.inode_mut(dir).zones[zone_index] == 0 {
            let zone = self.alloc_zone();
            self.inode_mut(dir).zones[zone_index] = zone;
        }
        let zone = self.inode_mut(dir).zones[zone_index];
        let at = self.zone_offset(zone) + size % zone_bytes;

        self.image[at..at + 2].copy_from_slice(&child.to_le_bytes());
        self.image[at + 2..at + 2 + name.len()].copy_from_slice(name);
        self.inode_mut(dir).size += 16;
    }

    fn split(path: &str) -> (String, String) {
        let trimmed = path.trim_end_matches('/');
        let idx = trimmed.rfind('/').expect("absolute path");
        let parent = if idx == 0 { "/".to_string() } else { trimmed[..idx].to_string() };
        (parent, trimmed[idx + 1..].to_string())
    }

    fn link(&mut self, path: &str, child: u16) {
        let (parent, name) = Self::split(path);
        let parent_inode = *self.paths.get(&parent).unwrap_or_else(|| panic!("no directory {}", parent));
        self.add_dir_entry(parent_inode, name.as_bytes(), child);
        self.paths.insert(path.trim_end_matches('/').to_string(), child);
    }

    pub fn mkdir(&mut self, path: &str) -> u16 {
        let (parent, _) = Self::split(path);
        let parent_inode = self.paths[&parent];
        let dir = self.alloc_inode(S_IFDIR | 0o755);
        self.inode_mut(dir).links = 2;
        self.add_dir_entry(dir, b".", dir);
        self.add_dir_entry(dir, b"..", parent_inode);
        self.link(path, dir);
        self.inode_mut(parent_inode).links += 1;
        dir
    }

    /// Creates a directory whose on-disk name is `name` as given, which need
    /// not be UTF-8. Later builder calls refer to it as `alias`.
    pub fn mkdir_raw(&mut self, parent: &str, name: &[u8], alias: &str) -> u16 {
        let parent_inode = self.paths[parent];
        let dir = self.alloc_inode(S_IFDIR | 0o755);
        self.inode_mut(dir).links = 2;
        self.add_dir_entry(dir, b".", dir);
        self.add_dir_entry(dir, b"..", parent_inode);
        self.add_dir_entry(parent_inode, name, dir);
        self.inode_mut(parent_inode).links += 1;
        self.paths.insert(alias.to_string(), dir);
        dir
    }

    pub fn write_file(&mut self, path: &str, content: &[u8]) -> u16 {
        let file = self.alloc_inode(S_IFREG | 0o644);
        let zone_bytes = self.zone_bytes();
        for (i, chunk) in content.chunks(zone_bytes).enumerate() {
            assert!(i < 7, "file needs indirect zones");
            let zone = self.alloc_zone();
            self.inode_mut(file).zones[i] = zone;
            let at = self.zone_offset(zone);
            self.image[at..at + chunk.len()].copy_from_slice(chunk);
        }
        self.inode_mut(file).size = content.len() as u32;
        self.link(path, file);
        file
    }

    /// Create an inode of any type without data zones.
    pub fn mknod(&mut self, path: &str, mode: u16) -> u16 {
        let node = self.alloc_inode(mode);
        self.link(path, node);
        node
    }

    pub fn set_magic(&mut self, magic: u16) {
        self.magic = magic;
    }

    pub fn set_state(&mut self, state: u16) {
        self.state = state;
    }

    pub fn inode_table_block(&self) -> usize {
        2 + self.imap_blocks as usize + self.zmap_blocks as usize
    }

    pub fn build(mut self) -> Vec<u8> {
        let sb = BLOCK_SIZE;
        let fields = [
            self.inode_count,
            self.zone_count,
            self.imap_blocks,
            self.zmap_blocks,
            self.first_zone,
            self.log_zone_size,
        ];
        for (i, field) in fields.iter().enumerate() {
            self.image[sb + i * 2..sb + i * 2 + 2].copy_from_slice(&field.to_le_bytes());
        }
        let max_size: u32 = (7 + 512 + 512 * 512) * BLOCK_SIZE as u32;
        self.image[sb + 12..sb + 16].copy_from_slice(&max_size.to_le_bytes());
        self.image[sb + 16..sb + 18].copy_from_slice(&self.magic.to_le_bytes());
        self.image[sb + 18..sb + 20].copy_from_slice(&self.state.to_le_bytes());

        // Bit 0 of both maps is reserved and always set.
        let imap = 2 * BLOCK_SIZE;
        for bit in 0..=self.inodes.len() {
            self.image[imap + bit / 8] |= 1 << (bit % 8);
        }
        let zmap = imap + self.imap_blocks as usize * BLOCK_SIZE;
        self.image[zmap] |= 1;
        for zone in self.allocated_zones.clone() {
            let bit = (zone - self.first_zone + 1) as usize;
            self.image[zmap + bit / 8] |= 1 << (bit % 8);
        }

        let table = self.inode_table_block() * BLOCK_SIZE;
        for (i, inode) in self.inodes.iter().enumerate() {
            let at = table + i * INODE_SIZE;
            self.image[at..at + INODE_SIZE].copy_from_slice(&inode.encode());
        }

        self.image
    }

    pub fn inodes_used(&self) -> usize {
        self.inodes.len()
    }

    pub fn zones_used(&self) -> usize {
        self.allocated_zones.len()
    }
}

pub const WELCOME: &[u8] = b"Hello\n";
pub const BOOKS: &[u8] = b"OS: Design and Implementation\nTo Kill a Mocking Bird\n";

/// The tree used throughout: a 25 MB image with a small Unix-like layout.
pub fn sample_tree() -> ImageBuilder {
    let mut builder = ImageBuilder::default_25mb();
    for dir in ["/system", "/users", "/media"] {
        builder.mkdir(dir);
    }
    for dir in ["/users/dick", "/users/erik", "/users/jim", "/users/ast", "/media/audio", "/media/videos"] {
        builder.mkdir(dir);
    }
    for dir in ["/system/bin", "/system/lib", "/system/etc", "/system/var"] {
        builder.mkdir(dir);
    }
    for file in ["/system/bin/sh", "/system/bin/ls", "/system/bin/rm", "/system/bin/ping", "/system/bin/tar"] {
        builder.write_file(file, b"");
    }
    builder.write_file("/media/videos/bunny.mkv", b"");
    builder.write_file("/media/audio/fur-elise.mid", b"");
    builder.write_file("/users/ast/welcome", WELCOME);
    builder.write_file("/users/ast/books", BOOKS);
    builder
}

pub fn open(image: Vec<u8>) -> MinixReader<Cursor<Vec<u8>>> {
    MinixReader::from_reader(Cursor::new(image)).expect("image should load")
}

pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
