// Filesystem families organization
pub mod families;

pub mod utils;

// Minix V1 reader
pub use families::minix::{
    DirEntry, FileHandle, FileLike, FileType, Inode, MinixFamily, MinixInfo, MinixReader,
    OpenMode, StatRecord, SuperBlock, Walk, WalkEntry, Whence,
};

// Family detection
pub use families::{FamilyOperations, FamilySignature, FilesystemFamily};
