// Minix filesystem family - read-only support for the V1 layout
pub mod core;
pub mod dir_ops;
pub mod file_ops;
pub mod path_resolver;
pub mod reader;

mod family;

pub use self::core::{Directory, DirectoryEntry, FileType, Inode, SuperBlock, MinixVersion};
pub use dir_ops::{DirEntry, ScanDir, StatRecord, Walk, WalkEntry};
pub use family::MinixFamily;
pub use file_ops::{FileHandle, FileLike, OpenMode, Whence};
pub use path_resolver::MinixPathResolver;
pub use reader::{MinixInfo, MinixReader};
