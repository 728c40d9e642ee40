// Minix Directory Operations
// stat, scandir-style listings and top-down walks over a loaded image

use log::debug;
use minix_core::MinixError;
use serde::Serialize;
use std::cell::OnceCell;
use std::collections::HashSet;
use std::io::{Read, Seek};

use super::core::structures::{DirectoryEntry, FileType, Inode};
use super::path_resolver::{join_path, join_path_bytes};
use super::reader::MinixReader;

/// Metadata for a file or directory.
///
/// Minix only records the modification time; access and creation times are
/// always `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatRecord {
    pub inode: u32,
    pub file_type: FileType,
    /// Full mode, type bits included.
    pub mode: u16,
    pub size: u64,
    pub links: u16,
    pub uid: u32,
    pub gid: u32,
    pub modified: u64,
    pub accessed: Option<u64>,
    pub created: Option<u64>,
}

impl StatRecord {
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::Regular
    }

    /// Permission bits without the type.
    pub fn permissions(&self) -> u16 {
        self.mode & super::core::constants::ALL_MODES
    }
}

impl From<&Inode> for StatRecord {
    fn from(inode: &Inode) -> Self {
        StatRecord {
            inode: inode.number,
            file_type: inode.file_type(),
            mode: inode.mode,
            size: inode.file_size as u64,
            links: inode.links as u16,
            uid: inode.uid as u32,
            gid: inode.gid as u32,
            modified: inode.mtime as u64,
            accessed: None,
            created: None,
        }
    }
}

/// One entry produced by [`MinixReader::scandir`].
///
/// The entry's inode is only loaded when its metadata is first asked for, and
/// then kept for the lifetime of the entry.
pub struct DirEntry<'a, R> {
    reader: &'a MinixReader<R>,
    name: String,
    raw_name: Vec<u8>,
    path: String,
    raw_path: Vec<u8>,
    inode_number: u32,
    stat: OnceCell<StatRecord>,
}

impl<'a, R: Read + Seek> DirEntry<'a, R> {
    pub fn stat(&self) -> Result<&StatRecord, MinixError> {
        if let Some(stat) = self.stat.get() {
            return Ok(stat);
        }
        let inode = self.reader.get_inode(self.inode_number)?;
        Ok(self.stat.get_or_init(|| StatRecord::from(&inode)))
    }

    pub fn is_dir(&self) -> Result<bool, MinixError> {
        Ok(self.stat()?.is_dir())
    }

    pub fn is_file(&self) -> Result<bool, MinixError> {
        Ok(self.stat()?.is_file())
    }
}

impl<'a, R> DirEntry<'a, R> {
    /// Name decoded as UTF-8, invalid bytes replaced.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name exactly as stored on disk.
    pub fn name_bytes(&self) -> &[u8] {
        &self.raw_name
    }

    /// Full path: the scanned directory joined with the entry name.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Full path with the raw name bytes; always resolvable with
    /// [`MinixReader::resolve_bytes`].
    pub fn path_bytes(&self) -> &[u8] {
        &self.raw_path
    }

    pub fn inode(&self) -> u32 {
        self.inode_number
    }
}

impl<'a, R> std::fmt::Debug for DirEntry<'a, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirEntry")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("inode", &self.inode_number)
            .finish()
    }
}

/// Iterator over a directory's entries, without "." and "..".
pub struct ScanDir<'a, R> {
    reader: &'a MinixReader<R>,
    parent: Vec<u8>,
    entries: std::vec::IntoIter<DirectoryEntry>,
}

impl<'a, R> Iterator for ScanDir<'a, R> {
    type Item = DirEntry<'a, R>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.by_ref().find(|e| !e.is_dot_or_dot_dot())?;
        let raw_path = join_path_bytes(&self.parent, &entry.name);
        Some(DirEntry {
            reader: self.reader,
            name: entry.name_lossy(),
            path: String::from_utf8_lossy(&raw_path).to_string(),
            raw_path,
            raw_name: entry.name,
            inode_number: entry.inode_number as u32,
            stat: OnceCell::new(),
        })
    }
}

/// One step of a walk: a directory, its subdirectories and its other entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: String,
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

/// A directory still to be visited.
struct PendingDir {
    path: String,
    raw_path: Vec<u8>,
    /// Unknown only for the starting path, which is resolved by name.
    inode: Option<u32>,
}

/// Top-down traversal, see [`MinixReader::walk`].
///
/// Subdirectories are entered by inode number, so names that are not valid
/// UTF-8 are walked like any other. A directory reached twice fails with a
/// format error instead of looping.
pub struct Walk<'a, R> {
    reader: &'a MinixReader<R>,
    stack: Vec<PendingDir>,
    visited: HashSet<u32>,
    /// Subdirectories of the last yielded directory, still to descend into.
    pending: Vec<(String, PendingDir)>,
}

impl<'a, R> Walk<'a, R> {
    /// Keep only the subdirectories of the last yielded entry for which `keep`
    /// returns true. Must be called before the walk is advanced.
    pub fn retain_dirs<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.pending.retain(|(name, _)| keep(name));
    }

    /// Do not descend into `name` below the last yielded directory.
    pub fn prune(&mut self, name: &str) {
        self.retain_dirs(|dir| dir != name);
    }
}

impl<'a, R: Read + Seek> Walk<'a, R> {
    fn scan_dir(&mut self, target: &PendingDir) -> Result<WalkEntry, MinixError> {
        let reader = self.reader;
        let inode = match target.inode {
            Some(number) => reader.get_inode(number)?,
            None => reader.resolve_bytes(&target.raw_path)?,
        };
        if !inode.is_directory() {
            return Err(MinixError::NotADirectory(target.path.clone()));
        }
        if !self.visited.insert(inode.number) {
            return Err(directory_loop(&target.path, inode.number));
        }

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in reader.scan_inode(&target.raw_path, &inode)? {
            if entry.is_dir()? {
                self.pending.push((
                    entry.name.clone(),
                    PendingDir {
                        path: entry.path.clone(),
                        raw_path: entry.raw_path.clone(),
                        inode: Some(entry.inode_number),
                    },
                ));
                dirs.push(entry.name);
            } else {
                files.push(entry.name);
            }
        }
        Ok(WalkEntry {
            path: target.path.clone(),
            dirs,
            files,
        })
    }
}

impl<'a, R: Read + Seek> Iterator for Walk<'a, R> {
    type Item = Result<WalkEntry, MinixError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((_, dir)) = self.pending.pop() {
            self.stack.push(dir);
        }

        let target = self.stack.pop()?;
        match self.scan_dir(&target) {
            Ok(entry) => Some(Ok(entry)),
            Err(e) => {
                self.pending.clear();
                debug!("Walk could not scan {}: {}", target.path, e);
                Some(Err(e))
            }
        }
    }
}

fn directory_loop(path: &str, inode_number: u32) -> MinixError {
    MinixError::Format(format!(
        "Directory loop: {} leads back to inode {}",
        path, inode_number
    ))
}

impl<R: Read + Seek> MinixReader<R> {
    pub fn stat(&self, path: &str) -> Result<StatRecord, MinixError> {
        let inode = self.resolve(path)?;
        Ok(StatRecord::from(&inode))
    }

    /// List a directory. "." and ".." are never yielded.
    pub fn scandir(&self, path: &str) -> Result<ScanDir<'_, R>, MinixError> {
        let inode = self.resolve(path)?;
        if !inode.is_directory() {
            return Err(MinixError::NotADirectory(path.to_string()));
        }
        self.scan_inode(path.as_bytes(), &inode)
    }

    fn scan_inode(&self, parent: &[u8], inode: &Inode) -> Result<ScanDir<'_, R>, MinixError> {
        let directory = self.read_directory(inode)?;
        Ok(ScanDir {
            reader: self,
            parent: parent.to_vec(),
            entries: directory.entries.into_iter(),
        })
    }

    /// Walk the tree below `path` top-down.
    ///
    /// Each directory is yielded before its subdirectories, which are then
    /// visited in listing order. Use [`Walk::retain_dirs`] or [`Walk::prune`]
    /// between steps to skip subtrees.
    pub fn walk(&self, path: &str) -> Walk<'_, R> {
        Walk {
            reader: self,
            stack: vec![PendingDir {
                path: path.to_string(),
                raw_path: path.as_bytes().to_vec(),
                inode: None,
            }],
            visited: HashSet::new(),
            pending: Vec::new(),
        }
    }

    /// Sorted names in a directory.
    pub fn listdir(&self, path: &str) -> Result<Vec<String>, MinixError> {
        let mut names: Vec<String> = self.scandir(path)?.map(|entry| entry.name).collect();
        names.sort();
        Ok(names)
    }

    pub fn exists(&self, path: &str) -> Result<bool, MinixError> {
        super::path_resolver::MinixPathResolver::new(self).exists(path)
    }

    pub fn is_dir(&self, path: &str) -> Result<bool, MinixError> {
        self.is_type(path, FileType::Directory)
    }

    pub fn is_file(&self, path: &str) -> Result<bool, MinixError> {
        self.is_type(path, FileType::Regular)
    }

    fn is_type(&self, path: &str, file_type: FileType) -> Result<bool, MinixError> {
        match self.resolve(path) {
            Ok(inode) => Ok(inode.file_type() == file_type),
            Err(e) if e.is_lookup_failure() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Sorted paths of every non-directory at or below `path`.
    pub fn find(&self, path: &str) -> Result<Vec<String>, MinixError> {
        if !self.resolve(path)?.is_directory() {
            return Ok(vec![path.to_string()]);
        }

        let mut found = Vec::new();
        for entry in self.walk(path) {
            let entry = entry?;
            found.extend(entry.files.iter().map(|name| join_path(&entry.path, name)));
        }
        found.sort();
        Ok(found)
    }

    /// Total size in bytes of the files at or below `path`.
    pub fn disk_usage(&self, path: &str) -> Result<u64, MinixError> {
        let inode = self.resolve(path)?;
        self.usage_of(path, &inode, &mut HashSet::new())
    }

    fn usage_of(&self, path: &str, inode: &Inode, visited: &mut HashSet<u32>) -> Result<u64, MinixError> {
        if !inode.is_directory() {
            return Ok(inode.file_size as u64);
        }
        if !visited.insert(inode.number) {
            return Err(directory_loop(path, inode.number));
        }

        let directory = self.read_directory(inode)?;
        let mut total = 0;
        for entry in directory.children() {
            let child = self.get_inode(entry.inode_number as u32)?;
            total += self.usage_of(&join_path(path, &entry.name_lossy()), &child, visited)?;
        }
        Ok(total)
    }
}
