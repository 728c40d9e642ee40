// Minix Path Resolver
// Walks absolute paths from the root inode, one directory read per component

use log::{debug, trace};
use minix_core::MinixError;
use std::io::{Read, Seek};

use super::core::structures::Inode;
use super::reader::MinixReader;

pub struct MinixPathResolver<'a, R> {
    reader: &'a MinixReader<R>,
}

impl<'a, R: Read + Seek> MinixPathResolver<'a, R> {
    pub fn new(reader: &'a MinixReader<R>) -> Self {
        Self { reader }
    }

    /// Resolve an absolute path to its inode.
    ///
    /// Names are compared byte for byte. "." and ".." are looked up like any
    /// other name, through the entries every directory stores for them.
    pub fn resolve_path(&self, path: &str) -> Result<Inode, MinixError> {
        self.resolve_path_bytes(path.as_bytes())
    }

    /// Same as [`resolve_path`](Self::resolve_path) for paths holding names
    /// that are not valid UTF-8.
    pub fn resolve_path_bytes(&self, path: &[u8]) -> Result<Inode, MinixError> {
        debug!("Resolving Minix path: {}", String::from_utf8_lossy(path));

        let components = split_path(path)?;
        let mut current = self.reader.root_inode();
        let mut walked: Vec<u8> = Vec::new();

        for component in components {
            trace!(
                "Resolving component '{}' in inode {}",
                String::from_utf8_lossy(component),
                current.number
            );

            if !current.is_directory() {
                return Err(MinixError::NotADirectory(if walked.is_empty() {
                    "/".to_string()
                } else {
                    String::from_utf8_lossy(&walked).to_string()
                }));
            }

            let directory = self.reader.read_directory(&current)?;
            walked.push(b'/');
            walked.extend_from_slice(component);

            let entry = directory
                .find(component)
                .ok_or_else(|| MinixError::NotFound(String::from_utf8_lossy(&walked).to_string()))?;

            current = self.reader.get_inode(entry.inode_number as u32)?;
        }

        Ok(current)
    }

    /// True when `path` names something; lookup failures count as absent.
    pub fn exists(&self, path: &str) -> Result<bool, MinixError> {
        match self.resolve_path(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_lookup_failure() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<R: Read + Seek> MinixReader<R> {
    /// Resolve an absolute path to its inode.
    pub fn resolve(&self, path: &str) -> Result<Inode, MinixError> {
        MinixPathResolver::new(self).resolve_path(path)
    }

    /// Resolve an absolute path given as raw bytes.
    pub fn resolve_bytes(&self, path: &[u8]) -> Result<Inode, MinixError> {
        MinixPathResolver::new(self).resolve_path_bytes(path)
    }
}

/// Split an absolute POSIX path into its non-empty components.
pub fn split_path(path: &[u8]) -> Result<Vec<&[u8]>, MinixError> {
    if path.first() != Some(&b'/') {
        return Err(MinixError::NotSupported(format!(
            "Relative paths are not supported: '{}'",
            String::from_utf8_lossy(path)
        )));
    }

    Ok(path.split(|&b| b == b'/').filter(|s| !s.is_empty()).collect())
}

/// Append `name` to a directory path.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Append a raw `name` to a raw directory path.
pub fn join_path_bytes(parent: &[u8], name: &[u8]) -> Vec<u8> {
    let mut joined = parent.to_vec();
    if joined.last() != Some(&b'/') {
        joined.push(b'/');
    }
    joined.extend_from_slice(name);
    joined
}
