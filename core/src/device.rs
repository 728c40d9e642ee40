use serde::{Deserialize, Serialize};
use std::path::Path;

/// Describes the backing store of a file system image.
///
/// `id` is the path the store is opened from; for a disk image this is the
/// image file, for a block device the device node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub device_type: DeviceType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceType {
    /// A regular file holding a raw image.
    Image,
    /// A block device node such as `/dev/sdb1`.
    BlockDevice,
}

impl Device {
    /// Describe an image file or block device on the host file system.
    pub fn from_image_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Device {
            id: path.to_string_lossy().to_string(),
            name,
            size: metadata.len(),
            device_type: device_type_of(&metadata),
        })
    }
}

#[cfg(unix)]
fn device_type_of(metadata: &std::fs::Metadata) -> DeviceType {
    use std::os::unix::fs::FileTypeExt;
    if metadata.file_type().is_block_device() {
        DeviceType::BlockDevice
    } else {
        DeviceType::Image
    }
}

#[cfg(not(unix))]
fn device_type_of(_metadata: &std::fs::Metadata) -> DeviceType {
    DeviceType::Image
}
