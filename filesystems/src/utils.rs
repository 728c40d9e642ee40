// Helpers for opening and reading backing devices

use minix_core::{Device, MinixError};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

/// Open a device (or image file) for reading only.
pub fn open_device_read(device: &Device) -> Result<File, MinixError> {
    File::open(&device.id).map_err(|e| {
        MinixError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to open {} for reading: {}", device.id, e),
        ))
    })
}

/// Read exactly `size` bytes starting at byte `offset`.
pub fn read_block<R: Read + Seek>(source: &mut R, offset: u64, size: usize) -> Result<Vec<u8>, MinixError> {
    source.seek(SeekFrom::Start(offset))?;
    let mut buffer = vec![0u8; size];
    source.read_exact(&mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_block_at_offset() {
        let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let mut cursor = Cursor::new(data);
        let block = read_block(&mut cursor, 1024, 16).unwrap();
        assert_eq!(block, (0..16u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_read_block_past_end() {
        let mut cursor = Cursor::new(vec![0u8; 100]);
        let result = read_block(&mut cursor, 64, 64);
        assert!(matches!(result, Err(MinixError::IoError(_))));
    }
}
