// Minix family detection
// Tells the Minix variants apart by the superblock magic

use minix_core::MinixError;
use std::io::Read;

use super::core::constants::*;
use crate::families::{FamilyOperations, FamilySignature, FilesystemFamily};

/// Byte offset of the magic field: the superblock starts at 1024 and the
/// magic follows six u16 fields and one u32.
const MAGIC_OFFSET: u64 = SUPERBLOCK_OFFSET + 16;

const VARIANTS: [MinixVersion; 5] = [
    MinixVersion::V1,
    MinixVersion::V1LongNames,
    MinixVersion::V2,
    MinixVersion::V2LongNames,
    MinixVersion::V3,
];

pub struct MinixFamily;

impl MinixFamily {
    fn magic_of(variant: MinixVersion) -> u16 {
        match variant {
            MinixVersion::V1 => MINIX_SUPER_MAGIC,
            MinixVersion::V1LongNames => MINIX_SUPER_MAGIC2,
            MinixVersion::V2 => MINIX2_SUPER_MAGIC,
            MinixVersion::V2LongNames => MINIX2_SUPER_MAGIC2,
            MinixVersion::V3 => MINIX3_SUPER_MAGIC,
        }
    }

    fn read_magic(&self, device: &mut dyn Read) -> Result<u16, MinixError> {
        let superblock = self.read_metadata(device)?;
        let at = (MAGIC_OFFSET - SUPERBLOCK_OFFSET) as usize;
        Ok(u16::from_le_bytes([superblock[at], superblock[at + 1]]))
    }
}

impl FilesystemFamily for MinixFamily {
    fn family_name(&self) -> &str {
        "Minix"
    }

    fn variants(&self) -> Vec<String> {
        VARIANTS.iter().map(|v| v.name().to_string()).collect()
    }

    fn family_signatures(&self) -> Vec<FamilySignature> {
        VARIANTS
            .iter()
            .map(|&variant| FamilySignature {
                offset: MAGIC_OFFSET,
                signature: Self::magic_of(variant).to_le_bytes().to_vec(),
                variant_hint: Some(variant.name().to_string()),
                supported: variant == MinixVersion::V1,
            })
            .collect()
    }
}

impl FamilyOperations for MinixFamily {
    /// Skip the boot block and return the 1024-byte superblock.
    fn read_metadata(&self, device: &mut dyn Read) -> Result<Vec<u8>, MinixError> {
        let mut head = vec![0u8; SUPERBLOCK_OFFSET as usize + SUPERBLOCK_SIZE];
        device.read_exact(&mut head)?;
        Ok(head.split_off(SUPERBLOCK_OFFSET as usize))
    }

    fn validate_family(&self, device: &mut dyn Read) -> Result<bool, MinixError> {
        let magic = self.read_magic(device)?;
        Ok(MinixVersion::from_magic(magic).is_some())
    }

    fn detect_variant(&self, device: &mut dyn Read) -> Result<String, MinixError> {
        let magic = self.read_magic(device)?;
        MinixVersion::from_magic(magic)
            .map(|v| v.name().to_string())
            .ok_or_else(|| MinixError::Format(format!("Not a Minix filesystem (magic 0x{:04X})", magic)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn image_head(magic: u16) -> Vec<u8> {
        let mut head = vec![0u8; 2048];
        head[MAGIC_OFFSET as usize..MAGIC_OFFSET as usize + 2].copy_from_slice(&magic.to_le_bytes());
        head
    }

    #[test]
    fn test_detect_v1() {
        let family = MinixFamily;
        let mut device = Cursor::new(image_head(MINIX_SUPER_MAGIC));
        assert_eq!(family.detect_variant(&mut device).unwrap(), "Minix v1");
    }

    #[test]
    fn test_detect_v3() {
        let family = MinixFamily;
        let mut device = Cursor::new(image_head(MINIX3_SUPER_MAGIC));
        assert!(family.validate_family(&mut device).unwrap());
        let mut device = Cursor::new(image_head(MINIX3_SUPER_MAGIC));
        assert_eq!(family.detect_variant(&mut device).unwrap(), "Minix v3");
    }

    #[test]
    fn test_not_minix() {
        let family = MinixFamily;
        let mut device = Cursor::new(image_head(0xEF53));
        assert!(!family.validate_family(&mut device).unwrap());
        let mut device = Cursor::new(image_head(0xEF53));
        assert!(matches!(family.detect_variant(&mut device), Err(MinixError::Format(_))));
    }

    #[test]
    fn test_truncated_device() {
        let family = MinixFamily;
        let mut device = Cursor::new(vec![0u8; 100]);
        assert!(matches!(family.read_metadata(&mut device), Err(MinixError::IoError(_))));
    }

    #[test]
    fn test_signatures() {
        let family = MinixFamily;
        let signatures = family.family_signatures();
        assert_eq!(signatures.len(), 5);
        assert!(signatures.iter().all(|s| s.offset == 1040));
        assert_eq!(signatures.iter().filter(|s| s.supported).count(), 1);
        assert_eq!(signatures[0].signature, vec![0x7F, 0x13]);
        assert_eq!(family.variants()[0], "Minix v1");
    }
}
