// Filesystem Families Organization
// Groups the on-disk variants of a filesystem and how to tell them apart

pub mod minix;

use minix_core::MinixError;

/// Common trait for filesystem families
pub trait FilesystemFamily {
    /// Name of the filesystem family (e.g., "Minix")
    fn family_name(&self) -> &str;

    /// List of filesystem variants in this family
    fn variants(&self) -> Vec<String>;

    /// Magic signatures for this family
    fn family_signatures(&self) -> Vec<FamilySignature>;
}

/// Signature information for a filesystem family
#[derive(Debug, Clone)]
pub struct FamilySignature {
    /// Offset in the device where signature appears
    pub offset: u64,
    /// The signature bytes
    pub signature: Vec<u8>,
    /// Which variant this signature indicates
    pub variant_hint: Option<String>,
    /// Whether the driver can read this variant
    pub supported: bool,
}

/// Trait for shared operations within a filesystem family
pub trait FamilyOperations {
    /// Read the raw superblock in a family-specific way
    fn read_metadata(&self, device: &mut dyn std::io::Read) -> Result<Vec<u8>, MinixError>;

    /// Validate that this device contains a filesystem from this family
    fn validate_family(&self, device: &mut dyn std::io::Read) -> Result<bool, MinixError>;

    /// Detect which specific variant within the family
    fn detect_variant(&self, device: &mut dyn std::io::Read) -> Result<String, MinixError>;
}
