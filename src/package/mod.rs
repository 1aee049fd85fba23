// package/ — Package container access
//
// The verifier only needs three things from a container: whether it has a
// signature entry, the parsed primary signature, and a content hash that
// excludes the signature entry.
//
// directory.rs — Packages laid out as a directory tree on disk
// memory.rs    — In-memory packages with explicit signature entry metadata

pub mod directory;
pub mod memory;

pub use directory::DirectoryPackage;
pub use memory::InMemoryPackage;

use crate::error::VerifyError;
use crate::hash::{ContentHasher, HashAlgorithm};
use crate::signature::PrimarySignature;

/// Name of the signature entry at the root of a package.
pub const SIGNATURE_ENTRY: &str = ".signature.json";

/// Largest signature entry the readers accept.
pub const MAX_SIGNATURE_ENTRY_SIZE: u64 = 1024 * 1024;

/// Read access to a package container.
pub trait PackageReader: Send + Sync {
    /// Human-readable identity used in diagnostics.
    fn identity(&self) -> String;

    fn is_signed(&self) -> Result<bool, VerifyError>;

    /// The parsed signature entry, or `None` for an unsigned package.
    ///
    /// # Errors
    ///
    /// [`VerifyError::InvalidSignatureContainerMetadata`] when the signature
    /// entry itself is malformed, [`VerifyError::InvalidSignature`] when its
    /// content does not parse.
    fn primary_signature(&self) -> Result<Option<PrimarySignature>, VerifyError>;

    /// Hash of every entry except the signature entry.
    fn content_hash(&self, algorithm: HashAlgorithm) -> Result<Vec<u8>, VerifyError>;
}

/// Container-level attributes of the signature entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureEntryMetadata {
    pub general_purpose_flags: u16,
    /// 0 = stored.
    pub compression_method: u16,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub external_attributes: u32,
}

impl SignatureEntryMetadata {
    /// Metadata of a well-formed, uncompressed entry of `size` bytes.
    pub fn stored(size: u64) -> Self {
        Self {
            general_purpose_flags: 0,
            compression_method: 0,
            compressed_size: size,
            uncompressed_size: size,
            external_attributes: 0,
        }
    }
}

/// Reject signature entries whose container attributes could let a reader
/// and a verifier disagree about the entry's bytes.
pub fn assert_signature_entry_metadata(
    metadata: &SignatureEntryMetadata,
) -> Result<(), VerifyError> {
    let invalid = |reason: &str| {
        Err(VerifyError::InvalidSignatureContainerMetadata(format!(
            "the package signature entry {reason}"
        )))
    };

    if metadata.general_purpose_flags != 0 {
        return invalid("has general purpose flags set");
    }
    if metadata.compression_method != 0 {
        return invalid("is compressed");
    }
    if metadata.compressed_size != metadata.uncompressed_size {
        return invalid("has a compressed size that differs from its uncompressed size");
    }
    if metadata.external_attributes != 0 {
        return invalid("has external file attributes set");
    }
    if metadata.uncompressed_size == 0 {
        return invalid("is empty");
    }
    if metadata.uncompressed_size > MAX_SIGNATURE_ENTRY_SIZE {
        return invalid("exceeds the maximum signature size");
    }
    Ok(())
}

/// Feed one content entry into a package content hash.
///
/// Each entry contributes its `/`-separated relative path, a NUL byte, its
/// length as a little-endian u64, and its bytes. Entries must be fed in
/// path order.
pub(crate) fn hash_entry(hasher: &mut ContentHasher, path: &str, data: &[u8]) {
    hasher.update(path.as_bytes());
    hasher.update(&[0]);
    hasher.update(&(data.len() as u64).to_le_bytes());
    hasher.update(data);
}
