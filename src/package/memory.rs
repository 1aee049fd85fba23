use std::collections::BTreeMap;

use crate::error::VerifyError;
use crate::hash::HashAlgorithm;
use crate::package::{
    assert_signature_entry_metadata, hash_entry, PackageReader, SignatureEntryMetadata,
};
use crate::signature::PrimarySignature;

/// A package held in memory. Entry paths are `/`-separated.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPackage {
    name: String,
    entries: BTreeMap<String, Vec<u8>>,
    signature: Option<(SignatureEntryMetadata, Vec<u8>)>,
}

impl InMemoryPackage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_entry(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert_entry(path, data);
        self
    }

    pub fn insert_entry(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.entries.insert(path.into(), data.into());
    }

    pub fn remove_entry(&mut self, path: &str) -> Option<Vec<u8>> {
        self.entries.remove(path)
    }

    pub fn entry_mut(&mut self, path: &str) -> Option<&mut Vec<u8>> {
        self.entries.get_mut(path)
    }

    /// Store `signature` as a well-formed signature entry.
    pub fn set_signature(&mut self, signature: &PrimarySignature) -> Result<(), VerifyError> {
        let bytes = signature.to_json()?;
        let metadata = SignatureEntryMetadata::stored(bytes.len() as u64);
        self.signature = Some((metadata, bytes));
        Ok(())
    }

    /// Store raw signature entry bytes with explicit container metadata.
    pub fn set_signature_entry(&mut self, metadata: SignatureEntryMetadata, bytes: Vec<u8>) {
        self.signature = Some((metadata, bytes));
    }

    pub fn signature_entry_metadata_mut(&mut self) -> Option<&mut SignatureEntryMetadata> {
        self.signature.as_mut().map(|(metadata, _)| metadata)
    }
}

impl PackageReader for InMemoryPackage {
    fn identity(&self) -> String {
        self.name.clone()
    }

    fn is_signed(&self) -> Result<bool, VerifyError> {
        Ok(self.signature.is_some())
    }

    fn primary_signature(&self) -> Result<Option<PrimarySignature>, VerifyError> {
        let Some((metadata, bytes)) = &self.signature else {
            return Ok(None);
        };
        assert_signature_entry_metadata(metadata)?;
        if bytes.len() as u64 != metadata.uncompressed_size {
            return Err(VerifyError::InvalidSignatureContainerMetadata(
                "the package signature entry size does not match its content".to_string(),
            ));
        }
        PrimarySignature::from_json(bytes).map(Some)
    }

    fn content_hash(&self, algorithm: HashAlgorithm) -> Result<Vec<u8>, VerifyError> {
        let mut hasher = algorithm.hasher();
        for (path, data) in &self.entries {
            hash_entry(&mut hasher, path, data);
        }
        Ok(hasher.finalize())
    }
}
