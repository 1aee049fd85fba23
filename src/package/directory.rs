use std::fs;
use std::path::{Path, PathBuf};

use crate::error::VerifyError;
use crate::hash::HashAlgorithm;
use crate::package::{
    assert_signature_entry_metadata, hash_entry, PackageReader, SignatureEntryMetadata,
    SIGNATURE_ENTRY,
};
use crate::signature::PrimarySignature;

/// A package laid out as a directory tree, with the signature entry stored
/// as `.signature.json` at its root.
#[derive(Debug, Clone)]
pub struct DirectoryPackage {
    root: PathBuf,
}

impl DirectoryPackage {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, VerifyError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(VerifyError::InvalidPackage(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn signature_path(&self) -> PathBuf {
        self.root.join(SIGNATURE_ENTRY)
    }

    /// Write (or replace) the signature entry.
    pub fn write_signature(&self, signature: &PrimarySignature) -> Result<(), VerifyError> {
        fs::write(self.signature_path(), signature.to_json()?)?;
        Ok(())
    }

    fn collect_entries(&self, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> Result<(), VerifyError> {
        let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let file_type = entry.file_type()?;
            let rel = path
                .strip_prefix(&self.root)
                .map_err(|e| VerifyError::InvalidPackage(e.to_string()))?
                .to_str()
                .ok_or_else(|| {
                    VerifyError::InvalidPackage(format!(
                        "entry name is not valid UTF-8: {}",
                        path.display()
                    ))
                })?
                .replace('\\', "/");

            if file_type.is_dir() {
                self.collect_entries(&path, out)?;
            } else if file_type.is_file() {
                if rel != SIGNATURE_ENTRY {
                    out.push((rel, path));
                }
            } else {
                return Err(VerifyError::InvalidPackage(format!(
                    "unsupported entry type at {rel}"
                )));
            }
        }
        Ok(())
    }
}

impl PackageReader for DirectoryPackage {
    fn identity(&self) -> String {
        self.root.display().to_string()
    }

    fn is_signed(&self) -> Result<bool, VerifyError> {
        match fs::symlink_metadata(self.signature_path()) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn primary_signature(&self) -> Result<Option<PrimarySignature>, VerifyError> {
        if !self.is_signed()? {
            return Ok(None);
        }

        let path = self.signature_path();
        let meta = fs::symlink_metadata(&path)?;
        if !meta.file_type().is_file() {
            return Err(VerifyError::InvalidSignatureContainerMetadata(
                "the package signature entry is not a regular file".to_string(),
            ));
        }
        assert_signature_entry_metadata(&SignatureEntryMetadata::stored(meta.len()))?;

        let bytes = fs::read(&path)?;
        PrimarySignature::from_json(&bytes).map(Some)
    }

    fn content_hash(&self, algorithm: HashAlgorithm) -> Result<Vec<u8>, VerifyError> {
        let mut entries = Vec::new();
        self.collect_entries(&self.root, &mut entries)?;
        // Directory order above is per level; hash in full path order.
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut hasher = algorithm.hasher();
        for (rel, path) in entries {
            let data = fs::read(&path)?;
            hash_entry(&mut hasher, &rel, &data);
        }
        Ok(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_package, Fixture};
    use std::time::{Duration, SystemTime};

    #[test]
    fn unsigned_directory_has_no_signature() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path());
        let package = DirectoryPackage::open(dir.path()).unwrap();

        assert!(!package.is_signed().unwrap());
        assert!(package.primary_signature().unwrap().is_none());
    }

    #[test]
    fn content_hash_ignores_signature_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path());
        let package = DirectoryPackage::open(dir.path()).unwrap();
        let before = package.content_hash(HashAlgorithm::Sha256).unwrap();

        let fx = Fixture::new();
        package
            .write_signature(&fx.author_signature(b"anything"))
            .unwrap();
        assert_eq!(before, package.content_hash(HashAlgorithm::Sha256).unwrap());
    }

    #[test]
    fn content_hash_tracks_nested_content() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path());
        let package = DirectoryPackage::open(dir.path()).unwrap();
        let before = package.content_hash(HashAlgorithm::Sha512).unwrap();

        fs::write(dir.path().join("lib/net/extra.dll"), b"x").unwrap();
        assert_ne!(before, package.content_hash(HashAlgorithm::Sha512).unwrap());
    }

    #[test]
    fn signature_entry_modified_time_does_not_matter() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path());
        let package = DirectoryPackage::open(dir.path()).unwrap();
        let fx = Fixture::new();
        package
            .write_signature(&fx.author_signature(b"anything"))
            .unwrap();
        let before = package.content_hash(HashAlgorithm::Sha256).unwrap();

        let file = fs::File::options()
            .write(true)
            .open(dir.path().join(SIGNATURE_ENTRY))
            .unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(2))
            .unwrap();

        assert_eq!(before, package.content_hash(HashAlgorithm::Sha256).unwrap());
        assert!(package.primary_signature().unwrap().is_some());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_entry_name_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path());
        fs::write(dir.path().join(OsStr::from_bytes(b"lib/bad\xff.dll")), b"x").unwrap();
        let package = DirectoryPackage::open(dir.path()).unwrap();

        let err = package.content_hash(HashAlgorithm::Sha256).unwrap_err();
        assert!(matches!(err, VerifyError::InvalidPackage(_)));
    }

    #[test]
    fn empty_signature_entry_is_structural_error() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path());
        fs::write(dir.path().join(SIGNATURE_ENTRY), b"").unwrap();
        let package = DirectoryPackage::open(dir.path()).unwrap();

        assert!(package.is_signed().unwrap());
        let err = package.primary_signature().unwrap_err();
        assert!(matches!(err, VerifyError::InvalidSignatureContainerMetadata(_)));
    }

    #[test]
    fn directory_signature_entry_is_structural_error() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path());
        fs::create_dir(dir.path().join(SIGNATURE_ENTRY)).unwrap();
        let package = DirectoryPackage::open(dir.path()).unwrap();

        let err = package.primary_signature().unwrap_err();
        assert!(matches!(err, VerifyError::InvalidSignatureContainerMetadata(_)));
    }

    #[test]
    fn garbage_signature_entry_is_invalid_signature() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path());
        fs::write(dir.path().join(SIGNATURE_ENTRY), b"{ not json").unwrap();
        let package = DirectoryPackage::open(dir.path()).unwrap();

        let err = package.primary_signature().unwrap_err();
        assert!(matches!(err, VerifyError::InvalidSignature(_)));
    }

    #[test]
    fn open_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectoryPackage::open(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, VerifyError::InvalidPackage(_)));
    }
}
