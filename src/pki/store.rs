//! On-disk certificate files.
//!
//! A certificate file holds one certificate and the chain above it
//! (nearest issuer first). Private keys are never stored here; they come
//! from a keyfile or the signing key environment variable.

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::VerifyError;
use crate::pki::authority::CertifiedKey;
use crate::signature::Certificate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateFile {
    pub certificate: Certificate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<Certificate>,
}

impl CertificateFile {
    pub fn new(certificate: Certificate, chain: Vec<Certificate>) -> Self {
        Self { certificate, chain }
    }

    pub fn load(path: &Path) -> Result<Self, VerifyError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), VerifyError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Attach the private key, checking that it belongs to the certificate.
    pub fn with_key(self, signing_key: SigningKey) -> Result<CertifiedKey, VerifyError> {
        CertifiedKey::from_parts(self.certificate, signing_key, self.chain)
    }
}

impl From<&CertifiedKey> for CertificateFile {
    fn from(key: &CertifiedKey) -> Self {
        Self::new(key.certificate.clone(), key.chain.clone())
    }
}

/// Load the leaf certificates of several certificate files.
pub fn load_certificates<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Certificate>, VerifyError> {
    paths
        .iter()
        .map(|path| CertificateFile::load(path.as_ref()).map(|file| file.certificate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::{CertificateAuthority, CertificateRequest};

    #[test]
    fn saved_file_restores_a_signing_identity() {
        let dir = tempfile::tempdir().unwrap();
        let root = CertificateAuthority::root("CN=Root").unwrap();
        let issued = root.issue(CertificateRequest::code_signing("CN=Author")).unwrap();
        let path = dir.path().join("certs/author.cert.json");

        CertificateFile::from(&issued).save(&path).unwrap();
        let restored = CertificateFile::load(&path)
            .unwrap()
            .with_key(issued.signing_key.clone())
            .unwrap();

        assert_eq!(restored.certificate, issued.certificate);
        assert_eq!(restored.chain, vec![root.certificate().clone()]);
    }

    #[test]
    fn root_file_has_no_chain_field() {
        let dir = tempfile::tempdir().unwrap();
        let root = CertificateAuthority::root("CN=Root").unwrap();
        let path = dir.path().join("root.cert.json");
        CertificateFile::new(root.certificate().clone(), Vec::new())
            .save(&path)
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(json.get("chain").is_none());
        assert_eq!(load_certificates(&[path]).unwrap(), vec![root.certificate().clone()]);
    }
}
