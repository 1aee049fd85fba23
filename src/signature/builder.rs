use crate::error::VerifyError;
use crate::hash::{self, HashAlgorithm};
use crate::package::PackageReader;
use crate::pki::{CertifiedKey, TimestampAuthority};
use crate::signature::model::{Placement, PrimarySignature, RepositoryMetadata, Signature, Target};

/// Produces primary signatures and repository countersignatures.
pub struct SignatureBuilder<'a> {
    signer: &'a CertifiedKey,
    digest_algorithm: HashAlgorithm,
    timestamper: Option<&'a TimestampAuthority>,
}

impl<'a> SignatureBuilder<'a> {
    pub fn new(signer: &'a CertifiedKey) -> Self {
        Self {
            signer,
            digest_algorithm: HashAlgorithm::Sha256,
            timestamper: None,
        }
    }

    pub fn digest_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    pub fn timestamped_by(mut self, timestamper: &'a TimestampAuthority) -> Self {
        self.timestamper = Some(timestamper);
        self
    }

    /// Author primary signature over the package content.
    pub fn author(&self, package: &dyn PackageReader) -> Result<PrimarySignature, VerifyError> {
        let digest = hash::hex_encode(&package.content_hash(self.digest_algorithm)?);
        Ok(PrimarySignature::new(self.sign_digest(
            Placement::PrimarySignature,
            Target::Author,
            digest,
            None,
        )?))
    }

    /// Repository primary signature over the package content.
    pub fn repository(
        &self,
        package: &dyn PackageReader,
        metadata: RepositoryMetadata,
    ) -> Result<PrimarySignature, VerifyError> {
        let digest = hash::hex_encode(&package.content_hash(self.digest_algorithm)?);
        Ok(PrimarySignature::new(self.sign_digest(
            Placement::PrimarySignature,
            Target::Repository,
            digest,
            Some(metadata),
        )?))
    }

    /// Add a repository countersignature over `primary`'s signature value,
    /// replacing any existing one.
    pub fn countersign(
        &self,
        primary: &PrimarySignature,
        metadata: RepositoryMetadata,
    ) -> Result<PrimarySignature, VerifyError> {
        let digest = primary
            .signature
            .countersignature_digest(self.digest_algorithm);
        let counter = self.sign_digest(
            Placement::Countersignature,
            Target::Repository,
            digest,
            Some(metadata),
        )?;
        Ok(PrimarySignature {
            countersignature: Some(counter),
            ..primary.clone()
        })
    }

    pub fn sign_digest(
        &self,
        placement: Placement,
        target: Target,
        signed_digest: String,
        repository: Option<RepositoryMetadata>,
    ) -> Result<Signature, VerifyError> {
        let mut signature = Signature {
            placement,
            target,
            signer_certificate: self.signer.certificate.clone(),
            additional_certificates: self.signer.chain.clone(),
            digest_algorithm: self.digest_algorithm,
            signed_digest,
            repository,
            timestamps: Vec::new(),
            signature_value: String::new(),
        };
        signature.signature_value = self.signer.sign(&signature.signed_attributes()?);

        if let Some(tsa) = self.timestamper {
            signature
                .timestamps
                .push(tsa.timestamp(&signature.signature_value)?);
        }
        Ok(signature)
    }
}
