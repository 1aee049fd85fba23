//! Certificate and timestamp issuance.
//!
//! Used by `pkgsig sign` / `pkgsig countersign` and by tests to produce
//! signer, repository and timestamp authority certificates.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use ed25519_dalek::SigningKey;

use crate::error::VerifyError;
use crate::hash::{self, HashAlgorithm};
use crate::sign;
use crate::signature::canonical::canonical_bytes;
use crate::signature::{Certificate, CertificateBody, KeyPurpose, Timestamp, TimestampToken};

/// Parameters for a certificate to be issued.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub subject: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub is_ca: bool,
    pub key_purposes: Vec<KeyPurpose>,
}

impl CertificateRequest {
    fn new(subject: &str, lifetime: Duration, is_ca: bool, key_purposes: Vec<KeyPurpose>) -> Self {
        let now = Utc::now().trunc_subsecs(0);
        Self {
            subject: subject.to_string(),
            not_before: now - Duration::hours(1),
            not_after: now + lifetime,
            is_ca,
            key_purposes,
        }
    }

    pub fn certificate_authority(subject: &str) -> Self {
        Self::new(subject, Duration::days(3650), true, Vec::new())
    }

    pub fn code_signing(subject: &str) -> Self {
        Self::new(subject, Duration::days(365), false, vec![KeyPurpose::CodeSigning])
    }

    pub fn time_stamping(subject: &str) -> Self {
        Self::new(subject, Duration::days(730), false, vec![KeyPurpose::TimeStamping])
    }

    pub fn valid_between(mut self, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        self.not_before = not_before.trunc_subsecs(0);
        self.not_after = not_after.trunc_subsecs(0);
        self
    }

    pub fn with_purposes(mut self, key_purposes: Vec<KeyPurpose>) -> Self {
        self.key_purposes = key_purposes;
        self
    }
}

/// A certificate together with its private key and issuer chain
/// (nearest issuer first).
#[derive(Clone)]
pub struct CertifiedKey {
    pub certificate: Certificate,
    pub signing_key: SigningKey,
    pub chain: Vec<Certificate>,
}

impl CertifiedKey {
    /// Pair a stored certificate with its private key.
    ///
    /// # Errors
    ///
    /// [`VerifyError::InvalidKey`] when the key does not belong to the
    /// certificate.
    pub fn from_parts(
        certificate: Certificate,
        signing_key: SigningKey,
        chain: Vec<Certificate>,
    ) -> Result<Self, VerifyError> {
        if sign::public_key_b64(&signing_key) != certificate.body.public_key {
            return Err(VerifyError::InvalidKey(format!(
                "the signing key does not match the certificate '{}'",
                certificate.subject()
            )));
        }
        Ok(Self {
            certificate,
            signing_key,
            chain,
        })
    }

    /// A self-signed certificate for an existing key.
    pub fn self_signed(
        request: &CertificateRequest,
        signing_key: SigningKey,
    ) -> Result<Self, VerifyError> {
        let public_key = sign::public_key_b64(&signing_key);
        let certificate = certify(request, &public_key, &request.subject, &signing_key)?;
        Ok(Self {
            certificate,
            signing_key,
            chain: Vec::new(),
        })
    }

    pub fn sign(&self, data: &[u8]) -> String {
        sign::sign(&self.signing_key, data)
    }
}

fn certify(
    request: &CertificateRequest,
    public_key: &str,
    issuer_subject: &str,
    issuer_key: &SigningKey,
) -> Result<Certificate, VerifyError> {
    let body = CertificateBody {
        serial_number: uuid::Uuid::new_v4().simple().to_string(),
        subject: request.subject.clone(),
        issuer: issuer_subject.to_string(),
        not_before: request.not_before,
        not_after: request.not_after,
        public_key: public_key.to_string(),
        is_ca: request.is_ca,
        key_purposes: request.key_purposes.clone(),
    };
    let signature = sign::sign(issuer_key, &canonical_bytes(&body)?);
    Ok(Certificate { body, signature })
}

/// An issuing certificate authority.
#[derive(Clone)]
pub struct CertificateAuthority {
    key: CertifiedKey,
}

impl CertificateAuthority {
    /// Create a self-signed root authority valid for ten years.
    pub fn root(subject: &str) -> Result<Self, VerifyError> {
        Self::root_with(CertificateRequest::certificate_authority(subject))
    }

    pub fn root_with(request: CertificateRequest) -> Result<Self, VerifyError> {
        Ok(Self {
            key: CertifiedKey::self_signed(&request, sign::generate_signing_key())?,
        })
    }

    /// An authority backed by an existing CA certificate and its key.
    ///
    /// # Errors
    ///
    /// [`VerifyError::InvalidKey`] when the certificate is not a CA.
    pub fn from_key(key: CertifiedKey) -> Result<Self, VerifyError> {
        if !key.certificate.body.is_ca {
            return Err(VerifyError::InvalidKey(format!(
                "'{}' is not a certificate authority",
                key.certificate.subject()
            )));
        }
        Ok(Self { key })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.key.certificate
    }

    /// Certificates above this authority, nearest first.
    pub fn chain(&self) -> &[Certificate] {
        &self.key.chain
    }

    /// Issue a certificate for a fresh key pair.
    pub fn issue(&self, request: CertificateRequest) -> Result<CertifiedKey, VerifyError> {
        let signing_key = sign::generate_signing_key();
        let certificate = self.certify(&request, &sign::public_key_b64(&signing_key))?;
        Ok(CertifiedKey {
            certificate,
            signing_key,
            chain: self.issued_chain(),
        })
    }

    /// Issue a certificate for someone else's public key (base64).
    pub fn certify(
        &self,
        request: &CertificateRequest,
        public_key: &str,
    ) -> Result<Certificate, VerifyError> {
        certify(
            request,
            public_key,
            self.key.certificate.subject(),
            &self.key.signing_key,
        )
    }

    /// The chain handed out with issued certificates, nearest issuer first.
    pub fn issued_chain(&self) -> Vec<Certificate> {
        std::iter::once(self.key.certificate.clone())
            .chain(self.key.chain.iter().cloned())
            .collect()
    }

    pub fn intermediate(&self, subject: &str) -> Result<CertificateAuthority, VerifyError> {
        Ok(CertificateAuthority {
            key: self.issue(CertificateRequest::certificate_authority(subject))?,
        })
    }
}

/// Issues timestamps over signature values.
#[derive(Clone)]
pub struct TimestampAuthority {
    identity: CertifiedKey,
    hash_algorithm: HashAlgorithm,
    accuracy_seconds: Option<u32>,
    clock: Option<DateTime<Utc>>,
}

impl TimestampAuthority {
    pub fn new(identity: CertifiedKey) -> Self {
        Self {
            identity,
            hash_algorithm: HashAlgorithm::Sha256,
            accuracy_seconds: None,
            clock: None,
        }
    }

    pub fn with_accuracy(mut self, seconds: u32) -> Self {
        self.accuracy_seconds = Some(seconds);
        self
    }

    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    /// Assert `at` instead of the current time in issued tokens.
    pub fn at_time(mut self, at: DateTime<Utc>) -> Self {
        self.clock = Some(at.trunc_subsecs(0));
        self
    }

    pub fn certificate(&self) -> &Certificate {
        &self.identity.certificate
    }

    /// Timestamp a base64 signature value.
    pub fn timestamp(&self, signature_value: &str) -> Result<Timestamp, VerifyError> {
        let token = TimestampToken {
            serial_number: uuid::Uuid::new_v4().simple().to_string(),
            generalized_time: self.clock.unwrap_or_else(|| Utc::now().trunc_subsecs(0)),
            accuracy_seconds: self.accuracy_seconds,
            hash_algorithm: self.hash_algorithm,
            message_imprint: hash::hex_encode(
                &self.hash_algorithm.digest(signature_value.as_bytes()),
            ),
        };
        let signed = self.identity.sign(&canonical_bytes(&token)?);

        Ok(Timestamp {
            token,
            tsa_certificate: self.identity.certificate.clone(),
            additional_certificates: self.identity.chain.clone(),
            signature_value: signed,
        })
    }
}
