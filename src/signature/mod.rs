// signature/ — Signature content model
//
// model.rs       — Primary signature, countersignature, timestamp (serde)
// certificate.rs — Ed25519 certificates and fingerprints
// canonical.rs   — Canonical JSON: the bytes every signature covers
// builder.rs     — Producing signatures and countersignatures

pub mod builder;
pub mod canonical;
pub mod certificate;
pub mod model;

pub use builder::SignatureBuilder;
pub use certificate::{Certificate, CertificateBody, KeyPurpose};
pub use model::{
    Placement, PrimarySignature, RepositoryMetadata, Signature, Target, Timestamp,
    TimestampToken, SIGNATURE_FORMAT_VERSION,
};
