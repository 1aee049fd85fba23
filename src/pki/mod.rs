// pki/ — Certificate infrastructure behind the trust verifier
//
// authority.rs  — Certificate and timestamp issuance
// chain.rs      — Chain building from a leaf to a trusted root
// revocation.rs — Revocation sources and revocation mode
// platform.rs   — CertificatePlatform capability + software implementation
// store.rs      — Certificate files on disk

pub mod authority;
pub mod chain;
pub mod platform;
pub mod revocation;
pub mod store;

pub use authority::{CertificateAuthority, CertificateRequest, CertifiedKey, TimestampAuthority};
pub use chain::{build_chain, CertificateChain, ChainStatus};
pub use platform::{CertificatePlatform, SoftwarePlatform, DEFAULT_REVOCATION_TIMEOUT};
pub use revocation::{
    InMemoryRevocationList, RevocationMode, RevocationSource, RevocationStatus,
    REVOCATION_MODE_ENV,
};
pub use store::{load_certificates, CertificateFile};
