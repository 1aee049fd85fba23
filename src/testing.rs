//! Shared test fixtures: a small PKI, signed packages and sample content.

use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use url::Url;

use crate::hash::HashAlgorithm;
use crate::package::{InMemoryPackage, PackageReader};
use crate::pki::{
    CertificateAuthority, CertificateRequest, CertifiedKey, InMemoryRevocationList,
    SoftwarePlatform, TimestampAuthority,
};
use crate::signature::{PrimarySignature, RepositoryMetadata, SignatureBuilder};
use crate::verify::TrustVerifier;

const SAMPLE_ENTRIES: &[(&str, &str)] = &[
    ("demo.nuspec", "<package><id>Demo</id><version>1.0.0</version></package>"),
    ("lib/net/pkg.dll", "MZ demo library bytes"),
    ("readme.md", "# Demo\n"),
];

pub(crate) fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub(crate) fn days_from_now(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}

/// Lay out the sample package under `root`.
pub(crate) fn write_package(root: &Path) {
    for (path, data) in SAMPLE_ENTRIES {
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(target, data).unwrap();
    }
}

/// The sample package, in memory. Hashes identically to [`write_package`].
pub(crate) fn memory_package() -> InMemoryPackage {
    SAMPLE_ENTRIES
        .iter()
        .fold(InMemoryPackage::new("Demo.1.0.0"), |package, (path, data)| {
            package.with_entry(*path, data.as_bytes())
        })
}

pub(crate) struct Fixture {
    pub root: CertificateAuthority,
    pub untrusted_root: CertificateAuthority,
    pub author: CertifiedKey,
    pub repository: CertifiedKey,
    pub untrusted_author: CertifiedKey,
    pub untrusted_repository: CertifiedKey,
    pub tsa: TimestampAuthority,
    pub service_index: Url,
}

impl Fixture {
    pub fn new() -> Self {
        let root = CertificateAuthority::root_with(
            CertificateRequest::certificate_authority("CN=Test Root")
                .valid_between(days_ago(3650), days_from_now(3650)),
        )
        .unwrap();
        let untrusted_root = CertificateAuthority::root_with(
            CertificateRequest::certificate_authority("CN=Untrusted Root")
                .valid_between(days_ago(3650), days_from_now(3650)),
        )
        .unwrap();

        let year = |subject: &str| {
            CertificateRequest::code_signing(subject).valid_between(days_ago(365), days_from_now(365))
        };
        let author = root.issue(year("CN=Test Author")).unwrap();
        let repository = root.issue(year("CN=Test Repository")).unwrap();
        let untrusted_author = untrusted_root.issue(year("CN=Untrusted Author")).unwrap();
        let untrusted_repository = untrusted_root.issue(year("CN=Untrusted Repository")).unwrap();

        let tsa = TimestampAuthority::new(
            root.issue(
                CertificateRequest::time_stamping("CN=Test TSA")
                    .valid_between(days_ago(365), days_from_now(365)),
            )
            .unwrap(),
        );

        Self {
            root,
            untrusted_root,
            author,
            repository,
            untrusted_author,
            untrusted_repository,
            tsa,
            service_index: Url::parse("https://packages.example.test/v3/index.json").unwrap(),
        }
    }

    pub fn trusted_roots(&self) -> Vec<crate::signature::Certificate> {
        vec![self.root.certificate().clone()]
    }

    pub fn platform(&self) -> SoftwarePlatform {
        SoftwarePlatform::new(self.trusted_roots())
    }

    pub fn platform_with(&self, revocations: InMemoryRevocationList) -> SoftwarePlatform {
        self.platform().with_revocation_source(Arc::new(revocations))
    }

    pub fn trust_verifier(&self) -> TrustVerifier {
        TrustVerifier::new(Arc::new(self.platform()))
    }

    pub fn trust_verifier_with(&self, revocations: InMemoryRevocationList) -> TrustVerifier {
        TrustVerifier::new(Arc::new(self.platform_with(revocations)))
    }

    /// Issue from the trusted root.
    pub fn issue(&self, request: CertificateRequest) -> CertifiedKey {
        self.root.issue(request).unwrap()
    }

    /// An intermediate authority under the trusted root.
    pub fn intermediate_between(
        &self,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> CertificateAuthority {
        let key = self.issue(
            CertificateRequest::certificate_authority("CN=Test Intermediate")
                .valid_between(not_before, not_after),
        );
        CertificateAuthority::from_key(key).unwrap()
    }

    pub fn issue_untrusted(&self, request: CertificateRequest) -> CertifiedKey {
        self.untrusted_root.issue(request).unwrap()
    }

    /// The trusted timestamp authority, asserting `at` as signing time.
    pub fn tsa_at(&self, at: DateTime<Utc>) -> TimestampAuthority {
        self.tsa.clone().at_time(at)
    }

    pub fn untrusted_tsa(&self) -> TimestampAuthority {
        TimestampAuthority::new(self.issue_untrusted(CertificateRequest::time_stamping("CN=Rogue TSA")))
    }

    pub fn repository_metadata(&self, owners: Option<Vec<&str>>) -> RepositoryMetadata {
        let metadata = RepositoryMetadata::new(self.service_index.clone());
        match owners {
            Some(owners) => metadata.with_owners(owners),
            None => metadata,
        }
    }

    pub fn sign_with(
        &self,
        signer: &CertifiedKey,
        package: &dyn PackageReader,
        tsa: Option<&TimestampAuthority>,
    ) -> PrimarySignature {
        let builder = SignatureBuilder::new(signer);
        match tsa {
            Some(tsa) => builder.timestamped_by(tsa).author(package),
            None => builder.author(package),
        }
        .unwrap()
    }

    pub fn sign_author(&self, package: &dyn PackageReader) -> PrimarySignature {
        self.sign_with(&self.author, package, None)
    }

    pub fn sign_author_with(
        &self,
        package: &dyn PackageReader,
        algorithm: HashAlgorithm,
    ) -> PrimarySignature {
        SignatureBuilder::new(&self.author)
            .digest_algorithm(algorithm)
            .author(package)
            .unwrap()
    }

    pub fn sign_author_timestamped(&self, package: &dyn PackageReader) -> PrimarySignature {
        self.sign_with(&self.author, package, Some(&self.tsa))
    }

    pub fn sign_repository_timestamped(
        &self,
        package: &dyn PackageReader,
        owners: Option<Vec<&str>>,
    ) -> PrimarySignature {
        SignatureBuilder::new(&self.repository)
            .timestamped_by(&self.tsa)
            .repository(package, self.repository_metadata(owners))
            .unwrap()
    }

    /// Repository countersignature, timestamped now.
    pub fn countersign(&self, primary: PrimarySignature) -> PrimarySignature {
        SignatureBuilder::new(&self.repository)
            .timestamped_by(&self.tsa)
            .countersign(&primary, self.repository_metadata(None))
            .unwrap()
    }

    /// Repository countersignature whose timestamp asserts `at`.
    pub fn countersign_at(&self, primary: PrimarySignature, at: DateTime<Utc>) -> PrimarySignature {
        let tsa = self.tsa_at(at);
        SignatureBuilder::new(&self.repository)
            .timestamped_by(&tsa)
            .countersign(&primary, self.repository_metadata(None))
            .unwrap()
    }

    pub fn author_signature(&self, content: &[u8]) -> PrimarySignature {
        self.sign_author(&content_package(content))
    }

    pub fn timestamped_author_signature(
        &self,
        content: &[u8],
        accuracy_seconds: Option<u32>,
    ) -> PrimarySignature {
        let tsa = match accuracy_seconds {
            Some(seconds) => self.tsa.clone().with_accuracy(seconds),
            None => self.tsa.clone(),
        };
        self.sign_with(&self.author, &content_package(content), Some(&tsa))
    }

    pub fn repository_signature(
        &self,
        content: &[u8],
        owners: Option<Vec<&str>>,
    ) -> PrimarySignature {
        SignatureBuilder::new(&self.repository)
            .repository(&content_package(content), self.repository_metadata(owners))
            .unwrap()
    }
}

fn content_package(content: &[u8]) -> InMemoryPackage {
    InMemoryPackage::new("content").with_entry("content", content.to_vec())
}
