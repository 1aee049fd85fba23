use crate::signature::Certificate;

/// Longest chain (leaf included) the builder will follow.
pub const MAX_CHAIN_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    /// The chain ends in a trusted root.
    Trusted,
    /// The chain ends in a self-issued root that is not trusted.
    UntrustedRoot,
    /// No issuer could be found for the last certificate.
    PartialChain,
    /// A link in the chain is broken.
    Invalid(String),
}

/// A certificate chain, leaf first.
#[derive(Debug, Clone)]
pub struct CertificateChain {
    pub certificates: Vec<Certificate>,
    pub status: ChainStatus,
}

impl CertificateChain {
    pub fn leaf(&self) -> Option<&Certificate> {
        self.certificates.first()
    }

    /// The top-most certificate reached.
    pub fn root(&self) -> Option<&Certificate> {
        self.certificates.last()
    }

    /// (certificate, issuer) links, leaf first.
    pub fn links(&self) -> impl Iterator<Item = (&Certificate, &Certificate)> {
        self.certificates.windows(2).map(|pair| (&pair[0], &pair[1]))
    }
}

/// Build a chain from `leaf` to one of `trusted_roots`, using `additional`
/// as intermediate lookup material.
pub fn build_chain(
    leaf: &Certificate,
    additional: &[Certificate],
    trusted_roots: &[Certificate],
) -> CertificateChain {
    let mut certificates = vec![leaf.clone()];

    let status = loop {
        let Some(current) = certificates.last() else {
            break ChainStatus::PartialChain;
        };

        if trusted_roots.contains(current) {
            break ChainStatus::Trusted;
        }
        if current.is_self_issued() {
            break ChainStatus::UntrustedRoot;
        }
        if certificates.len() >= MAX_CHAIN_DEPTH {
            break ChainStatus::Invalid(format!(
                "the certificate chain exceeds {MAX_CHAIN_DEPTH} certificates"
            ));
        }

        if let Some(root) = trusted_roots.iter().find(|root| current.is_issued_by(root)) {
            certificates.push(root.clone());
            break ChainStatus::Trusted;
        }

        let mut named = additional
            .iter()
            .filter(|candidate| candidate.subject() == current.body.issuer)
            .peekable();
        if named.peek().is_none() {
            break ChainStatus::PartialChain;
        }
        // Several certificates may share the issuer name; any one that
        // actually signed `current` will do.
        let Some(issuer) = named.find(|candidate| current.is_issued_by(candidate)) else {
            break ChainStatus::Invalid(format!(
                "the certificate '{}' is not signed by its issuer '{}'",
                current.subject(),
                current.body.issuer
            ));
        };
        if !issuer.body.is_ca {
            break ChainStatus::Invalid(format!(
                "the issuer '{}' is not a certificate authority",
                issuer.subject()
            ));
        }
        if certificates.contains(issuer) {
            break ChainStatus::Invalid("the certificate chain contains a cycle".to_string());
        }
        certificates.push(issuer.clone());
    };

    CertificateChain {
        certificates,
        status,
    }
}
