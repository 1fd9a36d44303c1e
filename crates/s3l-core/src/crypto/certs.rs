// ============================================
// File: crates/s3l-core/src/crypto/certs.rs
// ============================================
//! # Certificates
//!
//! ## Creation Reason
//! The server proves its identity with an X.509 certificate issued by a
//! single configured root. This module parses PEM certificates and
//! validates one-level chains with Ed25519 signatures.
//!
//! ## Validation Rules
//! 1. Both certificates parse and are inside their validity window
//! 2. Leaf issuer DN equals root subject DN (raw DER comparison)
//! 3. Leaf signature algorithm is Ed25519 and verifies over the TBS bytes
//!    under the root's public key
//! 4. Leaf subject common name equals the expected name exactly
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only Ed25519 certificates are accepted, matching the identity keys
//! - There are no intermediates: the leaf must be signed by the root
//!
//! ## Last Modified
//! v0.1.0 - Initial certificate validation

use std::fmt;
use std::path::Path;

use tracing::debug;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{FromDer, X509Certificate};

use super::keys::IdentityPublicKey;
use crate::error::{CoreError, Result};

/// Dotted OID shared by Ed25519 keys and Ed25519 signatures.
const ED25519_OID: &str = "1.3.101.112";

// ============================================
// Certificate
// ============================================

/// A parsed-on-demand X.509 certificate, kept as PEM and DER.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    pem: Vec<u8>,
    der: Vec<u8>,
}

impl Certificate {
    /// Parses a PEM `CERTIFICATE` block.
    ///
    /// # Errors
    /// Returns `CertificateInvalid` if the PEM or DER does not parse.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let (_, block) = parse_x509_pem(pem)
            .map_err(|e| CoreError::certificate(format!("PEM: {e}")))?;
        if block.label != "CERTIFICATE" {
            return Err(CoreError::certificate(format!(
                "expected CERTIFICATE block, found {}",
                block.label
            )));
        }
        let cert = Self {
            pem: pem.to_vec(),
            der: block.contents,
        };
        cert.parsed()?;
        Ok(cert)
    }

    /// Loads a PEM certificate from disk.
    ///
    /// # Errors
    /// Returns `CertificateInvalid` if the file is unreadable or invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| {
            CoreError::certificate(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_pem(&pem)
    }

    /// Original PEM bytes, as sent in ServerHello.
    #[must_use]
    pub fn as_pem(&self) -> &[u8] {
        &self.pem
    }

    fn parsed(&self) -> Result<X509Certificate<'_>> {
        let (rest, cert) = X509Certificate::from_der(&self.der)
            .map_err(|e| CoreError::certificate(format!("DER: {e}")))?;
        if !rest.is_empty() {
            return Err(CoreError::certificate("trailing bytes after certificate"));
        }
        Ok(cert)
    }

    /// Subject common name.
    ///
    /// # Errors
    /// Returns `CertificateInvalid` if the subject has no UTF-8 CN.
    pub fn common_name(&self) -> Result<String> {
        let cert = self.parsed()?;
        let cn = cert
            .subject()
            .iter_common_name()
            .next()
            .ok_or_else(|| CoreError::certificate("subject has no common name"))?;
        cn.as_str()
            .map(str::to_owned)
            .map_err(|_| CoreError::certificate("common name is not a string"))
    }

    /// Ed25519 key the certificate binds.
    ///
    /// # Errors
    /// Returns `CertificateInvalid` for non-Ed25519 keys.
    pub fn public_key(&self) -> Result<IdentityPublicKey> {
        let cert = self.parsed()?;
        let spki = cert.public_key();
        if spki.algorithm.algorithm.to_id_string() != ED25519_OID {
            return Err(CoreError::certificate("certificate key is not Ed25519"));
        }
        IdentityPublicKey::from_bytes(&spki.subject_public_key.data)
            .map_err(|_| CoreError::certificate("malformed Ed25519 key"))
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cn = self.common_name().unwrap_or_else(|_| "?".into());
        f.debug_struct("Certificate").field("common_name", &cn).finish()
    }
}

fn check_validity(cert: &X509Certificate<'_>, what: &str) -> Result<()> {
    if cert.validity().is_valid() {
        Ok(())
    } else {
        Err(CoreError::certificate(format!("{what} certificate outside its validity window")))
    }
}

// ============================================
// TrustAnchor
// ============================================

/// The single root certificate a client trusts.
#[derive(Clone)]
pub struct TrustAnchor {
    root: Certificate,
    key: IdentityPublicKey,
}

impl TrustAnchor {
    /// Wraps a root certificate.
    ///
    /// # Errors
    /// Returns `CertificateInvalid` if the root key is not Ed25519.
    pub fn new(root: Certificate) -> Result<Self> {
        let key = root.public_key()?;
        Ok(Self { root, key })
    }

    /// Parses a PEM root certificate.
    ///
    /// # Errors
    /// See [`Certificate::from_pem`] and [`TrustAnchor::new`].
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        Self::new(Certificate::from_pem(pem)?)
    }

    /// Loads a PEM root certificate from disk.
    ///
    /// # Errors
    /// See [`Certificate::load`] and [`TrustAnchor::new`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Certificate::load(path)?)
    }

    /// Checks that `leaf` was issued by this root and both are current.
    ///
    /// # Errors
    /// Returns `CertificateInvalid` naming the failed rule.
    pub fn verify(&self, leaf: &Certificate) -> Result<()> {
        let root = self.root.parsed()?;
        let cert = leaf.parsed()?;

        check_validity(&root, "root")?;
        check_validity(&cert, "peer")?;

        if cert.issuer().as_raw() != root.subject().as_raw() {
            return Err(CoreError::certificate("issuer does not match trusted root"));
        }
        if cert.signature_algorithm.algorithm.to_id_string() != ED25519_OID {
            return Err(CoreError::certificate("certificate is not Ed25519-signed"));
        }
        self.key
            .verify(cert.tbs_certificate.as_ref(), &cert.signature_value.data)
            .map_err(|_| CoreError::certificate("issuer signature does not verify"))
    }

    /// Full peer check: chain, then exact common name. Returns the key
    /// the certificate binds.
    ///
    /// # Errors
    /// Returns `CertificateInvalid` on any failure.
    pub fn validate_peer_certificate(
        &self,
        pem: &[u8],
        expected_common_name: &str,
    ) -> Result<IdentityPublicKey> {
        let leaf = Certificate::from_pem(pem)?;
        self.verify(&leaf)?;

        let common_name = leaf.common_name()?;
        if common_name != expected_common_name {
            return Err(CoreError::certificate(format!(
                "common name {common_name:?} does not match {expected_common_name:?}"
            )));
        }

        let key = leaf.public_key()?;
        debug!(cn = %common_name, key = %key.fingerprint(), "Peer certificate accepted");
        Ok(key)
    }
}

impl fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustAnchor").field("root", &self.root).finish()
    }
}

// ============================================
// Tests
// ============================================
