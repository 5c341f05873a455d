//! Signed-element handling for SAML assertions.
//!
//! This module decides whether an assertion presented itself as signed,
//! attaches signatures before serialization, and hands signed bytes to the
//! verification capability. The cryptographic primitives themselves are
//! consumed through the [`SigningKey`] and [`VerificationKey`] traits; this
//! module never implements key handling or signature math.
//!
//! A present signature is informational only: parsing a signed assertion
//! records that it *was* signed, not that the signature is *valid*. Callers
//! must verify explicitly with a trusted key before treating an assertion
//! as authentic.

mod signer;
mod verifier;

pub(crate) use signer::create_signature;
pub(crate) use verifier::{extract_signature, verify_with_key};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{SamlError, SamlResult};

/// Signature algorithms.
pub mod signature_algorithms {
    /// RSA-SHA256 signature algorithm.
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

    /// RSA-SHA384 signature algorithm.
    pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";

    /// RSA-SHA512 signature algorithm.
    pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";

    /// ECDSA-SHA256 signature algorithm.
    pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";

    /// ECDSA-SHA384 signature algorithm.
    pub const ECDSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384";

    /// ECDSA-SHA512 signature algorithm.
    pub const ECDSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512";

    /// Legacy RSA-SHA1 signature algorithm (not recommended).
    pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
}

/// Digest algorithms.
pub mod digest_algorithms {
    /// SHA-256 digest algorithm.
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

    /// SHA-384 digest algorithm.
    pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";

    /// SHA-512 digest algorithm.
    pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

    /// Legacy SHA-1 digest algorithm (not recommended).
    pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
}

/// Canonicalization algorithms.
pub mod canonicalization_algorithms {
    /// Exclusive C14N without comments.
    pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

    /// C14N without comments.
    pub const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
}

/// Signature algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// RSA with SHA-256 (recommended).
    #[default]
    RsaSha256,
    /// RSA with SHA-384.
    RsaSha384,
    /// RSA with SHA-512.
    RsaSha512,
    /// ECDSA with SHA-256.
    EcdsaSha256,
    /// ECDSA with SHA-384.
    EcdsaSha384,
    /// ECDSA with SHA-512.
    EcdsaSha512,
    /// Legacy RSA with SHA-1 (not recommended).
    RsaSha1,
}

impl SignatureAlgorithm {
    /// Returns the URI for this signature algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 => signature_algorithms::RSA_SHA256,
            Self::RsaSha384 => signature_algorithms::RSA_SHA384,
            Self::RsaSha512 => signature_algorithms::RSA_SHA512,
            Self::EcdsaSha256 => signature_algorithms::ECDSA_SHA256,
            Self::EcdsaSha384 => signature_algorithms::ECDSA_SHA384,
            Self::EcdsaSha512 => signature_algorithms::ECDSA_SHA512,
            Self::RsaSha1 => signature_algorithms::RSA_SHA1,
        }
    }

    /// Returns the corresponding digest algorithm URI.
    #[must_use]
    pub const fn digest_uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 | Self::EcdsaSha256 => digest_algorithms::SHA256,
            Self::RsaSha384 | Self::EcdsaSha384 => digest_algorithms::SHA384,
            Self::RsaSha512 | Self::EcdsaSha512 => digest_algorithms::SHA512,
            Self::RsaSha1 => digest_algorithms::SHA1,
        }
    }

    /// Parses a signature algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            signature_algorithms::RSA_SHA256 => Some(Self::RsaSha256),
            signature_algorithms::RSA_SHA384 => Some(Self::RsaSha384),
            signature_algorithms::RSA_SHA512 => Some(Self::RsaSha512),
            signature_algorithms::ECDSA_SHA256 => Some(Self::EcdsaSha256),
            signature_algorithms::ECDSA_SHA384 => Some(Self::EcdsaSha384),
            signature_algorithms::ECDSA_SHA512 => Some(Self::EcdsaSha512),
            signature_algorithms::RSA_SHA1 => Some(Self::RsaSha1),
            _ => None,
        }
    }

    /// Returns true if this algorithm uses a deprecated hash (SHA-1).
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        matches!(self, Self::RsaSha1)
    }
}

/// Canonicalization algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CanonicalizationAlgorithm {
    /// Exclusive C14N without comments (recommended).
    #[default]
    ExclusiveC14N,
    /// C14N without comments.
    C14N,
}

impl CanonicalizationAlgorithm {
    /// Returns the URI for this canonicalization algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::ExclusiveC14N => canonicalization_algorithms::EXCLUSIVE_C14N,
            Self::C14N => canonicalization_algorithms::C14N,
        }
    }

    /// Parses a canonicalization algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            canonicalization_algorithms::EXCLUSIVE_C14N => Some(Self::ExclusiveC14N),
            canonicalization_algorithms::C14N => Some(Self::C14N),
            _ => None,
        }
    }
}

/// XML Signature structure.
///
/// Represents the `<ds:Signature>` element attached to a signed assertion,
/// whether populated at parse time or by signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlSignature {
    /// The signature algorithm used.
    pub algorithm: SignatureAlgorithm,
    /// The canonicalization algorithm used.
    pub canonicalization: CanonicalizationAlgorithm,
    /// The reference URI (the ID of the signed element, `#`-prefixed).
    pub reference_uri: String,
    /// The digest value (base64 encoded).
    pub digest_value: String,
    /// The signature value (base64 encoded).
    pub signature_value: String,
    /// Optional X.509 certificate (base64 encoded, DER format).
    pub x509_certificate: Option<String>,
}

/// Configuration for signature creation.
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    /// The canonicalization algorithm to use.
    pub canonicalization: CanonicalizationAlgorithm,
    /// Whether to include the key's X.509 certificate in the signature.
    pub include_certificate: bool,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            canonicalization: CanonicalizationAlgorithm::ExclusiveC14N,
            include_certificate: true,
        }
    }
}

/// Capability to sign bytes with a held private key.
///
/// Implemented by the host's key store; this crate never touches raw key
/// material.
pub trait SigningKey {
    /// The signature algorithm this key signs with.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Signs the given bytes, returning the raw signature.
    fn sign(&self, data: &[u8]) -> SamlResult<Vec<u8>>;

    /// The X.509 certificate (DER) to embed in `KeyInfo`, if any.
    fn certificate_der(&self) -> Option<&[u8]> {
        None
    }
}

/// Capability to verify a signature against a trusted public key.
pub trait VerificationKey {
    /// Returns true iff `signature` is a valid signature over `data`.
    fn verify(&self, data: &[u8], signature: &[u8]) -> bool;
}

/// Computes the digest of `data` for the hash family of `algorithm`.
///
/// SHA-1 is refused; legacy assertions signed with it must be re-issued.
pub(crate) fn digest(algorithm: SignatureAlgorithm, data: &[u8]) -> SamlResult<Vec<u8>> {
    match algorithm {
        SignatureAlgorithm::RsaSha256 | SignatureAlgorithm::EcdsaSha256 => {
            Ok(Sha256::digest(data).to_vec())
        }
        SignatureAlgorithm::RsaSha384 | SignatureAlgorithm::EcdsaSha384 => {
            Ok(Sha384::digest(data).to_vec())
        }
        SignatureAlgorithm::RsaSha512 | SignatureAlgorithm::EcdsaSha512 => {
            Ok(Sha512::digest(data).to_vec())
        }
        SignatureAlgorithm::RsaSha1 => Err(SamlError::SignatureCreation(
            "SHA-1 digests are not supported".to_string(),
        )),
    }
}

pub(crate) fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

pub(crate) fn base64_decode(data: &str) -> SamlResult<Vec<u8>> {
    Ok(BASE64.decode(data)?)
}
