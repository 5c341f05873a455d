//! XML signature extraction and verification.
//!
//! Extraction runs at parse time and records what the document presented;
//! verification is a separate, explicit step that recomputes the digest,
//! rebuilds `SignedInfo`, and hands the signed bytes to the
//! [`VerificationKey`] capability. The boolean verdict is the capability's;
//! this module never decides trust on its own.

use roxmltree::Node;

use crate::error::{SamlError, SamlResult};
use crate::types::constants::XMLDSIG_NS;
use crate::xml;

use super::signer::{canonicalize, signed_info_markup};
use super::{
    base64_decode, digest, CanonicalizationAlgorithm, SignatureAlgorithm, VerificationKey,
    XmlSignature,
};

/// Extracts the `<ds:Signature>` child of an element node, if present.
///
/// Called during assertion parsing; a `Some` result only means the document
/// presented itself as signed.
pub(crate) fn extract_signature(node: Node<'_, '_>) -> SamlResult<Option<XmlSignature>> {
    xml::optional_child(node, XMLDSIG_NS, "Signature")?
        .map(parse_signature)
        .transpose()
}

/// Parses a `<ds:Signature>` element into its structural parts.
fn parse_signature(node: Node<'_, '_>) -> SamlResult<XmlSignature> {
    let signed_info = xml::required_child(node, XMLDSIG_NS, "SignedInfo")?;

    let c14n_node = xml::required_child(signed_info, XMLDSIG_NS, "CanonicalizationMethod")?;
    let c14n_uri = xml::required_attribute(c14n_node, "Algorithm")?;
    let canonicalization = CanonicalizationAlgorithm::from_uri(c14n_uri).ok_or_else(|| {
        SamlError::SignatureInvalid(format!("unsupported canonicalization: {c14n_uri}"))
    })?;

    let method_node = xml::required_child(signed_info, XMLDSIG_NS, "SignatureMethod")?;
    let method_uri = xml::required_attribute(method_node, "Algorithm")?;
    let algorithm = SignatureAlgorithm::from_uri(method_uri).ok_or_else(|| {
        SamlError::SignatureInvalid(format!("unsupported signature algorithm: {method_uri}"))
    })?;

    let reference = xml::required_child(signed_info, XMLDSIG_NS, "Reference")?;
    let reference_uri = xml::required_attribute(reference, "URI")?.to_string();
    let digest_value =
        xml::text_content(xml::required_child(reference, XMLDSIG_NS, "DigestValue")?);

    let signature_value =
        xml::text_content(xml::required_child(node, XMLDSIG_NS, "SignatureValue")?)
            .split_whitespace()
            .collect();

    let x509_certificate = xml::optional_child(node, XMLDSIG_NS, "KeyInfo")?
        .map(|key_info| -> SamlResult<Option<String>> {
            Ok(xml::optional_child(key_info, XMLDSIG_NS, "X509Data")?
                .map(|data| xml::optional_child(data, XMLDSIG_NS, "X509Certificate"))
                .transpose()?
                .flatten()
                .map(|cert| xml::text_content(cert).split_whitespace().collect()))
        })
        .transpose()?
        .flatten();

    Ok(XmlSignature {
        algorithm,
        canonicalization,
        reference_uri,
        digest_value,
        signature_value,
        x509_certificate,
    })
}

/// Verifies `signature` over the canonical form of `unsigned_xml`.
///
/// Checks the digest first, then rebuilds `SignedInfo` and delegates the
/// signature check to `key`. Returns the verifier's boolean verdict;
/// structural problems (undecodable values, deprecated algorithms) are
/// errors, not `false`.
pub(crate) fn verify_with_key(
    unsigned_xml: &str,
    signature: &XmlSignature,
    key: &dyn VerificationKey,
) -> SamlResult<bool> {
    if signature.algorithm.is_deprecated() {
        return Err(SamlError::SignatureInvalid(
            "SHA-1 signatures are not allowed".to_string(),
        ));
    }

    let canonical_element = canonicalize(unsigned_xml);
    let computed = super::base64_encode(&digest(
        signature.algorithm,
        canonical_element.as_bytes(),
    )?);
    if computed != signature.digest_value {
        tracing::debug!(
            reference = %signature.reference_uri,
            "signature digest mismatch"
        );
        return Ok(false);
    }

    let canonical_signed_info = canonicalize(&signed_info_markup(signature));
    let signature_bytes = base64_decode(&signature.signature_value)?;
    Ok(key.verify(canonical_signed_info.as_bytes(), &signature_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{create_signature, SignatureConfig, SigningKey};

    struct ReversingKey;

    impl SigningKey for ReversingKey {
        fn algorithm(&self) -> SignatureAlgorithm {
            SignatureAlgorithm::RsaSha256
        }

        fn sign(&self, data: &[u8]) -> SamlResult<Vec<u8>> {
            Ok(data.iter().rev().copied().collect())
        }
    }

    impl VerificationKey for ReversingKey {
        fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
            let expected: Vec<u8> = data.iter().rev().copied().collect();
            expected == signature
        }
    }

    struct RejectAllKey;

    impl VerificationKey for RejectAllKey {
        fn verify(&self, _data: &[u8], _signature: &[u8]) -> bool {
            false
        }
    }

    const SIGNED_ASSERTION_FRAGMENT: &str = r##"<saml:Assertion
        xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_id1">
        <ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
            <ds:SignedInfo>
                <ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>
                <ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>
                <ds:Reference URI="#_id1">
                    <ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>
                    <ds:DigestValue>q2hp...</ds:DigestValue>
                </ds:Reference>
            </ds:SignedInfo>
            <ds:SignatureValue>c2ln</ds:SignatureValue>
            <ds:KeyInfo>
                <ds:X509Data>
                    <ds:X509Certificate>Y2VydA==</ds:X509Certificate>
                </ds:X509Data>
            </ds:KeyInfo>
        </ds:Signature>
    </saml:Assertion>"##;

    #[test]
    fn extract_signature_reads_structural_parts() {
        let doc = roxmltree::Document::parse(SIGNED_ASSERTION_FRAGMENT).unwrap();
        let signature = extract_signature(doc.root_element()).unwrap().unwrap();
        assert_eq!(signature.algorithm, SignatureAlgorithm::RsaSha256);
        assert_eq!(signature.reference_uri, "#_id1");
        assert_eq!(signature.signature_value, "c2ln");
        assert_eq!(signature.x509_certificate.as_deref(), Some("Y2VydA=="));
    }

    #[test]
    fn extract_signature_absent_is_none() {
        let doc = roxmltree::Document::parse(
            r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_id1"/>"#,
        )
        .unwrap();
        assert!(extract_signature(doc.root_element()).unwrap().is_none());
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        let xml = SIGNED_ASSERTION_FRAGMENT
            .replace("xmldsig-more#rsa-sha256", "xmldsig#dsa-sha1");
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(matches!(
            extract_signature(doc.root_element()),
            Err(SamlError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn sign_then_verify_round_trip() {
        let unsigned = r#"<saml:Assertion ID="_id1">payload</saml:Assertion>"#;
        let signature =
            create_signature(unsigned, "_id1", &ReversingKey, &SignatureConfig::default())
                .unwrap();

        assert!(verify_with_key(unsigned, &signature, &ReversingKey).unwrap());
    }

    #[test]
    fn tampered_content_fails_digest_check() {
        let unsigned = r#"<saml:Assertion ID="_id1">payload</saml:Assertion>"#;
        let signature =
            create_signature(unsigned, "_id1", &ReversingKey, &SignatureConfig::default())
                .unwrap();

        let tampered = unsigned.replace("payload", "tampered");
        assert!(!verify_with_key(&tampered, &signature, &ReversingKey).unwrap());
    }

    #[test]
    fn verifier_verdict_is_surfaced_not_overridden() {
        let unsigned = r#"<saml:Assertion ID="_id1">payload</saml:Assertion>"#;
        let signature =
            create_signature(unsigned, "_id1", &ReversingKey, &SignatureConfig::default())
                .unwrap();

        assert!(!verify_with_key(unsigned, &signature, &RejectAllKey).unwrap());
    }
}
