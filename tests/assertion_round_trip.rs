//! Assertion round-trip integration tests.
//!
//! Serialize a fully-populated assertion, parse it back, and check the
//! reconstructed object is structurally equivalent to the original.

use chrono::{DateTime, Utc};
use saml2_assertion::signature::{SignatureAlgorithm, SigningKey, VerificationKey};
use saml2_assertion::types::{
    Attribute, AttributeStatement, AudienceRestriction, AuthnContextClass, AuthnStatement,
    Statement, SubjectConfirmation, SubjectConfirmationData,
};
use saml2_assertion::{Assertion, Conditions, Issuer, NameId, SamlResult};

fn instant(s: &str) -> DateTime<Utc> {
    saml2_assertion::xml::parse_instant(s).unwrap()
}

fn sample_assertion() -> SamlResult<Assertion> {
    let issued = instant("2020-03-23T23:37:24Z");
    let expires = instant("2020-03-23T23:42:24Z");

    let subject = saml2_assertion::Subject::new(NameId::email("user@example.com"))
        .with_confirmation(
            SubjectConfirmation::bearer().with_data(
                SubjectConfirmationData::new()
                    .with_recipient("https://sp.example/acs")
                    .with_in_response_to("_req1")
                    .with_window(None, Some(expires)),
            ),
        );

    let conditions = Conditions::with_window(Some(issued), Some(expires))?
        .with_audience_restriction(AudienceRestriction::new(vec![
            "https://sp.example/metadata".to_string(),
            "https://sp2.example/metadata".to_string(),
        ])?)
        .one_time_use();

    let statements = vec![
        Statement::Authn(
            AuthnStatement::new(issued, AuthnContextClass::PasswordProtectedTransport)
                .with_session_index("_session1"),
        ),
        Statement::Attribute(
            AttributeStatement::new()
                .with_attribute(Attribute::single("email", "user@example.com"))
                .with_attribute(Attribute::multi(
                    "roles",
                    vec!["admin".to_string(), "user".to_string()],
                )),
        ),
    ];

    Ok(
        Assertion::new(Issuer::new("https://idp.example.com")?, Some(subject), statements)?
            .with_id("_id-round-trip")
            .with_issue_instant(issued)
            .with_conditions(conditions),
    )
}

fn parse(xml: &str) -> SamlResult<Assertion> {
    let doc = roxmltree::Document::parse(xml)?;
    Assertion::from_xml(doc.root_element())
}

/// Tests that a fully-populated assertion survives a serialize/parse cycle
/// structurally unchanged.
#[test]
fn test_round_trip_structural_equivalence() -> SamlResult<()> {
    let original = sample_assertion()?;
    let xml = original.to_xml()?;
    let parsed = parse(&xml)?;

    assert_eq!(parsed, original, "round trip must preserve every element");

    // A second cycle must also be byte-stable.
    assert_eq!(parsed.to_xml()?, xml, "serialization must be deterministic");
    Ok(())
}

/// Tests that statement order and attribute values are preserved exactly.
#[test]
fn test_round_trip_preserves_statement_detail() -> SamlResult<()> {
    let parsed = parse(&sample_assertion()?.to_xml()?)?;

    let authn = parsed.authn_statements().next().expect("AuthnStatement missing");
    assert_eq!(authn.session_index.as_deref(), Some("_session1"));
    assert_eq!(
        authn.authn_context.class_ref.as_deref(),
        Some(AuthnContextClass::PasswordProtectedTransport.uri())
    );

    let attrs = parsed.attribute_statements().next().expect("AttributeStatement missing");
    assert_eq!(attrs.attributes.len(), 2);
    assert_eq!(attrs.attributes[1].name, "roles");
    assert_eq!(attrs.attributes[1].values, ["admin", "user"]);

    let conditions = parsed.conditions.as_ref().expect("Conditions missing");
    assert!(conditions.one_time_use);
    let audiences: Vec<&str> = conditions.restricted_audiences().collect();
    assert_eq!(
        audiences,
        ["https://sp.example/metadata", "https://sp2.example/metadata"]
    );
    Ok(())
}

struct ReversingKey;

impl SigningKey for ReversingKey {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::RsaSha256
    }

    fn sign(&self, data: &[u8]) -> SamlResult<Vec<u8>> {
        Ok(data.iter().rev().copied().collect())
    }

    fn certificate_der(&self) -> Option<&[u8]> {
        Some(b"test-certificate")
    }
}

impl VerificationKey for ReversingKey {
    fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        let expected: Vec<u8> = data.iter().rev().copied().collect();
        expected == signature
    }
}

/// Tests that signing emits the signature immediately after the Issuer
/// element and that the signed assertion still parses.
#[test]
fn test_signature_placement_after_issuer() -> SamlResult<()> {
    let mut assertion = sample_assertion()?;
    assertion.sign(&ReversingKey)?;
    let xml = assertion.to_xml()?;

    let issuer_end = xml.find("</saml:Issuer>").expect("Issuer missing");
    let signature_start = xml.find("<ds:Signature").expect("Signature missing");
    let subject_start = xml.find("<saml:Subject").expect("Subject missing");
    assert!(
        issuer_end < signature_start && signature_start < subject_start,
        "Signature must sit between Issuer and Subject"
    );
    assert!(
        xml.contains("<ds:X509Certificate>"),
        "Signature should embed the signer certificate"
    );

    let parsed = parse(&xml)?;
    assert!(parsed.was_signed_at_construction());
    Ok(())
}

/// Tests that a signed assertion verifies after a round trip and that a
/// tampered document fails verification.
#[test]
fn test_sign_round_trip_verify() -> SamlResult<()> {
    let mut assertion = sample_assertion()?;
    assertion.sign(&ReversingKey)?;
    let xml = assertion.to_xml()?;

    let parsed = parse(&xml)?;
    assert!(
        parsed.verify_signature(&ReversingKey)?,
        "intact signed assertion must verify"
    );

    let tampered = parse(&xml.replace("user@example.com", "admin@example.com"))?;
    assert!(
        !tampered.verify_signature(&ReversingKey)?,
        "tampered assertion must fail verification"
    );
    Ok(())
}

/// Tests that parsing a signed document records the signed state without
/// implying verification happened.
#[test]
fn test_was_signed_is_not_verified() -> SamlResult<()> {
    let mut assertion = sample_assertion()?;
    assertion.sign(&ReversingKey)?;
    let parsed = parse(&assertion.to_xml()?)?;

    assert!(parsed.was_signed_at_construction());
    // The signed flag alone proves nothing: a key that rejects everything
    // still gets the final say.
    struct RejectAll;
    impl VerificationKey for RejectAll {
        fn verify(&self, _data: &[u8], _signature: &[u8]) -> bool {
            false
        }
    }
    assert!(!parsed.verify_signature(&RejectAll)?);
    Ok(())
}
