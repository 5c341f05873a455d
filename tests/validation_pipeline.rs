//! Validation pipeline integration tests.
//!
//! Run the full validator set against assertions parsed from wire XML, the
//! way a message-processing host would after receiving a response.

use chrono::{DateTime, Duration, Utc};
use saml2_assertion::validation::{
    self, AssertionValidator, ConditionsNotBefore, ConditionsNotOnOrAfter, InResponseToMatches,
    OneTimeUse, SpIsValidAudience, SubjectConfirmationDataNotOnOrAfter,
    SubjectConfirmationRecipientMatches, SubjectConfirmationValidator,
};
use saml2_assertion::{
    Assertion, FixedClock, SamlResult, ValidationContext, ValidationResult,
};

const SP_ENTITY_ID: &str = "https://sp.example/metadata";
const DESTINATION: &str = "https://sp.example/acs";

fn now() -> DateTime<Utc> {
    saml2_assertion::xml::parse_instant("2020-03-23T23:37:24Z").unwrap()
}

fn context() -> ValidationContext {
    ValidationContext::new(&FixedClock(now()))
        .with_sp_entity_id(SP_ENTITY_ID)
        .with_destination(DESTINATION)
        .with_request_id("_req1")
}

fn assertion_xml(not_on_or_after: DateTime<Utc>, audience: &str) -> String {
    format!(
        r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
            ID="_id-pipeline" Version="2.0" IssueInstant="2020-03-23T23:37:24Z">
            <saml:Issuer>https://idp.example.com</saml:Issuer>
            <saml:Subject>
                <saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress">user@example.com</saml:NameID>
                <saml:SubjectConfirmation Method="urn:oasis:names:tc:SAML:2.0:cm:bearer">
                    <saml:SubjectConfirmationData
                        NotOnOrAfter="{expiry}"
                        Recipient="{destination}"
                        InResponseTo="_req1"/>
                </saml:SubjectConfirmation>
            </saml:Subject>
            <saml:Conditions NotBefore="2020-03-23T23:17:24Z" NotOnOrAfter="{expiry}">
                <saml:AudienceRestriction>
                    <saml:Audience>{audience}</saml:Audience>
                </saml:AudienceRestriction>
            </saml:Conditions>
            <saml:AuthnStatement AuthnInstant="2020-03-23T23:37:24Z">
                <saml:AuthnContext>
                    <saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport</saml:AuthnContextClassRef>
                </saml:AuthnContext>
            </saml:AuthnStatement>
        </saml:Assertion>"#,
        expiry = saml2_assertion::xml::format_instant(not_on_or_after),
        destination = DESTINATION,
        audience = audience,
    )
}

fn parse(xml: &str) -> SamlResult<Assertion> {
    let doc = roxmltree::Document::parse(xml)?;
    Assertion::from_xml(doc.root_element())
}

fn assertion_validators() -> [&'static dyn AssertionValidator; 4] {
    [
        &ConditionsNotBefore,
        &ConditionsNotOnOrAfter,
        &SpIsValidAudience,
        &OneTimeUse,
    ]
}

fn run_confirmation_validators(
    assertion: &Assertion,
    context: &ValidationContext,
    result: &mut ValidationResult,
) -> SamlResult<()> {
    let validators: [&dyn SubjectConfirmationValidator; 3] = [
        &SubjectConfirmationRecipientMatches,
        &SubjectConfirmationDataNotOnOrAfter,
        &InResponseToMatches,
    ];
    let subject = assertion.subject.as_ref().expect("Subject missing");
    for confirmation in &subject.confirmations {
        for validator in validators {
            validator.validate(confirmation, context, result)?;
        }
    }
    Ok(())
}

/// Tests that a fresh, correctly-targeted assertion passes the full
/// validator set with no errors.
#[test]
fn test_fresh_assertion_is_valid() -> SamlResult<()> {
    let assertion = parse(&assertion_xml(now() + Duration::minutes(5), SP_ENTITY_ID))?;
    let context = context();

    let mut result =
        validation::validate_assertion(&assertion, &context, &assertion_validators())?;
    run_confirmation_validators(&assertion, &context, &mut result)?;

    assert!(result.is_valid(), "unexpected errors: {:?}", result.errors());
    Ok(())
}

/// Tests that an expired, mis-targeted assertion reports every violation
/// in one pass rather than stopping at the first.
#[test]
fn test_all_violations_reported_together() -> SamlResult<()> {
    let assertion = parse(&assertion_xml(
        now() - Duration::minutes(10),
        "https://other-sp.example/metadata",
    ))?;
    let context = context();

    let mut result =
        validation::validate_assertion(&assertion, &context, &assertion_validators())?;
    run_confirmation_validators(&assertion, &context, &mut result)?;

    // Expired Conditions, wrong audience, and expired confirmation data.
    assert_eq!(result.errors().len(), 3, "errors: {:?}", result.errors());
    Ok(())
}

/// Tests that recipient mismatches are reported naming both the presented
/// and the expected value.
#[test]
fn test_recipient_mismatch_names_both_values() -> SamlResult<()> {
    let assertion = parse(&assertion_xml(now() + Duration::minutes(5), SP_ENTITY_ID))?;
    let context = ValidationContext::new(&FixedClock(now()))
        .with_sp_entity_id(SP_ENTITY_ID)
        .with_destination("https://elsewhere.example/acs")
        .with_request_id("_req1");

    let mut result = ValidationResult::new();
    run_confirmation_validators(&assertion, &context, &mut result)?;

    assert_eq!(result.errors().len(), 1);
    assert!(result.errors()[0].contains(DESTINATION));
    assert!(result.errors()[0].contains("https://elsewhere.example/acs"));
    Ok(())
}

/// Tests that validator preconditions surface as hard errors, not as
/// entries in the result.
#[test]
fn test_missing_context_is_a_hard_error() -> SamlResult<()> {
    let assertion = parse(&assertion_xml(now() + Duration::minutes(5), SP_ENTITY_ID))?;
    let context = ValidationContext::new(&FixedClock(now()));

    let err = validation::validate_assertion(&assertion, &context, &[&SpIsValidAudience])
        .expect_err("audience check without SP identity must fail loudly");
    assert!(matches!(
        err,
        saml2_assertion::SamlError::ValidatorPrecondition(_)
    ));
    Ok(())
}

/// Tests that the one-time-use flag is surfaced for replay-cache
/// consultation without contributing a validation error by itself.
#[test]
fn test_one_time_use_is_reported_for_replay_check() -> SamlResult<()> {
    let xml = assertion_xml(now() + Duration::minutes(5), SP_ENTITY_ID).replace(
        "</saml:AudienceRestriction>",
        "</saml:AudienceRestriction><saml:OneTimeUse/>",
    );
    let assertion = parse(&xml)?;

    assert!(OneTimeUse::requires_replay_check(&assertion));
    let result =
        validation::validate_assertion(&assertion, &context(), &assertion_validators())?;
    assert!(result.is_valid());
    Ok(())
}

/// Tests that the validation verdict is independent of the signed flag:
/// an unsigned assertion can pass constraint validation, and a signed one
/// is not authenticated until verification runs.
#[test]
fn test_validation_is_independent_of_signed_state() -> SamlResult<()> {
    let assertion = parse(&assertion_xml(now() + Duration::minutes(5), SP_ENTITY_ID))?;
    assert!(!assertion.was_signed_at_construction());

    let result =
        validation::validate_assertion(&assertion, &context(), &assertion_validators())?;
    assert!(
        result.is_valid(),
        "constraint validation must not require a signature"
    );

    // Authenticity is a separate question: without a signature there is
    // nothing to verify, and the attempt fails loudly.
    struct AcceptAll;
    impl saml2_assertion::signature::VerificationKey for AcceptAll {
        fn verify(&self, _data: &[u8], _signature: &[u8]) -> bool {
            true
        }
    }
    assert!(assertion.verify_signature(&AcceptAll).is_err());
    Ok(())
}
