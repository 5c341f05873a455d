//! SAML Assertion type.
//!
//! The assertion is the unit of trust exchanged between identity and
//! service providers: a package of statements about a subject made by an
//! issuer, optionally signed.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use roxmltree::Node;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::{SamlError, SamlResult};
use crate::signature::{
    create_signature, extract_signature, verify_with_key, SignatureConfig, SigningKey,
    VerificationKey, XmlSignature,
};
use crate::types::conditions::Conditions;
use crate::types::constants::{SAML_NS, SAML_VERSION};
use crate::types::issuer::Issuer;
use crate::types::statements::{AttributeStatement, AuthnStatement, Statement};
use crate::types::subject::Subject;
use crate::xml;

/// SAML Assertion.
///
/// Immutable after construction except for the signature slot: the only
/// mutation point is [`Assertion::sign`], which attaches a signature so the
/// next serialization emits it.
///
/// An assertion that parsed with a signature attached has *not* been
/// verified; [`Assertion::was_signed_at_construction`] is informational
/// only, and callers must invoke [`Assertion::verify_signature`] with a
/// trusted key before treating the assertion as authentic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Unique identifier for this assertion.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    pub version: String,

    /// Timestamp when this assertion was issued.
    pub issue_instant: DateTime<Utc>,

    /// The authority that issued this assertion.
    pub issuer: Issuer,

    /// The subject of this assertion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,

    /// Conditions that must be evaluated for the assertion to be valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,

    /// The statements carried by this assertion, in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<Statement>,

    #[serde(skip)]
    signature: Option<XmlSignature>,

    #[serde(skip)]
    signed_at_construction: bool,
}

impl Assertion {
    /// Creates a new assertion with a generated ID and the process clock's
    /// current time as its issue instant.
    ///
    /// Fails with [`SamlError::InvalidAssertion`] when neither a subject
    /// nor any statement is given; an assertion must carry at least one of
    /// the two.
    pub fn new(
        issuer: Issuer,
        subject: Option<Subject>,
        statements: Vec<Statement>,
    ) -> SamlResult<Self> {
        Self::new_with_clock(&SystemClock, issuer, subject, statements)
    }

    /// Creates a new assertion reading the issue instant from an explicit
    /// temporal source instead of the process clock.
    pub fn new_with_clock(
        clock: &dyn Clock,
        issuer: Issuer,
        subject: Option<Subject>,
        statements: Vec<Statement>,
    ) -> SamlResult<Self> {
        if subject.is_none() && statements.is_empty() {
            return Err(SamlError::InvalidAssertion(
                "assertion must carry a Subject or at least one statement".to_string(),
            ));
        }
        Ok(Self {
            id: generate_id(),
            version: SAML_VERSION.to_string(),
            issue_instant: clock.now(),
            issuer,
            subject,
            conditions: None,
            statements,
            signature: None,
            signed_at_construction: false,
        })
    }

    /// Sets a custom ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the issue instant.
    #[must_use]
    pub fn with_issue_instant(mut self, instant: DateTime<Utc>) -> Self {
        self.issue_instant = instant;
        self
    }

    /// Sets the conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Returns the authentication statements in document order.
    pub fn authn_statements(&self) -> impl Iterator<Item = &AuthnStatement> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Authn(statement) => Some(statement),
            Statement::Attribute(_) => None,
        })
    }

    /// Returns the attribute statements in document order.
    pub fn attribute_statements(&self) -> impl Iterator<Item = &AttributeStatement> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Attribute(statement) => Some(statement),
            Statement::Authn(_) => None,
        })
    }

    /// True iff a signature element was present when this assertion was
    /// parsed.
    ///
    /// Presence says nothing about validity; see
    /// [`Assertion::verify_signature`].
    #[must_use]
    pub const fn was_signed_at_construction(&self) -> bool {
        self.signed_at_construction
    }

    /// The attached signature, populated at parse time or by
    /// [`Assertion::sign`].
    #[must_use]
    pub const fn signature(&self) -> Option<&XmlSignature> {
        self.signature.as_ref()
    }

    /// Signs this assertion with the default signature configuration.
    ///
    /// The signature is computed over the canonical serialization of the
    /// unsigned assertion and attached; the next [`Assertion::to_xml`]
    /// call emits it immediately after the Issuer element.
    pub fn sign<K: SigningKey>(&mut self, key: &K) -> SamlResult<()> {
        self.sign_with_config(key, &SignatureConfig::default())
    }

    /// Signs this assertion with an explicit signature configuration.
    pub fn sign_with_config<K: SigningKey>(
        &mut self,
        key: &K,
        config: &SignatureConfig,
    ) -> SamlResult<()> {
        let unsigned = self.unsigned_xml()?;
        self.signature = Some(create_signature(&unsigned, &self.id, key, config)?);
        Ok(())
    }

    /// Verifies the attached signature against a trusted key, surfacing the
    /// verifier's boolean verdict.
    ///
    /// Fails with [`SamlError::SignatureInvalid`] when no signature is
    /// attached; an unsigned assertion cannot be authenticated.
    pub fn verify_signature<K: VerificationKey>(&self, key: &K) -> SamlResult<bool> {
        let signature = self.signature.as_ref().ok_or_else(|| {
            SamlError::SignatureInvalid("assertion is not signed".to_string())
        })?;
        verify_with_key(&self.unsigned_xml()?, signature, key)
    }

    /// Parses an `<saml:Assertion>` element node.
    ///
    /// Performs all structural checks before constructing: qualified name,
    /// version, child cardinality, and the subject-or-statement invariant.
    /// A half-formed assertion is never returned.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        Self::from_xml_with_clock(node, &SystemClock)
    }

    /// Parses an `<saml:Assertion>` element node, reading the default issue
    /// instant (used when the `IssueInstant` attribute is absent) from an
    /// explicit temporal source.
    pub fn from_xml_with_clock(node: Node<'_, '_>, clock: &dyn Clock) -> SamlResult<Self> {
        xml::expect_element(node, SAML_NS, "Assertion")?;

        let version = xml::required_attribute(node, "Version")?.to_string();
        if version != SAML_VERSION {
            return Err(SamlError::InvalidAssertion(format!(
                "unsupported SAML version: {version}"
            )));
        }

        let id = match node.attribute("ID") {
            Some(id) => id.to_string(),
            None => generate_id(),
        };
        let issue_instant = match node.attribute("IssueInstant") {
            Some(value) => xml::parse_instant(value)?,
            None => clock.now(),
        };

        let issuer = Issuer::from_xml(xml::required_child(node, SAML_NS, "Issuer")?)?;
        let signature = extract_signature(node)?;

        let subject = xml::optional_child(node, SAML_NS, "Subject")?
            .map(Subject::from_xml)
            .transpose()?;
        let conditions = xml::optional_child(node, SAML_NS, "Conditions")?
            .map(Conditions::from_xml)
            .transpose()?;

        let statements = node
            .children()
            .filter(|c| Statement::matches(*c))
            .map(Statement::from_xml)
            .collect::<SamlResult<Vec<_>>>()?;

        if subject.is_none() && statements.is_empty() {
            return Err(SamlError::InvalidAssertion(
                "assertion must carry a Subject or at least one statement".to_string(),
            ));
        }

        let signed_at_construction = signature.is_some();
        Ok(Self {
            id,
            version,
            issue_instant,
            issuer,
            subject,
            conditions,
            statements,
            signature,
            signed_at_construction,
        })
    }

    /// Serializes this assertion to an XML string.
    ///
    /// Children are emitted in schema order: Issuer, Signature (if
    /// attached), Subject, Conditions, then statements.
    pub fn to_xml(&self) -> SamlResult<String> {
        self.serialize(true)
    }

    /// The canonical signing input: the assertion serialized without its
    /// signature element (the enveloped-signature transform).
    fn unsigned_xml(&self) -> SamlResult<String> {
        self.serialize(false)
    }

    fn serialize(&self, include_signature: bool) -> SamlResult<String> {
        let mut writer = Writer::new(Vec::new());

        let mut start = BytesStart::new("saml:Assertion");
        start.push_attribute(("xmlns:saml", SAML_NS));
        start.push_attribute(("ID", self.id.as_str()));
        start.push_attribute(("Version", self.version.as_str()));
        start.push_attribute((
            "IssueInstant",
            xml::format_instant(self.issue_instant).as_str(),
        ));
        writer.write_event(Event::Start(start))?;

        self.issuer.write_xml(&mut writer)?;
        if include_signature {
            if let Some(ref signature) = self.signature {
                signature.write_xml(&mut writer)?;
            }
        }
        if let Some(ref subject) = self.subject {
            subject.write_xml(&mut writer)?;
        }
        if let Some(ref conditions) = self.conditions {
            conditions.write_xml(&mut writer)?;
        }
        for statement in &self.statements {
            statement.write_xml(&mut writer)?;
        }

        writer.write_event(Event::End(BytesEnd::new("saml:Assertion")))?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| SamlError::XmlWrite(format!("serialized assertion is not UTF-8: {e}")))
    }
}

fn generate_id() -> String {
    format!("_id{}", uuid::Uuid::new_v4())
}
