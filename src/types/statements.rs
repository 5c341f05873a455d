//! SAML statement elements.
//!
//! An assertion carries an ordered, mixed list of statements. The
//! [`Statement`] enum preserves that order while keeping each kind typed;
//! parsing selects the matching variant per child element.

use std::collections::HashMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::Node;
use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};
use crate::types::constants::{attribute_name_formats, AuthnContextClass, SAML_NS};
use crate::xml;

/// A statement carried by an assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Evidence that the subject authenticated.
    Authn(AuthnStatement),
    /// Attribute assertions about the subject.
    Attribute(AttributeStatement),
}

impl Statement {
    /// Returns true when the node's qualified name matches a known
    /// statement element.
    pub(crate) fn matches(node: Node<'_, '_>) -> bool {
        node.is_element()
            && node.tag_name().namespace() == Some(SAML_NS)
            && matches!(node.tag_name().name(), "AuthnStatement" | "AttributeStatement")
    }

    /// Parses a statement element node, selecting the variant by qualified
    /// name.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        match node.tag_name().name() {
            "AuthnStatement" => AuthnStatement::from_xml(node).map(Self::Authn),
            "AttributeStatement" => AttributeStatement::from_xml(node).map(Self::Attribute),
            other => Err(SamlError::InvalidElement {
                expected: format!("{{{SAML_NS}}}AuthnStatement or AttributeStatement"),
                actual: format!(
                    "{{{}}}{}",
                    node.tag_name().namespace().unwrap_or_default(),
                    other
                ),
            }),
        }
    }

    /// Writes this statement into `writer`.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        match self {
            Self::Authn(statement) => statement.write_xml(writer),
            Self::Attribute(statement) => statement.write_xml(writer),
        }
    }
}

/// Authentication statement.
///
/// Describes the act of authentication performed by the subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthnStatement {
    /// The time of authentication.
    pub authn_instant: DateTime<Utc>,

    /// The session index (for session management).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_index: Option<String>,

    /// Time at which the session ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_not_on_or_after: Option<DateTime<Utc>>,

    /// The subject locality information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_locality: Option<SubjectLocality>,

    /// The authentication context. Exactly one per statement.
    pub authn_context: AuthnContext,
}

impl AuthnStatement {
    /// Creates a new authentication statement.
    #[must_use]
    pub fn new(authn_instant: DateTime<Utc>, context_class: AuthnContextClass) -> Self {
        Self {
            authn_instant,
            session_index: None,
            session_not_on_or_after: None,
            subject_locality: None,
            authn_context: AuthnContext::class_ref(context_class),
        }
    }

    /// Sets the session index.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_index = Some(index.into());
        self
    }

    /// Sets the session expiry.
    #[must_use]
    pub fn with_session_not_on_or_after(mut self, instant: DateTime<Utc>) -> Self {
        self.session_not_on_or_after = Some(instant);
        self
    }

    /// Sets the subject locality.
    #[must_use]
    pub fn with_locality(mut self, locality: SubjectLocality) -> Self {
        self.subject_locality = Some(locality);
        self
    }

    /// Parses an `<saml:AuthnStatement>` element node.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        xml::expect_element(node, SAML_NS, "AuthnStatement")?;

        let authn_instant = xml::parse_instant(xml::required_attribute(node, "AuthnInstant")?)?;
        let session_index = node.attribute("SessionIndex").map(String::from);
        let session_not_on_or_after =
            xml::optional_instant_attribute(node, "SessionNotOnOrAfter")?;

        let subject_locality = xml::optional_child(node, SAML_NS, "SubjectLocality")?
            .map(SubjectLocality::from_xml)
            .transpose()?;

        let authn_context =
            AuthnContext::from_xml(xml::required_child(node, SAML_NS, "AuthnContext")?)?;

        Ok(Self {
            authn_instant,
            session_index,
            session_not_on_or_after,
            subject_locality,
            authn_context,
        })
    }

    /// Writes this element into `writer` in schema order.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        let mut start = BytesStart::new("saml:AuthnStatement");
        start.push_attribute((
            "AuthnInstant",
            xml::format_instant(self.authn_instant).as_str(),
        ));
        if let Some(ref index) = self.session_index {
            start.push_attribute(("SessionIndex", index.as_str()));
        }
        if let Some(expiry) = self.session_not_on_or_after {
            start.push_attribute(("SessionNotOnOrAfter", xml::format_instant(expiry).as_str()));
        }
        writer.write_event(Event::Start(start))?;
        if let Some(ref locality) = self.subject_locality {
            locality.write_xml(writer)?;
        }
        self.authn_context.write_xml(writer)?;
        writer.write_event(Event::End(BytesEnd::new("saml:AuthnStatement")))?;
        Ok(())
    }
}

/// Authentication context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthnContext {
    /// Authentication context class reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_ref: Option<String>,

    /// Authentication context declaration reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decl_ref: Option<String>,

    /// Authenticating authorities.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authenticating_authorities: Vec<String>,
}

impl AuthnContext {
    /// Creates an authentication context with a class reference.
    #[must_use]
    pub fn class_ref(class: AuthnContextClass) -> Self {
        Self {
            class_ref: Some(class.uri().to_string()),
            decl_ref: None,
            authenticating_authorities: Vec::new(),
        }
    }

    /// Returns the parsed context class, if the reference is a known URI.
    #[must_use]
    pub fn parsed_class(&self) -> Option<AuthnContextClass> {
        self.class_ref.as_deref().and_then(AuthnContextClass::from_uri)
    }

    /// Parses an `<saml:AuthnContext>` element node.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        xml::expect_element(node, SAML_NS, "AuthnContext")?;
        Ok(Self {
            class_ref: xml::optional_child(node, SAML_NS, "AuthnContextClassRef")?
                .map(xml::text_content),
            decl_ref: xml::optional_child(node, SAML_NS, "AuthnContextDeclRef")?
                .map(xml::text_content),
            authenticating_authorities: xml::child_elements(
                node,
                SAML_NS,
                "AuthenticatingAuthority",
            )
            .into_iter()
            .map(xml::text_content)
            .collect(),
        })
    }

    /// Writes this element into `writer` in schema order.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        writer.write_event(Event::Start(BytesStart::new("saml:AuthnContext")))?;
        if let Some(ref class_ref) = self.class_ref {
            write_text_element(writer, "saml:AuthnContextClassRef", class_ref)?;
        }
        if let Some(ref decl_ref) = self.decl_ref {
            write_text_element(writer, "saml:AuthnContextDeclRef", decl_ref)?;
        }
        for authority in &self.authenticating_authorities {
            write_text_element(writer, "saml:AuthenticatingAuthority", authority)?;
        }
        writer.write_event(Event::End(BytesEnd::new("saml:AuthnContext")))?;
        Ok(())
    }
}

/// Subject locality information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectLocality {
    /// IP address of the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// DNS name of the system from which the subject authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
}

impl SubjectLocality {
    /// Creates a locality with the given address.
    #[must_use]
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            dns_name: None,
        }
    }

    /// Parses an `<saml:SubjectLocality>` element node.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        xml::expect_element(node, SAML_NS, "SubjectLocality")?;
        Ok(Self {
            address: node.attribute("Address").map(String::from),
            dns_name: node.attribute("DNSName").map(String::from),
        })
    }

    /// Writes this element into `writer`.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        let mut start = BytesStart::new("saml:SubjectLocality");
        if let Some(ref address) = self.address {
            start.push_attribute(("Address", address.as_str()));
        }
        if let Some(ref dns_name) = self.dns_name {
            start.push_attribute(("DNSName", dns_name.as_str()));
        }
        writer.write_event(Event::Empty(start))?;
        Ok(())
    }
}

/// Attribute statement.
///
/// Contains attributes about the subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeStatement {
    /// The attributes, in document order.
    pub attributes: Vec<Attribute>,
}

impl AttributeStatement {
    /// Creates a new empty attribute statement.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Creates an attribute statement from a map of names to values.
    #[must_use]
    pub fn from_map(attributes: HashMap<String, Vec<String>>) -> Self {
        let attributes = attributes
            .into_iter()
            .map(|(name, values)| Attribute {
                name,
                name_format: None,
                friendly_name: None,
                values,
            })
            .collect();
        Self { attributes }
    }

    /// Parses an `<saml:AttributeStatement>` element node.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        xml::expect_element(node, SAML_NS, "AttributeStatement")?;
        let attributes = xml::child_elements(node, SAML_NS, "Attribute")
            .into_iter()
            .map(Attribute::from_xml)
            .collect::<SamlResult<Vec<_>>>()?;
        Ok(Self { attributes })
    }

    /// Writes this element into `writer`.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        writer.write_event(Event::Start(BytesStart::new("saml:AttributeStatement")))?;
        for attribute in &self.attributes {
            attribute.write_xml(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new("saml:AttributeStatement")))?;
        Ok(())
    }
}

/// SAML Attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// The attribute name (typically a URI).
    pub name: String,

    /// The format of the attribute name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_format: Option<String>,

    /// A human-readable name for the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// The attribute values, in document order.
    pub values: Vec<String>,
}

impl Attribute {
    /// Creates a new attribute with a single value.
    #[must_use]
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            name_format: None,
            friendly_name: None,
            values: vec![value.into()],
        }
    }

    /// Creates a new attribute with multiple values.
    #[must_use]
    pub fn multi(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            name_format: None,
            friendly_name: None,
            values,
        }
    }

    /// Sets the friendly name.
    #[must_use]
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    /// Sets the basic name format.
    #[must_use]
    pub fn basic_format(mut self) -> Self {
        self.name_format = Some(attribute_name_formats::BASIC.to_string());
        self
    }

    /// Sets the name format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.name_format = Some(format.into());
        self
    }

    /// Parses an `<saml:Attribute>` element node.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        xml::expect_element(node, SAML_NS, "Attribute")?;
        Ok(Self {
            name: xml::required_attribute(node, "Name")?.to_string(),
            name_format: node.attribute("NameFormat").map(String::from),
            friendly_name: node.attribute("FriendlyName").map(String::from),
            values: xml::child_elements(node, SAML_NS, "AttributeValue")
                .into_iter()
                .map(xml::text_content)
                .collect(),
        })
    }

    /// Writes this element into `writer`.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        let mut start = BytesStart::new("saml:Attribute");
        start.push_attribute(("Name", self.name.as_str()));
        if let Some(ref format) = self.name_format {
            start.push_attribute(("NameFormat", format.as_str()));
        }
        if let Some(ref friendly) = self.friendly_name {
            start.push_attribute(("FriendlyName", friendly.as_str()));
        }
        writer.write_event(Event::Start(start))?;
        for value in &self.values {
            write_text_element(writer, "saml:AttributeValue", value)?;
        }
        writer.write_event(Event::End(BytesEnd::new("saml:Attribute")))?;
        Ok(())
    }
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> SamlResult<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHN_STATEMENT: &str = r#"<saml:AuthnStatement
        xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
        AuthnInstant="2020-03-23T23:37:24Z" SessionIndex="_session1">
        <saml:SubjectLocality Address="192.0.2.1"/>
        <saml:AuthnContext>
            <saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport</saml:AuthnContextClassRef>
        </saml:AuthnContext>
    </saml:AuthnStatement>"#;

    #[test]
    fn parse_authn_statement() {
        let doc = roxmltree::Document::parse(AUTHN_STATEMENT).unwrap();
        let statement = AuthnStatement::from_xml(doc.root_element()).unwrap();
        assert_eq!(statement.session_index.as_deref(), Some("_session1"));
        assert_eq!(
            statement.authn_context.parsed_class(),
            Some(AuthnContextClass::PasswordProtectedTransport)
        );
        assert_eq!(
            statement.subject_locality.as_ref().and_then(|l| l.address.as_deref()),
            Some("192.0.2.1")
        );
    }

    #[test]
    fn authn_statement_requires_instant_and_context() {
        let doc = roxmltree::Document::parse(
            r#"<saml:AuthnStatement xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
                AuthnInstant="2020-03-23T23:37:24Z"/>"#,
        )
        .unwrap();
        assert!(matches!(
            AuthnStatement::from_xml(doc.root_element()),
            Err(SamlError::MissingElement(_))
        ));

        let doc = roxmltree::Document::parse(
            r#"<saml:AuthnStatement xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">
                <saml:AuthnContext/>
            </saml:AuthnStatement>"#,
        )
        .unwrap();
        assert!(matches!(
            AuthnStatement::from_xml(doc.root_element()),
            Err(SamlError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn duplicate_authn_context_is_rejected() {
        let doc = roxmltree::Document::parse(
            r#"<saml:AuthnStatement xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
                AuthnInstant="2020-03-23T23:37:24Z">
                <saml:AuthnContext/>
                <saml:AuthnContext/>
            </saml:AuthnStatement>"#,
        )
        .unwrap();
        assert!(matches!(
            AuthnStatement::from_xml(doc.root_element()),
            Err(SamlError::TooManyElements { .. })
        ));
    }

    #[test]
    fn parse_attribute_statement_preserves_value_order() {
        let doc = roxmltree::Document::parse(
            r#"<saml:AttributeStatement xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">
                <saml:Attribute Name="roles" FriendlyName="Roles">
                    <saml:AttributeValue>admin</saml:AttributeValue>
                    <saml:AttributeValue>user</saml:AttributeValue>
                </saml:Attribute>
            </saml:AttributeStatement>"#,
        )
        .unwrap();
        let statement = AttributeStatement::from_xml(doc.root_element()).unwrap();
        assert_eq!(statement.attributes.len(), 1);
        assert_eq!(statement.attributes[0].values, ["admin", "user"]);
        assert_eq!(statement.attributes[0].friendly_name.as_deref(), Some("Roles"));
    }

    #[test]
    fn attribute_requires_name() {
        let doc = roxmltree::Document::parse(
            r#"<saml:Attribute xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"/>"#,
        )
        .unwrap();
        assert!(matches!(
            Attribute::from_xml(doc.root_element()),
            Err(SamlError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn statement_dispatch_selects_variant() {
        let doc = roxmltree::Document::parse(AUTHN_STATEMENT).unwrap();
        let statement = Statement::from_xml(doc.root_element()).unwrap();
        assert!(matches!(statement, Statement::Authn(_)));
    }
}
