//! SAML Name ID element.
//!
//! Name identifiers are used to identify subjects in SAML assertions.

use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::Node;
use serde::{Deserialize, Serialize};

use crate::error::SamlResult;
use crate::types::constants::{NameIdFormat, SAML_NS};
use crate::xml;

/// SAML Name ID.
///
/// Represents the identifier of a subject in a SAML assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    /// The actual identifier value.
    pub value: String,

    /// The format of the name identifier. Absence means unspecified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// The security or administrative domain that qualifies the name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,

    /// The service provider's entity ID that qualifies the name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,

    /// A provider identifier for the SP that was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_provided_id: Option<String>,
}

impl NameId {
    /// Creates a new name ID with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
            name_qualifier: None,
            sp_name_qualifier: None,
            sp_provided_id: None,
        }
    }

    /// Creates a new email name ID.
    #[must_use]
    pub fn email(email: impl Into<String>) -> Self {
        Self::new(email).with_format(NameIdFormat::Email)
    }

    /// Creates a new persistent name ID.
    #[must_use]
    pub fn persistent(value: impl Into<String>) -> Self {
        Self::new(value).with_format(NameIdFormat::Persistent)
    }

    /// Creates a new transient name ID.
    #[must_use]
    pub fn transient(value: impl Into<String>) -> Self {
        Self::new(value).with_format(NameIdFormat::Transient)
    }

    /// Sets the format for this name ID.
    #[must_use]
    pub fn with_format(mut self, format: NameIdFormat) -> Self {
        self.format = Some(format.uri().to_string());
        self
    }

    /// Sets the name qualifier.
    #[must_use]
    pub fn with_name_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.name_qualifier = Some(qualifier.into());
        self
    }

    /// Sets the SP name qualifier.
    #[must_use]
    pub fn with_sp_name_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.sp_name_qualifier = Some(qualifier.into());
        self
    }

    /// Returns the parsed name ID format, defaulting to unspecified.
    #[must_use]
    pub fn parsed_format(&self) -> NameIdFormat {
        self.format
            .as_deref()
            .and_then(NameIdFormat::from_uri)
            .unwrap_or_default()
    }

    /// Parses an `<saml:NameID>` element node.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        xml::expect_element(node, SAML_NS, "NameID")?;
        Ok(Self {
            value: xml::text_content(node),
            format: node.attribute("Format").map(String::from),
            name_qualifier: node.attribute("NameQualifier").map(String::from),
            sp_name_qualifier: node.attribute("SPNameQualifier").map(String::from),
            sp_provided_id: node.attribute("SPProvidedID").map(String::from),
        })
    }

    /// Writes this element into `writer` in schema order.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        let mut start = BytesStart::new("saml:NameID");
        if let Some(ref format) = self.format {
            start.push_attribute(("Format", format.as_str()));
        }
        if let Some(ref qualifier) = self.name_qualifier {
            start.push_attribute(("NameQualifier", qualifier.as_str()));
        }
        if let Some(ref qualifier) = self.sp_name_qualifier {
            start.push_attribute(("SPNameQualifier", qualifier.as_str()));
        }
        if let Some(ref id) = self.sp_provided_id {
            start.push_attribute(("SPProvidedID", id.as_str()));
        }
        writer.write_event(Event::Start(start))?;
        writer.write_event(Event::Text(BytesText::new(&self.value)))?;
        writer.write_event(Event::End(BytesEnd::new("saml:NameID")))?;
        Ok(())
    }
}
