//! SAML Issuer element.

use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::Node;
use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};
use crate::types::constants::SAML_NS;
use crate::xml;

/// Identity of the assertion's issuing authority.
///
/// The value is usually the issuing identity provider's entity ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    /// The issuer identifier. Never empty.
    pub value: String,

    /// The format of the issuer identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Issuer {
    /// Creates a new issuer.
    ///
    /// Fails with [`SamlError::InvalidAssertion`] when the value is empty.
    pub fn new(value: impl Into<String>) -> SamlResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(SamlError::InvalidAssertion(
                "Issuer value must not be empty".to_string(),
            ));
        }
        Ok(Self {
            value,
            format: None,
        })
    }

    /// Sets the format of the issuer identifier.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Parses an `<saml:Issuer>` element node.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        xml::expect_element(node, SAML_NS, "Issuer")?;
        let mut issuer = Self::new(xml::text_content(node))?;
        issuer.format = node.attribute("Format").map(String::from);
        Ok(issuer)
    }

    /// Writes this element into `writer` in schema order.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        let mut start = BytesStart::new("saml:Issuer");
        if let Some(ref format) = self.format {
            start.push_attribute(("Format", format.as_str()));
        }
        writer.write_event(Event::Start(start))?;
        writer.write_event(Event::Text(BytesText::new(&self.value)))?;
        writer.write_event(Event::End(BytesEnd::new("saml:Issuer")))?;
        Ok(())
    }
}
