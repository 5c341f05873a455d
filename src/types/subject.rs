//! SAML Subject and subject confirmation elements.
//!
//! The subject identifies the principal the assertion's statements are
//! about; subject confirmations describe how a relying party may confirm
//! that the presenting party is that principal.

use std::io::Write;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use roxmltree::Node;
use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};
use crate::types::constants::SAML_NS;
use crate::types::name_id::NameId;
use crate::xml;

/// Subject of an assertion.
///
/// Carries at least one of a name identifier or a subject confirmation;
/// construction and parsing both reject an empty subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// The name identifier for the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id: Option<NameId>,

    /// Proposed methods of confirming the subject, in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confirmations: Vec<SubjectConfirmation>,
}

impl Subject {
    /// Creates a new subject identified by a name ID.
    #[must_use]
    pub fn new(name_id: NameId) -> Self {
        Self {
            name_id: Some(name_id),
            confirmations: Vec::new(),
        }
    }

    /// Creates a subject carrying only a confirmation, with no name ID.
    #[must_use]
    pub fn from_confirmation(confirmation: SubjectConfirmation) -> Self {
        Self {
            name_id: None,
            confirmations: vec![confirmation],
        }
    }

    /// Adds a subject confirmation.
    #[must_use]
    pub fn with_confirmation(mut self, confirmation: SubjectConfirmation) -> Self {
        self.confirmations.push(confirmation);
        self
    }

    /// Parses an `<saml:Subject>` element node.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        xml::expect_element(node, SAML_NS, "Subject")?;

        let name_id = xml::optional_child(node, SAML_NS, "NameID")?
            .map(NameId::from_xml)
            .transpose()?;

        let confirmations = xml::child_elements(node, SAML_NS, "SubjectConfirmation")
            .into_iter()
            .map(SubjectConfirmation::from_xml)
            .collect::<SamlResult<Vec<_>>>()?;

        if name_id.is_none() && confirmations.is_empty() {
            return Err(SamlError::InvalidAssertion(
                "Subject must carry a NameID or at least one SubjectConfirmation".to_string(),
            ));
        }

        Ok(Self {
            name_id,
            confirmations,
        })
    }

    /// Writes this element into `writer` in schema order.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        writer.write_event(Event::Start(BytesStart::new("saml:Subject")))?;
        if let Some(ref name_id) = self.name_id {
            name_id.write_xml(writer)?;
        }
        for confirmation in &self.confirmations {
            confirmation.write_xml(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new("saml:Subject")))?;
        Ok(())
    }
}

/// Subject confirmation.
///
/// A proposed method of confirming the subject, identified by a method URI
/// and optionally constrained by [`SubjectConfirmationData`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectConfirmation {
    /// The confirmation method URI.
    pub method: String,

    /// Constraints on the confirmation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SubjectConfirmationData>,
}

impl SubjectConfirmation {
    /// Bearer confirmation method URI.
    pub const BEARER: &'static str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";

    /// Holder of key confirmation method URI.
    pub const HOLDER_OF_KEY: &'static str = "urn:oasis:names:tc:SAML:2.0:cm:holder-of-key";

    /// Sender vouches confirmation method URI.
    pub const SENDER_VOUCHES: &'static str = "urn:oasis:names:tc:SAML:2.0:cm:sender-vouches";

    /// Creates a confirmation with the given method URI.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            data: None,
        }
    }

    /// Creates a bearer confirmation.
    #[must_use]
    pub fn bearer() -> Self {
        Self::new(Self::BEARER)
    }

    /// Sets the confirmation data.
    #[must_use]
    pub fn with_data(mut self, data: SubjectConfirmationData) -> Self {
        self.data = Some(data);
        self
    }

    /// Parses an `<saml:SubjectConfirmation>` element node.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        xml::expect_element(node, SAML_NS, "SubjectConfirmation")?;
        let method = xml::required_attribute(node, "Method")?.to_string();
        let data = xml::optional_child(node, SAML_NS, "SubjectConfirmationData")?
            .map(SubjectConfirmationData::from_xml)
            .transpose()?;
        Ok(Self { method, data })
    }

    /// Writes this element into `writer` in schema order.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        let mut start = BytesStart::new("saml:SubjectConfirmation");
        start.push_attribute(("Method", self.method.as_str()));
        match self.data {
            Some(ref data) => {
                writer.write_event(Event::Start(start))?;
                data.write_xml(writer)?;
                writer.write_event(Event::End(BytesEnd::new("saml:SubjectConfirmation")))?;
            }
            None => writer.write_event(Event::Empty(start))?,
        }
        Ok(())
    }
}

/// Subject confirmation data.
///
/// Every field is optional; absence means that aspect of the confirmation
/// is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectConfirmationData {
    /// Time before which the subject cannot be confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// Time at or after which the subject can no longer be confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// The location to which the assertion must be delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,

    /// The request ID that this assertion responds to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// Network address from which the subject must present the assertion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl SubjectConfirmationData {
    /// Creates confirmation data with no constraints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the recipient URL.
    #[must_use]
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Sets the request ID this confirmation responds to.
    #[must_use]
    pub fn with_in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    /// Sets the confirmation validity window.
    #[must_use]
    pub fn with_window(
        mut self,
        not_before: Option<DateTime<Utc>>,
        not_on_or_after: Option<DateTime<Utc>>,
    ) -> Self {
        self.not_before = not_before;
        self.not_on_or_after = not_on_or_after;
        self
    }

    /// Sets the subject address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Parses an `<saml:SubjectConfirmationData>` element node.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        xml::expect_element(node, SAML_NS, "SubjectConfirmationData")?;
        Ok(Self {
            not_before: xml::optional_instant_attribute(node, "NotBefore")?,
            not_on_or_after: xml::optional_instant_attribute(node, "NotOnOrAfter")?,
            recipient: node.attribute("Recipient").map(String::from),
            in_response_to: node.attribute("InResponseTo").map(String::from),
            address: node.attribute("Address").map(String::from),
        })
    }

    /// Writes this element into `writer` in schema order.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        let mut start = BytesStart::new("saml:SubjectConfirmationData");
        if let Some(not_before) = self.not_before {
            start.push_attribute(("NotBefore", xml::format_instant(not_before).as_str()));
        }
        if let Some(not_on_or_after) = self.not_on_or_after {
            start.push_attribute(("NotOnOrAfter", xml::format_instant(not_on_or_after).as_str()));
        }
        if let Some(ref recipient) = self.recipient {
            start.push_attribute(("Recipient", recipient.as_str()));
        }
        if let Some(ref in_response_to) = self.in_response_to {
            start.push_attribute(("InResponseTo", in_response_to.as_str()));
        }
        if let Some(ref address) = self.address {
            start.push_attribute(("Address", address.as_str()));
        }
        writer.write_event(Event::Empty(start))?;
        Ok(())
    }
}
