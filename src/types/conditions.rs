//! SAML Conditions and audience restriction elements.

use std::io::Write;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::Node;
use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};
use crate::types::constants::SAML_NS;
use crate::xml;

/// Temporal and consumer constraints on assertion validity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    /// Time before which the assertion is not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// Time at or after which the assertion is not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Audience restrictions, in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audience_restrictions: Vec<AudienceRestriction>,

    /// One-time use condition.
    #[serde(default)]
    pub one_time_use: bool,
}

impl Conditions {
    /// Creates conditions with no constraints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates conditions with the given validity window.
    ///
    /// Fails with [`SamlError::InvalidAssertion`] when `not_before` is after
    /// `not_on_or_after`.
    pub fn with_window(
        not_before: Option<DateTime<Utc>>,
        not_on_or_after: Option<DateTime<Utc>>,
    ) -> SamlResult<Self> {
        check_window(not_before, not_on_or_after)?;
        Ok(Self {
            not_before,
            not_on_or_after,
            ..Self::default()
        })
    }

    /// Adds an audience restriction with a single audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience_restrictions.push(AudienceRestriction {
            audiences: vec![audience.into()],
        });
        self
    }

    /// Adds an audience restriction.
    #[must_use]
    pub fn with_audience_restriction(mut self, restriction: AudienceRestriction) -> Self {
        self.audience_restrictions.push(restriction);
        self
    }

    /// Sets the one-time use flag.
    #[must_use]
    pub fn one_time_use(mut self) -> Self {
        self.one_time_use = true;
        self
    }

    /// Returns the union of all restricted audience URIs across all
    /// restrictions, in document order.
    pub fn restricted_audiences(&self) -> impl Iterator<Item = &str> {
        self.audience_restrictions
            .iter()
            .flat_map(|r| r.audiences.iter().map(String::as_str))
    }

    /// Parses an `<saml:Conditions>` element node.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        xml::expect_element(node, SAML_NS, "Conditions")?;

        let not_before = xml::optional_instant_attribute(node, "NotBefore")?;
        let not_on_or_after = xml::optional_instant_attribute(node, "NotOnOrAfter")?;
        check_window(not_before, not_on_or_after)?;

        let audience_restrictions = xml::child_elements(node, SAML_NS, "AudienceRestriction")
            .into_iter()
            .map(AudienceRestriction::from_xml)
            .collect::<SamlResult<Vec<_>>>()?;

        let one_time_use = xml::optional_child(node, SAML_NS, "OneTimeUse")?.is_some();

        Ok(Self {
            not_before,
            not_on_or_after,
            audience_restrictions,
            one_time_use,
        })
    }

    /// Writes this element into `writer` in schema order.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        let mut start = BytesStart::new("saml:Conditions");
        if let Some(not_before) = self.not_before {
            start.push_attribute(("NotBefore", xml::format_instant(not_before).as_str()));
        }
        if let Some(not_on_or_after) = self.not_on_or_after {
            start.push_attribute(("NotOnOrAfter", xml::format_instant(not_on_or_after).as_str()));
        }

        if self.audience_restrictions.is_empty() && !self.one_time_use {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for restriction in &self.audience_restrictions {
            restriction.write_xml(writer)?;
        }
        if self.one_time_use {
            writer.write_event(Event::Empty(BytesStart::new("saml:OneTimeUse")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("saml:Conditions")))?;
        Ok(())
    }
}

fn check_window(
    not_before: Option<DateTime<Utc>>,
    not_on_or_after: Option<DateTime<Utc>>,
) -> SamlResult<()> {
    if let (Some(nb), Some(noa)) = (not_before, not_on_or_after) {
        if nb > noa {
            return Err(SamlError::InvalidAssertion(format!(
                "Conditions NotBefore {} is after NotOnOrAfter {}",
                xml::format_instant(nb),
                xml::format_instant(noa)
            )));
        }
    }
    Ok(())
}

/// A set of intended-audience identifiers.
///
/// An assertion carrying a restriction may only be accepted by a service
/// provider whose entity ID appears in one of the restriction's audiences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceRestriction {
    /// The audience URIs. Never empty.
    pub audiences: Vec<String>,
}

impl AudienceRestriction {
    /// Creates a restriction from the given audiences.
    ///
    /// Fails with [`SamlError::InvalidAssertion`] when the set is empty.
    pub fn new(audiences: Vec<String>) -> SamlResult<Self> {
        if audiences.is_empty() {
            return Err(SamlError::InvalidAssertion(
                "AudienceRestriction must carry at least one Audience".to_string(),
            ));
        }
        Ok(Self { audiences })
    }

    /// Parses an `<saml:AudienceRestriction>` element node.
    pub fn from_xml(node: Node<'_, '_>) -> SamlResult<Self> {
        xml::expect_element(node, SAML_NS, "AudienceRestriction")?;
        let audiences: Vec<String> = xml::child_elements(node, SAML_NS, "Audience")
            .into_iter()
            .map(xml::text_content)
            .collect();
        if audiences.is_empty() {
            return Err(SamlError::MissingElement("Audience".to_string()));
        }
        Ok(Self { audiences })
    }

    /// Writes this element into `writer` in schema order.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        writer.write_event(Event::Start(BytesStart::new("saml:AudienceRestriction")))?;
        for audience in &self.audiences {
            writer.write_event(Event::Start(BytesStart::new("saml:Audience")))?;
            writer.write_event(Event::Text(BytesText::new(audience)))?;
            writer.write_event(Event::End(BytesEnd::new("saml:Audience")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("saml:AudienceRestriction")))?;
        Ok(())
    }
}
