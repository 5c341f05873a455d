//! Namespace-aware XML helpers.
//!
//! Every composite SAML element is parsed with the same algorithm: scan the
//! direct element children, filter by qualified name, keep document order,
//! then assert the schema cardinality for that field. The helpers here
//! implement that selection once; the element types in [`crate::types`]
//! apply it per field. Unknown interleaved elements are tolerated; known
//! elements above their permitted count are not.

use chrono::{DateTime, NaiveDateTime, Utc};
use roxmltree::Node;

use crate::error::{SamlError, SamlResult};

/// Verifies that a node's local name and namespace URI match the expected
/// qualified name, failing with [`SamlError::InvalidElement`] otherwise.
pub fn expect_element(node: Node<'_, '_>, ns: &str, local: &str) -> SamlResult<()> {
    let tag = node.tag_name();
    if node.is_element() && tag.name() == local && tag.namespace() == Some(ns) {
        return Ok(());
    }
    Err(SamlError::InvalidElement {
        expected: format!("{{{ns}}}{local}"),
        actual: format!(
            "{{{}}}{}",
            tag.namespace().unwrap_or_default(),
            tag.name()
        ),
    })
}

/// Returns the direct element children matching the qualified name, in
/// document order.
pub fn child_elements<'a, 'input>(
    node: Node<'a, 'input>,
    ns: &str,
    local: &str,
) -> Vec<Node<'a, 'input>> {
    node.children()
        .filter(|c| {
            c.is_element() && c.tag_name().name() == local && c.tag_name().namespace() == Some(ns)
        })
        .collect()
}

/// Selects exactly one child element, failing with
/// [`SamlError::MissingElement`] when absent and
/// [`SamlError::TooManyElements`] when duplicated.
pub fn required_child<'a, 'input>(
    node: Node<'a, 'input>,
    ns: &str,
    local: &str,
) -> SamlResult<Node<'a, 'input>> {
    let matches = child_elements(node, ns, local);
    match matches.len() {
        0 => Err(SamlError::MissingElement(local.to_string())),
        1 => Ok(matches[0]),
        _ => Err(SamlError::TooManyElements {
            element: local.to_string(),
            limit: 1,
        }),
    }
}

/// Selects at most one child element, failing with
/// [`SamlError::TooManyElements`] when duplicated.
pub fn optional_child<'a, 'input>(
    node: Node<'a, 'input>,
    ns: &str,
    local: &str,
) -> SamlResult<Option<Node<'a, 'input>>> {
    let matches = child_elements(node, ns, local);
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches[0])),
        _ => Err(SamlError::TooManyElements {
            element: local.to_string(),
            limit: 1,
        }),
    }
}

/// Reads a required attribute, failing with [`SamlError::MissingAttribute`]
/// when absent.
pub fn required_attribute<'a>(node: Node<'a, '_>, name: &str) -> SamlResult<&'a str> {
    node.attribute(name).ok_or_else(|| SamlError::MissingAttribute {
        element: node.tag_name().name().to_string(),
        attribute: name.to_string(),
    })
}

/// Returns the element's text content with surrounding whitespace trimmed,
/// or an empty string for an empty element.
pub fn text_content(node: Node<'_, '_>) -> String {
    node.text().map(str::trim).unwrap_or_default().to_string()
}

/// Parses an `xs:dateTime` value into a UTC instant.
///
/// The wire format is `YYYY-MM-DDThh:mm:ssZ`; fractional seconds and
/// explicit offsets produced by other stacks are tolerated on input.
pub fn parse_instant(value: &str) -> SamlResult<DateTime<Utc>> {
    let value = value.trim();
    for format in ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S%.fZ"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| SamlError::InvalidTimestamp(value.to_string()))
}

/// Formats a UTC instant as an `xs:dateTime` string with a `Z` suffix.
///
/// Conversion is exact and lossless at one-second resolution:
/// `parse_instant(&format_instant(t)) == t` for any whole-second `t`.
#[must_use]
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Reads an optional `xs:dateTime` attribute.
pub fn optional_instant_attribute(
    node: Node<'_, '_>,
    name: &str,
) -> SamlResult<Option<DateTime<Utc>>> {
    node.attribute(name).map(parse_instant).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> roxmltree::Document<'_> {
        roxmltree::Document::parse(xml).unwrap()
    }

    const NS: &str = "urn:example";

    #[test]
    fn child_selection_preserves_document_order() {
        let doc = parse(
            r#"<root xmlns="urn:example">
                <item>a</item>
                <other/>
                <item>b</item>
            </root>"#,
        );
        let items = child_elements(doc.root_element(), NS, "item");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text(), Some("a"));
        assert_eq!(items[1].text(), Some("b"));
    }

    #[test]
    fn child_selection_ignores_foreign_namespace() {
        let doc = parse(
            r#"<root xmlns="urn:example" xmlns:f="urn:foreign">
                <f:item/>
                <item/>
            </root>"#,
        );
        assert_eq!(child_elements(doc.root_element(), NS, "item").len(), 1);
    }

    #[test]
    fn required_child_cardinality() {
        let doc = parse(r#"<root xmlns="urn:example"><a/><a/></root>"#);
        let err = required_child(doc.root_element(), NS, "a").unwrap_err();
        assert!(matches!(err, SamlError::TooManyElements { limit: 1, .. }));

        let err = required_child(doc.root_element(), NS, "b").unwrap_err();
        assert!(matches!(err, SamlError::MissingElement(_)));
    }

    #[test]
    fn expect_element_checks_namespace() {
        let doc = parse(r#"<a xmlns="urn:other"/>"#);
        let err = expect_element(doc.root_element(), NS, "a").unwrap_err();
        assert!(matches!(err, SamlError::InvalidElement { .. }));
    }

    #[test]
    fn instant_round_trip_is_lossless() {
        let formatted = "2020-03-23T23:37:24Z";
        let instant = parse_instant(formatted).unwrap();
        assert_eq!(format_instant(instant), formatted);
    }

    #[test]
    fn instant_tolerates_fractional_seconds_and_offsets() {
        let a = parse_instant("2020-03-23T23:37:24.123Z").unwrap();
        assert_eq!(format_instant(a), "2020-03-23T23:37:24Z");

        let b = parse_instant("2020-03-24T01:37:24+02:00").unwrap();
        assert_eq!(format_instant(b), "2020-03-23T23:37:24Z");
    }

    #[test]
    fn invalid_instant_is_rejected() {
        assert!(matches!(
            parse_instant("not-a-date"),
            Err(SamlError::InvalidTimestamp(_))
        ));
    }
}
