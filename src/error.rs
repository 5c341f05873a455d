//! SAML error types.
//!
//! Structural and invariant errors abort parsing or construction and surface
//! through these types. Soft trust violations never appear here; they are
//! accumulated in [`crate::validation::ValidationResult`] instead.

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML assertion errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// XML parsing error from the underlying document parser.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// XML serialization error.
    #[error("XML write error: {0}")]
    XmlWrite(String),

    /// An element's qualified name did not match the expected type.
    #[error("invalid element: expected {expected}, got {actual}")]
    InvalidElement {
        /// The expected qualified name.
        expected: String,
        /// The qualified name actually present.
        actual: String,
    },

    /// A required child element or attribute is absent.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// More than the permitted count of a child element is present.
    #[error("too many {element} elements: at most {limit} permitted")]
    TooManyElements {
        /// The offending child element name.
        element: String,
        /// The schema cardinality limit.
        limit: usize,
    },

    /// A required attribute is absent.
    #[error("missing required attribute {attribute} on {element}")]
    MissingAttribute {
        /// The element carrying the attribute.
        element: String,
        /// The absent attribute name.
        attribute: String,
    },

    /// An `xs:dateTime` value could not be parsed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// An assertion or sub-element violates a construction invariant.
    #[error("invalid assertion: {0}")]
    InvalidAssertion(String),

    /// A validator was invoked against data its caller should have
    /// guaranteed exists. This is an orchestrator bug, not a trust
    /// violation, and is never downgraded to a soft validation error.
    #[error("validator precondition violated: {0}")]
    ValidatorPrecondition(String),

    /// XML signature creation failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// XML signature is malformed or structurally unusable.
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    /// Cryptographic capability error.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl SamlError {
    /// Returns the SAML status code for this error.
    ///
    /// Maps errors to appropriate SAML status codes as defined in the
    /// SAML 2.0 spec, for hosts that report failures in Status elements.
    #[must_use]
    pub const fn status_code(&self) -> &'static str {
        match self {
            Self::XmlParse(_)
            | Self::InvalidElement { .. }
            | Self::MissingElement(_)
            | Self::TooManyElements { .. }
            | Self::MissingAttribute { .. }
            | Self::InvalidTimestamp(_)
            | Self::InvalidAssertion(_)
            | Self::SignatureInvalid(_) => "urn:oasis:names:tc:SAML:2.0:status:Requester",
            _ => "urn:oasis:names:tc:SAML:2.0:status:Responder",
        }
    }

    /// Returns true if this error indicates malformed input rather than a
    /// failure on the processing side.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::XmlParse(_)
                | Self::InvalidElement { .. }
                | Self::MissingElement(_)
                | Self::TooManyElements { .. }
                | Self::MissingAttribute { .. }
                | Self::InvalidTimestamp(_)
                | Self::InvalidAssertion(_)
        )
    }
}

impl From<roxmltree::Error> for SamlError {
    fn from(err: roxmltree::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlWrite(err.to_string())
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::XmlWrite(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::SignatureInvalid(format!("base64 decode error: {err}"))
    }
}
