//! SAML 2.0 assertion model.
//!
//! This crate implements the assertion layer of SAML 2.0: parsing signed,
//! federated identity assertions from untrusted XML, validating them against
//! protocol- and deployment-specific constraints, and re-serializing them
//! with optional digital signatures.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`types`] - The SAML element model (Issuer, NameID, Subject, Conditions,
//!   statements, Assertion) with bidirectional XML mapping
//! - [`validation`] - Constraint validators and the error-accumulating
//!   validation result
//! - [`signature`] - Signed-element handling and the signing/verification
//!   capability traits
//! - [`clock`] - The substitutable temporal source for time-based checks
//! - [`xml`] - Namespace-aware child selection and `xs:dateTime` conversion
//! - [`error`] - Error types for parsing, construction, and signing
//!
//! # Trust model
//!
//! Parsing only establishes that an assertion is well-formed and satisfies
//! SAML 2.0 schema cardinality. Whether the assertion may be *trusted* is a
//! separate question answered by running the constraint validators, and
//! whether it is *authentic* is answered by explicit signature verification
//! with a trusted key. An assertion that parsed with a signature attached
//! ([`Assertion::was_signed_at_construction`]) has not been verified by
//! anyone; treating it as verified is a security defect in the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use saml2_assertion::{Assertion, SystemClock, ValidationContext};
//! use saml2_assertion::validation::{self, ConditionsNotBefore, ConditionsNotOnOrAfter, SpIsValidAudience};
//!
//! let doc = roxmltree::Document::parse(xml)?;
//! let assertion = Assertion::from_xml(doc.root_element())?;
//!
//! let ctx = ValidationContext::new(&SystemClock)
//!     .with_sp_entity_id("https://sp.example/metadata")
//!     .with_destination("https://sp.example/acs");
//! let result = validation::validate_assertion(
//!     &assertion,
//!     &ctx,
//!     &[&ConditionsNotBefore, &ConditionsNotOnOrAfter, &SpIsValidAudience],
//! )?;
//! if !result.is_valid() {
//!     // reject the identity claim; log result.errors() for audit
//! }
//! ```
//!
//! # SAML Specifications
//!
//! This implementation follows these specifications:
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod signature;
pub mod types;
pub mod validation;
pub mod xml;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{SamlError, SamlResult};
pub use types::*;
pub use validation::{ValidationContext, ValidationResult};
