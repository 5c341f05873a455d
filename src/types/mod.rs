//! SAML 2.0 assertion element model.
//!
//! Each type maps to one element of the assertion schema and knows how to
//! parse itself from a namespace-checked XML node and write itself back out.
//! Constructors enforce the structural invariants of the schema, so a value
//! of any of these types is always well-formed.

pub mod assertion;
pub mod conditions;
pub mod constants;
pub mod issuer;
pub mod name_id;
pub mod statements;
pub mod subject;

pub use assertion::Assertion;
pub use conditions::{AudienceRestriction, Conditions};
pub use constants::{AuthnContextClass, NameIdFormat};
pub use issuer::Issuer;
pub use name_id::NameId;
pub use statements::{
    Attribute, AttributeStatement, AuthnContext, AuthnStatement, Statement, SubjectLocality,
};
pub use subject::{Subject, SubjectConfirmation, SubjectConfirmationData};
