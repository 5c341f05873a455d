//! Assertion validation pipeline.
//!
//! Validators are independent, composable rules: each consumes an assertion
//! (or one of its subject confirmations) plus out-of-band context and
//! reports violations into a shared [`ValidationResult`]. Ordinary rule
//! violations never abort the pass; they accumulate so the caller sees
//! every violation for one assertion at once. A validator returns `Err`
//! only for structural impossibilities, which indicate the caller invoked
//! it against data it should have guaranteed exists.

mod validators;

pub use validators::{
    ConditionsNotBefore, ConditionsNotOnOrAfter, InResponseToMatches, OneTimeUse,
    SpIsValidAudience, SubjectConfirmationDataNotBefore, SubjectConfirmationDataNotOnOrAfter,
    SubjectConfirmationRecipientMatches,
};

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::SamlResult;
use crate::types::{Assertion, SubjectConfirmation};

/// Grace period absorbing clock skew between systems when checking
/// temporal validity bounds, in seconds.
pub const CLOCK_SKEW_GRACE_SECONDS: i64 = 60;

/// Accumulator of validation errors.
///
/// An assertion is valid iff the accumulator is empty after running all
/// applicable validators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<String>,
}

impl ValidationResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an error unconditionally.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// True iff no errors have been appended.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The ordered error list, for diagnostics.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Out-of-band context for one validation run.
///
/// The current time is snapshotted once when the context is built, so every
/// validator in a pass observes the same instant.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    /// The current time, read once at the start of the run.
    pub now: DateTime<Utc>,

    /// The validating service provider's own entity identifier.
    pub sp_entity_id: Option<String>,

    /// The URI the current message was delivered to.
    pub destination: Option<String>,

    /// The ID of the request this assertion is expected to respond to.
    pub request_id: Option<String>,
}

impl ValidationContext {
    /// Creates a context with the clock snapshotted now.
    #[must_use]
    pub fn new(clock: &dyn Clock) -> Self {
        Self::at(clock.now())
    }

    /// Creates a context pinned to an explicit instant.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            sp_entity_id: None,
            destination: None,
            request_id: None,
        }
    }

    /// Sets the service provider entity identifier.
    #[must_use]
    pub fn with_sp_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.sp_entity_id = Some(entity_id.into());
        self
    }

    /// Sets the message destination URI.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Sets the request ID the assertion must respond to.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// A rule over a whole assertion.
pub trait AssertionValidator {
    /// Checks the rule, appending any violations to `result`.
    ///
    /// Returns `Err` only when the rule cannot be evaluated at all.
    fn validate(
        &self,
        assertion: &Assertion,
        context: &ValidationContext,
        result: &mut ValidationResult,
    ) -> SamlResult<()>;
}

/// A rule over a single subject confirmation.
pub trait SubjectConfirmationValidator {
    /// Checks the rule, appending any violations to `result`.
    ///
    /// Returns `Err` only when the rule cannot be evaluated at all.
    fn validate(
        &self,
        confirmation: &SubjectConfirmation,
        context: &ValidationContext,
        result: &mut ValidationResult,
    ) -> SamlResult<()>;
}

/// Runs a set of assertion validators against one assertion.
///
/// Every validator runs even after earlier ones have reported errors, so
/// the result carries the complete list of violations.
pub fn validate_assertion(
    assertion: &Assertion,
    context: &ValidationContext,
    validators: &[&dyn AssertionValidator],
) -> SamlResult<ValidationResult> {
    let mut result = ValidationResult::new();
    for validator in validators {
        validator.validate(assertion, context, &mut result)?;
    }
    if !result.is_valid() {
        tracing::debug!(
            assertion = %assertion.id,
            violations = result.errors().len(),
            "assertion failed constraint validation"
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::xml::parse_instant;

    #[test]
    fn empty_result_is_valid() {
        let result = ValidationResult::new();
        assert!(result.is_valid());
        assert!(result.errors().is_empty());
    }

    #[test]
    fn errors_accumulate_in_order() {
        let mut result = ValidationResult::new();
        result.add_error("first");
        result.add_error("second");
        assert!(!result.is_valid());
        assert_eq!(result.errors(), ["first", "second"]);
    }

    #[test]
    fn context_snapshots_the_clock() {
        let instant = parse_instant("2020-03-23T23:37:24Z").unwrap();
        let context = ValidationContext::new(&FixedClock(instant));
        assert_eq!(context.now, instant);
        assert!(context.sp_entity_id.is_none());
        assert!(context.destination.is_none());
    }
}
