//! The constraint validator rule set.

use chrono::Duration;

use crate::error::{SamlError, SamlResult};
use crate::types::{Assertion, SubjectConfirmation, SubjectConfirmationData};
use crate::xml::format_instant;

use super::{
    AssertionValidator, SubjectConfirmationValidator, ValidationContext, ValidationResult,
    CLOCK_SKEW_GRACE_SECONDS,
};

fn grace() -> Duration {
    Duration::seconds(CLOCK_SKEW_GRACE_SECONDS)
}

/// Checks `Conditions.NotBefore` against the current time.
///
/// Passes trivially when the attribute (or the whole Conditions element) is
/// absent. The grace period absorbs clock skew between issuer and consumer.
pub struct ConditionsNotBefore;

impl AssertionValidator for ConditionsNotBefore {
    fn validate(
        &self,
        assertion: &Assertion,
        context: &ValidationContext,
        result: &mut ValidationResult,
    ) -> SamlResult<()> {
        let not_before = assertion.conditions.as_ref().and_then(|c| c.not_before);
        if let Some(not_before) = not_before {
            if not_before > context.now + grace() {
                result.add_error(format!(
                    "assertion is not yet valid: NotBefore {} is after current time {}",
                    format_instant(not_before),
                    format_instant(context.now)
                ));
            }
        }
        Ok(())
    }
}

/// Checks `Conditions.NotOnOrAfter` against the current time.
pub struct ConditionsNotOnOrAfter;

impl AssertionValidator for ConditionsNotOnOrAfter {
    fn validate(
        &self,
        assertion: &Assertion,
        context: &ValidationContext,
        result: &mut ValidationResult,
    ) -> SamlResult<()> {
        let not_on_or_after = assertion.conditions.as_ref().and_then(|c| c.not_on_or_after);
        if let Some(not_on_or_after) = not_on_or_after {
            if not_on_or_after <= context.now - grace() {
                result.add_error(format!(
                    "assertion has expired: NotOnOrAfter {} is before current time {}",
                    format_instant(not_on_or_after),
                    format_instant(context.now)
                ));
            }
        }
        Ok(())
    }
}

/// Checks that this service provider is a member of the assertion's
/// restricted audience.
///
/// Passes trivially when no audience restriction is declared. Appends
/// exactly one error per failing assertion, regardless of how many
/// restrictions the assertion carries. Running this validator against a
/// restricted assertion without knowing our own entity ID is caller
/// misuse, not a soft failure.
pub struct SpIsValidAudience;

impl AssertionValidator for SpIsValidAudience {
    fn validate(
        &self,
        assertion: &Assertion,
        context: &ValidationContext,
        result: &mut ValidationResult,
    ) -> SamlResult<()> {
        let Some(conditions) = assertion.conditions.as_ref() else {
            return Ok(());
        };
        if conditions.audience_restrictions.is_empty() {
            return Ok(());
        }

        let sp_entity_id = context.sp_entity_id.as_deref().ok_or_else(|| {
            SamlError::ValidatorPrecondition(
                "audience validation requires the service provider entity ID".to_string(),
            )
        })?;

        if !conditions
            .restricted_audiences()
            .any(|audience| audience == sp_entity_id)
        {
            let audiences: Vec<&str> = conditions.restricted_audiences().collect();
            result.add_error(format!(
                "service provider {sp_entity_id} is not in the restricted audience [{}]",
                audiences.join(", ")
            ));
        }
        Ok(())
    }
}

/// Reports whether an assertion demands replay-cache consultation.
///
/// The replay cache itself lives outside this crate; this validator only
/// surfaces the OneTimeUse flag. It never appends an error for the flag
/// alone.
pub struct OneTimeUse;

impl OneTimeUse {
    /// True iff the assertion is marked one-time use and must not be
    /// accepted again by a consumer that has already seen it.
    #[must_use]
    pub fn requires_replay_check(assertion: &Assertion) -> bool {
        assertion
            .conditions
            .as_ref()
            .is_some_and(|conditions| conditions.one_time_use)
    }
}

impl AssertionValidator for OneTimeUse {
    fn validate(
        &self,
        _assertion: &Assertion,
        _context: &ValidationContext,
        _result: &mut ValidationResult,
    ) -> SamlResult<()> {
        Ok(())
    }
}

fn require_data(confirmation: &SubjectConfirmation) -> SamlResult<&SubjectConfirmationData> {
    confirmation.data.as_ref().ok_or_else(|| {
        SamlError::ValidatorPrecondition(
            "subject confirmation has no SubjectConfirmationData".to_string(),
        )
    })
}

/// Checks that the confirmation's Recipient equals the message destination.
///
/// Only applicable when a destination is known; missing confirmation data
/// or a missing destination is caller misuse.
pub struct SubjectConfirmationRecipientMatches;

impl SubjectConfirmationValidator for SubjectConfirmationRecipientMatches {
    fn validate(
        &self,
        confirmation: &SubjectConfirmation,
        context: &ValidationContext,
        result: &mut ValidationResult,
    ) -> SamlResult<()> {
        let data = require_data(confirmation)?;
        let Some(recipient) = data.recipient.as_deref() else {
            return Ok(());
        };
        let destination = context.destination.as_deref().ok_or_else(|| {
            SamlError::ValidatorPrecondition(
                "recipient validation requires the message destination".to_string(),
            )
        })?;
        if recipient != destination {
            result.add_error(format!(
                "confirmation Recipient {recipient} does not match destination {destination}"
            ));
        }
        Ok(())
    }
}

/// Checks the confirmation-data NotBefore bound with the same grace logic
/// as the assertion-level Conditions.
pub struct SubjectConfirmationDataNotBefore;

impl SubjectConfirmationValidator for SubjectConfirmationDataNotBefore {
    fn validate(
        &self,
        confirmation: &SubjectConfirmation,
        context: &ValidationContext,
        result: &mut ValidationResult,
    ) -> SamlResult<()> {
        let data = require_data(confirmation)?;
        if let Some(not_before) = data.not_before {
            if not_before > context.now + grace() {
                result.add_error(format!(
                    "subject confirmation is not yet valid: NotBefore {} is after current time {}",
                    format_instant(not_before),
                    format_instant(context.now)
                ));
            }
        }
        Ok(())
    }
}

/// Checks the confirmation-data NotOnOrAfter bound.
pub struct SubjectConfirmationDataNotOnOrAfter;

impl SubjectConfirmationValidator for SubjectConfirmationDataNotOnOrAfter {
    fn validate(
        &self,
        confirmation: &SubjectConfirmation,
        context: &ValidationContext,
        result: &mut ValidationResult,
    ) -> SamlResult<()> {
        let data = require_data(confirmation)?;
        if let Some(not_on_or_after) = data.not_on_or_after {
            if not_on_or_after <= context.now - grace() {
                result.add_error(format!(
                    "subject confirmation has expired: NotOnOrAfter {} is before current time {}",
                    format_instant(not_on_or_after),
                    format_instant(context.now)
                ));
            }
        }
        Ok(())
    }
}

/// Checks that the confirmation's InResponseTo names the request this
/// consumer actually issued.
pub struct InResponseToMatches;

impl SubjectConfirmationValidator for InResponseToMatches {
    fn validate(
        &self,
        confirmation: &SubjectConfirmation,
        context: &ValidationContext,
        result: &mut ValidationResult,
    ) -> SamlResult<()> {
        let data = require_data(confirmation)?;
        let Some(in_response_to) = data.in_response_to.as_deref() else {
            return Ok(());
        };
        let request_id = context.request_id.as_deref().ok_or_else(|| {
            SamlError::ValidatorPrecondition(
                "InResponseTo validation requires the outstanding request ID".to_string(),
            )
        })?;
        if in_response_to != request_id {
            result.add_error(format!(
                "confirmation InResponseTo {in_response_to} does not match request {request_id}"
            ));
        }
        Ok(())
    }
}
