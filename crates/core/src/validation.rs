//! Reference-data validation.
//!
//! The rule functions tolerate incomplete configuration. Catalogs loaded from disk are
//! held to a stricter standard so that configuration mistakes surface at startup
//! instead of as silently uncovered bills.

use crate::coverage::{CoverageType, ServiceCoverageRule};
use crate::error::{HmoError, HmoResult};
use hmo_types::NonEmptyText;

/// Checks the shape of a coverage rule.
///
/// - `coverage_percentage` is present iff the type is `partial_percent`, and lies in
///   `0..=100`
/// - `coverage_flat_amount` is present iff the type is `partial_flat`, and is not
///   negative
/// - `max_covered_amount`, when present, is not negative
///
/// # Errors
///
/// Returns [`HmoError::InvalidCoverageRule`] naming the rule and the first problem found.
pub fn validate_coverage_rule(rule: &ServiceCoverageRule) -> HmoResult<()> {
    let invalid = |reason: &str| HmoError::InvalidCoverageRule {
        rule_id: rule.id.clone(),
        reason: reason.to_string(),
    };

    NonEmptyText::new(&rule.service_id)
        .and_then(|_| NonEmptyText::new(&rule.hmo_provider_id))
        .map_err(|_| invalid("service_id and hmo_provider_id are required"))?;

    let is_percent = rule.coverage_type == CoverageType::PartialPercent;
    match (is_percent, rule.coverage_percentage) {
        (true, None) => return Err(invalid("partial_percent requires coverage_percentage")),
        (false, Some(_)) => {
            return Err(invalid("coverage_percentage is only allowed for partial_percent"))
        }
        (true, Some(pct)) if !(0.0..=100.0).contains(&pct) => {
            return Err(invalid("coverage_percentage must be between 0 and 100"))
        }
        _ => {}
    }

    let is_flat = rule.coverage_type == CoverageType::PartialFlat;
    match (is_flat, rule.coverage_flat_amount) {
        (true, None) => return Err(invalid("partial_flat requires coverage_flat_amount")),
        (false, Some(_)) => {
            return Err(invalid("coverage_flat_amount is only allowed for partial_flat"))
        }
        (true, Some(amount)) if amount < 0 => {
            return Err(invalid("coverage_flat_amount cannot be negative"))
        }
        _ => {}
    }

    if rule.max_covered_amount.is_some_and(|max| max < 0) {
        return Err(invalid("max_covered_amount cannot be negative"));
    }

    Ok(())
}
