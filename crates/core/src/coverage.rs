//! Coverage-tier calculation for a single billed item.
//!
//! A [`ServiceCoverageRule`] states how much of a service an insurer pays for. The
//! calculator splits an item total into an HMO-covered amount and a patient
//! liability such that the two always add up to the item total exactly.

use hmo_types::{percent_of, Amount};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How an insurer covers a service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageType {
    Full,
    PartialPercent,
    PartialFlat,
    None,
}

/// Coverage status of an individual bill item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HmoItemStatus {
    Covered,
    Partial,
    NotCovered,
    OptedOut,
}

/// Insurer coverage configuration for one service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServiceCoverageRule {
    pub id: String,
    pub service_id: String,
    pub hmo_provider_id: String,
    pub coverage_type: CoverageType,
    #[serde(default)]
    pub coverage_percentage: Option<f64>,
    #[serde(default)]
    pub coverage_flat_amount: Option<Amount>,
    #[serde(default)]
    pub max_covered_amount: Option<Amount>,
    #[serde(default)]
    pub requires_pre_auth: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// The split of an item total between insurer and patient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageOutcome {
    pub hmo_covered_amount: Amount,
    pub patient_liability_amount: Amount,
    pub hmo_status: HmoItemStatus,
    /// Id of the rule that produced the split, if one applied.
    pub rule_id: Option<String>,
    pub requires_pre_auth: bool,
}

impl CoverageOutcome {
    /// The whole total falls on the patient.
    pub fn not_covered(item_total: Amount) -> Self {
        Self {
            hmo_covered_amount: 0,
            patient_liability_amount: item_total,
            hmo_status: HmoItemStatus::NotCovered,
            rule_id: None,
            requires_pre_auth: false,
        }
    }

    /// The patient chose to settle the item privately.
    pub fn opted_out(item_total: Amount) -> Self {
        Self {
            hmo_status: HmoItemStatus::OptedOut,
            ..Self::not_covered(item_total)
        }
    }
}

/// Computes the insurer share of `item_total` under `rule`, clamped into `0..=item_total`.
pub fn covered_amount(rule: &ServiceCoverageRule, item_total: Amount) -> Amount {
    let raw = match rule.coverage_type {
        CoverageType::Full => item_total,
        CoverageType::PartialPercent => {
            percent_of(item_total, rule.coverage_percentage.unwrap_or(0.0))
        }
        CoverageType::PartialFlat => rule.coverage_flat_amount.unwrap_or(0).min(item_total),
        CoverageType::None => 0,
    };

    let capped = match rule.max_covered_amount {
        Some(max) => raw.min(max),
        None => raw,
    };

    capped.clamp(0, item_total.max(0))
}

/// Typed lookup of coverage rules keyed by `(service_id, hmo_provider_id)`.
#[derive(Clone, Debug, Default)]
pub struct CoverageRuleBook {
    rules: HashMap<(String, String), ServiceCoverageRule>,
}

impl CoverageRuleBook {
    /// Builds the table. When several rules share a key, an active rule wins over an
    /// inactive one; otherwise the later rule wins.
    pub fn new(rules: impl IntoIterator<Item = ServiceCoverageRule>) -> Self {
        let mut table: HashMap<(String, String), ServiceCoverageRule> = HashMap::new();
        for rule in rules {
            let key = (rule.service_id.clone(), rule.hmo_provider_id.clone());
            match table.get(&key) {
                Some(existing) if existing.is_active && !rule.is_active => {}
                _ => {
                    table.insert(key, rule);
                }
            }
        }
        Self { rules: table }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the active rule for a service and insurer.
    pub fn active_rule(
        &self,
        service_id: &str,
        hmo_provider_id: &str,
    ) -> Option<&ServiceCoverageRule> {
        self.rules
            .get(&(service_id.to_string(), hmo_provider_id.to_string()))
            .filter(|rule| rule.is_active)
    }

    /// Splits `item_total` between insurer and patient for a service.
    ///
    /// A missing or inactive rule, or a rule of type `none`, leaves the whole total with
    /// the patient.
    pub fn calculate(
        &self,
        service_id: &str,
        hmo_provider_id: &str,
        item_total: Amount,
    ) -> CoverageOutcome {
        let Some(rule) = self
            .active_rule(service_id, hmo_provider_id)
            .filter(|rule| rule.coverage_type != CoverageType::None)
        else {
            tracing::debug!(service_id, hmo_provider_id, "no active coverage rule");
            return CoverageOutcome::not_covered(item_total);
        };

        let hmo_covered_amount = covered_amount(rule, item_total);
        let hmo_status = if hmo_covered_amount >= item_total {
            HmoItemStatus::Covered
        } else if hmo_covered_amount > 0 {
            HmoItemStatus::Partial
        } else {
            HmoItemStatus::NotCovered
        };

        CoverageOutcome {
            hmo_covered_amount,
            patient_liability_amount: item_total - hmo_covered_amount,
            hmo_status,
            rule_id: Some(rule.id.clone()),
            requires_pre_auth: rule.requires_pre_auth,
        }
    }
}
