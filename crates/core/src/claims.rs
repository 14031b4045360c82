//! Insurance claim building.
//!
//! A claim is the subset of a bill that an HMO is asked to reimburse. Items the
//! patient opted out of, or that the insurer does not cover, never reach a claim.

use crate::billing::{apply_bill_coverage, Bill};
use crate::coverage::{CoverageRuleBook, HmoItemStatus};
use crate::pricing::ServiceCategory;
use hmo_types::Amount;
use serde::{Deserialize, Serialize};

/// A claimed bill line. Description, category, quantity and prices are copied from
/// the bill item unchanged so the claim can be traced back during audit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimItem {
    pub bill_item_id: String,
    pub description: String,
    pub category: ServiceCategory,
    pub quantity: i64,
    pub unit_price: Amount,
    pub total: Amount,
    pub claimed_amount: Amount,
    pub requires_pre_auth: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub bill_id: String,
    pub patient_id: String,
    pub hmo_provider_id: String,
    pub items: Vec<ClaimItem>,
    pub claim_amount: Amount,
    /// Set when any claimed item needs pre-authorisation from the insurer.
    pub requires_pre_auth: bool,
}

impl Claim {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Builds the claim for `bill` against `hmo_provider_id`.
///
/// Coverage is recomputed from `rules` rather than trusted from the bill's existing
/// annotations.
pub fn build_claim(bill: &Bill, hmo_provider_id: &str, rules: &CoverageRuleBook) -> Claim {
    let coverage = apply_bill_coverage(&bill.items, hmo_provider_id, rules);

    let items: Vec<ClaimItem> = coverage
        .items
        .into_iter()
        .filter(|item| !item.is_opted_out_of_hmo)
        .filter(|item| {
            !matches!(
                item.hmo_status,
                None | Some(HmoItemStatus::NotCovered) | Some(HmoItemStatus::OptedOut)
            )
        })
        .filter(|item| item.hmo_covered_amount.unwrap_or(0) > 0)
        .map(|item| ClaimItem {
            claimed_amount: item.hmo_covered_amount.unwrap_or(0),
            bill_item_id: item.id,
            description: item.description,
            category: item.category,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total: item.total,
            requires_pre_auth: item.requires_pre_auth,
        })
        .collect();

    let claim_amount = items.iter().map(|item| item.claimed_amount).sum();
    let requires_pre_auth = items.iter().any(|item| item.requires_pre_auth);

    tracing::debug!(
        bill_id = %bill.id,
        hmo_provider_id,
        items = items.len(),
        claim_amount,
        "built claim"
    );

    Claim {
        bill_id: bill.id.clone(),
        patient_id: bill.patient_id.clone(),
        hmo_provider_id: hmo_provider_id.to_string(),
        items,
        claim_amount,
        requires_pre_auth,
    }
}
