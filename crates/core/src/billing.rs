//! Bills, bill items and bill-wide coverage aggregation.

use crate::coverage::{CoverageOutcome, CoverageRuleBook, HmoItemStatus};
use crate::error::{HmoError, HmoResult};
use crate::pricing::ServiceCategory;
use hmo_types::Amount;
use serde::{Deserialize, Serialize};

/// A line on a bill.
///
/// When coverage has been applied and the item is not opted out,
/// `hmo_covered_amount + patient_liability_amount == total`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillItem {
    pub id: String,
    pub description: String,
    pub category: ServiceCategory,
    pub quantity: i64,
    pub unit_price: Amount,
    pub total: Amount,
    #[serde(default, rename = "isOptedOutOfHMO")]
    pub is_opted_out_of_hmo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmo_status: Option<HmoItemStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmo_covered_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_liability_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmo_service_coverage_id: Option<String>,
    /// Copied from the coverage rule that priced this item.
    #[serde(default)]
    pub requires_pre_auth: bool,
}

impl BillItem {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        category: ServiceCategory,
        quantity: i64,
        unit_price: Amount,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            category,
            quantity,
            unit_price,
            total: quantity * unit_price,
            is_opted_out_of_hmo: false,
            hmo_status: None,
            hmo_covered_amount: None,
            patient_liability_amount: None,
            hmo_service_coverage_id: None,
            requires_pre_auth: false,
        }
    }

    /// Marks the item as settled privately by the patient.
    pub fn opted_out(mut self) -> Self {
        self.is_opted_out_of_hmo = true;
        self
    }

    fn annotate(&mut self, outcome: CoverageOutcome) {
        self.hmo_status = Some(outcome.hmo_status);
        self.hmo_covered_amount = Some(outcome.hmo_covered_amount);
        self.patient_liability_amount = Some(outcome.patient_liability_amount);
        self.hmo_service_coverage_id = outcome.rule_id;
        self.requires_pre_auth = outcome.requires_pre_auth;
    }
}

/// Payment status of a bill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Pending,
    Partial,
    Paid,
    Waived,
    Refunded,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub patient_id: String,
    #[serde(default)]
    pub episode_id: Option<String>,
    #[serde(default)]
    pub hmo_provider_id: Option<String>,
    pub items: Vec<BillItem>,
    pub status: BillStatus,
    #[serde(default)]
    pub amount_paid: Amount,
}

impl Bill {
    pub fn new(id: impl Into<String>, patient_id: impl Into<String>, items: Vec<BillItem>) -> Self {
        Self {
            id: id.into(),
            patient_id: patient_id.into(),
            episode_id: None,
            hmo_provider_id: None,
            items,
            status: BillStatus::Pending,
            amount_paid: 0,
        }
    }

    pub fn total(&self) -> Amount {
        self.items.iter().map(|item| item.total).sum()
    }

    pub fn balance(&self) -> Amount {
        self.total() - self.amount_paid
    }

    /// Derives the payment status from the amount paid. Waived and refunded bills keep
    /// their status.
    pub fn derive_status(&self) -> BillStatus {
        match self.status {
            BillStatus::Waived | BillStatus::Refunded => self.status,
            _ if self.amount_paid >= self.total() => BillStatus::Paid,
            _ if self.amount_paid > 0 => BillStatus::Partial,
            _ => BillStatus::Pending,
        }
    }

    /// Records a payment against the bill and updates its status.
    ///
    /// # Errors
    ///
    /// Returns [`HmoError::InvalidPaymentAmount`] for a zero or negative amount and
    /// [`HmoError::BillClosed`] when the bill was waived or refunded.
    pub fn record_payment(&mut self, amount: Amount) -> HmoResult<BillStatus> {
        if amount <= 0 {
            return Err(HmoError::InvalidPaymentAmount(amount));
        }
        if matches!(self.status, BillStatus::Waived | BillStatus::Refunded) {
            tracing::warn!(bill_id = %self.id, status = ?self.status, "payment rejected");
            return Err(HmoError::BillClosed(self.id.clone()));
        }
        self.amount_paid += amount;
        self.status = self.derive_status();
        Ok(self.status)
    }

    /// Annotates every item with coverage for `hmo_provider_id` and returns the totals.
    pub fn apply_coverage(
        &mut self,
        hmo_provider_id: &str,
        rules: &CoverageRuleBook,
    ) -> BillCoverage {
        let coverage = apply_bill_coverage(&self.items, hmo_provider_id, rules);
        self.items = coverage.items.clone();
        self.hmo_provider_id = Some(hmo_provider_id.to_string());
        coverage
    }
}

/// Coverage-annotated bill items with bill-wide totals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillCoverage {
    pub items: Vec<BillItem>,
    pub hmo_total_coverage: Amount,
    pub patient_total_liability: Amount,
}

/// Runs the coverage calculator over every item of a bill.
///
/// Opted-out items are left entirely with the patient. Other items are looked up by
/// their id as the service id. Running this again on its own output yields the same
/// result.
pub fn apply_bill_coverage(
    items: &[BillItem],
    hmo_provider_id: &str,
    rules: &CoverageRuleBook,
) -> BillCoverage {
    let mut annotated = Vec::with_capacity(items.len());
    let mut hmo_total_coverage = 0;
    let mut patient_total_liability = 0;

    for item in items {
        let outcome = if item.is_opted_out_of_hmo {
            CoverageOutcome::opted_out(item.total)
        } else {
            rules.calculate(&item.id, hmo_provider_id, item.total)
        };

        hmo_total_coverage += outcome.hmo_covered_amount;
        patient_total_liability += outcome.patient_liability_amount;

        let mut item = item.clone();
        item.annotate(outcome);
        annotated.push(item);
    }

    BillCoverage {
        items: annotated,
        hmo_total_coverage,
        patient_total_liability,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{CoverageType, ServiceCoverageRule};

    fn rules() -> CoverageRuleBook {
        CoverageRuleBook::new([
            ServiceCoverageRule {
                id: "cov-consult".into(),
                service_id: "item-consult".into(),
                hmo_provider_id: "hmo-axa".into(),
                coverage_type: CoverageType::Full,
                coverage_percentage: None,
                coverage_flat_amount: None,
                max_covered_amount: None,
                requires_pre_auth: false,
                is_active: true,
            },
            ServiceCoverageRule {
                id: "cov-scan".into(),
                service_id: "item-scan".into(),
                hmo_provider_id: "hmo-axa".into(),
                coverage_type: CoverageType::PartialPercent,
                coverage_percentage: Some(80.0),
                coverage_flat_amount: None,
                max_covered_amount: Some(7_000),
                requires_pre_auth: true,
                is_active: true,
            },
        ])
    }

    fn items() -> Vec<BillItem> {
        vec![
            BillItem::new(
                "item-consult",
                "GP consultation",
                ServiceCategory::Consultation,
                1,
                5_000,
            ),
            BillItem::new("item-scan", "Abdominal ultrasound", ServiceCategory::Imaging, 1, 10_000),
            BillItem::new("item-drug", "Amoxicillin 500mg", ServiceCategory::Pharmacy, 3, 400),
        ]
    }

    #[test]
    fn new_item_computes_total() {
        let item = BillItem::new("x", "Paracetamol", ServiceCategory::Pharmacy, 4, 250);
        assert_eq!(item.total, 1_000);
        assert!(!item.is_opted_out_of_hmo);
    }

    #[test]
    fn aggregates_coverage_and_liability() {
        let coverage = apply_bill_coverage(&items(), "hmo-axa", &rules());
        assert_eq!(coverage.hmo_total_coverage, 12_000);
        assert_eq!(coverage.patient_total_liability, 3_000 + 1_200);

        let scan = &coverage.items[1];
        assert_eq!(scan.hmo_status, Some(HmoItemStatus::Partial));
        assert!(scan.requires_pre_auth);
        assert!(!coverage.items[0].requires_pre_auth);
        assert_eq!(scan.hmo_covered_amount, Some(7_000));
        assert_eq!(scan.patient_liability_amount, Some(3_000));
        assert_eq!(scan.hmo_service_coverage_id.as_deref(), Some("cov-scan"));

        let drug = &coverage.items[2];
        assert_eq!(drug.hmo_status, Some(HmoItemStatus::NotCovered));
        assert_eq!(drug.patient_liability_amount, Some(1_200));
    }

    #[test]
    fn opted_out_items_stay_with_patient() {
        let mut items = items();
        items[0] = items[0].clone().opted_out();
        let coverage = apply_bill_coverage(&items, "hmo-axa", &rules());

        let consult = &coverage.items[0];
        assert_eq!(consult.hmo_status, Some(HmoItemStatus::OptedOut));
        assert_eq!(consult.hmo_covered_amount, Some(0));
        assert_eq!(consult.patient_liability_amount, Some(consult.total));
        assert_eq!(consult.hmo_service_coverage_id, None);
        assert_eq!(coverage.hmo_total_coverage, 7_000);
    }

    #[test]
    fn reapplying_coverage_is_idempotent() {
        let first = apply_bill_coverage(&items(), "hmo-axa", &rules());
        let second = apply_bill_coverage(&first.items, "hmo-axa", &rules());
        assert_eq!(first, second);
    }

    #[test]
    fn item_split_sums_to_total() {
        let coverage = apply_bill_coverage(&items(), "hmo-axa", &rules());
        for item in coverage.items {
            assert_eq!(
                item.hmo_covered_amount.unwrap_or_default()
                    + item.patient_liability_amount.unwrap_or_default(),
                item.total
            );
        }
    }

    #[test]
    fn payments_drive_bill_status() {
        let mut bill = Bill::new("bill-1", "patient-1", items());
        assert_eq!(bill.total(), 16_200);
        assert_eq!(bill.derive_status(), BillStatus::Pending);

        assert_eq!(bill.record_payment(6_200).expect("payment"), BillStatus::Partial);
        assert_eq!(bill.balance(), 10_000);

        assert_eq!(bill.record_payment(10_000).expect("payment"), BillStatus::Paid);
        assert_eq!(bill.balance(), 0);
    }

    #[test]
    fn rejects_bad_payments() {
        let mut bill = Bill::new("bill-1", "patient-1", items());
        assert!(matches!(bill.record_payment(0), Err(HmoError::InvalidPaymentAmount(0))));

        bill.status = BillStatus::Waived;
        assert!(matches!(bill.record_payment(100), Err(HmoError::BillClosed(_))));
        assert_eq!(bill.amount_paid, 0);
    }

    #[test]
    fn apply_coverage_updates_bill_in_place() {
        let mut bill = Bill::new("bill-1", "patient-1", items());
        let coverage = bill.apply_coverage("hmo-axa", &rules());
        assert_eq!(bill.items, coverage.items);
        assert_eq!(bill.hmo_provider_id.as_deref(), Some("hmo-axa"));
    }

    #[test]
    fn bill_item_json_uses_upstream_field_names() {
        let json = serde_json::to_value(
            BillItem::new(
                "i1",
                "Malaria parasite test",
                ServiceCategory::Laboratory,
                1,
                2_000,
            ).opted_out(),
        )
        .expect("serialize");
        assert_eq!(json["isOptedOutOfHMO"], true);
        assert_eq!(json["unitPrice"], 2_000);
        assert!(json.get("hmoStatus").is_none());
    }
}
