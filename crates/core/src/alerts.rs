//! Insurer clinical-documentation rules.
//!
//! Insurers attach documentation requirements to diagnoses: a malaria claim must
//! carry a temperature reading, a diabetes claim must come with a blood glucose test
//! on the order list, and so on. Each [`HmoRule`] names the ICD-10 code prefixes it
//! applies to and a single check against the encounter's vitals or lab orders.

use crate::constants::{LAB_NOT_ORDERED, LAB_PRESENT, NOT_APPLICABLE, NOT_RECORDED};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a rule inspects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleField {
    LabOrder,
    Prescription,
    /// A named vital sign, e.g. `temperature` or `systolicBP`.
    Vital(String),
}

impl From<String> for RuleField {
    fn from(value: String) -> Self {
        match value.as_str() {
            "labOrder" => Self::LabOrder,
            "prescription" => Self::Prescription,
            _ => Self::Vital(value),
        }
    }
}

impl From<RuleField> for String {
    fn from(value: RuleField) -> Self {
        match value {
            RuleField::LabOrder => "labOrder".to_string(),
            RuleField::Prescription => "prescription".to_string(),
            RuleField::Vital(name) => name,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCondition {
    Gte,
    Lte,
    Eq,
    Present,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Threshold or target of a rule: a number for vitals, a test code for lab orders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Number(f64),
    Text(String),
}

impl RuleValue {
    /// Numeric view of the value. Text that does not parse as a number reads as 0.
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Text(text) => text.trim().parse().unwrap_or(0.0),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HmoRule {
    pub id: String,
    pub hmo_provider_id: String,
    pub rule_field: RuleField,
    pub condition: RuleCondition,
    pub value: RuleValue,
    pub icd_codes_applicable: Vec<String>,
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
}

impl HmoRule {
    /// True when any configured ICD-10 prefix starts any of the diagnosis codes.
    pub fn applies_to(&self, diagnoses: &[String]) -> bool {
        self.icd_codes_applicable
            .iter()
            .any(|prefix| diagnoses.iter().any(|code| code.starts_with(prefix.as_str())))
    }
}

/// Vital-sign readings captured at an encounter, keyed by vital name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VitalSigns(BTreeMap<String, f64>);

impl VitalSigns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }
}

/// A lab test on the encounter's order list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabOrderRef {
    pub test_code: String,
    #[serde(default)]
    pub test_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertResult {
    pub rule: HmoRule,
    pub passed: bool,
    pub actual_value: String,
}

/// Evaluates an insurer's rules that apply to the given diagnoses.
///
/// Returns one result per applicable rule, in catalog order.
pub fn evaluate_hmo_rules(
    rules: &[HmoRule],
    hmo_provider_id: &str,
    diagnoses: &[String],
    vitals: Option<&VitalSigns>,
    lab_orders: &[LabOrderRef],
) -> Vec<AlertResult> {
    rules
        .iter()
        .filter(|rule| rule.hmo_provider_id == hmo_provider_id)
        .filter(|rule| rule.applies_to(diagnoses))
        .map(|rule| {
            let (passed, actual_value) = check_rule(rule, vitals, lab_orders);
            AlertResult {
                rule: rule.clone(),
                passed,
                actual_value,
            }
        })
        .collect()
}

fn check_rule(
    rule: &HmoRule,
    vitals: Option<&VitalSigns>,
    lab_orders: &[LabOrderRef],
) -> (bool, String) {
    match &rule.rule_field {
        RuleField::LabOrder => {
            let target = rule.value.as_text().to_lowercase();
            let ordered = lab_orders.iter().any(|order| {
                order.test_code.to_lowercase().contains(&target)
                    || order.test_name.to_lowercase().contains(&target)
            });
            let actual = if ordered { LAB_PRESENT } else { LAB_NOT_ORDERED };
            (ordered, actual.to_string())
        }
        // No prescription checks are defined yet.
        RuleField::Prescription => (true, NOT_APPLICABLE.to_string()),
        RuleField::Vital(name) => {
            let Some(reading) = vitals.and_then(|v| v.get(name)) else {
                return (false, NOT_RECORDED.to_string());
            };
            let threshold = rule.value.as_number();
            let passed = match rule.condition {
                RuleCondition::Gte => reading >= threshold,
                RuleCondition::Lte => reading <= threshold,
                RuleCondition::Eq => reading == threshold,
                RuleCondition::Present => true,
            };
            (passed, reading.to_string())
        }
    }
}

/// Failure counts across a set of alert results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSummary {
    pub evaluated: usize,
    pub failed: usize,
    pub failed_by_severity: BTreeMap<Severity, usize>,
}

impl AlertSummary {
    pub fn from_results(results: &[AlertResult]) -> Self {
        let mut summary = Self {
            evaluated: results.len(),
            ..Self::default()
        };
        for result in results.iter().filter(|r| !r.passed) {
            summary.failed += 1;
            *summary.failed_by_severity.entry(result.rule.severity).or_default() += 1;
        }
        summary
    }

    /// True when a critical rule failed.
    pub fn has_critical_failure(&self) -> bool {
        self.failed_by_severity.get(&Severity::Critical).copied().unwrap_or(0) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(
        id: &str,
        field: &str,
        condition: RuleCondition,
        value: RuleValue,
        icd: &[&str],
    ) -> HmoRule {
        HmoRule {
            id: id.into(),
            hmo_provider_id: "hmo-avon".into(),
            rule_field: RuleField::from(field.to_string()),
            condition,
            value,
            icd_codes_applicable: icd.iter().map(|s| s.to_string()).collect(),
            severity: Severity::Warning,
            message: String::new(),
        }
    }

    fn rules() -> Vec<HmoRule> {
        let mut fever = rule(
            "fever",
            "temperature",
            RuleCondition::Gte,
            RuleValue::Number(37.5),
            &["B50", "B54"],
        );
        fever.severity = Severity::Critical;
        vec![
            fever,
            rule(
                "mp-test",
                "labOrder",
                RuleCondition::Present,
                RuleValue::Text("MP".into()),
                &["B5"],
            ),
            rule("bp", "systolicBP", RuleCondition::Gte, RuleValue::Number(140.0), &["I10"]),
            rule(
                "rx",
                "prescription",
                RuleCondition::Present,
                RuleValue::Text("ACT".into()),
                &["B54"],
            ),
        ]
    }

    fn dx(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn selects_rules_by_icd_prefix() {
        let results = evaluate_hmo_rules(&rules(), "hmo-avon", &dx(&["B54"]), None, &[]);
        let ids: Vec<&str> = results.iter().map(|r| r.rule.id.as_str()).collect();
        assert_eq!(ids, ["fever", "mp-test", "rx"]);

        let none = evaluate_hmo_rules(&rules(), "hmo-avon", &dx(&["J06.9"]), None, &[]);
        assert!(none.is_empty());
    }

    #[test]
    fn ignores_other_providers() {
        let results = evaluate_hmo_rules(&rules(), "hmo-other", &dx(&["B54"]), None, &[]);
        assert!(results.is_empty());
    }

    #[test]
    fn missing_vital_fails_as_not_recorded() {
        let results = evaluate_hmo_rules(&rules(), "hmo-avon", &dx(&["B50.9"]), None, &[]);
        let fever = &results[0];
        assert!(!fever.passed);
        assert_eq!(fever.actual_value, "Not recorded");
    }

    #[test]
    fn vital_thresholds_are_compared() {
        let hot = VitalSigns::new().with("temperature", 38.6);
        let results = evaluate_hmo_rules(&rules(), "hmo-avon", &dx(&["B50.9"]), Some(&hot), &[]);
        assert!(results[0].passed);
        assert_eq!(results[0].actual_value, "38.6");

        let normal = VitalSigns::new().with("temperature", 36.8);
        let results = evaluate_hmo_rules(&rules(), "hmo-avon", &dx(&["B50.9"]), Some(&normal), &[]);
        assert!(!results[0].passed);
    }

    #[test]
    fn lte_eq_and_present_conditions() {
        let vitals = VitalSigns::new().with("spo2", 92.0);
        let lte = rule("lte", "spo2", RuleCondition::Lte, RuleValue::Number(94.0), &["J18"]);
        let eq = rule("eq", "spo2", RuleCondition::Eq, RuleValue::Text("92".into()), &["J18"]);
        let present = rule(
            "present",
            "spo2",
            RuleCondition::Present,
            RuleValue::Number(0.0),
            &["J18"],
        );
        let results = evaluate_hmo_rules(
            &[lte, eq, present],
            "hmo-avon",
            &dx(&["J18.9"]),
            Some(&vitals),
            &[],
        );
        assert!(results.iter().all(|r| r.passed));
    }

    #[test]
    fn lab_order_matches_code_or_name_case_insensitively() {
        let by_name = [LabOrderRef {
            test_code: "LAB-042".into(),
            test_name: "Malaria Parasite (mp) smear".into(),
        }];
        let results = evaluate_hmo_rules(&rules(), "hmo-avon", &dx(&["B54"]), None, &by_name);
        let mp = results.iter().find(|r| r.rule.id == "mp-test").expect("mp rule");
        assert!(mp.passed);
        assert_eq!(mp.actual_value, "Present");

        let unrelated = [LabOrderRef {
            test_code: "FBC".into(),
            test_name: "Full blood count".into(),
        }];
        let results = evaluate_hmo_rules(&rules(), "hmo-avon", &dx(&["B54"]), None, &unrelated);
        let mp = results.iter().find(|r| r.rule.id == "mp-test").expect("mp rule");
        assert!(!mp.passed);
        assert_eq!(mp.actual_value, "Not ordered");
    }

    #[test]
    fn prescription_rules_always_pass() {
        let results = evaluate_hmo_rules(&rules(), "hmo-avon", &dx(&["B54"]), None, &[]);
        let rx = results.iter().find(|r| r.rule.id == "rx").expect("rx rule");
        assert!(rx.passed);
    }

    #[test]
    fn summary_counts_failures_by_severity() {
        let results = evaluate_hmo_rules(&rules(), "hmo-avon", &dx(&["B54"]), None, &[]);
        let summary = AlertSummary::from_results(&results);
        assert_eq!(summary.evaluated, 3);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failed_by_severity.get(&Severity::Critical), Some(&1));
        assert_eq!(summary.failed_by_severity.get(&Severity::Warning), Some(&1));
        assert!(summary.has_critical_failure());
    }

    #[test]
    fn rule_field_round_trips_through_strings() {
        assert_eq!(RuleField::from("labOrder".to_string()), RuleField::LabOrder);
        assert_eq!(String::from(RuleField::Vital("pulse".into())), "pulse");
        let rule: HmoRule = serde_json::from_str(
            r#"{"id":"r","hmoProviderId":"h","ruleField":"pulse","condition":"lte","value":100,
                "icdCodesApplicable":["I"],"severity":"info"}"#,
        )
        .expect("parse rule");
        assert_eq!(rule.rule_field, RuleField::Vital("pulse".into()));
        assert_eq!(rule.value, RuleValue::Number(100.0));
    }
}
