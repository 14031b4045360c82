//! Drug–lab conflict detection.
//!
//! Flags prescriptions that a lab result suggests are unnecessary, such as an
//! antimalarial prescribed after a negative malaria parasite test. Matching uses
//! case-insensitive substrings on drug names, so a pattern like `artemether` also
//! catches `Artemether/Lumefantrine 80/480`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConflictRule {
    pub drug_name_pattern: String,
    pub conflicting_lab_test_code: String,
    /// `negative`, `normal`, or free text expected in the lab result.
    pub conflicting_lab_result: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabResult {
    pub test_code: String,
    pub result: String,
    #[serde(default)]
    pub is_abnormal: bool,
}

impl ConflictRule {
    fn matches_drug(&self, drug_name: &str) -> bool {
        drug_name
            .to_lowercase()
            .contains(&self.drug_name_pattern.to_lowercase())
    }

    fn is_triggered_by(&self, lab: &LabResult) -> bool {
        let expected = self.conflicting_lab_result.to_lowercase();
        let actual = lab.result.to_lowercase();
        match expected.as_str() {
            "negative" => actual.contains("negative") || actual.contains("not detected"),
            "normal" => !lab.is_abnormal,
            _ => actual.contains(&expected),
        }
    }
}

/// Returns every rule that `drug_name` conflicts with given the patient's lab results.
///
/// Only the first lab result for a rule's test code is considered.
pub fn detect_conflicts<'a>(
    drug_name: &str,
    lab_results: &[LabResult],
    rules: &'a [ConflictRule],
) -> Vec<&'a ConflictRule> {
    rules
        .iter()
        .filter(|rule| rule.matches_drug(drug_name))
        .filter(|rule| {
            lab_results
                .iter()
                .find(|lab| lab.test_code == rule.conflicting_lab_test_code)
                .is_some_and(|lab| rule.is_triggered_by(lab))
        })
        .collect()
}

/// A conflict raised for one drug of a prescription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionConflict<'a> {
    pub drug_name: String,
    pub rule: &'a ConflictRule,
}

/// Runs [`detect_conflicts`] for each drug of a prescription.
pub fn detect_prescription_conflicts<'a, S: AsRef<str>>(
    drug_names: &[S],
    lab_results: &[LabResult],
    rules: &'a [ConflictRule],
) -> Vec<PrescriptionConflict<'a>> {
    drug_names
        .iter()
        .flat_map(|drug| {
            detect_conflicts(drug.as_ref(), lab_results, rules)
                .into_iter()
                .map(move |rule| PrescriptionConflict {
                    drug_name: drug.as_ref().to_string(),
                    rule,
                })
        })
        .collect()
}
