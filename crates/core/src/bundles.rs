//! Protocol bundle suggestions.
//!
//! A protocol bundle is a standard set of lab tests and medications for a diagnosis.
//! While a clinician works on an encounter, matching bundles are suggested until they
//! are dismissed, applied, or everything in them is already ordered.
//!
//! Dismissals, applications and partial-adoption audit records live in a
//! [`BundleSession`] owned by the caller for the lifetime of the encounter screen. It
//! is never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BundleLabTest {
    pub test_code: String,
    #[serde(default)]
    pub test_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BundleMedication {
    pub drug_name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProtocolBundle {
    pub id: String,
    pub name: String,
    pub icd10_codes: Vec<String>,
    #[serde(default)]
    pub lab_tests: Vec<BundleLabTest>,
    #[serde(default)]
    pub medications: Vec<BundleMedication>,
}

impl ProtocolBundle {
    /// True when every lab test is already ordered and every medication already
    /// prescribed.
    pub fn is_fully_present(
        &self,
        current_lab_codes: &[String],
        current_drug_names: &[String],
    ) -> bool {
        let labs_present = self.lab_tests.iter().all(|test| {
            current_lab_codes
                .iter()
                .any(|code| code.eq_ignore_ascii_case(&test.test_code))
        });
        let drugs_present = self.medications.iter().all(|med| {
            let wanted = med.drug_name.to_lowercase();
            current_drug_names
                .iter()
                .any(|name| name.to_lowercase().contains(&wanted))
        });
        labs_present && drugs_present
    }
}

/// Protocol bundles indexed for lookup by diagnosis.
#[derive(Clone, Debug, Default)]
pub struct BundleCatalog {
    bundles: Vec<ProtocolBundle>,
}

impl BundleCatalog {
    pub fn new(bundles: impl IntoIterator<Item = ProtocolBundle>) -> Self {
        Self {
            bundles: bundles.into_iter().collect(),
        }
    }

    pub fn bundles(&self) -> &[ProtocolBundle] {
        &self.bundles
    }

    pub fn get(&self, bundle_id: &str) -> Option<&ProtocolBundle> {
        self.bundles.iter().find(|bundle| bundle.id == bundle_id)
    }

    /// Bundles with an ICD-10 code that prefixes `diagnosis_code`.
    pub fn bundles_for_diagnosis<'a, 'b>(
        &'a self,
        diagnosis_code: &'b str,
    ) -> impl Iterator<Item = &'a ProtocolBundle> + 'b
    where
        'a: 'b,
    {
        self.bundles.iter().filter(move |bundle| {
            bundle
                .icd10_codes
                .iter()
                .any(|code| diagnosis_code.starts_with(code.as_str()))
        })
    }
}

/// Lab tests and drugs the clinician left out when applying a bundle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deselection {
    #[serde(default)]
    pub lab_test_codes: Vec<String>,
    #[serde(default)]
    pub drug_names: Vec<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Deselection {
    pub fn is_empty(&self) -> bool {
        self.lab_test_codes.is_empty() && self.drug_names.is_empty()
    }
}

/// Audit record of a partially adopted bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeselectionRecord {
    pub bundle_id: String,
    pub deselected_lab_tests: Vec<String>,
    pub deselected_drugs: Vec<String>,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSession {
    dismissed: BTreeSet<String>,
    applied: Vec<String>,
    deselections: Vec<DeselectionRecord>,
}

impl BundleSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dismissed(&self) -> &BTreeSet<String> {
        &self.dismissed
    }

    pub fn applied(&self) -> &[String] {
        &self.applied
    }

    pub fn deselections(&self) -> &[DeselectionRecord] {
        &self.deselections
    }

    pub fn dismiss_bundle(&mut self, bundle_id: impl Into<String>) {
        self.dismissed.insert(bundle_id.into());
    }

    /// Records that a bundle was applied at `now`. A non-empty `deselection` is kept
    /// in the audit log.
    pub fn mark_applied(
        &mut self,
        bundle_id: impl Into<String>,
        deselection: Option<Deselection>,
        now: DateTime<Utc>,
    ) {
        let bundle_id = bundle_id.into();
        if !self.applied.contains(&bundle_id) {
            self.applied.push(bundle_id.clone());
        }

        if let Some(deselection) = deselection.filter(|d| !d.is_empty()) {
            tracing::info!(
                bundle_id = %bundle_id,
                lab_tests = deselection.lab_test_codes.len(),
                drugs = deselection.drug_names.len(),
                "bundle applied with deselections"
            );
            self.deselections.push(DeselectionRecord {
                bundle_id,
                deselected_lab_tests: deselection.lab_test_codes,
                deselected_drugs: deselection.drug_names,
                reason: deselection.reason,
                recorded_at: now,
            });
        }
    }

    fn is_settled(&self, bundle_id: &str) -> bool {
        self.dismissed.contains(bundle_id) || self.applied.iter().any(|id| id == bundle_id)
    }

    /// Bundles to suggest for the selected diagnoses, in first-seen order.
    pub fn suggest<'a>(
        &self,
        catalog: &'a BundleCatalog,
        diagnoses: &[String],
        current_lab_codes: &[String],
        current_drug_names: &[String],
    ) -> Vec<&'a ProtocolBundle> {
        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();

        for diagnosis in diagnoses {
            for bundle in catalog.bundles_for_diagnosis(diagnosis) {
                if !seen.insert(bundle.id.as_str()) {
                    continue;
                }
                if self.is_settled(&bundle.id) {
                    continue;
                }
                if bundle.is_fully_present(current_lab_codes, current_drug_names) {
                    tracing::debug!(bundle_id = %bundle.id, "bundle already fully ordered");
                    continue;
                }
                suggestions.push(bundle);
            }
        }

        suggestions
    }
}
