//! YAML reference catalog.
//!
//! All reference data the rule functions consume can be kept in a single YAML file:
//!
//! ```yaml
//! providers: [...]        # HmoProvider
//! catalogItems: [...]     # CatalogItem
//! servicePrices: [...]    # ServicePrice
//! coverageRules: [...]    # ServiceCoverageRule
//! hmoRules: [...]         # HmoRule
//! conflictRules: [...]    # ConflictRule
//! bundles: [...]          # ProtocolBundle
//! ```
//!
//! Every section is optional. Unknown keys are rejected and schema errors report the
//! path to the failing field (for example `coverageRules[2].coverageType`).

use crate::alerts::HmoRule;
use crate::bundles::{BundleCatalog, ProtocolBundle};
use crate::conflicts::ConflictRule;
use crate::coverage::{CoverageRuleBook, ServiceCoverageRule};
use crate::error::{HmoError, HmoResult};
use crate::pricing::{CatalogItem, HmoProvider, PriceBook, ServicePrice};
use crate::validation::validate_coverage_rule;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// On-disk shape of the catalog file.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CatalogWire {
    #[serde(default)]
    providers: Vec<HmoProvider>,
    #[serde(default)]
    catalog_items: Vec<CatalogItem>,
    #[serde(default)]
    service_prices: Vec<ServicePrice>,
    #[serde(default)]
    coverage_rules: Vec<ServiceCoverageRule>,
    #[serde(default)]
    hmo_rules: Vec<HmoRule>,
    #[serde(default)]
    conflict_rules: Vec<ConflictRule>,
    #[serde(default)]
    bundles: Vec<ProtocolBundle>,
}

/// Loaded, validated reference data with typed lookup tables.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub prices: PriceBook,
    pub coverage: CoverageRuleBook,
    pub hmo_rules: Vec<HmoRule>,
    pub conflict_rules: Vec<ConflictRule>,
    pub bundles: BundleCatalog,
}

impl Catalog {
    /// Parses and validates catalog YAML.
    ///
    /// # Errors
    ///
    /// - [`HmoError::CatalogSchema`] if the YAML does not match the schema
    /// - [`HmoError::InvalidCoverageRule`] if a coverage rule breaks its invariants
    /// - [`HmoError::DuplicateCatalogEntry`] for repeated provider, coverage rule,
    ///   clinical rule or bundle ids
    pub fn parse(yaml_text: &str) -> HmoResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let wire: CatalogWire = match serde_path_to_error::deserialize(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                return Err(HmoError::CatalogSchema {
                    path: if path.is_empty() || path == "." {
                        "<root>".to_string()
                    } else {
                        path
                    },
                    message: source.to_string(),
                });
            }
        };

        wire_to_domain(wire)
    }

    /// Reads and parses the catalog file at `path`.
    pub fn load(path: &Path) -> HmoResult<Self> {
        let text = std::fs::read_to_string(path).map_err(HmoError::CatalogRead)?;
        let catalog = Self::parse(&text)?;
        tracing::info!(
            path = %path.display(),
            coverage_rules = catalog.coverage.len(),
            hmo_rules = catalog.hmo_rules.len(),
            conflict_rules = catalog.conflict_rules.len(),
            bundles = catalog.bundles.bundles().len(),
            "loaded catalog"
        );
        Ok(catalog)
    }
}

fn ensure_unique<'a>(kind: &'static str, ids: impl IntoIterator<Item = &'a str>) -> HmoResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(HmoError::DuplicateCatalogEntry {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn wire_to_domain(wire: CatalogWire) -> HmoResult<Catalog> {
    ensure_unique("provider", wire.providers.iter().map(|p| p.id.as_str()))?;
    ensure_unique("coverage rule", wire.coverage_rules.iter().map(|r| r.id.as_str()))?;
    ensure_unique("clinical rule", wire.hmo_rules.iter().map(|r| r.id.as_str()))?;
    ensure_unique("bundle", wire.bundles.iter().map(|b| b.id.as_str()))?;

    for rule in &wire.coverage_rules {
        validate_coverage_rule(rule)?;
    }

    Ok(Catalog {
        prices: PriceBook::new(wire.catalog_items, wire.service_prices, wire.providers),
        coverage: CoverageRuleBook::new(wire.coverage_rules),
        hmo_rules: wire.hmo_rules,
        conflict_rules: wire.conflict_rules,
        bundles: BundleCatalog::new(wire.bundles),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::HmoItemStatus;
    use crate::pricing::{CoverageStatus, PayerType, PriceQuery, ServiceCategory};
    use std::io::Write;

    const SAMPLE: &str = r#"
providers:
  - id: hmo-hygeia
    name: Hygeia HMO
    defaultCopay: 1000
servicePrices:
  - itemId: consult-gp
    category: consultation
    standardPrice: 5000
    hmoPrices:
      hmo-hygeia: 4000
coverageRules:
  - id: cov-1
    serviceId: consult-gp
    hmoProviderId: hmo-hygeia
    coverageType: partial_percent
    coveragePercentage: 80
    maxCoveredAmount: 7000
hmoRules:
  - id: fever-temp
    hmoProviderId: hmo-hygeia
    ruleField: temperature
    condition: gte
    value: 37.5
    icdCodesApplicable: [B50, B54]
    severity: critical
    message: Temperature must be documented for malaria claims
conflictRules:
  - drugNamePattern: artemether
    conflictingLabTestCode: MP
    conflictingLabResult: negative
    description: Antimalarial despite negative malaria test
bundles:
  - id: malaria
    name: Uncomplicated malaria
    icd10Codes: [B54]
    labTests:
      - testCode: MP
    medications:
      - drugName: Artemether/Lumefantrine
"#;

    #[test]
    fn parses_sample_catalog() {
        let catalog = Catalog::parse(SAMPLE).expect("parse catalog");

        let outcome = catalog.coverage.calculate("consult-gp", "hmo-hygeia", 10_000);
        assert_eq!(outcome.hmo_covered_amount, 7_000);
        assert_eq!(outcome.hmo_status, HmoItemStatus::Partial);
        assert!(outcome.rule_id.is_some());

        let price = catalog.prices.resolve(&PriceQuery {
            item_id: "consult-gp".into(),
            item_name: "GP consultation".into(),
            category: ServiceCategory::Consultation,
            payer_type: PayerType::Hmo,
            hmo_provider_id: Some("hmo-hygeia".into()),
        });
        assert_eq!(price.patient_liability, 1_000);
        assert_eq!(price.hmo_liability, 3_000);
        assert_eq!(price.coverage_status, CoverageStatus::Partial);

        assert_eq!(catalog.hmo_rules.len(), 1);
        assert_eq!(catalog.conflict_rules.len(), 1);
        assert!(catalog.bundles.get("malaria").is_some());
    }

    #[test]
    fn shipped_catalog_is_valid() {
        let catalog = Catalog::parse(include_str!("../../../catalog/catalog.yaml"))
            .expect("shipped catalog parses");

        let mri = catalog.coverage.calculate("img-mri-brain", "hmo-hygeia", 120_000);
        assert_eq!(mri.hmo_covered_amount, 70_000);
        assert_eq!(mri.patient_liability_amount, 50_000);
        assert!(mri.requires_pre_auth);

        let price = catalog.prices.resolve(&PriceQuery {
            item_id: "img-mri-brain".into(),
            item_name: "MRI brain".into(),
            category: ServiceCategory::Imaging,
            payer_type: PayerType::Cash,
            hmo_provider_id: None,
        });
        assert_eq!(price.standard_price, 120_000);
        assert!(price.is_premium && price.is_restricted);
    }

    #[test]
    fn empty_document_is_an_empty_catalog() {
        let catalog = Catalog::parse("{}").expect("parse empty");
        assert!(catalog.coverage.is_empty());
        assert!(catalog.hmo_rules.is_empty());
    }

    #[test]
    fn rejects_unknown_keys_with_path() {
        let input = "\
coverageRules:
  - id: c
    serviceId: s
    hmoProviderId: h
    coverageType: full
    colour: blue
";
        match Catalog::parse(input).expect_err("unknown key") {
            HmoError::CatalogSchema { path, message } => {
                assert!(path.starts_with("coverageRules"), "path was {path}");
                assert!(message.contains("colour"));
            }
            other => panic!("expected CatalogSchema, got {other:?}"),
        }
    }

    #[test]
    fn rejects_wrong_enum_value_with_path() {
        let input = "\
coverageRules:
  - id: c
    serviceId: s
    hmoProviderId: h
    coverageType: most
";
        match Catalog::parse(input).expect_err("bad enum") {
            HmoError::CatalogSchema { path, .. } => {
                assert_eq!(path, "coverageRules[0].coverageType");
            }
            other => panic!("expected CatalogSchema, got {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_coverage_rule() {
        let input = "\
coverageRules:
  - id: c
    serviceId: s
    hmoProviderId: h
    coverageType: partial_flat
";
        assert!(matches!(
            Catalog::parse(input),
            Err(HmoError::InvalidCoverageRule { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let input = "providers:\n  - {id: a, name: A}\n  - {id: a, name: B}\n";
        match Catalog::parse(input).expect_err("duplicate") {
            HmoError::DuplicateCatalogEntry { kind, id } => {
                assert_eq!(kind, "provider");
                assert_eq!(id, "a");
            }
            other => panic!("expected DuplicateCatalogEntry, got {other:?}"),
        }
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write catalog");
        let catalog = Catalog::load(file.path()).expect("load catalog");
        assert_eq!(catalog.coverage.len(), 1);

        let missing = Catalog::load(Path::new("/definitely/not/here.yaml"));
        assert!(matches!(missing, Err(HmoError::CatalogRead(_))));
    }
}
