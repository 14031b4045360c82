//! Price resolution per payer.
//!
//! A [`PriceBook`] answers "what does this item cost, and who pays for it?" for a
//! given payer. Cash and corporate payers always settle the standard price
//! themselves. HMO payers settle an insurer-specific price split into a patient
//! co-pay and an HMO share, provided the insurer has a price configured for the item.
//!
//! Missing configuration never fails: it degrades to "not covered".

use hmo_types::Amount;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Service category shared by catalog items, configured prices and bill items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Consultation,
    Laboratory,
    Pharmacy,
    Procedure,
    Imaging,
    Admission,
    Nursing,
    Other,
}

/// Who settles the bill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayerType {
    Cash,
    Hmo,
    Corporate,
}

/// Coverage outcome for a resolved price.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStatus {
    Covered,
    Partial,
    NotCovered,
}

/// An insurer and its default co-pay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HmoProvider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default_copay: Amount,
}

/// An item in the service/drug catalog with its list price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub category: ServiceCategory,
    pub default_price: Amount,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub is_restricted: bool,
    #[serde(default)]
    pub restriction_reason: Option<String>,
}

/// A price configured by the facility for an item, with optional per-insurer prices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServicePrice {
    pub item_id: String,
    pub category: ServiceCategory,
    pub standard_price: Amount,
    /// Insurer-specific prices keyed by HMO provider id.
    #[serde(default)]
    pub hmo_prices: BTreeMap<String, Amount>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub is_restricted: bool,
    #[serde(default)]
    pub restriction_reason: Option<String>,
}

/// A request to price an item for a payer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuery {
    pub item_id: String,
    pub item_name: String,
    pub category: ServiceCategory,
    pub payer_type: PayerType,
    #[serde(default)]
    pub hmo_provider_id: Option<String>,
}

/// The price of an item for a payer and the split of who pays what.
///
/// For HMO payers `patient_liability + hmo_liability == payer_price`. For cash and
/// corporate payers the patient carries the full standard price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPrice {
    pub item_id: String,
    pub item_name: String,
    pub category: ServiceCategory,
    pub standard_price: Amount,
    pub payer_price: Amount,
    pub coverage_status: CoverageStatus,
    pub patient_liability: Amount,
    pub hmo_liability: Amount,
    pub is_premium: bool,
    pub is_restricted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restriction_reason: Option<String>,
}

/// Typed lookup tables for item prices and insurers.
#[derive(Clone, Debug, Default)]
pub struct PriceBook {
    catalog: HashMap<String, CatalogItem>,
    prices: HashMap<(ServiceCategory, String), ServicePrice>,
    providers: HashMap<String, HmoProvider>,
}

impl PriceBook {
    /// Builds the lookup tables. Later entries replace earlier ones with the same key.
    pub fn new(
        catalog_items: impl IntoIterator<Item = CatalogItem>,
        service_prices: impl IntoIterator<Item = ServicePrice>,
        providers: impl IntoIterator<Item = HmoProvider>,
    ) -> Self {
        Self {
            catalog: catalog_items
                .into_iter()
                .map(|item| (item.id.clone(), item))
                .collect(),
            prices: service_prices
                .into_iter()
                .map(|price| ((price.category, price.item_id.clone()), price))
                .collect(),
            providers: providers
                .into_iter()
                .map(|provider| (provider.id.clone(), provider))
                .collect(),
        }
    }

    pub fn provider(&self, hmo_provider_id: &str) -> Option<&HmoProvider> {
        self.providers.get(hmo_provider_id)
    }

    pub fn catalog_item(&self, item_id: &str) -> Option<&CatalogItem> {
        self.catalog.get(item_id)
    }

    pub fn configured_price(
        &self,
        category: ServiceCategory,
        item_id: &str,
    ) -> Option<&ServicePrice> {
        self.prices.get(&(category, item_id.to_string()))
    }

    /// Resolves the price of an item for the payer in `query`.
    pub fn resolve(&self, query: &PriceQuery) -> ResolvedPrice {
        let configured = self.configured_price(query.category, &query.item_id);
        let catalog = self.catalog_item(&query.item_id);

        let standard_price = match (configured, catalog) {
            (Some(price), _) => price.standard_price,
            (None, Some(item)) => item.default_price,
            (None, None) => {
                tracing::debug!(
                    item_id = %query.item_id,
                    "no configured or catalog price; using 0"
                );
                0
            }
        };

        let is_premium =
            configured.is_some_and(|p| p.is_premium) || catalog.is_some_and(|c| c.is_premium);
        let is_restricted =
            configured.is_some_and(|p| p.is_restricted) || catalog.is_some_and(|c| c.is_restricted);
        let restriction_reason = [
            configured.and_then(|p| p.restriction_reason.as_deref()),
            catalog.and_then(|c| c.restriction_reason.as_deref()),
        ]
        .into_iter()
        .flatten()
        .find(|reason| !reason.trim().is_empty())
        .map(str::to_string);

        let mut resolved = ResolvedPrice {
            item_id: query.item_id.clone(),
            item_name: query.item_name.clone(),
            category: query.category,
            standard_price,
            payer_price: standard_price,
            coverage_status: CoverageStatus::NotCovered,
            patient_liability: standard_price,
            hmo_liability: 0,
            is_premium,
            is_restricted,
            restriction_reason,
        };

        if query.payer_type != PayerType::Hmo {
            return resolved;
        }

        let hmo_price = query.hmo_provider_id.as_deref().and_then(|provider_id| {
            configured.and_then(|p| p.hmo_prices.get(provider_id).copied())
        });
        let Some(hmo_price) = hmo_price else {
            tracing::debug!(
                item_id = %query.item_id,
                hmo_provider_id = ?query.hmo_provider_id,
                "no HMO price configured; treating as not covered"
            );
            return resolved;
        };

        let copay = query
            .hmo_provider_id
            .as_deref()
            .and_then(|id| self.provider(id))
            .map(|provider| provider.default_copay.max(0))
            .unwrap_or(0);

        let patient_liability = copay.min(hmo_price);
        resolved.payer_price = hmo_price;
        resolved.patient_liability = patient_liability;
        resolved.hmo_liability = hmo_price - patient_liability;
        resolved.coverage_status = if copay > 0 {
            CoverageStatus::Partial
        } else {
            CoverageStatus::Covered
        };
        resolved
    }
}
