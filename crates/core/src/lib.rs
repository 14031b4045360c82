//! # HMO Core
//!
//! Coverage and pricing rules for clinic billing under HMO (insurer) plans.
//!
//! This crate contains pure, synchronous rule evaluation over in-memory reference data:
//! - price resolution per payer ([`pricing`])
//! - coverage-tier calculation and bill-wide aggregation ([`coverage`], [`billing`])
//! - insurance claim building ([`claims`])
//! - insurer clinical-documentation alerts ([`alerts`])
//! - drug–lab conflict detection ([`conflicts`])
//! - protocol bundle suggestions ([`bundles`])
//! - episode lifecycle ([`episode`])
//!
//! Reference data can be loaded from a YAML file with [`catalog::Catalog`].
//!
//! **No I/O in the rules**: only catalog loading and configuration resolution touch the
//! filesystem. Presentation, persistence and transport belong to the callers.

pub mod alerts;
pub mod billing;
pub mod bundles;
pub mod catalog;
pub mod claims;
pub mod config;
pub mod conflicts;
pub mod constants;
pub mod coverage;
pub mod episode;
pub mod error;
pub mod pricing;
pub mod validation;

pub use catalog::Catalog;
pub use config::CoreConfig;
pub use error::{HmoError, HmoResult};

pub use hmo_types::{Amount, NonEmptyText};
