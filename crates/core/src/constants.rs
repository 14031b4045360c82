//! Constants used throughout the HMO core crate.

/// Directory searched for the reference catalog when no explicit path is configured.
pub const DEFAULT_CATALOG_DIR: &str = "catalog";

/// Filename of the YAML reference catalog.
pub const CATALOG_FILENAME: &str = "catalog.yaml";

/// Days an episode stays open before it becomes eligible for auto-completion.
pub const DEFAULT_EPISODE_DURATION_DAYS: i64 = 7;

/// Longest configurable episode, in days.
pub const MAX_EPISODE_DURATION_DAYS: i64 = 3_650;

/// Reported when a clinical rule targets a vital sign that was not captured.
pub const NOT_RECORDED: &str = "Not recorded";

/// Reported when a required lab test is on the order list.
pub const LAB_PRESENT: &str = "Present";

/// Reported when a required lab test is missing from the order list.
pub const LAB_NOT_ORDERED: &str = "Not ordered";

/// Reported for prescription rules, which have no checks yet.
pub const NOT_APPLICABLE: &str = "N/A";
