// crates/orderlake-core/src/status.rs

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The canonical status taxonomy used by the gold aggregation buckets.
///
/// Raw statuses that do not map onto one of these values are NOT errors:
/// they pass through `normalize` unchanged and surface in aggregation as
/// visibly uncategorized strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalStatus {
    Delivered,
    Cancelled,
    Returned,
    Failed,
}

impl CanonicalStatus {
    pub const ALL: [CanonicalStatus; 4] = [
        CanonicalStatus::Delivered,
        CanonicalStatus::Cancelled,
        CanonicalStatus::Returned,
        CanonicalStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::Delivered => "Delivered",
            CanonicalStatus::Cancelled => "Cancelled",
            CanonicalStatus::Returned => "Returned",
            CanonicalStatus::Failed => "Failed",
        }
    }

    /// Column name of the per-status count in the metrics tables.
    pub fn metric_column(&self) -> &'static str {
        match self {
            CanonicalStatus::Delivered => "delivered",
            CanonicalStatus::Cancelled => "cancelled",
            CanonicalStatus::Returned => "returned",
            CanonicalStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static DEFAULT_STATUS_MAPPING: Lazy<BTreeMap<String, String>> = Lazy::new(|| {
    [
        ("Delivered", "Delivered"),
        ("Completed", "Delivered"),
        ("Done", "Delivered"),
        ("Cancel by cust.", "Cancelled"),
        ("Cancelled", "Cancelled"),
        ("Canceled", "Cancelled"),
        ("Returned", "Returned"),
        ("Return", "Returned"),
        ("Refunded", "Returned"),
        ("Failed delivery", "Failed"),
        ("Failed", "Failed"),
        ("Delivery Failed", "Failed"),
    ]
    .into_iter()
    .map(|(raw, canonical)| (raw.to_string(), canonical.to_string()))
    .collect()
});

/// The mapping shipped with the tool, used when no config file is present.
pub fn default_status_mapping() -> BTreeMap<String, String> {
    DEFAULT_STATUS_MAPPING.clone()
}

/// A raw-status to canonical-status lookup table with an identity fallback.
#[derive(Debug, Clone)]
pub struct StatusMapping {
    mapping: BTreeMap<String, String>,
}

impl StatusMapping {
    pub fn new(mapping: BTreeMap<String, String>) -> Self {
        Self { mapping }
    }

    /// Null stays null, a mapped value becomes its canonical form, and an
    /// unmapped value is returned unchanged.
    pub fn normalize(&self, raw: Option<&str>) -> Option<String> {
        raw.map(|value| {
            self.mapping
                .get(value)
                .cloned()
                .unwrap_or_else(|| value.to_string())
        })
    }

    /// Appends a `Status_Normalized` column derived from `Status`.
    /// Frames without a `Status` column are returned untouched.
    pub fn normalize_column(&self, df: DataFrame) -> Result<DataFrame> {
        if df.column("Status").is_err() {
            return Ok(df);
        }

        let status = df.column("Status")?.str()?;
        let normalized: Vec<Option<String>> = status
            .into_iter()
            .map(|raw| self.normalize(raw))
            .collect();

        let mut out = df.clone();
        out.with_column(Series::new("Status_Normalized".into(), normalized))?;
        Ok(out)
    }
}

impl Default for StatusMapping {
    fn default() -> Self {
        Self::new(default_status_mapping())
    }
}
