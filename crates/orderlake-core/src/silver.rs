// crates/orderlake-core/src/silver.rs
//
// Silver layer: cleaning and validation. Re-reads one source's bronze
// partitions from disk, normalizes statuses, trims strings, drops invalid
// rows, and persists the schema-aligned result.

use polars::prelude::*;
use tracing::warn;

use crate::bronze::CANONICAL_COLUMNS;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::report::LayerReport;
use crate::status::StatusMapping;
use crate::store::{load_partitions, save_partitioned};

/// Per-channel validation hook. Implementations may only narrow the row
/// set beyond the base validation; they must never resurrect a row the
/// base rules already dropped.
pub trait SilverAdapter {
    fn name(&self) -> &'static str;

    fn validate(&self, df: DataFrame) -> Result<DataFrame> {
        Ok(df)
    }
}

pub struct DefaultSilver;

impl SilverAdapter for DefaultSilver {
    fn name(&self) -> &'static str {
        "default"
    }
}

/// Marketplace exports contain sentinel test orders that must not reach
/// aggregation.
pub struct MarketplaceSilver;

impl SilverAdapter for MarketplaceSilver {
    fn name(&self) -> &'static str {
        "marketplace"
    }

    fn validate(&self, df: DataFrame) -> Result<DataFrame> {
        if df.column("Order ID").is_err() {
            return Ok(df);
        }
        // Null order ids are kept; only the TEST prefix marks a sentinel.
        let out = df
            .lazy()
            .filter(
                col("Order ID")
                    .is_null()
                    .or(col("Order ID").str().starts_with(lit("TEST")).not()),
            )
            .collect()?;
        Ok(out)
    }
}

pub struct StorefrontSilver;

impl SilverAdapter for StorefrontSilver {
    fn name(&self) -> &'static str {
        "storefront"
    }
}

pub fn silver_adapter_for(source: &str) -> Box<dyn SilverAdapter> {
    let key = source.to_ascii_lowercase();
    if key == "marketplace" {
        Box::new(MarketplaceSilver)
    } else if key.starts_with("storefront") {
        Box::new(StorefrontSilver)
    } else {
        Box::new(DefaultSilver)
    }
}

pub fn run_silver(config: &PipelineConfig, source: &str) -> Result<LayerReport> {
    let adapter = silver_adapter_for(source);
    let bronze_dir = config.bronze_dir(source);
    let df = load_partitions(&bronze_dir, config.output.format)?;

    if df.height() == 0 {
        warn!("no bronze data found in {}", bronze_dir.display());
        return Ok(LayerReport::completed(
            0,
            0,
            vec![format!("no bronze data found in {}", bronze_dir.display())],
        ));
    }

    let mapping = config.status_mapping();
    let df = mapping.normalize_column(df)?;
    let df = trim_string_columns(df)?;

    let before = df.height();
    let df = validate_base(df)?;
    let df = adapter.validate(df)?;
    let invalid_rows = before - df.height();

    let df = project_canonical(df)?;

    let report = save_partitioned(&df, &config.silver_dir(source), config.output.format)?;
    Ok(LayerReport::completed(
        report.rows_written,
        invalid_rows + report.rows_dropped,
        Vec::new(),
    ))
}

/// Strips surrounding whitespace from every string column.
pub fn trim_string_columns(df: DataFrame) -> Result<DataFrame> {
    let mut out = df.clone();
    for column in df.get_columns() {
        if column.dtype() != &DataType::String {
            continue;
        }
        let trimmed: Vec<Option<&str>> = column
            .str()?
            .into_iter()
            .map(|value| value.map(str::trim))
            .collect();
        out.with_column(Series::new(column.name().clone(), trimmed))?;
    }
    Ok(out)
}

/// Base validation: rows without a date (and therefore without a partition
/// key) are invalid past this layer.
fn validate_base(df: DataFrame) -> Result<DataFrame> {
    let mut predicates: Vec<Expr> = Vec::new();
    if df.column("Date").is_ok() {
        predicates.push(col("Date").is_not_null());
    }
    if df.column("Year").is_ok() {
        predicates.push(col("Year").is_not_null());
    }
    let Some(filter) = predicates.into_iter().reduce(|acc, e| acc.and(e)) else {
        return Ok(df);
    };
    Ok(df.lazy().filter(filter).collect()?)
}

/// Projects to the canonical column set followed by any extra columns,
/// dropping internal (underscore-prefixed) bookkeeping columns.
fn project_canonical(df: DataFrame) -> Result<DataFrame> {
    let names = df.get_column_names();
    let mut selection: Vec<String> = CANONICAL_COLUMNS
        .iter()
        .copied()
        .filter(|canonical| names.iter().any(|n| n.as_str() == *canonical))
        .map(str::to_string)
        .collect();

    for name in &names {
        let name = name.as_str();
        if !CANONICAL_COLUMNS.contains(&name) && !name.starts_with('_') {
            selection.push(name.to_string());
        }
    }

    Ok(df.select(selection)?)
}
