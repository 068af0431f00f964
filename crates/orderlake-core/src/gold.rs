// crates/orderlake-core/src/gold.rs
//
// Gold layer: cross-source combination plus the pre-aggregated metrics
// tables that form the dashboard's read path. Both metrics tables are
// recomputed in full from the combined dataset on every run; they are
// never patched incrementally.

use std::path::Path;

use polars::prelude::*;
use tracing::warn;

use crate::bronze::CANONICAL_COLUMNS;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::report::LayerReport;
use crate::status::CanonicalStatus;
use crate::store::{concat_diagonal, load_partitions, save_partitioned, write_frame, OutputFormat};

pub const COMBINED_SUBDIR: &str = "all_sources";
pub const METRICS_SUBDIR: &str = "metrics";
pub const MONTHLY_METRICS_FILE: &str = "monthly_by_source";
pub const REASONS_FILE: &str = "cancellation_reasons";

/// Synthetic source label for the all-sources aggregate rows.
pub const ALL_SOURCES_LABEL: &str = "All";

pub fn monthly_metrics_path(gold_dir: &Path, format: OutputFormat) -> std::path::PathBuf {
    gold_dir
        .join(METRICS_SUBDIR)
        .join(format!("{MONTHLY_METRICS_FILE}.{}", format.extension()))
}

pub fn reasons_path(gold_dir: &Path, format: OutputFormat) -> std::path::PathBuf {
    gold_dir
        .join(METRICS_SUBDIR)
        .join(format!("{REASONS_FILE}.{}", format.extension()))
}

pub fn run_gold(config: &PipelineConfig, sources: &[String]) -> Result<LayerReport> {
    let format = config.output.format;
    let mut frames: Vec<LazyFrame> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    for source in sources {
        let silver_dir = config.silver_dir(source);
        let df = load_partitions(&silver_dir, format)?;
        if df.height() == 0 {
            warn!("source {source}: no silver data, skipped in gold union");
            warnings.push(format!("source {source}: no silver data"));
            continue;
        }
        frames.push(df.lazy());
    }

    if frames.is_empty() {
        warn!("gold layer has no input data");
        warnings.push("no silver data found for any source".to_string());
        return Ok(LayerReport::completed(0, 0, warnings));
    }

    let combined = concat_diagonal(frames)?.collect()?;
    let combined = backfill_canonical_columns(combined)?;
    let combined = combined.sort(
        ["Date"],
        SortMultipleOptions::default().with_maintain_order(true),
    )?;

    let gold_dir = config.gold_dir();
    let report = save_partitioned(&combined, &gold_dir.join(COMBINED_SUBDIR), format)?;

    let metrics = monthly_by_source(&combined)?;
    write_frame(&metrics, &monthly_metrics_path(&gold_dir, format), format)?;

    let reasons = cancellation_reasons(&combined)?;
    write_frame(&reasons, &reasons_path(&gold_dir, format), format)?;

    Ok(LayerReport::completed(
        report.rows_written,
        report.rows_dropped,
        warnings,
    ))
}

/// Any canonical column missing from the union is backfilled with null so
/// downstream consumers see a stable schema.
fn backfill_canonical_columns(df: DataFrame) -> Result<DataFrame> {
    let names = df.get_column_names();
    let missing: Vec<Expr> = CANONICAL_COLUMNS
        .iter()
        .copied()
        .filter(|canonical| !names.iter().any(|n| n.as_str() == *canonical))
        .map(|canonical| lit(NULL).alias(canonical))
        .collect();

    if missing.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(missing).collect()?)
}

/// Monthly order counts and rates per source, plus the synthetic "All"
/// group covering every source combined.
///
/// Group-by only ever emits groups with at least one row, so total_orders
/// is strictly positive and the rates never divide by zero.
pub fn monthly_by_source(df: &DataFrame) -> Result<DataFrame> {
    let per_source = df
        .clone()
        .lazy()
        .group_by([col("Source"), col("Year"), col("Month")])
        .agg(status_count_exprs())
        .collect()?;

    let all_sources = df
        .clone()
        .lazy()
        .group_by([col("Year"), col("Month")])
        .agg(status_count_exprs())
        .with_column(lit(ALL_SOURCES_LABEL).alias("Source"))
        .select(metric_column_order())
        .collect()?;

    let mut metrics = per_source.vstack(&all_sources)?;
    metrics = metrics.sort(
        ["Source", "Year", "Month"],
        SortMultipleOptions::default().with_maintain_order(true),
    )?;

    add_rates(metrics)
}

fn status_count_exprs() -> Vec<Expr> {
    let mut exprs = vec![len().cast(DataType::Int64).alias("total_orders")];
    for status in CanonicalStatus::ALL {
        exprs.push(
            col("Status_Normalized")
                .eq(lit(status.as_str()))
                .sum()
                .cast(DataType::Int64)
                .alias(status.metric_column()),
        );
    }
    exprs
}

fn metric_column_order() -> Vec<Expr> {
    let mut order = vec![col("Source"), col("Year"), col("Month"), col("total_orders")];
    for status in CanonicalStatus::ALL {
        order.push(col(status.metric_column()));
    }
    order
}

/// Appends delivery_rate and cancel_rate (percentages, one decimal).
fn add_rates(metrics: DataFrame) -> Result<DataFrame> {
    let totals = metrics.column("total_orders")?.i64()?;
    let delivered = metrics.column("delivered")?.i64()?;
    let cancelled = metrics.column("cancelled")?.i64()?;

    let mut delivery_rate: Vec<Option<f64>> = Vec::with_capacity(metrics.height());
    let mut cancel_rate: Vec<Option<f64>> = Vec::with_capacity(metrics.height());

    for idx in 0..metrics.height() {
        match totals.get(idx) {
            Some(total) if total > 0 => {
                delivery_rate.push(delivered.get(idx).map(|d| rate(d, total)));
                cancel_rate.push(cancelled.get(idx).map(|c| rate(c, total)));
            }
            _ => {
                delivery_rate.push(None);
                cancel_rate.push(None);
            }
        }
    }

    let mut out = metrics.clone();
    out.with_column(Series::new("delivery_rate".into(), delivery_rate))?;
    out.with_column(Series::new("cancel_rate".into(), cancel_rate))?;
    Ok(out)
}

fn rate(count: i64, total: i64) -> f64 {
    (count as f64 / total as f64 * 100.0 * 10.0).round() / 10.0
}

/// Cancellation reason counts per month, restricted to Cancelled rows with
/// a non-null reason, most frequent reasons first within each month.
pub fn cancellation_reasons(df: &DataFrame) -> Result<DataFrame> {
    let reasons = df
        .clone()
        .lazy()
        .filter(
            col("Status_Normalized")
                .eq(lit(CanonicalStatus::Cancelled.as_str()))
                .and(col("Reason Cancelled").is_not_null()),
        )
        .group_by([col("Year"), col("Month"), col("Reason Cancelled")])
        .agg([len().cast(DataType::Int64).alias("count")])
        .sort(
            ["Year", "Month", "count", "Reason Cancelled"],
            SortMultipleOptions::default()
                .with_order_descending_multi([false, false, true, false])
                .with_maintain_order(true),
        )
        .collect()?;
    Ok(reasons)
}
