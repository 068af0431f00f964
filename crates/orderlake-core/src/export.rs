// crates/orderlake-core/src/export.rs
//
// Dashboard export: flattens the gold metrics tables into a single JSON
// document the static dashboard reads. The exporter only reads gold
// output; it never recomputes metrics from row-level data.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use polars::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::gold::{monthly_metrics_path, reasons_path, ALL_SOURCES_LABEL};
use crate::store::{read_frame, OutputFormat};

/// One month of the all-sources trend line.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyEntry {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: i32,
    pub total_orders: i64,
    pub delivered: i64,
    pub cancelled: i64,
    pub returned: i64,
    pub failed: i64,
}

/// One (source, month) metrics row, including the synthetic "All" source.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsEntry {
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: i32,
    pub total_orders: i64,
    pub delivered: i64,
    pub cancelled: i64,
    pub returned: i64,
    pub failed: i64,
    pub delivery_rate: Option<f64>,
    pub cancel_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReasonEntry {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: i32,
    #[serde(rename = "Reason")]
    pub reason: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub monthly: Vec<MonthlyEntry>,
    pub metrics: Vec<MetricsEntry>,
    pub reasons: Vec<ReasonEntry>,
    pub sources: Vec<String>,
}

/// Reads the gold metrics tables and writes the dashboard JSON document.
///
/// A missing monthly metrics table is an error (nothing to chart); a
/// missing reasons table only empties the reasons panel.
pub fn export_dashboard_json(
    gold_dir: &Path,
    format: OutputFormat,
    out_path: &Path,
) -> Result<Dashboard> {
    let metrics_path = monthly_metrics_path(gold_dir, format);
    if !metrics_path.exists() {
        return Err(PipelineError::Validation(format!(
            "gold metrics not found at {}; run the pipeline first",
            metrics_path.display()
        )));
    }
    let metrics_df = with_metric_dtypes(read_frame(&metrics_path, format)?)?;

    let reasons_file = reasons_path(gold_dir, format);
    let reasons_df = if reasons_file.exists() {
        Some(with_metric_dtypes(read_frame(&reasons_file, format)?)?)
    } else {
        warn!(
            "reasons table not found at {}, exporting empty reasons",
            reasons_file.display()
        );
        None
    };

    let metrics = metric_entries(&metrics_df)?;
    let monthly = metrics
        .iter()
        .filter(|entry| entry.source == ALL_SOURCES_LABEL)
        .map(|entry| MonthlyEntry {
            year: entry.year,
            month: entry.month,
            total_orders: entry.total_orders,
            delivered: entry.delivered,
            cancelled: entry.cancelled,
            returned: entry.returned,
            failed: entry.failed,
        })
        .collect();

    let sources: Vec<String> = metrics
        .iter()
        .filter(|entry| entry.source != ALL_SOURCES_LABEL)
        .map(|entry| entry.source.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let reasons = match &reasons_df {
        Some(df) => reason_entries(df)?,
        None => Vec::new(),
    };

    let dashboard = Dashboard {
        monthly,
        metrics,
        reasons,
        sources,
    };

    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(out_path)?;
    serde_json::to_writer_pretty(file, &dashboard)?;
    Ok(dashboard)
}

/// Pins the dtypes the entry builders expect. CSV round-trips widen the
/// integer columns to i64 and this keeps both formats on one code path.
fn with_metric_dtypes(df: DataFrame) -> Result<DataFrame> {
    let expected: [(&str, DataType); 9] = [
        ("Year", DataType::Int32),
        ("Month", DataType::Int32),
        ("total_orders", DataType::Int64),
        ("delivered", DataType::Int64),
        ("cancelled", DataType::Int64),
        ("returned", DataType::Int64),
        ("failed", DataType::Int64),
        ("count", DataType::Int64),
        ("delivery_rate", DataType::Float64),
    ];

    let mut casts = Vec::new();
    for (name, dtype) in expected {
        if df.column(name).is_ok() {
            casts.push(col(name).cast(dtype));
        }
    }
    if df.column("cancel_rate").is_ok() {
        casts.push(col("cancel_rate").cast(DataType::Float64));
    }
    if casts.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(casts).collect()?)
}

fn metric_entries(df: &DataFrame) -> Result<Vec<MetricsEntry>> {
    let source = df.column("Source")?.str()?;
    let year = df.column("Year")?.i32()?;
    let month = df.column("Month")?.i32()?;
    let total = df.column("total_orders")?.i64()?;
    let delivered = df.column("delivered")?.i64()?;
    let cancelled = df.column("cancelled")?.i64()?;
    let returned = df.column("returned")?.i64()?;
    let failed = df.column("failed")?.i64()?;
    let delivery_rate = df.column("delivery_rate")?.f64()?;
    let cancel_rate = df.column("cancel_rate")?.f64()?;

    let mut entries = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let (Some(year), Some(month)) = (year.get(idx), month.get(idx)) else {
            continue;
        };
        entries.push(MetricsEntry {
            source: source.get(idx).unwrap_or_default().to_string(),
            year,
            month,
            total_orders: total.get(idx).unwrap_or(0),
            delivered: delivered.get(idx).unwrap_or(0),
            cancelled: cancelled.get(idx).unwrap_or(0),
            returned: returned.get(idx).unwrap_or(0),
            failed: failed.get(idx).unwrap_or(0),
            delivery_rate: delivery_rate.get(idx),
            cancel_rate: cancel_rate.get(idx),
        });
    }
    Ok(entries)
}

fn reason_entries(df: &DataFrame) -> Result<Vec<ReasonEntry>> {
    let year = df.column("Year")?.i32()?;
    let month = df.column("Month")?.i32()?;
    let reason = df.column("Reason Cancelled")?.str()?;
    let count = df.column("count")?.i64()?;

    let mut entries = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let (Some(year), Some(month), Some(reason)) =
            (year.get(idx), month.get(idx), reason.get(idx))
        else {
            continue;
        };
        entries.push(ReasonEntry {
            year,
            month,
            reason: reason.to_string(),
            count: count.get(idx).unwrap_or(0),
        });
    }
    Ok(entries)
}
