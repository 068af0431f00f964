use std::path::Path;

use orderlake_core::export::export_dashboard_json;
use orderlake_core::gold::{monthly_metrics_path, reasons_path};
use orderlake_core::store::{write_frame, OutputFormat};
use polars::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn seed_metrics(gold_dir: &Path, format: OutputFormat) {
    let metrics = df!(
        "Source" => ["All", "Alpha", "Beta"],
        "Year" => [2024i32, 2024, 2024],
        "Month" => [3i32, 3, 3],
        "total_orders" => [6i64, 4, 2],
        "delivered" => [5i64, 3, 2],
        "cancelled" => [1i64, 1, 0],
        "returned" => [0i64, 0, 0],
        "failed" => [0i64, 0, 0],
        "delivery_rate" => [83.3f64, 75.0, 100.0],
        "cancel_rate" => [16.7f64, 25.0, 0.0],
    )
    .unwrap();
    write_frame(&metrics, &monthly_metrics_path(gold_dir, format), format).unwrap();
}

fn seed_reasons(gold_dir: &Path, format: OutputFormat) {
    let reasons = df!(
        "Year" => [2024i32],
        "Month" => [3i32],
        "Reason Cancelled" => ["Changed mind"],
        "count" => [1i64],
    )
    .unwrap();
    write_frame(&reasons, &reasons_path(gold_dir, format), format).unwrap();
}

#[test]
fn dashboard_document_has_the_four_panels() {
    let root = tempdir().unwrap();
    let gold_dir = root.path().join("gold");
    seed_metrics(&gold_dir, OutputFormat::Parquet);
    seed_reasons(&gold_dir, OutputFormat::Parquet);

    let out = root.path().join("dashboard/data.json");
    export_dashboard_json(&gold_dir, OutputFormat::Parquet, &out).unwrap();

    let document: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();

    // monthly holds only the all-sources rows, without a Source key.
    let monthly = document["monthly"].as_array().unwrap();
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly[0]["Year"], 2024);
    assert_eq!(monthly[0]["total_orders"], 6);
    assert!(monthly[0].get("Source").is_none());

    // metrics keeps every row, including the All group and the rates.
    let metrics = document["metrics"].as_array().unwrap();
    assert_eq!(metrics.len(), 3);
    assert_eq!(metrics[1]["Source"], "Alpha");
    assert_eq!(metrics[1]["delivery_rate"], 75.0);

    let reasons = document["reasons"].as_array().unwrap();
    assert_eq!(reasons.len(), 1);
    assert_eq!(reasons[0]["Reason"], "Changed mind");
    assert_eq!(reasons[0]["count"], 1);

    // The source list is sorted and excludes the synthetic All group.
    let sources = document["sources"].as_array().unwrap();
    let sources: Vec<_> = sources.iter().map(|s| s.as_str().unwrap()).collect();
    assert_eq!(sources, vec!["Alpha", "Beta"]);
}

#[test]
fn missing_metrics_table_is_an_error() {
    let root = tempdir().unwrap();
    let gold_dir = root.path().join("gold");
    let out = root.path().join("data.json");

    assert!(export_dashboard_json(&gold_dir, OutputFormat::Parquet, &out).is_err());
    assert!(!out.exists());
}

#[test]
fn missing_reasons_table_exports_an_empty_panel() {
    let root = tempdir().unwrap();
    let gold_dir = root.path().join("gold");
    seed_metrics(&gold_dir, OutputFormat::Parquet);

    let out = root.path().join("data.json");
    let dashboard = export_dashboard_json(&gold_dir, OutputFormat::Parquet, &out).unwrap();
    assert!(dashboard.reasons.is_empty());

    let document: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(document["reasons"].as_array().unwrap().len(), 0);
}

#[test]
fn csv_metrics_export_the_same_document() {
    let root = tempdir().unwrap();
    let gold_dir = root.path().join("gold");
    seed_metrics(&gold_dir, OutputFormat::Csv);
    seed_reasons(&gold_dir, OutputFormat::Csv);

    let out = root.path().join("data.json");
    let dashboard = export_dashboard_json(&gold_dir, OutputFormat::Csv, &out).unwrap();

    assert_eq!(dashboard.monthly.len(), 1);
    assert_eq!(dashboard.metrics.len(), 3);
    assert_eq!(dashboard.sources, vec!["Alpha", "Beta"]);
}
