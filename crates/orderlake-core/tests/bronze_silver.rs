use std::fs;
use std::path::Path;

use orderlake_core::bronze::{run_bronze, CANONICAL_COLUMNS};
use orderlake_core::config::PipelineConfig;
use orderlake_core::error::PipelineError;
use orderlake_core::report::LayerState;
use orderlake_core::silver::run_silver;
use orderlake_core::store::{load_partitions, read_frame, OutputFormat};
use tempfile::tempdir;

fn test_config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths.input_dir = root.join("raw");
    config.paths.output_dir = root.join("out");
    config
}

fn write_source_file(config: &PipelineConfig, source: &str, name: &str, content: &str) {
    let dir = config.paths.input_dir.join(source);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

#[test]
fn bronze_partitions_and_tags_marketplace_files() {
    let root = tempdir().unwrap();
    let config = test_config(root.path());
    write_source_file(
        &config,
        "marketplace",
        "orders_spring.csv",
        "Order ID,Date,Status,Reason Cancelled\n\
         M-1,03-05-24,Delivered,\n\
         M-2,03-07-24,Cancel by cust.,Changed mind\n\
         M-3,04-01-24,Completed,\n",
    );

    let report = run_bronze(&config, "marketplace").unwrap();
    assert_eq!(report.state, LayerState::Completed);
    assert_eq!(report.rows, 3);
    assert_eq!(report.rows_dropped, 0);

    let march = config
        .bronze_dir("marketplace")
        .join("2024/03/orders.parquet");
    let april = config
        .bronze_dir("marketplace")
        .join("2024/04/orders.parquet");
    assert!(march.exists());
    assert!(april.exists());

    let df = read_frame(&march, OutputFormat::Parquet).unwrap();
    assert_eq!(df.height(), 2);
    let sources = df.column("Source").unwrap().str().unwrap();
    assert!(sources.into_iter().all(|s| s == Some("marketplace")));
    let files = df.column("_source_file").unwrap().str().unwrap();
    assert!(files.into_iter().all(|f| f == Some("orders_spring.csv")));
}

#[test]
fn storefront_headers_are_renamed_to_canonical() {
    let root = tempdir().unwrap();
    let config = test_config(root.path());
    write_source_file(
        &config,
        "storefront_us",
        "export.csv",
        "Order No,Order Date,Order Status,Cancel Reason\n\
         W-1,2024-03-05,Shipped,\n\
         W-2,2024-03-06,Cancelled,Out of stock\n",
    );

    run_bronze(&config, "storefront_us").unwrap();
    let df = load_partitions(&config.bronze_dir("storefront_us"), OutputFormat::Parquet).unwrap();

    for name in ["Order ID", "Date", "Status", "Reason Cancelled"] {
        assert!(df.column(name).is_ok(), "missing canonical column {name}");
    }
    assert!(df.column("Order No").is_err());
}

#[test]
fn bronze_with_no_input_files_warns_instead_of_failing() {
    let root = tempdir().unwrap();
    let config = test_config(root.path());
    fs::create_dir_all(config.paths.input_dir.join("alpha")).unwrap();

    let report = run_bronze(&config, "alpha").unwrap();
    assert_eq!(report.state, LayerState::Completed);
    assert_eq!(report.rows, 0);
    assert_eq!(report.warnings.len(), 1);
}

#[test]
fn bronze_fails_when_every_file_is_unreadable() {
    let root = tempdir().unwrap();
    let config = test_config(root.path());
    write_source_file(&config, "alpha", "empty.csv", "Order ID,Date,Status\n");

    let err = run_bronze(&config, "alpha").unwrap_err();
    assert!(matches!(err, PipelineError::AllFilesFailed { .. }));
}

#[test]
fn one_bad_file_among_good_ones_is_a_warning() {
    let root = tempdir().unwrap();
    let config = test_config(root.path());
    write_source_file(
        &config,
        "alpha",
        "good.csv",
        "Order ID,Date,Status,Reason Cancelled\nA-1,03-05-24,Delivered,\n",
    );
    write_source_file(&config, "alpha", "header_only.csv", "Order ID,Date,Status\n");

    let report = run_bronze(&config, "alpha").unwrap();
    assert_eq!(report.rows, 1);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("header_only.csv")));
}

#[test]
fn undatable_rows_are_dropped_at_the_partition_boundary() {
    let root = tempdir().unwrap();
    let config = test_config(root.path());
    write_source_file(
        &config,
        "alpha",
        "orders.csv",
        "Order ID,Date,Status,Reason Cancelled\n\
         A-1,03-05-24,Delivered,\n\
         A-2,not a date,Delivered,\n\
         A-3,03-06-24,Returned,\n",
    );

    let report = run_bronze(&config, "alpha").unwrap();
    assert_eq!(report.rows, 2);
    assert_eq!(report.rows_dropped, 1);
}

#[test]
fn silver_filters_marketplace_test_orders_only() {
    let root = tempdir().unwrap();
    let config = test_config(root.path());
    let content = "Order ID,Date,Status,Reason Cancelled\n\
                   M-1,03-05-24,Delivered,\n\
                   TEST-1,03-05-24,Delivered,\n\
                   M-2,03-06-24,Returned,\n";
    write_source_file(&config, "marketplace", "orders.csv", content);
    write_source_file(&config, "alpha", "orders.csv", content);

    run_bronze(&config, "marketplace").unwrap();
    let report = run_silver(&config, "marketplace").unwrap();
    assert_eq!(report.rows, 2);
    assert_eq!(report.rows_dropped, 1);

    // The TEST prefix only means something on the marketplace channel.
    run_bronze(&config, "alpha").unwrap();
    let report = run_silver(&config, "alpha").unwrap();
    assert_eq!(report.rows, 3);
    assert_eq!(report.rows_dropped, 0);
}

#[test]
fn silver_output_is_canonical_and_hides_bookkeeping_columns() {
    let root = tempdir().unwrap();
    let config = test_config(root.path());
    write_source_file(
        &config,
        "marketplace",
        "orders.csv",
        "Order ID,Date,Status,Reason Cancelled\n\
         M-1,03-05-24,On Hold,\n\
         M-2,03-06-24,Completed,\n",
    );

    run_bronze(&config, "marketplace").unwrap();
    run_silver(&config, "marketplace").unwrap();

    let df = load_partitions(&config.silver_dir("marketplace"), OutputFormat::Parquet).unwrap();
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(names, CANONICAL_COLUMNS.to_vec());

    // Unmapped statuses pass through into the normalized column.
    let normalized = df.column("Status_Normalized").unwrap().str().unwrap();
    let mut values: Vec<_> = normalized.into_iter().flatten().collect();
    values.sort();
    assert_eq!(values, vec!["Delivered", "On Hold"]);
}

#[test]
fn silver_drops_rows_without_dates_and_reports_the_count() {
    use orderlake_core::store::{partition_path, write_frame};
    use polars::prelude::*;

    let root = tempdir().unwrap();
    let config = test_config(root.path());

    // Bronze partition seeded directly: 10 rows, two of them undated.
    let ids: Vec<String> = (1..=10).map(|i| format!("A-{i}")).collect();
    let dates: Vec<Option<&str>> = (1..=10)
        .map(|i| if i % 5 == 0 { None } else { Some("2024-03-05") })
        .collect();
    let bronze = df!(
        "Date" => dates,
        "Source" => vec!["alpha"; 10],
        "Order ID" => ids,
        "Status" => vec!["Delivered"; 10],
        "Reason Cancelled" => vec![None::<&str>; 10],
        "Year" => vec![2024i32; 10],
        "Month" => vec![3i32; 10],
    )
    .unwrap();
    let path = partition_path(&config.bronze_dir("alpha"), 2024, 3, OutputFormat::Parquet);
    write_frame(&bronze, &path, OutputFormat::Parquet).unwrap();

    let report = run_silver(&config, "alpha").unwrap();
    assert_eq!(report.rows, 8);
    assert_eq!(report.rows_dropped, 2);
}

#[test]
fn silver_with_no_bronze_data_warns_instead_of_failing() {
    let root = tempdir().unwrap();
    let config = test_config(root.path());

    let report = run_silver(&config, "alpha").unwrap();
    assert_eq!(report.state, LayerState::Completed);
    assert_eq!(report.rows, 0);
    assert_eq!(report.warnings.len(), 1);
}
