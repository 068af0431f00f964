use std::path::PathBuf;

use orderlake_core::config::PipelineConfig;
use orderlake_core::store::OutputFormat;
use tempfile::tempdir;

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let config = PipelineConfig::load(&PathBuf::from("/definitely/not/here.toml")).unwrap();
    assert_eq!(config.paths.input_dir, PathBuf::from("data/raw"));
    assert_eq!(config.output.format, OutputFormat::Parquet);
    assert!(!config.status_mapping.is_empty());
}

#[test]
fn toml_values_override_the_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("orderlake.toml");
    std::fs::write(
        &path,
        r#"
[paths]
input_dir = "exports"
output_dir = "lake"

[output]
format = "csv"

[status_mapping]
"Shipped" = "Delivered"

[sources.storefront_eu]
pattern = "*.txt"
source_name = "Storefront EU"
"#,
    )
    .unwrap();

    let config = PipelineConfig::load(&path).unwrap();
    assert_eq!(config.paths.input_dir, PathBuf::from("exports"));
    assert_eq!(config.output.format, OutputFormat::Csv);

    // A custom mapping table replaces the built-in one wholesale.
    assert_eq!(config.status_mapping.len(), 1);
    assert_eq!(
        config.status_mapping().normalize(Some("Shipped")).as_deref(),
        Some("Delivered")
    );

    assert_eq!(config.source_pattern("storefront_eu"), "*.txt");
    assert_eq!(config.source_label("storefront_eu"), "Storefront EU");
    // Sources without overrides keep the defaults.
    assert_eq!(config.source_pattern("marketplace"), "*.csv");
    assert_eq!(config.source_label("marketplace"), "marketplace");
}

#[test]
fn unknown_config_keys_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("orderlake.toml");
    std::fs::write(&path, "[paths]\ninputdir = \"typo\"\n").unwrap();

    assert!(PipelineConfig::load(&path).is_err());
}

#[test]
fn mapping_targets_outside_the_categories_are_reported() {
    let mut config = PipelineConfig::default();
    assert!(config.unknown_mapping_targets().is_empty());

    config
        .status_mapping
        .insert("Weird".to_string(), "Limbo".to_string());
    assert_eq!(config.unknown_mapping_targets(), vec!["Limbo"]);
}

#[test]
fn layer_directories_nest_under_the_output_root() {
    let config = PipelineConfig::default();
    assert_eq!(
        config.bronze_dir("Marketplace"),
        PathBuf::from("data/processed/bronze/marketplace")
    );
    assert_eq!(
        config.silver_dir("marketplace"),
        PathBuf::from("data/processed/silver/marketplace")
    );
    assert_eq!(config.gold_dir(), PathBuf::from("data/processed/gold"));
    assert_eq!(
        config.source_input_dir("Marketplace"),
        PathBuf::from("data/raw/marketplace")
    );
}
