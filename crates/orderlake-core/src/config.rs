// crates/orderlake-core/src/config.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::Result;
use crate::status::{default_status_mapping, StatusMapping};
use crate::store::OutputFormat;

/// Pipeline configuration, loaded from a TOML document.
///
/// A missing config file is not an error: the pipeline falls back to the
/// built-in defaults (including the default status mapping) so that a bare
/// checkout can still process data.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub output: OutputConfig,
    pub status_mapping: BTreeMap<String, String>,
    pub status_categories: Vec<String>,
    pub sources: BTreeMap<String, SourceOverrides>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// Per-source overrides: a file glob and a display label.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceOverrides {
    pub pattern: Option<String>,
    pub source_name: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/raw"),
            output_dir: PathBuf::from("data/processed"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Parquet,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            output: OutputConfig::default(),
            status_mapping: default_status_mapping(),
            status_categories: vec![
                "Delivered".to_string(),
                "Cancelled".to_string(),
                "Returned".to_string(),
                "Failed".to_string(),
            ],
            sources: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "config file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        Ok(config)
    }

    pub fn status_mapping(&self) -> StatusMapping {
        StatusMapping::new(self.status_mapping.clone())
    }

    /// Raw input directory for one source.
    pub fn source_input_dir(&self, source: &str) -> PathBuf {
        self.paths.input_dir.join(source.to_ascii_lowercase())
    }

    pub fn bronze_dir(&self, source: &str) -> PathBuf {
        self.paths
            .output_dir
            .join("bronze")
            .join(source.to_ascii_lowercase())
    }

    pub fn silver_dir(&self, source: &str) -> PathBuf {
        self.paths
            .output_dir
            .join("silver")
            .join(source.to_ascii_lowercase())
    }

    pub fn gold_dir(&self) -> PathBuf {
        self.paths.output_dir.join("gold")
    }

    pub fn source_pattern(&self, source: &str) -> String {
        self.sources
            .get(source)
            .and_then(|s| s.pattern.clone())
            .unwrap_or_else(|| "*.csv".to_string())
    }

    /// Display label written into the `Source` column.
    pub fn source_label(&self, source: &str) -> String {
        self.sources
            .get(source)
            .and_then(|s| s.source_name.clone())
            .unwrap_or_else(|| source.to_string())
    }

    /// Mapping targets that are not listed in `status_categories`. These are
    /// legal (pass-through statuses are, too) but usually indicate a typo in
    /// the config, so the orchestrator logs them once per run.
    pub fn unknown_mapping_targets(&self) -> Vec<String> {
        let mut unknown: Vec<String> = self
            .status_mapping
            .values()
            .filter(|target| !self.status_categories.iter().any(|c| c == *target))
            .cloned()
            .collect();
        unknown.sort();
        unknown.dedup();
        unknown
    }
}
