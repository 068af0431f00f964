// crates/orderlake-core/src/pipeline.rs
//
// Orchestrates bronze -> silver per source, then a single gold run across
// every source. Sources and layers run strictly sequentially; silver
// always re-reads bronze output from disk rather than reusing in-memory
// frames, so a partial re-run stays consistent.

use std::path::Path;

use chrono::Utc;
use tracing::{error, warn};

use crate::bronze::run_bronze;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::gold::run_gold;
use crate::report::{LayerReport, LayerState, PipelineReport, Progress, SourceReport};
use crate::silver::run_silver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Bronze,
    Silver,
    Gold,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Bronze, Layer::Silver, Layer::Gold];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
            Layer::Gold => "gold",
        }
    }
}

impl std::str::FromStr for Layer {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "bronze" => Ok(Layer::Bronze),
            "silver" => Ok(Layer::Silver),
            "gold" => Ok(Layer::Gold),
            other => Err(format!("unknown layer '{other}'")),
        }
    }
}

/// Enumerates sources as the sorted non-hidden subdirectories of the raw
/// input root.
pub fn discover_sources(input_dir: &Path) -> Result<Vec<String>> {
    let mut sources = Vec::new();
    if !input_dir.exists() {
        return Ok(sources);
    }

    for entry in std::fs::read_dir(input_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            sources.push(name);
        }
    }

    sources.sort();
    Ok(sources)
}

/// Runs the layered pipeline. `sources = None` auto-discovers from the
/// configured input root; `layers = None` runs all three.
///
/// Failure policy: a source whose bronze or silver step fails is recorded
/// and skipped, and the remaining sources still run. Gold runs once at the
/// end over the full source list; sources that produced no silver rows are
/// skipped inside its union with a warning.
pub fn run_pipeline(
    config: &PipelineConfig,
    sources: Option<Vec<String>>,
    layers: Option<Vec<Layer>>,
    progress: &Progress,
) -> Result<PipelineReport> {
    let layers = layers.unwrap_or_else(|| Layer::ALL.to_vec());
    let sources = match sources {
        Some(list) if !list.is_empty() => list,
        _ => discover_sources(&config.paths.input_dir)?,
    };

    if sources.is_empty() {
        return Err(PipelineError::Validation(format!(
            "no sources found under {}",
            config.paths.input_dir.display()
        )));
    }

    let unknown_targets = config.unknown_mapping_targets();
    if !unknown_targets.is_empty() {
        warn!(
            "status_mapping targets outside status_categories: {}",
            unknown_targets.join(", ")
        );
    }

    let started_at = Utc::now();
    let mut reports: Vec<SourceReport> = Vec::with_capacity(sources.len());

    for source in &sources {
        let mut report = SourceReport::new(source.clone());

        if layers.contains(&Layer::Bronze) {
            report.bronze.state = LayerState::Running;
            progress.emit(&format!("[bronze] {source}: extracting raw files"));
            match run_bronze(config, source) {
                Ok(outcome) => {
                    progress.emit(&format!("[bronze] {source}: {} rows", outcome.rows));
                    report.bronze = outcome;
                }
                Err(err) => {
                    error!("bronze failed for {source}: {err}");
                    report.bronze = LayerReport::failed();
                    report.error = Some(err.to_string());
                    reports.push(report);
                    continue;
                }
            }
        }

        if layers.contains(&Layer::Silver) {
            report.silver.state = LayerState::Running;
            progress.emit(&format!("[silver] {source}: cleaning and validating"));
            match run_silver(config, source) {
                Ok(outcome) => {
                    progress.emit(&format!(
                        "[silver] {source}: {} rows ({} dropped)",
                        outcome.rows, outcome.rows_dropped
                    ));
                    report.silver = outcome;
                }
                Err(err) => {
                    error!("silver failed for {source}: {err}");
                    report.silver = LayerReport::failed();
                    report.error = Some(err.to_string());
                }
            }
        }

        reports.push(report);
    }

    let gold = if layers.contains(&Layer::Gold) {
        progress.emit("[gold] combining all sources");
        let outcome = run_gold(config, &sources)?;
        progress.emit(&format!("[gold] combined {} rows", outcome.rows));
        outcome
    } else {
        LayerReport::default()
    };

    Ok(PipelineReport {
        started_at,
        sources: reports,
        gold,
    })
}
