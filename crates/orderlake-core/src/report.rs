// crates/orderlake-core/src/report.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Per-(source, layer) lifecycle. Every pair starts `Pending`; layers that
/// are excluded from the run simply stay there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Outcome of one layer run for one source.
#[derive(Debug, Clone, Serialize)]
pub struct LayerReport {
    pub state: LayerState,
    pub rows: usize,
    pub rows_dropped: usize,
    pub warnings: Vec<String>,
}

impl Default for LayerReport {
    fn default() -> Self {
        Self {
            state: LayerState::Pending,
            rows: 0,
            rows_dropped: 0,
            warnings: Vec::new(),
        }
    }
}

impl LayerReport {
    pub fn completed(rows: usize, rows_dropped: usize, warnings: Vec<String>) -> Self {
        Self {
            state: LayerState::Completed,
            rows,
            rows_dropped,
            warnings,
        }
    }

    pub fn failed() -> Self {
        Self {
            state: LayerState::Failed,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub bronze: LayerReport,
    pub silver: LayerReport,
    /// First error that aborted this source, if any. A failed source does
    /// not halt the rest of the run.
    pub error: Option<String>,
}

impl SourceReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            bronze: LayerReport::default(),
            silver: LayerReport::default(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub gold: LayerReport,
}

impl PipelineReport {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }

    pub fn warned_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| {
                s.error.is_none()
                    && (!s.bronze.warnings.is_empty() || !s.silver.warnings.is_empty())
            })
            .count()
    }
}

/// Progress reporting boundary for front-ends. The pipeline itself is
/// synchronous; GUI shells hand in a callback to keep their own threads
/// informed, everyone else gets the messages through `tracing`.
pub struct Progress(Option<Box<dyn Fn(&str) + Send + Sync>>);

impl Progress {
    pub fn sink(callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self(Some(Box::new(callback)))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn emit(&self, message: &str) {
        match &self.0 {
            Some(callback) => callback(message),
            None => info!("{message}"),
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}
