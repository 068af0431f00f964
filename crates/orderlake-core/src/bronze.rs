// crates/orderlake-core/src/bronze.rs
//
// Bronze layer: raw extraction. Reads one source's export files, maps the
// source's native column names onto the canonical ones, tags rows with
// their origin, types the Date column, and persists Year/Month partitions.

use std::fs;
use std::path::Path;

use polars::prelude::*;
use tracing::warn;

use crate::config::PipelineConfig;
use crate::dates::{add_year_month, parse_date_column};
use crate::error::{PipelineError, Result};
use crate::report::LayerReport;
use crate::store::{concat_diagonal, save_partitioned};

/// Canonical column order of a cleaned order record.
pub const CANONICAL_COLUMNS: [&str; 8] = [
    "Date",
    "Source",
    "Order ID",
    "Status",
    "Status_Normalized",
    "Reason Cancelled",
    "Year",
    "Month",
];

/// Text columns pinned to the String dtype so that partitions from
/// different files union cleanly regardless of what CSV inference guessed.
const TEXT_COLUMNS: [&str; 4] = ["Order ID", "Status", "Reason Cancelled", "Source"];

/// Per-channel column mapping. The default implementation renames nothing,
/// which is the contract for unregistered sources: any source works,
/// specific sources customize.
pub trait BronzeAdapter {
    fn name(&self) -> &'static str;

    /// Native-to-canonical column renames for this channel.
    fn column_mapping(&self) -> &[(&'static str, &'static str)] {
        &[]
    }

    fn rename_columns(&self, df: DataFrame) -> Result<DataFrame> {
        let mut out = df;
        for (native, canonical) in self.column_mapping().iter().copied() {
            if native != canonical && out.column(native).is_ok() {
                out.rename(native, canonical.into())?;
            }
        }
        Ok(out)
    }
}

pub struct DefaultBronze;

impl BronzeAdapter for DefaultBronze {
    fn name(&self) -> &'static str {
        "default"
    }
}

/// Marketplace exports already use the canonical column names.
pub struct MarketplaceBronze;

impl BronzeAdapter for MarketplaceBronze {
    fn name(&self) -> &'static str {
        "marketplace"
    }
}

/// Website storefront exports use their own header vocabulary.
pub struct StorefrontBronze;

impl BronzeAdapter for StorefrontBronze {
    fn name(&self) -> &'static str {
        "storefront"
    }

    fn column_mapping(&self) -> &[(&'static str, &'static str)] {
        &[
            ("Order Date", "Date"),
            ("Order No", "Order ID"),
            ("Order Status", "Status"),
            ("Cancel Reason", "Reason Cancelled"),
        ]
    }
}

/// Registry keyed by source identifier; unregistered sources fall back to
/// the identity adapter.
pub fn bronze_adapter_for(source: &str) -> Box<dyn BronzeAdapter> {
    let key = source.to_ascii_lowercase();
    if key == "marketplace" {
        Box::new(MarketplaceBronze)
    } else if key.starts_with("storefront") {
        Box::new(StorefrontBronze)
    } else {
        Box::new(DefaultBronze)
    }
}

pub fn run_bronze(config: &PipelineConfig, source: &str) -> Result<LayerReport> {
    let adapter = bronze_adapter_for(source);
    let input_dir = config.source_input_dir(source);
    let pattern = input_dir.join(config.source_pattern(source));
    let pattern = pattern
        .to_str()
        .ok_or_else(|| PipelineError::Validation(format!("non-UTF8 input path for {source}")))?;

    let mut files: Vec<_> = glob::glob(pattern)?.collect::<std::result::Result<_, _>>()?;
    files.sort();

    if files.is_empty() {
        warn!("no input files found in {}", input_dir.display());
        return Ok(LayerReport::completed(
            0,
            0,
            vec![format!("no input files found in {}", input_dir.display())],
        ));
    }

    let label = config.source_label(source);
    let mut frames: Vec<LazyFrame> = Vec::with_capacity(files.len());
    let mut failures: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    for path in &files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match extract_file(path, adapter.as_ref(), &file_name, &label) {
            Ok(Extracted { df, date_warning }) => {
                if let Some(message) = date_warning {
                    warnings.push(message);
                }
                frames.push(df.lazy());
            }
            Err(err) => {
                let message = format!("{file_name}: {}", simplify_read_error(&err));
                warn!("skipping file: {message}");
                failures.push(message);
            }
        }
    }

    if frames.is_empty() {
        return Err(PipelineError::AllFilesFailed {
            source_name: source.to_string(),
            failures,
        });
    }
    warnings.extend(failures);

    let combined = concat_diagonal(frames)?.collect()?;
    let combined = add_year_month(combined)?;
    let combined = pin_text_columns(combined)?;

    let report = save_partitioned(&combined, &config.bronze_dir(source), config.output.format)?;
    Ok(LayerReport::completed(
        report.rows_written,
        report.rows_dropped,
        warnings,
    ))
}

struct Extracted {
    df: DataFrame,
    date_warning: Option<String>,
}

fn extract_file(
    path: &Path,
    adapter: &dyn BronzeAdapter,
    file_name: &str,
    label: &str,
) -> Result<Extracted> {
    let file = fs::File::open(path)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(file)
        .finish()?;

    if df.height() == 0 {
        return Err(PipelineError::Processing("file is empty".to_string()));
    }

    let mut df = adapter.rename_columns(df)?;
    df.with_column(Series::new(
        "_source_file".into(),
        vec![file_name; df.height()],
    ))?;
    df.with_column(Series::new("Source".into(), vec![label; df.height()]))?;

    let height = df.height();
    let df = parse_date_column(df)?;

    // More than half the rows failing to parse is a warning, not an error:
    // the rows survive with null dates until silver validation drops them.
    let mut date_warning = None;
    if let Ok(date) = df.column("Date") {
        let nulls = date.null_count();
        if nulls * 2 > height {
            date_warning = Some(format!(
                "{file_name}: {nulls}/{height} rows have unparseable dates"
            ));
        }
    }

    Ok(Extracted { df, date_warning })
}

fn pin_text_columns(df: DataFrame) -> Result<DataFrame> {
    let mut casts = Vec::new();
    for name in TEXT_COLUMNS {
        if let Ok(column) = df.column(name) {
            if column.dtype() != &DataType::String {
                casts.push(col(name).cast(DataType::String));
            }
        }
    }
    if casts.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(casts).collect()?)
}

/// Collapses noisy reader errors into the short messages surfaced to the
/// run summary and the UI.
fn simplify_read_error(err: &PipelineError) -> String {
    let raw = err.to_string();
    let lowered = raw.to_ascii_lowercase();
    if lowered.contains("no such file") {
        "file not found or corrupted".to_string()
    } else if lowered.contains("password") {
        "file is password protected".to_string()
    } else if lowered.contains("empty") {
        "file is empty".to_string()
    } else if lowered.contains("invalid") || lowered.contains("could not parse") {
        "invalid file format".to_string()
    } else {
        raw
    }
}
