// crates/orderlake-core/src/legacy.rs
//
// Single-layer compatibility mode for the old flat-directory workflow:
// every CSV directly under the input root is one source, cleaned and
// partitioned in one pass with no bronze/silver/gold intermediates. The
// layered pipeline and this module deliberately do not call into each
// other, so changes to the layered transforms cannot shift legacy output.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use tracing::warn;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::report::Progress;

/// Formats accepted for legacy date cells, tried per value in order.
const LEGACY_DATE_FORMATS: [&str; 5] = ["%m-%d-%y", "%m/%d/%y", "%Y-%m-%d", "%d-%m-%Y", "%m-%d-%Y"];

const COMBINED_DIR: &str = "all_sources";

#[derive(Debug, Clone, Default)]
pub struct LegacyReport {
    /// (source label, rows written) per input file, in input order.
    pub sources: Vec<(String, usize)>,
    pub combined_rows: usize,
    pub rows_dropped: usize,
}

/// Runs the legacy single-pass workflow over every CSV in the flat input
/// directory. Fails when the directory holds no CSV files at all; a file
/// that cleans down to zero datable rows is only a warning.
pub fn run_legacy(config: &PipelineConfig, progress: &Progress) -> Result<LegacyReport> {
    let input_dir = &config.paths.input_dir;
    let pattern = input_dir.join("*.csv");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| PipelineError::Validation("non-UTF8 input path".to_string()))?;

    let mut files: Vec<PathBuf> = glob::glob(pattern)?.collect::<std::result::Result<_, _>>()?;
    files.sort();

    if files.is_empty() {
        return Err(PipelineError::Validation(format!(
            "no CSV files found in {}",
            input_dir.display()
        )));
    }

    let mut report = LegacyReport::default();
    let mut combined: Vec<LazyFrame> = Vec::new();

    for path in &files {
        let source = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        progress.emit(&format!("[legacy] processing {source}"));

        let df = read_csv(path)?;
        let before = df.height();
        let df = clean(df, &source, config)?;
        report.rows_dropped += before - df.height();

        if df.height() == 0 {
            warn!("{source}: no datable rows after cleaning, skipped");
            report.sources.push((source, 0));
            continue;
        }

        let written = write_partitions(&df, &config.paths.output_dir.join(&source), config)?;
        report.sources.push((source, written));
        combined.push(df.lazy());
    }

    if !combined.is_empty() {
        let all = concat(
            combined,
            UnionArgs {
                diagonal: true,
                to_supertypes: true,
                ..Default::default()
            },
        )?
        .collect()?;
        report.combined_rows =
            write_partitions(&all, &config.paths.output_dir.join(COMBINED_DIR), config)?;
    }

    Ok(report)
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = fs::File::open(path)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(file)
        .finish()?;
    Ok(df)
}

/// Trims strings, drops rows with no values at all, types the date, tags
/// the source, and normalizes the status. Rows whose date cannot be parsed
/// are dropped here because legacy output has no later validation step.
fn clean(df: DataFrame, source: &str, config: &PipelineConfig) -> Result<DataFrame> {
    let mut df = trim_strings(df)?;
    df = drop_empty_rows(df)?;

    df.with_column(Series::new("Source".into(), vec![source; df.height()]))?;

    if let Ok(status) = df.column("Status") {
        let mapping = config.status_mapping();
        let normalized: Vec<Option<String>> = status
            .str()?
            .into_iter()
            .map(|raw| mapping.normalize(raw))
            .collect();
        df.with_column(Series::new("Status_Normalized".into(), normalized))?;
    }

    add_date_parts(df)
}

fn trim_strings(df: DataFrame) -> Result<DataFrame> {
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

fn drop_empty_rows(df: DataFrame) -> Result<DataFrame> {
    let mut keep = vec![false; df.height()];
    for column in df.get_columns() {
        for (idx, is_null) in column.is_null().into_iter().enumerate() {
            if !is_null.unwrap_or(true) {
                keep[idx] = true;
            }
        }
    }
    let mask = BooleanChunked::new("keep".into(), keep);
    Ok(df.filter(&mask)?)
}

/// Rewrites `Date` as an ISO string and derives Int32 `Year`/`Month`.
/// Each cell tries the format list independently; undatable rows go away.
fn add_date_parts(df: DataFrame) -> Result<DataFrame> {
    let Ok(date) = df.column("Date") else {
        return Err(PipelineError::Validation(
            "input file has no Date column".to_string(),
        ));
    };
    let date = date.cast(&DataType::String)?;
    let date = date.str()?;

    let mut iso: Vec<Option<String>> = Vec::with_capacity(df.height());
    let mut years: Vec<Option<i32>> = Vec::with_capacity(df.height());
    let mut months: Vec<Option<i32>> = Vec::with_capacity(df.height());

    for value in date {
        match value.and_then(parse_legacy_date) {
            Some(parsed) => {
                iso.push(Some(parsed.format("%Y-%m-%d").to_string()));
                years.push(Some(parsed.year()));
                months.push(Some(parsed.month() as i32));
            }
            None => {
                iso.push(None);
                years.push(None);
                months.push(None);
            }
        }
    }

    let mut out = df.clone();
    out.with_column(Series::new("Date".into(), iso))?;
    out.with_column(Series::new("Year".into(), years))?;
    out.with_column(Series::new("Month".into(), months))?;

    let mask = out.column("Year")?.is_not_null();
    Ok(out.filter(&mask)?)
}

fn parse_legacy_date(value: &str) -> Option<NaiveDate> {
    LEGACY_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Legacy's own partition writer: `<dir>/<year>/<month:02>/orders.<ext>`,
/// full overwrite per partition.
fn write_partitions(df: &DataFrame, dir: &Path, config: &PipelineConfig) -> Result<usize> {
    let years = df.column("Year")?.i32()?;
    let months = df.column("Month")?.i32()?;

    let mut periods: std::collections::BTreeSet<(i32, i32)> = std::collections::BTreeSet::new();
    for idx in 0..df.height() {
        if let (Some(year), Some(month)) = (years.get(idx), months.get(idx)) {
            periods.insert((year, month));
        }
    }

    let extension = config.output.format.extension();
    let mut written = 0;
    for (year, month) in periods {
        let mask =
            df.column("Year")?.i32()?.equal(year) & df.column("Month")?.i32()?.equal(month);
        let mut partition = df.filter(&mask)?;

        let path = dir
            .join(year.to_string())
            .join(format!("{month:02}"))
            .join(format!("orders.{extension}"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(&path)?;
        match config.output.format {
            crate::store::OutputFormat::Parquet => {
                ParquetWriter::new(file).finish(&mut partition)?;
            }
            crate::store::OutputFormat::Csv => {
                CsvWriter::new(file)
                    .include_header(true)
                    .finish(&mut partition)?;
            }
        }
        written += partition.height();
    }
    Ok(written)
}
