// crates/orderlake-core/src/store.rs
//
// Year/Month partitioned storage shared by every layer. A partition write
// fully replaces the file at its path; there is no append-merge and no
// cross-partition locking, so concurrent writers to the same output root
// are not supported.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Parquet,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PartitionWriteReport {
    pub rows_written: usize,
    pub rows_dropped: usize,
    pub partitions: usize,
}

/// Writes one frame to one file, creating parent directories and
/// overwriting any previous content at that path.
pub fn write_frame(df: &DataFrame, path: &Path, format: OutputFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let mut out = df.clone();
    match format {
        OutputFormat::Parquet => {
            ParquetWriter::new(file).finish(&mut out)?;
        }
        OutputFormat::Csv => {
            CsvWriter::new(file).include_header(true).finish(&mut out)?;
        }
    }
    Ok(())
}

pub fn read_frame(path: &Path, format: OutputFormat) -> Result<DataFrame> {
    let file = fs::File::open(path)?;
    let df = match format {
        OutputFormat::Parquet => ParquetReader::new(file).finish()?,
        OutputFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(file)
            .finish()?,
    };
    Ok(df)
}

/// Saves a frame partitioned by (Year, Month) into
/// `<output_dir>/<year>/<month:02>/orders.<ext>`.
///
/// Rows with a null partition key are never persisted; their count is
/// reported back to the caller instead of being silently lost. A frame
/// with zero valid rows writes nothing and reports zeros, which callers
/// must treat as "no data" rather than an error.
pub fn save_partitioned(
    df: &DataFrame,
    output_dir: &Path,
    format: OutputFormat,
) -> Result<PartitionWriteReport> {
    if df.column("Year").is_err() || df.column("Month").is_err() {
        return Ok(PartitionWriteReport {
            rows_written: 0,
            rows_dropped: df.height(),
            partitions: 0,
        });
    }

    // Pin the key dtypes: CSV round-trips widen them to Int64 on re-read.
    let valid = df
        .clone()
        .lazy()
        .with_columns([
            col("Year").cast(DataType::Int32),
            col("Month").cast(DataType::Int32),
        ])
        .filter(col("Year").is_not_null().and(col("Month").is_not_null()))
        .collect()?;
    let dropped = df.height() - valid.height();

    if valid.height() == 0 {
        return Ok(PartitionWriteReport {
            rows_written: 0,
            rows_dropped: dropped,
            partitions: 0,
        });
    }

    let years = valid.column("Year")?.i32()?;
    let months = valid.column("Month")?.i32()?;
    let mut periods: BTreeSet<(i32, i32)> = BTreeSet::new();
    for idx in 0..valid.height() {
        if let (Some(year), Some(month)) = (years.get(idx), months.get(idx)) {
            periods.insert((year, month));
        }
    }

    let mut rows_written = 0;
    let mut partitions = 0;
    for (year, month) in periods {
        let mask = valid.column("Year")?.i32()?.equal(year)
            & valid.column("Month")?.i32()?.equal(month);
        let partition = valid.filter(&mask)?;

        let path = partition_path(output_dir, year, month, format);
        write_frame(&partition, &path, format)?;
        debug!("wrote {} rows to {}", partition.height(), path.display());

        rows_written += partition.height();
        partitions += 1;
    }

    Ok(PartitionWriteReport {
        rows_written,
        rows_dropped: dropped,
        partitions,
    })
}

pub fn partition_path(output_dir: &Path, year: i32, month: i32, format: OutputFormat) -> PathBuf {
    output_dir
        .join(year.to_string())
        .join(format!("{month:02}"))
        .join(format!("orders.{}", format.extension()))
}

/// Loads every partition file under a root and concatenates them with a
/// schema-union join: columns missing from one partition become null
/// instead of failing the combine. Returns an empty frame when the root
/// holds no partitions.
pub fn load_partitions(dir: &Path, format: OutputFormat) -> Result<DataFrame> {
    let pattern = format!("{}/**/*.{}", dir.display(), format.extension());
    let mut frames: Vec<LazyFrame> = Vec::new();

    for entry in glob::glob(&pattern)? {
        let path = entry?;
        frames.push(read_frame(&path, format)?.lazy());
    }

    if frames.is_empty() {
        return Ok(DataFrame::default());
    }

    let combined = concat_diagonal(frames)?.collect()?;
    Ok(combined)
}

/// Lazy diagonal concat with supertype coercion, the combine used whenever
/// frames from different files or sources are unioned.
pub fn concat_diagonal(frames: Vec<LazyFrame>) -> PolarsResult<LazyFrame> {
    concat(
        frames,
        UnionArgs {
            diagonal: true,
            to_supertypes: true,
            ..Default::default()
        },
    )
}
