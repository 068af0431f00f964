// crates/orderlake-core/src/dates.rs

use polars::prelude::*;
use tracing::debug;

use crate::error::Result;

/// Formats tried against string `Date` columns, in priority order.
///
/// The first format that parses at least one row wins, even when a later
/// format would parse more rows. That tie-break is load-bearing: historic
/// partition contents were produced under it, so switching to a
/// "most successful format" rule would silently reshuffle which rows carry
/// dates.
pub const DATE_FORMATS: [&str; 5] = [
    "%m-%d-%y", // 01-13-24
    "%m/%d/%y", // 01/13/24
    "%Y-%m-%d", // 2024-01-13
    "%d-%m-%Y", // 13-01-2024
    "%m-%d-%Y", // 01-13-2024
];

/// Best-effort conversion of the `Date` column to the Date dtype.
///
/// Already-typed date columns pass through (datetimes are truncated to
/// dates). For string columns each format in [`DATE_FORMATS`] is attempted
/// non-strictly; unparseable rows become null. If no format matches any row
/// and a lenient cast fails too, the column becomes all-null rather than
/// raising. Frames without a `Date` column are returned untouched.
pub fn parse_date_column(df: DataFrame) -> Result<DataFrame> {
    let Ok(date) = df.column("Date") else {
        return Ok(df);
    };

    match date.dtype() {
        DataType::Date => return Ok(df),
        DataType::Datetime(_, _) => {
            let out = df
                .lazy()
                .with_column(col("Date").cast(DataType::Date))
                .collect()?;
            return Ok(out);
        }
        DataType::String => {}
        _ => return all_null_dates(df),
    }

    let height = df.height();
    for format in DATE_FORMATS {
        let parsed = df
            .clone()
            .lazy()
            .with_column(
                col("Date")
                    .str()
                    .strptime(
                        DataType::Date,
                        StrptimeOptions {
                            format: Some(format.into()),
                            strict: false,
                            exact: true,
                            cache: true,
                        },
                        lit("raise"),
                    )
                    .alias("Date"),
            )
            .collect()?;

        if parsed.column("Date")?.null_count() < height {
            debug!("date column parsed with format {format}");
            return Ok(parsed);
        }
    }

    // Last resort: lenient cast, then give up and null the column out.
    match df
        .clone()
        .lazy()
        .with_column(col("Date").cast(DataType::Date))
        .collect()
    {
        Ok(parsed) => Ok(parsed),
        Err(_) => all_null_dates(df),
    }
}

fn all_null_dates(df: DataFrame) -> Result<DataFrame> {
    let mut out = df.clone();
    out.with_column(Series::full_null("Date".into(), df.height(), &DataType::Date))?;
    Ok(out)
}

/// Derives Int32 `Year` and `Month` columns from the `Date` column, used
/// as partition keys. Frames without `Date` are returned untouched.
pub fn add_year_month(df: DataFrame) -> Result<DataFrame> {
    if df.column("Date").is_err() {
        return Ok(df);
    }

    let out = df
        .lazy()
        .with_columns([
            col("Date").dt().year().cast(DataType::Int32).alias("Year"),
            col("Date").dt().month().cast(DataType::Int32).alias("Month"),
        ])
        .collect()?;
    Ok(out)
}
