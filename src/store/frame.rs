//! Conversions between typed forecast rows and the polars frames written to disk.

use crate::config::RowPolicy;
use crate::store::error::StoreError;
use crate::types::forecast::{
    format_values, parse_values, ForecastRow, SeriesRow, COL_COMPOSITE, COL_DATE, COL_DATE_TIME,
    COL_NAME, COL_TIME, COL_UNIT, COL_VALUES, COL_WEEKDAY,
};
use log::warn;
use polars::prelude::*;
use std::path::Path;

/// `Composite_Dates,Name,Unit,Values`
pub fn raw_frame(rows: &[ForecastRow]) -> PolarsResult<DataFrame> {
    df!(
        COL_COMPOSITE => rows.iter().map(|r| r.composite_timestamp.clone()).collect::<Vec<_>>(),
        COL_NAME => rows.iter().map(|r| r.parameter_name.clone()).collect::<Vec<_>>(),
        COL_UNIT => rows.iter().map(|r| r.unit.clone()).collect::<Vec<_>>(),
        COL_VALUES => rows.iter().map(|r| format_values(&r.values)).collect::<Vec<_>>()
    )
}

/// The raw columns followed by `Date,Time,Date_Time,Weekday`.
pub fn series_frame(rows: &[SeriesRow]) -> PolarsResult<DataFrame> {
    df!(
        COL_COMPOSITE => rows.iter().map(|r| r.row.composite_timestamp.clone()).collect::<Vec<_>>(),
        COL_NAME => rows.iter().map(|r| r.row.parameter_name.clone()).collect::<Vec<_>>(),
        COL_UNIT => rows.iter().map(|r| r.row.unit.clone()).collect::<Vec<_>>(),
        COL_VALUES => rows.iter().map(|r| format_values(&r.row.values)).collect::<Vec<_>>(),
        COL_DATE => rows.iter().map(|r| r.date.clone()).collect::<Vec<_>>(),
        COL_TIME => rows.iter().map(|r| r.time.clone()).collect::<Vec<_>>(),
        COL_DATE_TIME => rows.iter().map(|r| r.date_time_text()).collect::<Vec<_>>(),
        COL_WEEKDAY => rows.iter().map(|r| r.weekday.clone()).collect::<Vec<_>>()
    )
}

fn string_column(df: &DataFrame, column: &str, path: &Path) -> Result<Vec<String>, StoreError> {
    let missing = || StoreError::MissingColumn {
        path: path.to_path_buf(),
        column: column.to_string(),
    };
    let values = df
        .column(column)
        .map_err(|_| missing())?
        .str()
        .map_err(|_| missing())?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect();
    Ok(values)
}

/// Rebuilds the derived rows from a frame read back from disk.
///
/// Only the four raw columns are consulted; the calendar fields are derived again
/// so a file edited by hand can never carry a weekday that disagrees with its date.
pub fn series_rows(
    df: &DataFrame,
    path: &Path,
    policy: RowPolicy,
) -> Result<Vec<SeriesRow>, StoreError> {
    let timestamps = string_column(df, COL_COMPOSITE, path)?;
    let names = string_column(df, COL_NAME, path)?;
    let units = string_column(df, COL_UNIT, path)?;
    let values = string_column(df, COL_VALUES, path)?;

    let mut rows = Vec::with_capacity(timestamps.len());
    for (index, (((timestamp, name), unit), values)) in timestamps
        .into_iter()
        .zip(names)
        .zip(units)
        .zip(values)
        .enumerate()
    {
        let parsed = match parse_values(&values) {
            Some(parsed) => parsed,
            None => {
                let err = StoreError::MalformedValues {
                    row: index,
                    value: values,
                };
                match policy {
                    RowPolicy::Fail => return Err(err),
                    RowPolicy::Skip => {
                        warn!("Skipping row in {}: {}", path.display(), err);
                        continue;
                    }
                }
            }
        };
        let row = ForecastRow {
            composite_timestamp: timestamp.clone(),
            parameter_name: name,
            unit,
            values: parsed,
        };
        match SeriesRow::derive(row) {
            Some(derived) => rows.push(derived),
            None => {
                let err = StoreError::MalformedTimestamp {
                    row: index,
                    value: timestamp,
                };
                match policy {
                    RowPolicy::Fail => return Err(err),
                    RowPolicy::Skip => warn!("Skipping row in {}: {}", path.display(), err),
                }
            }
        }
    }
    Ok(rows)
}
