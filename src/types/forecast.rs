//! Forecast rows as written by the store, and the derived series built when
//! the raw dump is loaded back.

use chrono::{NaiveDate, NaiveDateTime};

/// Column names of the raw forecast dump.
pub const COL_COMPOSITE: &str = "Composite_Dates";
pub const COL_NAME: &str = "Name";
pub const COL_UNIT: &str = "Unit";
pub const COL_VALUES: &str = "Values";
/// Columns added by [`crate::ForecastStore::load`].
pub const COL_DATE: &str = "Date";
pub const COL_TIME: &str = "Time";
pub const COL_DATE_TIME: &str = "Date_Time";
pub const COL_WEEKDAY: &str = "Weekday";

pub(crate) const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One (time bucket, parameter) pair from the forecast API.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    /// Date and time in one ISO string, e.g. `"2021-01-01T12:00:00"`.
    pub composite_timestamp: String,
    pub parameter_name: String,
    pub unit: String,
    /// Never empty.
    pub values: Vec<f64>,
}

impl ForecastRow {
    /// The value plotted for this row. Multi-level parameters report several values;
    /// the first one is the primary level.
    pub fn primary_value(&self) -> f64 {
        self.values.first().copied().unwrap_or(f64::NAN)
    }
}

/// A [`ForecastRow`] with the calendar fields derived from its timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    pub row: ForecastRow,
    /// `YYYY-MM-DD` part of the composite timestamp.
    pub date: String,
    /// `HH:MM:SS` part of the composite timestamp.
    pub time: String,
    /// `date` and `time` joined and parsed.
    pub date_time: NaiveDateTime,
    /// English weekday name of `date`, e.g. `"Friday"`.
    pub weekday: String,
}

impl SeriesRow {
    /// Splits the composite timestamp on the ISO `T` separator and derives the
    /// remaining fields. Returns `None` when the timestamp is not well formed.
    ///
    /// ```
    /// use smhi_forecast::{ForecastRow, SeriesRow};
    ///
    /// let row = ForecastRow {
    ///     composite_timestamp: "2021-01-01T12:00:00".into(),
    ///     parameter_name: "t".into(),
    ///     unit: "Cel".into(),
    ///     values: vec![-1.5],
    /// };
    /// let derived = SeriesRow::derive(row).unwrap();
    /// assert_eq!(derived.date, "2021-01-01");
    /// assert_eq!(derived.time, "12:00:00");
    /// assert_eq!(derived.weekday, "Friday");
    /// ```
    pub fn derive(row: ForecastRow) -> Option<SeriesRow> {
        let (date, time) = row.composite_timestamp.trim().split_once('T')?;
        let time = time.trim_end_matches('Z');
        let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        let date_time =
            NaiveDateTime::parse_from_str(&format!("{date} {time}"), DATE_TIME_FORMAT).ok()?;
        Some(SeriesRow {
            date: date.to_string(),
            time: time.to_string(),
            date_time,
            weekday: day.format("%A").to_string(),
            row,
        })
    }

    /// `Date_Time` column text.
    pub fn date_time_text(&self) -> String {
        self.date_time.format(DATE_TIME_FORMAT).to_string()
    }
}

/// The full reloaded forecast, every row annotated with calendar fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastSeries {
    pub rows: Vec<SeriesRow>,
}

impl ForecastSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct parameter names in order of first appearance.
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for row in &self.rows {
            let name = row.row.parameter_name.as_str();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// The rows of one parameter, as persisted by [`crate::SampleFilter`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredSample {
    /// The parameter name the series was filtered on.
    pub key: String,
    pub rows: Vec<SeriesRow>,
    /// Arithmetic mean of every value of every row.
    pub mean: f64,
    /// Artifact name (file stem) the subset was written under.
    pub artifact: String,
}

/// Renders values the way the raw dump stores them: a bracket-free list.
pub fn format_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses a bracket-free value list. `None` for an empty list or any non-number.
pub fn parse_values(text: &str) -> Option<Vec<f64>> {
    let values = text
        .trim()
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Mean over all values of all rows; `None` when there are no values.
pub fn mean_of<'a>(rows: impl IntoIterator<Item = &'a ForecastRow>) -> Option<f64> {
    let (sum, count) = rows
        .into_iter()
        .flat_map(|row| row.values.iter())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
