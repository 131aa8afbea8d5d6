//! Time series data handling for forecasting
//!
//! Input tables are polars [`DataFrame`]s with the columns `timestamps`, `open`,
//! `high`, `low`, `close` and optionally `volume` and `amount`. [`PriceSeries`]
//! is the typed, column-oriented view the predictor works on.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::Path;

/// Name of the timestamp column
pub const TIMESTAMP_COLUMN: &str = "timestamps";

/// Default identifier column of a combined batch table
pub const DEFAULT_ID_COLUMN: &str = "skin_id";

/// Columns every series must carry
pub const REQUIRED_COLUMNS: [&str; 5] = [TIMESTAMP_COLUMN, "open", "high", "low", "close"];

/// Days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A value column of a series row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
    Amount,
}

impl Field {
    /// Every field in canonical column order
    pub const ALL: [Field; 6] = [
        Field::Open,
        Field::High,
        Field::Low,
        Field::Close,
        Field::Volume,
        Field::Amount,
    ];

    /// The mandatory price fields
    pub const PRICES: [Field; 4] = [Field::Open, Field::High, Field::Low, Field::Close];

    /// The optional activity fields, which travel together
    pub const ACTIVITY: [Field; 2] = [Field::Volume, Field::Amount];

    /// Column name of the field
    pub fn column_name(self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::Volume => "volume",
            Field::Amount => "amount",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Typed daily OHLC(VA) series
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    /// One date per row
    timestamps: Vec<NaiveDate>,
    /// Present fields in canonical order, each as long as `timestamps`
    columns: Vec<(Field, Vec<f64>)>,
}

impl PriceSeries {
    /// Create a series from the mandatory OHLC columns
    pub fn new(
        timestamps: Vec<NaiveDate>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
    ) -> Result<Self> {
        let series = Self {
            timestamps,
            columns: Vec::with_capacity(6),
        };
        series
            .with_field(Field::Open, open)?
            .with_field(Field::High, high)?
            .with_field(Field::Low, low)?
            .with_field(Field::Close, close)
    }

    /// Add or replace a field column
    pub fn with_field(mut self, field: Field, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.timestamps.len() {
            return Err(ForecastError::Data(format!(
                "Column '{}' has {} values but the series has {} timestamps",
                field,
                values.len(),
                self.timestamps.len()
            )));
        }

        match self.columns.iter_mut().find(|(f, _)| *f == field) {
            Some((_, existing)) => *existing = values,
            None => {
                self.columns.push((field, values));
                self.columns.sort_by_key(|(f, _)| *f);
            }
        }
        Ok(self)
    }

    /// Build a series from a DataFrame, validating the mandatory columns
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let present = present_columns(df);
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| !present.iter().any(|p| p == *name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::Schema(missing));
        }

        if df.height() == 0 {
            return Err(ForecastError::EmptySeries);
        }

        let timestamps = parse_timestamps(df.column(TIMESTAMP_COLUMN)?)?;
        let mut columns = Vec::with_capacity(Field::ALL.len());
        for field in Field::ALL {
            if present.iter().any(|p| p == field.column_name()) {
                columns.push((field, column_as_f64(df, field.column_name())?));
            }
        }

        Ok(Self {
            timestamps,
            columns,
        })
    }

    /// Convert back into a DataFrame with a `timestamps` date column
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        columns.push(date_series(TIMESTAMP_COLUMN, &self.timestamps)?);
        for (field, values) in &self.columns {
            columns.push(Series::new(field.column_name(), values.as_slice()));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Row dates in order
    pub fn timestamps(&self) -> &[NaiveDate] {
        &self.timestamps
    }

    /// Date of the most recent row
    pub fn last_timestamp(&self) -> Option<NaiveDate> {
        self.timestamps.last().copied()
    }

    /// Fields present in the series, in canonical order
    pub fn fields(&self) -> Vec<Field> {
        self.columns.iter().map(|(f, _)| *f).collect()
    }

    /// Whether the series carries the field
    pub fn has(&self, field: Field) -> bool {
        self.columns.iter().any(|(f, _)| *f == field)
    }

    /// Values of one field
    pub fn column(&self, field: Field) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, values)| values.as_slice())
    }

    /// The most recent `n` rows in chronological order
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        Self {
            timestamps: self.timestamps[start..].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(f, values)| (*f, values[start..].to_vec()))
                .collect(),
        }
    }

    /// Restrict the series to the given fields, in the given order
    pub fn select(&self, fields: &[Field]) -> Result<Self> {
        let missing: Vec<String> = fields
            .iter()
            .filter(|f| !self.has(**f))
            .map(|f| f.column_name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::Schema(missing));
        }

        let columns = fields
            .iter()
            .filter_map(|f| self.columns.iter().find(|(c, _)| c == f).cloned())
            .collect();

        Ok(Self {
            timestamps: self.timestamps.clone(),
            columns,
        })
    }

    /// Row-major values, one inner vector per row in field order
    pub fn rows(&self) -> Vec<Vec<f64>> {
        (0..self.len())
            .map(|i| self.columns.iter().map(|(_, values)| values[i]).collect())
            .collect()
    }
}

/// Data loader for CSV tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a table from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(Some(1000))
            .has_header(true)
            .finish()?;
        Ok(df)
    }

    /// Load a single series from a CSV file
    pub fn series_from_csv<P: AsRef<Path>>(path: P) -> Result<PriceSeries> {
        PriceSeries::from_dataframe(&Self::from_csv(path)?)
    }

    /// Write a table to a CSV file with a header row
    pub fn write_csv<P: AsRef<Path>>(df: &mut DataFrame, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).has_header(true).finish(df)?;
        Ok(())
    }
}

/// Partition a combined table by identifier, in first-occurrence order
///
/// Rows with a null identifier belong to no group and are skipped.
pub fn group_rows(df: &DataFrame, id_column: &str) -> Result<Vec<(String, DataFrame)>> {
    if !df.get_column_names().contains(&id_column) {
        return Err(ForecastError::Schema(vec![id_column.to_string()]));
    }

    let labels = id_labels(df.column(id_column)?)?;
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<(&str, Vec<IdxSize>)> = Vec::new();
    let mut skipped = 0usize;
    for (row, label) in labels.iter().enumerate() {
        let Some(id) = label.as_deref() else {
            skipped += 1;
            continue;
        };
        let group = *index.entry(id).or_insert_with(|| {
            order.push((id, Vec::new()));
            order.len() - 1
        });
        order[group].1.push(row as IdxSize);
    }

    if skipped > 0 {
        tracing::warn!(
            column = id_column,
            rows = skipped,
            "Skipping rows with a null identifier"
        );
    }

    let mut groups = Vec::with_capacity(order.len());
    for (id, rows) in order {
        let rows = IdxCa::from_vec("", rows);
        groups.push((id.to_string(), df.take(&rows)?));
    }
    Ok(groups)
}

/// Build a polars `Date` series from calendar dates
pub fn date_series(name: &str, dates: &[NaiveDate]) -> Result<Series> {
    let days: Vec<i32> = dates
        .iter()
        .map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
        .collect();
    Ok(Series::new(name, days).cast(&DataType::Date)?)
}

/// Names of columns that hold at least one value (or belong to an empty frame)
fn present_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|s| s.is_empty() || s.null_count() < s.len())
        .map(|s| s.name().to_string())
        .collect()
}

fn id_labels(series: &Series) -> Result<Vec<Option<String>>> {
    let labels = match series.dtype() {
        DataType::Utf8 => series.clone(),
        _ => series.cast(&DataType::Utf8)?,
    };
    Ok(labels
        .utf8()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn epoch_days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

fn missing_timestamp(row: usize) -> ForecastError {
    ForecastError::Data(format!("Missing or invalid timestamp at row {}", row))
}

fn parse_timestamps(series: &Series) -> Result<Vec<NaiveDate>> {
    match series.dtype() {
        DataType::Date => {
            let days = series.cast(&DataType::Int32)?;
            let days = days.i32()?;
            days.into_iter()
                .enumerate()
                .map(|(i, d)| d.and_then(epoch_days_to_date).ok_or_else(|| missing_timestamp(i)))
                .collect()
        }
        DataType::Datetime(unit, _) => {
            let per_day: i64 = match unit {
                TimeUnit::Nanoseconds => 86_400_000_000_000,
                TimeUnit::Microseconds => 86_400_000_000,
                TimeUnit::Milliseconds => 86_400_000,
            };
            let raw = series.cast(&DataType::Int64)?;
            let raw = raw.i64()?;
            raw.into_iter()
                .enumerate()
                .map(|(i, v)| {
                    v.and_then(|v| i32::try_from(v.div_euclid(per_day)).ok())
                        .and_then(epoch_days_to_date)
                        .ok_or_else(|| missing_timestamp(i))
                })
                .collect()
        }
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .enumerate()
            .map(|(i, v)| match v {
                Some(s) => parse_date(s).ok_or_else(|| {
                    ForecastError::Data(format!("Unparseable timestamp '{}' at row {}", s, i))
                }),
                None => Err(missing_timestamp(i)),
            })
            .collect(),
        other => Err(ForecastError::Data(format!(
            "Column '{}' has unsupported type {}",
            TIMESTAMP_COLUMN, other
        ))),
    }
}

/// Parse an ISO date or datetime string, keeping only the calendar date
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|datetime| datetime.date_naive())
}

fn column_as_f64(df: &DataFrame, column_name: &str) -> Result<Vec<f64>> {
    let col = df.column(column_name).map_err(|e| {
        ForecastError::Data(format!("Column '{}' not found: {}", column_name, e))
    })?;

    if !col.dtype().is_numeric() {
        return Err(ForecastError::Data(format!(
            "Column '{}' cannot be converted to f64",
            column_name
        )));
    }

    let values = col.cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_dates_and_datetimes() {
        assert_eq!(parse_date("2021-01-05"), Some(date(2021, 1, 5)));
        assert_eq!(parse_date("2021-01-05 13:45:00"), Some(date(2021, 1, 5)));
        assert_eq!(parse_date("2021-01-05T00:00:00"), Some(date(2021, 1, 5)));
        assert_eq!(parse_date("2021-01-05T08:00:00+00:00"), Some(date(2021, 1, 5)));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn epoch_round_trip() {
        assert_eq!(epoch_days_to_date(0), Some(date(1970, 1, 1)));
        assert_eq!(epoch_days_to_date(18628), Some(date(2021, 1, 1)));
    }

    #[test]
    fn tail_keeps_most_recent_rows() {
        let dates: Vec<NaiveDate> = (1..=5).map(|d| date(2024, 1, d)).collect();
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let series = PriceSeries::new(
            dates,
            values.clone(),
            values.clone(),
            values.clone(),
            values,
        )
        .unwrap();

        let tail = series.tail(2);
        assert_eq!(tail.timestamps(), &[date(2024, 1, 4), date(2024, 1, 5)]);
        assert_eq!(tail.column(Field::Close), Some(&[4.0, 5.0][..]));
        assert_eq!(series.tail(10).len(), 5);
    }

    #[test]
    fn with_field_keeps_canonical_order() {
        let series = PriceSeries::new(vec![date(2024, 1, 1)], vec![1.0], vec![1.0], vec![1.0], vec![1.0])
            .unwrap()
            .with_field(Field::Amount, vec![10.0])
            .unwrap()
            .with_field(Field::Volume, vec![5.0])
            .unwrap();
        assert_eq!(series.fields(), Field::ALL.to_vec());
        assert_eq!(series.rows(), vec![vec![1.0, 1.0, 1.0, 1.0, 5.0, 10.0]]);
    }

    #[test]
    fn with_field_rejects_length_mismatch() {
        let result = PriceSeries::new(vec![date(2024, 1, 1)], vec![1.0], vec![1.0], vec![1.0], vec![]);
        assert!(matches!(result, Err(ForecastError::Data(_))));
    }
}
