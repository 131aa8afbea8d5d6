//! Single-series forecasting over a pluggable backend

use crate::backend::{ContextWindow, ForecastBackend, ForecastRequest, ForecastRows, SamplingParams};
use crate::data::{date_series, Field, PriceSeries, TIMESTAMP_COLUMN};
use crate::error::{ForecastError, Result};
use crate::utils::future_dates;
use chrono::NaiveDate;
use polars::prelude::*;

/// Predictor settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorConfig {
    /// Most recent rows kept as context; stays under the backend's ceiling
    pub context_rows: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self { context_rows: 400 }
    }
}

/// Forecast rows keyed by their horizon dates
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    timestamps: Vec<NaiveDate>,
    fields: Vec<Field>,
    rows: Vec<Vec<f64>>,
}

impl Forecast {
    /// Pair backend rows with the horizon, one-to-one and in order
    pub fn index(output: ForecastRows, horizon: Vec<NaiveDate>) -> Result<Self> {
        if output.rows.len() != horizon.len() {
            return Err(ForecastError::IndexMismatch {
                expected: horizon.len(),
                actual: output.rows.len(),
            });
        }
        if let Some(row) = output.rows.iter().find(|row| row.len() != output.fields.len()) {
            return Err(ForecastError::Backend(format!(
                "row with {} values for {} fields",
                row.len(),
                output.fields.len()
            )));
        }

        Ok(Self {
            timestamps: horizon,
            fields: output.fields,
            rows: output.rows,
        })
    }

    /// Number of forecast rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the forecast has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Horizon dates, one per row
    pub fn timestamps(&self) -> &[NaiveDate] {
        &self.timestamps
    }

    /// Forecast fields, in row order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Row-major forecast values
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Values of one field across the horizon
    pub fn column(&self, field: Field) -> Option<Vec<f64>> {
        let idx = self.fields.iter().position(|f| *f == field)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Value of one field on one horizon date
    pub fn value(&self, date: NaiveDate, field: Field) -> Option<f64> {
        let row = self.timestamps.iter().position(|d| *d == date)?;
        let idx = self.fields.iter().position(|f| *f == field)?;
        Some(self.rows[row][idx])
    }

    /// Table with the horizon as an explicit `timestamps` column
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.fields.len() + 1);
        columns.push(date_series(TIMESTAMP_COLUMN, &self.timestamps)?);
        for field in &self.fields {
            let values = self.column(*field).unwrap_or_default();
            columns.push(Series::new(field.column_name(), values));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Fields forwarded to the backend: OHLC, plus volume and amount only when both
/// are present. A lone volume or amount column is dropped with a notice.
pub fn select_fields(series: &PriceSeries) -> Vec<Field> {
    let mut fields = Field::PRICES.to_vec();
    let has_volume = series.has(Field::Volume);
    let has_amount = series.has(Field::Amount);

    if has_volume && has_amount {
        fields.extend(Field::ACTIVITY);
    } else if has_volume || has_amount {
        let present = if has_volume { Field::Volume } else { Field::Amount };
        tracing::warn!(
            field = %present,
            "Only one of volume/amount provided; ignoring it. Provide both or neither."
        );
    }
    fields
}

/// Forecaster for one price series at a time
#[derive(Debug, Clone)]
pub struct SkinPredictor<B: ForecastBackend> {
    backend: B,
    config: PredictorConfig,
}

impl<B: ForecastBackend> SkinPredictor<B> {
    /// Create a predictor with the default context length
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, PredictorConfig::default())
    }

    /// Create a predictor with explicit settings
    pub fn with_config(backend: B, config: PredictorConfig) -> Self {
        Self { backend, config }
    }

    /// The wrapped backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The predictor settings
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Forecast the next `pred_days` days of a series table
    pub fn predict(
        &self,
        df: &DataFrame,
        pred_days: usize,
        sampling: &SamplingParams,
    ) -> Result<Forecast> {
        let series = PriceSeries::from_dataframe(df)?;
        self.predict_series(&series, pred_days, sampling)
    }

    /// Forecast the next `pred_days` days of a typed series
    pub fn predict_series(
        &self,
        series: &PriceSeries,
        pred_days: usize,
        sampling: &SamplingParams,
    ) -> Result<Forecast> {
        if pred_days == 0 {
            return Err(ForecastError::InvalidParameter(
                "pred_days must be at least 1".to_string(),
            ));
        }
        sampling.validate()?;
        if series.is_empty() {
            return Err(ForecastError::EmptySeries);
        }

        let fields = select_fields(series);
        let window = series.tail(self.config.context_rows).select(&fields)?;

        let max = self.backend.max_context();
        if window.len() > max {
            return Err(ForecastError::ContextOverflow {
                rows: window.len(),
                max,
            });
        }

        let last = window.last_timestamp().ok_or(ForecastError::EmptySeries)?;
        let horizon = future_dates(last, pred_days, "D")?;

        let request = ForecastRequest {
            context: ContextWindow {
                fields,
                timestamps: window.timestamps().to_vec(),
                rows: window.rows(),
            },
            future_timestamps: horizon.clone(),
            pred_len: pred_days,
            sampling: *sampling,
        };

        tracing::debug!(
            backend = self.backend.name(),
            context_rows = request.context.len(),
            pred_days,
            "Calling forecast backend"
        );
        let output = self.backend.predict(&request)?;
        Forecast::index(output, horizon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn ohlc(days: u32) -> PriceSeries {
        let dates: Vec<NaiveDate> = (1..=days).map(date).collect();
        let values: Vec<f64> = (1..=days).map(f64::from).collect();
        PriceSeries::new(dates, values.clone(), values.clone(), values.clone(), values).unwrap()
    }

    #[test]
    fn field_selection_policy() {
        let base = ohlc(3);
        assert_eq!(select_fields(&base), Field::PRICES.to_vec());

        let volume_only = base.clone().with_field(Field::Volume, vec![1.0; 3]).unwrap();
        assert_eq!(select_fields(&volume_only), Field::PRICES.to_vec());

        let amount_only = base.clone().with_field(Field::Amount, vec![1.0; 3]).unwrap();
        assert_eq!(select_fields(&amount_only), Field::PRICES.to_vec());

        let both = volume_only.with_field(Field::Amount, vec![1.0; 3]).unwrap();
        assert_eq!(select_fields(&both), Field::ALL.to_vec());
    }

    #[test]
    fn index_rejects_short_output() {
        let output = ForecastRows {
            fields: vec![Field::Close],
            rows: vec![vec![1.0]],
        };
        let err = Forecast::index(output, vec![date(1), date(2)]).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::IndexMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn index_rejects_ragged_rows() {
        let output = ForecastRows {
            fields: vec![Field::Open, Field::Close],
            rows: vec![vec![1.0]],
        };
        assert!(matches!(
            Forecast::index(output, vec![date(1)]),
            Err(ForecastError::Backend(_))
        ));
    }

    #[test]
    fn forecast_lookup() {
        let output = ForecastRows {
            fields: vec![Field::Open, Field::Close],
            rows: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        };
        let forecast = Forecast::index(output, vec![date(5), date(6)]).unwrap();
        assert_eq!(forecast.value(date(6), Field::Close), Some(4.0));
        assert_eq!(forecast.value(date(7), Field::Close), None);
        assert_eq!(forecast.column(Field::Open), Some(vec![1.0, 3.0]));

        let df = forecast.to_dataframe().unwrap();
        assert_eq!(df.get_column_names(), vec!["timestamps", "open", "close"]);
        assert_eq!(df.height(), 2);
    }
}
