//! Batch forecasting over many independent series
//!
//! A combined table is split by its identifier column and every group is
//! forecast on its own. A failing series becomes a [`BatchOutcome::Failure`]
//! instead of aborting the run; only a batch in which nothing succeeded is an
//! error.
//!
//! With the `parallel` feature the groups are forecast on the rayon thread
//! pool. Outcomes keep first-occurrence order either way.

use crate::backend::{ForecastBackend, SamplingParams};
use crate::data::{date_series, group_rows, Field, TIMESTAMP_COLUMN};
use crate::error::{ForecastError, Result};
use crate::predictor::{Forecast, SkinPredictor};
use polars::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Cloneable flag that stops a running batch from starting further series
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the flag was raised
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Batch run settings
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Emit a progress notice every this many finished series (0 disables)
    pub progress_every: usize,
    /// Forecast groups concurrently (needs the `parallel` feature)
    pub parallel: bool,
    /// Optional cancellation hook
    pub cancel: Option<CancelFlag>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            progress_every: 50,
            parallel: false,
            cancel: None,
        }
    }
}

/// Result of forecasting one identifier
#[derive(Debug)]
pub enum BatchOutcome {
    Success { id: String, forecast: Forecast },
    Failure { id: String, error: ForecastError },
}

impl BatchOutcome {
    /// Identifier the outcome belongs to
    pub fn id(&self) -> &str {
        match self {
            BatchOutcome::Success { id, .. } | BatchOutcome::Failure { id, .. } => id,
        }
    }

    /// Whether the forecast succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Success { .. })
    }
}

/// Every outcome of a batch run, in first-occurrence order of the identifiers
#[derive(Debug)]
pub struct BatchReport {
    id_column: String,
    outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    /// All outcomes in order
    pub fn outcomes(&self) -> &[BatchOutcome] {
        &self.outcomes
    }

    /// Successful forecasts in order
    pub fn successes(&self) -> impl Iterator<Item = (&str, &Forecast)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            BatchOutcome::Success { id, forecast } => Some((id.as_str(), forecast)),
            BatchOutcome::Failure { .. } => None,
        })
    }

    /// Failed identifiers with their errors, in order
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ForecastError)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            BatchOutcome::Failure { id, error } => Some((id.as_str(), error)),
            BatchOutcome::Success { .. } => None,
        })
    }

    pub fn succeeded_ids(&self) -> Vec<&str> {
        self.successes().map(|(id, _)| id).collect()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures().map(|(id, _)| id).collect()
    }

    /// True when no identifier produced a forecast
    pub fn is_exhausted(&self) -> bool {
        !self.outcomes.iter().any(BatchOutcome::is_success)
    }

    /// Combine the successes, failing when there are none
    pub fn into_forecast(self) -> Result<BatchForecast> {
        if self.is_exhausted() {
            return Err(ForecastError::BatchExhausted {
                attempted: self.outcomes.len(),
            });
        }

        let mut entries = Vec::new();
        let mut failures = Vec::new();
        for outcome in self.outcomes {
            match outcome {
                BatchOutcome::Success { id, forecast } => entries.push((id, forecast)),
                BatchOutcome::Failure { id, error } => failures.push((id, error.to_string())),
            }
        }

        Ok(BatchForecast {
            id_column: self.id_column,
            entries,
            failures,
        })
    }
}

/// Combined forecasts of a batch, tagged by identifier
#[derive(Debug, Clone)]
pub struct BatchForecast {
    id_column: String,
    entries: Vec<(String, Forecast)>,
    failures: Vec<(String, String)>,
}

impl BatchForecast {
    /// Name of the identifier column
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Identifiers with a forecast, in first-occurrence order
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// Per-identifier forecasts in order
    pub fn entries(&self) -> &[(String, Forecast)] {
        &self.entries
    }

    /// Forecast of one identifier
    pub fn get(&self, id: &str) -> Option<&Forecast> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, forecast)| forecast)
    }

    /// Identifiers that failed, with the error message
    pub fn failures(&self) -> &[(String, String)] {
        &self.failures
    }

    /// Total number of forecast rows across identifiers
    pub fn len(&self) -> usize {
        self.entries.iter().map(|(_, forecast)| forecast.len()).sum()
    }

    /// Check if the combined result has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fields carried by at least one identifier, in canonical order
    pub fn fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|field| {
                self.entries
                    .iter()
                    .any(|(_, forecast)| forecast.fields().contains(field))
            })
            .collect()
    }

    /// Combined table: identifier, explicit `timestamps` column, then the fields.
    /// Fields an identifier was not forecast on are null for its rows.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let fields = self.fields();
        let mut ids = Vec::with_capacity(self.len());
        let mut dates = Vec::with_capacity(self.len());
        let mut values: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(self.len()); fields.len()];

        for (id, forecast) in &self.entries {
            ids.extend(std::iter::repeat(id.as_str()).take(forecast.len()));
            dates.extend_from_slice(forecast.timestamps());
            for (column, field) in values.iter_mut().zip(&fields) {
                match forecast.column(*field) {
                    Some(forecast_values) => column.extend(forecast_values.into_iter().map(Some)),
                    None => column.extend(std::iter::repeat(None).take(forecast.len())),
                }
            }
        }

        let mut columns = Vec::with_capacity(fields.len() + 2);
        columns.push(Series::new(&self.id_column, ids));
        columns.push(date_series(TIMESTAMP_COLUMN, &dates)?);
        for (field, column) in fields.iter().zip(values) {
            columns.push(Series::new(field.column_name(), column));
        }
        Ok(DataFrame::new(columns)?)
    }
}

impl<B: ForecastBackend> SkinPredictor<B> {
    /// Forecast every identifier of a combined table and report each outcome
    pub fn forecast_outcomes(
        &self,
        df: &DataFrame,
        id_column: &str,
        pred_days: usize,
        sampling: &SamplingParams,
        options: &BatchOptions,
    ) -> Result<BatchReport> {
        if pred_days == 0 {
            return Err(ForecastError::InvalidParameter(
                "pred_days must be at least 1".to_string(),
            ));
        }
        sampling.validate()?;

        let groups = group_rows(df, id_column)?;
        let total = groups.len();
        let finished = AtomicUsize::new(0);
        tracing::info!(series = total, pred_days, "Starting batch forecast");

        let run = |(id, group): &(String, DataFrame)| -> BatchOutcome {
            let result = match &options.cancel {
                Some(flag) if flag.is_cancelled() => Err(ForecastError::Cancelled),
                _ => self.predict(group, pred_days, sampling),
            };

            let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
            if options.progress_every > 0 && done % options.progress_every == 0 {
                tracing::info!("Progress: {}/{} series forecast", done, total);
            }

            match result {
                Ok(forecast) => BatchOutcome::Success {
                    id: id.clone(),
                    forecast,
                },
                Err(error) => {
                    tracing::warn!(id = %id, error = %error, "Forecast failed; skipping series");
                    BatchOutcome::Failure {
                        id: id.clone(),
                        error,
                    }
                }
            }
        };

        let outcomes = if options.parallel {
            run_parallel(&groups, &run)
        } else {
            groups.iter().map(&run).collect()
        };

        let report = BatchReport {
            id_column: id_column.to_string(),
            outcomes,
        };
        tracing::info!(
            succeeded = report.successes().count(),
            failed = report.failures().count(),
            "Batch forecast finished"
        );
        Ok(report)
    }

    /// Forecast every identifier and combine the successes
    pub fn predict_batch(
        &self,
        df: &DataFrame,
        id_column: &str,
        pred_days: usize,
        sampling: &SamplingParams,
    ) -> Result<BatchForecast> {
        self.predict_batch_with(df, id_column, pred_days, sampling, &BatchOptions::default())
    }

    /// [`predict_batch`](Self::predict_batch) with explicit run settings
    pub fn predict_batch_with(
        &self,
        df: &DataFrame,
        id_column: &str,
        pred_days: usize,
        sampling: &SamplingParams,
        options: &BatchOptions,
    ) -> Result<BatchForecast> {
        self.forecast_outcomes(df, id_column, pred_days, sampling, options)?
            .into_forecast()
    }
}

#[cfg(feature = "parallel")]
fn run_parallel<F>(groups: &[(String, DataFrame)], run: &F) -> Vec<BatchOutcome>
where
    F: Fn(&(String, DataFrame)) -> BatchOutcome + Sync,
{
    groups.par_iter().map(run).collect()
}

#[cfg(not(feature = "parallel"))]
fn run_parallel<F>(groups: &[(String, DataFrame)], run: &F) -> Vec<BatchOutcome>
where
    F: Fn(&(String, DataFrame)) -> BatchOutcome + Sync,
{
    tracing::debug!("Built without the `parallel` feature; running sequentially");
    groups.iter().map(run).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn forecast(fields: Vec<Field>, day: u32) -> Forecast {
        let width = fields.len();
        Forecast::index(
            crate::backend::ForecastRows {
                fields,
                rows: vec![vec![1.0; width]],
            },
            vec![NaiveDate::from_ymd_opt(2024, 1, day).unwrap()],
        )
        .unwrap()
    }

    #[test]
    fn exhausted_report_is_an_error() {
        let report = BatchReport {
            id_column: "skin_id".to_string(),
            outcomes: vec![BatchOutcome::Failure {
                id: "A".to_string(),
                error: ForecastError::EmptySeries,
            }],
        };
        assert!(report.is_exhausted());
        assert!(matches!(
            report.into_forecast(),
            Err(ForecastError::BatchExhausted { attempted: 1 })
        ));
    }

    #[test]
    fn empty_report_is_exhausted() {
        let report = BatchReport {
            id_column: "skin_id".to_string(),
            outcomes: Vec::new(),
        };
        assert!(matches!(
            report.into_forecast(),
            Err(ForecastError::BatchExhausted { attempted: 0 })
        ));
    }

    #[test]
    fn mixed_field_sets_are_unioned() {
        let report = BatchReport {
            id_column: "skin_id".to_string(),
            outcomes: vec![
                BatchOutcome::Success {
                    id: "A".to_string(),
                    forecast: forecast(Field::PRICES.to_vec(), 2),
                },
                BatchOutcome::Failure {
                    id: "B".to_string(),
                    error: ForecastError::Backend("boom".to_string()),
                },
                BatchOutcome::Success {
                    id: "C".to_string(),
                    forecast: forecast(Field::ALL.to_vec(), 3),
                },
            ],
        };
        assert_eq!(report.succeeded_ids(), vec!["A", "C"]);
        assert_eq!(report.failed_ids(), vec!["B"]);

        let combined = report.into_forecast().unwrap();
        assert_eq!(combined.fields(), Field::ALL.to_vec());
        assert_eq!(combined.failures().len(), 1);

        let df = combined.to_dataframe().unwrap();
        assert_eq!(
            df.get_column_names(),
            vec!["skin_id", "timestamps", "open", "high", "low", "close", "volume", "amount"]
        );
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("volume").unwrap().null_count(), 1);
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
