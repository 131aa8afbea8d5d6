//! # Skin Oracle
//!
//! Forecasting of CS2 skin prices with a pretrained time-series model.
//!
//! This crate ties the workspace together:
//!
//! - [`skin_synth`] generates synthetic skin price series
//! - [`skin_forecast`] forecasts single series and whole batches through a
//!   pluggable [`ForecastBackend`](skin_forecast::ForecastBackend)
//!
//! and bridges generated series into the tables the forecaster reads.
//!
//! ## Example
//!
//! ```
//! use skin_oracle::prelude::*;
//!
//! # fn main() -> skin_oracle::Result<()> {
//! let universe = generate_skin_universe(3, 60, 42)?;
//! let table = universe_to_dataframe(&universe, false)?;
//!
//! let backend = DriftBackend::new(ModelSpec::default(), Device::Cpu).with_seed(1);
//! let predictor = SkinPredictor::new(backend);
//! let combined = predictor.predict_batch(&table, DEFAULT_ID_COLUMN, 7, &SamplingParams::default())?;
//! assert_eq!(combined.ids(), vec!["skin_000", "skin_001", "skin_002"]);
//! # Ok(())
//! # }
//! ```

use chrono::NaiveDate;
use polars::prelude::*;
use skin_forecast::data::{date_series, Field, DEFAULT_ID_COLUMN, TIMESTAMP_COLUMN};
use skin_synth::SkinBar;
use thiserror::Error;

pub use skin_forecast;
pub use skin_synth;

/// Errors from either side of the workspace
#[derive(Error, Debug)]
pub enum OracleError {
    #[error(transparent)]
    Forecast(#[from] skin_forecast::ForecastError),

    #[error(transparent)]
    Synth(#[from] skin_synth::SynthError),
}

impl From<PolarsError> for OracleError {
    fn from(err: PolarsError) -> Self {
        OracleError::Forecast(err.into())
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;

/// Commonly used items of both member crates
pub mod prelude {
    pub use crate::{bars_to_dataframe, universe_to_dataframe, OracleError};
    pub use skin_forecast::backend::{Device, DriftBackend, ModelSpec, SamplingParams};
    pub use skin_forecast::data::{DataLoader, Field, DEFAULT_ID_COLUMN};
    pub use skin_forecast::{
        BatchForecast, BatchOptions, Forecast, ForecastBackend, ForecastConfig, ForecastError,
        PredictorConfig, SkinPredictor,
    };
    pub use skin_synth::{
        generate_one_skin, generate_skin_universe, generate_synthetic_skin, SkinBar,
        SkinGenerator,
    };
}

fn price_columns(bars: &[&SkinBar]) -> Vec<Series> {
    Field::PRICES
        .iter()
        .map(|field| {
            let values: Vec<f64> = bars
                .iter()
                .map(|bar| match field {
                    Field::Open => bar.open,
                    Field::High => bar.high,
                    Field::Low => bar.low,
                    _ => bar.close,
                })
                .collect();
            Series::new(field.column_name(), values)
        })
        .collect()
}

fn activity_columns(bars: &[&SkinBar]) -> Option<Vec<Series>> {
    let volume: Option<Vec<f64>> = bars.iter().map(|bar| bar.volume).collect();
    let amount: Option<Vec<f64>> = bars.iter().map(|bar| bar.amount).collect();
    Some(vec![
        Series::new(Field::Volume.column_name(), volume?),
        Series::new(Field::Amount.column_name(), amount?),
    ])
}

fn bars_frame(bars: &[&SkinBar], with_activity: bool) -> Result<DataFrame> {
    let dates: Vec<NaiveDate> = bars.iter().map(|bar| bar.timestamp).collect();
    let mut columns = vec![date_series(TIMESTAMP_COLUMN, &dates)?];
    columns.extend(price_columns(bars));
    if with_activity {
        if let Some(activity) = activity_columns(bars) {
            columns.extend(activity);
        }
    }
    Ok(DataFrame::new(columns)?)
}

/// One generated series as a forecaster input table
///
/// Volume and amount are included when every bar carries them.
pub fn bars_to_dataframe(bars: &[SkinBar]) -> Result<DataFrame> {
    let refs: Vec<&SkinBar> = bars.iter().collect();
    bars_frame(&refs, true)
}

/// A generated universe as one long table with a leading `skin_id` column
///
/// With `with_activity` the table also carries volume and amount (when every
/// bar has them); otherwise it holds OHLC only.
pub fn universe_to_dataframe(
    universe: &[(String, Vec<SkinBar>)],
    with_activity: bool,
) -> Result<DataFrame> {
    let mut ids = Vec::new();
    let mut bars = Vec::new();
    for (id, series) in universe {
        ids.extend(std::iter::repeat(id.as_str()).take(series.len()));
        bars.extend(series.iter());
    }

    let mut df = bars_frame(&bars, with_activity)?;
    df.insert_at_idx(0, Series::new(DEFAULT_ID_COLUMN, ids))?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn series_table_has_forecaster_schema() {
        let bars = generate_synthetic_skin(20, 42).unwrap();
        let df = bars_to_dataframe(&bars).unwrap();
        assert_eq!(
            df.get_column_names(),
            vec!["timestamps", "open", "high", "low", "close", "volume", "amount"]
        );
        assert_eq!(df.column("timestamps").unwrap().dtype(), &DataType::Date);
    }

    #[test]
    fn ohlc_only_bars_skip_activity() {
        let bars = SkinGenerator::new().days(5).ohlcva(false).generate().unwrap();
        let df = bars_to_dataframe(&bars).unwrap();
        assert_eq!(df.width(), 5);
    }

    #[test]
    fn generated_universe_forecasts_end_to_end() {
        let universe = generate_skin_universe(4, 90, 42).unwrap();
        let table = universe_to_dataframe(&universe, true).unwrap();
        assert_eq!(table.height(), 360);
        assert_eq!(table.get_column_names()[0], "skin_id");

        let backend = DriftBackend::new(ModelSpec::default(), Device::Cpu).with_seed(7);
        let predictor = SkinPredictor::new(backend);
        let combined = predictor
            .predict_batch(&table, DEFAULT_ID_COLUMN, 7, &SamplingParams::default())
            .unwrap();

        assert_eq!(
            combined.ids(),
            vec!["skin_000", "skin_001", "skin_002", "skin_003"]
        );
        assert_eq!(combined.len(), 28);
        assert!(combined.failures().is_empty());
        assert_eq!(combined.fields(), Field::ALL.to_vec());

        let first = combined.get("skin_000").unwrap();
        let last_day = universe[0].1.last().unwrap().timestamp;
        assert_eq!(first.timestamps()[0], last_day.succ_opt().unwrap());
    }

    #[test]
    fn errors_convert_from_both_crates() {
        let err: OracleError = skin_synth::SynthError::InvalidParameter("days".into()).into();
        assert_eq!(err.to_string(), "Invalid parameter: days");
        let err: OracleError = skin_forecast::ForecastError::EmptySeries.into();
        assert!(matches!(err, OracleError::Forecast(_)));
    }
}
