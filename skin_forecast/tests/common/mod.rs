//! Shared fixtures and backend doubles for the integration tests
#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use skin_forecast::backend::{ForecastBackend, ForecastRequest, ForecastRows};
use skin_forecast::data::{date_series, Field};
use skin_forecast::{ForecastError, Result};
use std::sync::Mutex;

pub fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
}

/// Daily table starting 2024-01-01 whose close on day `i` is `i + 1`
pub fn daily_frame(rows: usize, fields: &[Field]) -> DataFrame {
    let dates: Vec<NaiveDate> = (0..rows as i64).map(day).collect();
    let mut columns = vec![date_series("timestamps", &dates).unwrap()];
    for field in fields {
        let values: Vec<f64> = (0..rows)
            .map(|i| match field {
                Field::Volume => 50.0,
                Field::Amount => 50.0 * (i + 1) as f64,
                _ => (i + 1) as f64,
            })
            .collect();
        columns.push(Series::new(field.column_name(), values));
    }
    DataFrame::new(columns).unwrap()
}

pub fn ohlc_frame(rows: usize) -> DataFrame {
    daily_frame(rows, &Field::PRICES)
}

/// Append an identifier column
pub fn tagged(mut df: DataFrame, id: &str) -> DataFrame {
    let ids = Series::new("skin_id", vec![id; df.height()]);
    df.with_column(ids).unwrap();
    df
}

/// Stack several tables with the same schema
pub fn stack(frames: Vec<DataFrame>) -> DataFrame {
    let mut iter = frames.into_iter();
    let mut combined = iter.next().expect("at least one frame");
    for frame in iter {
        combined.vstack_mut(&frame).unwrap();
    }
    combined
}

/// Repeats the last context row for every horizon step and remembers each request
pub struct RecordingBackend {
    pub max_context: usize,
    pub requests: Mutex<Vec<ForecastRequest>>,
}

impl RecordingBackend {
    pub fn new(max_context: usize) -> Self {
        Self {
            max_context,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> ForecastRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("backend was called")
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ForecastBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn max_context(&self) -> usize {
        self.max_context
    }

    fn predict(&self, request: &ForecastRequest) -> Result<ForecastRows> {
        self.requests.lock().unwrap().push(request.clone());
        let last = request.context.rows.last().cloned().unwrap_or_default();
        Ok(ForecastRows {
            fields: request.context.fields.clone(),
            rows: vec![last; request.pred_len],
        })
    }
}

/// Rejects short contexts, like a model that needs a warm-up window
pub struct MinContextBackend {
    pub min_rows: usize,
}

impl ForecastBackend for MinContextBackend {
    fn name(&self) -> &str {
        "min-context"
    }

    fn max_context(&self) -> usize {
        512
    }

    fn predict(&self, request: &ForecastRequest) -> Result<ForecastRows> {
        if request.context.len() < self.min_rows {
            return Err(ForecastError::Backend(format!(
                "need at least {} context rows, got {}",
                self.min_rows,
                request.context.len()
            )));
        }
        let last = request.context.rows.last().cloned().unwrap_or_default();
        Ok(ForecastRows {
            fields: request.context.fields.clone(),
            rows: vec![last; request.pred_len],
        })
    }
}

/// Always returns the same number of rows, whatever the horizon
pub struct FixedRowsBackend {
    pub rows: usize,
}

impl ForecastBackend for FixedRowsBackend {
    fn name(&self) -> &str {
        "fixed-rows"
    }

    fn max_context(&self) -> usize {
        512
    }

    fn predict(&self, request: &ForecastRequest) -> Result<ForecastRows> {
        Ok(ForecastRows {
            fields: request.context.fields.clone(),
            rows: vec![vec![1.0; request.context.fields.len()]; self.rows],
        })
    }
}
