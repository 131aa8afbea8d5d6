//! Forecasting backend contract
//!
//! The pretrained sequence model (tokenizer plus transformer) is an external
//! collaborator. This module defines what the predictor hands to it and what it
//! expects back, so that a local model, a remote service or a test double can
//! sit behind [`ForecastBackend`].

use crate::data::Field;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub mod drift;

pub use drift::DriftBackend;

/// Environment variable consulted once at startup to pick the compute device
pub const DEVICE_ENV_VAR: &str = "SKIN_FORECAST_DEVICE";

/// Stochastic decoding controls, passed through to the backend unmodified
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    /// Sampling temperature, must be positive
    pub temperature: f64,
    /// Nucleus sampling threshold in (0, 1]
    pub top_p: f64,
    /// Number of stochastic samples to draw and average
    pub sample_count: usize,
    /// Ask the backend for progress output
    pub verbose: bool,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.9,
            sample_count: 1,
            verbose: false,
        }
    }
}

impl SamplingParams {
    /// Check the parameter ranges the backend contract requires
    pub fn validate(&self) -> Result<()> {
        if !(self.temperature > 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "temperature must be positive, got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "top_p must be in (0, 1], got {}",
                self.top_p
            )));
        }
        if self.sample_count == 0 {
            return Err(ForecastError::InvalidParameter(
                "sample_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Historical rows handed to the backend as conditioning input
#[derive(Debug, Clone, PartialEq)]
pub struct ContextWindow {
    /// Fields of every row, in order
    pub fields: Vec<Field>,
    /// One date per row, strictly increasing
    pub timestamps: Vec<NaiveDate>,
    /// Row-major values, `fields.len()` per row
    pub rows: Vec<Vec<f64>>,
}

impl ContextWindow {
    /// Number of context rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the context has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one field across the context
    pub fn column(&self, field: Field) -> Option<Vec<f64>> {
        let idx = self.fields.iter().position(|f| *f == field)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }
}

/// A complete backend call
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    /// Conditioning rows
    pub context: ContextWindow,
    /// Dates of the rows to produce, in order
    pub future_timestamps: Vec<NaiveDate>,
    /// Number of rows to produce
    pub pred_len: usize,
    /// Decoding controls
    pub sampling: SamplingParams,
}

/// Rows returned by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRows {
    /// Fields of every row, in order
    pub fields: Vec<Field>,
    /// Row-major forecast values
    pub rows: Vec<Vec<f64>>,
}

/// A pretrained forecasting capability
///
/// Implementations must not keep per-call mutable state; the predictor shares one
/// backend across sequential and parallel calls.
pub trait ForecastBackend: Send + Sync {
    /// Name of the backend, for diagnostics
    fn name(&self) -> &str;

    /// Longest context the backend accepts
    fn max_context(&self) -> usize;

    /// Produce `request.pred_len` rows with the context's field schema
    fn predict(&self, request: &ForecastRequest) -> Result<ForecastRows>;
}

impl<B: ForecastBackend + ?Sized> ForecastBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn max_context(&self) -> usize {
        (**self).max_context()
    }

    fn predict(&self, request: &ForecastRequest) -> Result<ForecastRows> {
        (**self).predict(request)
    }
}

impl<B: ForecastBackend + ?Sized> ForecastBackend for Arc<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn max_context(&self) -> usize {
        (**self).max_context()
    }

    fn predict(&self, request: &ForecastRequest) -> Result<ForecastRows> {
        (**self).predict(request)
    }
}

/// Compute device the backend runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cuda,
    Mps,
    Cpu,
}

impl Device {
    /// Decide the device once: an explicit preference wins, then the
    /// `SKIN_FORECAST_DEVICE` environment variable, then the CPU.
    pub fn resolve(preferred: Option<Device>) -> Result<Device> {
        if let Some(device) = preferred {
            return Ok(device);
        }
        match std::env::var(DEVICE_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => value.parse(),
            _ => Ok(Device::Cpu),
        }
    }

    /// Lower-case device name
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Mps => "mps",
            Device::Cpu => "cpu",
        }
    }
}

impl FromStr for Device {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cuda" | "gpu" => Ok(Device::Cuda),
            "mps" => Ok(Device::Mps),
            "cpu" => Ok(Device::Cpu),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown device: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pretrained model and tokenizer identifiers plus the context ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub model_name: String,
    pub tokenizer_name: String,
    pub max_context: usize,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            model_name: "NeoQuasar/Kronos-small".to_string(),
            tokenizer_name: "NeoQuasar/Kronos-Tokenizer-base".to_string(),
            max_context: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sampling_is_valid() {
        assert!(SamplingParams::default().validate().is_ok());
    }

    #[test]
    fn sampling_ranges() {
        let base = SamplingParams::default();
        let cases = [
            SamplingParams { temperature: 0.0, ..base },
            SamplingParams { temperature: f64::NAN, ..base },
            SamplingParams { top_p: 0.0, ..base },
            SamplingParams { top_p: 1.5, ..base },
            SamplingParams { sample_count: 0, ..base },
        ];
        for params in cases {
            assert!(matches!(
                params.validate(),
                Err(ForecastError::InvalidParameter(_))
            ));
        }
        assert!(SamplingParams { top_p: 1.0, ..base }.validate().is_ok());
    }

    #[test]
    fn device_parsing() {
        assert_eq!("CUDA".parse::<Device>().unwrap(), Device::Cuda);
        assert_eq!(" mps ".parse::<Device>().unwrap(), Device::Mps);
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert!("tpu".parse::<Device>().is_err());
    }

    #[test]
    fn explicit_device_wins() {
        assert_eq!(Device::resolve(Some(Device::Mps)).unwrap(), Device::Mps);
    }

    #[test]
    fn context_column_extraction() {
        let context = ContextWindow {
            fields: vec![Field::Open, Field::Close],
            timestamps: vec![
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            ],
            rows: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        };
        assert_eq!(context.column(Field::Close), Some(vec![2.0, 4.0]));
        assert_eq!(context.column(Field::Volume), None);
    }
}
