//! # Skin Forecast
//!
//! Forecasting of CS2 skin price series on top of a pretrained time-series
//! forecasting backend.
//!
//! ## Features
//!
//! - Schema-checked OHLC(VA) series tables (polars `DataFrame`s)
//! - A [`ForecastBackend`] trait for the opaque sequence model, with a built-in
//!   log-return drift backend for local runs
//! - Single-series forecasting with context clipping and explicit horizon dates
//! - Batch forecasting over many series with per-series failure isolation
//! - TOML configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use skin_forecast::backend::{Device, DriftBackend, ModelSpec, SamplingParams};
//! use skin_forecast::data::DataLoader;
//! use skin_forecast::SkinPredictor;
//!
//! # fn main() -> skin_forecast::Result<()> {
//! let device = Device::resolve(None)?;
//! let backend = DriftBackend::new(ModelSpec::default(), device);
//! let predictor = SkinPredictor::new(backend);
//!
//! let history = DataLoader::from_csv("synthetic_skin_data.csv")?;
//! let forecast = predictor.predict(&history, 7, &SamplingParams::default())?;
//! println!("{}", forecast.to_dataframe()?);
//!
//! let universe = DataLoader::from_csv("synthetic_500_skins_ohlc.csv")?;
//! let combined = predictor.predict_batch(&universe, "skin_id", 7, &SamplingParams::default())?;
//! println!("{} skins forecast", combined.ids().len());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod batch;
pub mod config;
pub mod data;
pub mod error;
pub mod predictor;
pub mod utils;

// Re-export commonly used types
pub use crate::backend::{ForecastBackend, SamplingParams};
pub use crate::batch::{BatchForecast, BatchOptions, BatchOutcome, BatchReport, CancelFlag};
pub use crate::config::ForecastConfig;
pub use crate::data::{DataLoader, Field, PriceSeries};
pub use crate::error::{ForecastError, Result};
pub use crate::predictor::{Forecast, PredictorConfig, SkinPredictor};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
