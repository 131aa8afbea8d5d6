//! # Skin Synth
//!
//! Deterministic synthetic daily price series for CS2 skins.
//!
//! Two flavours are provided:
//!
//! - **Random walk**: a plain `N(0, 2%)` daily walk from $10 with flat
//!   Poisson(50) volume ([`generate_synthetic_skin`])
//! - **Market dynamics**: slow upward trend, recurring heat events and rare
//!   crashes, with volume that grows with the price ([`generate_one_skin`])
//!
//! [`generate_skin_universe`] builds many independent skins for batch runs, and
//! the [`export`] module writes the CSV files the forecaster reads.
//!
//! ## Usage Example
//!
//! ```
//! use skin_synth::{generate_one_skin, generate_synthetic_skin};
//!
//! let walk = generate_synthetic_skin(30, 42).unwrap();
//! assert_eq!(walk.len(), 30);
//! assert_eq!(walk[0].close, 10.0);
//!
//! let skin = generate_one_skin(30, 7, 25.0).unwrap();
//! assert!(skin.iter().all(|bar| bar.close >= 0.1));
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod export;
pub mod generator;

pub use export::{write_series_csv, write_universe_csv, CsvLayout};
pub use generator::{
    generate_one_skin, generate_skin_universe, generate_synthetic_skin, SkinGenerator, VolumeModel,
};

/// Errors raised while generating or exporting synthetic series
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for synthetic data operations
pub type Result<T> = std::result::Result<T, SynthError>;

/// One synthetic trading day
///
/// Skins trade at a single observed price per day, so open, high, low and
/// close are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinBar {
    #[serde(rename = "timestamps")]
    pub timestamp: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Units traded, when the generator models activity
    pub volume: Option<f64>,
    /// Traded value, `close * volume`
    pub amount: Option<f64>,
}

impl SkinBar {
    /// A bar whose OHLC prices all equal `price`
    pub fn flat(timestamp: NaiveDate, price: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: None,
            amount: None,
        }
    }

    /// Attach a volume and derive the amount from the close
    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self.amount = Some(self.close * volume);
        self
    }
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
