//! TOML configuration for the predictor, the backend and batch runs
//!
//! ```toml
//! [model]
//! model_name = "NeoQuasar/Kronos-small"
//! tokenizer_name = "NeoQuasar/Kronos-Tokenizer-base"
//! max_context = 512
//! device = "cpu"
//!
//! [predictor]
//! context_rows = 400
//! pred_days = 7
//! temperature = 0.8
//! top_p = 0.9
//! sample_count = 1
//!
//! [batch]
//! id_column = "skin_id"
//! progress_every = 50
//! parallel = false
//! ```
//!
//! Every key is optional and falls back to the values above.

use crate::backend::{Device, ModelSpec, SamplingParams};
use crate::batch::BatchOptions;
use crate::data::DEFAULT_ID_COLUMN;
use crate::error::{ForecastError, Result};
use crate::predictor::PredictorConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub model: ModelConfig,
    pub predictor: PredictorSection,
    pub batch: BatchSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_name: String,
    pub tokenizer_name: String,
    pub max_context: usize,
    /// Unset means: resolve from the environment at startup
    pub device: Option<Device>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let spec = ModelSpec::default();
        Self {
            model_name: spec.model_name,
            tokenizer_name: spec.tokenizer_name,
            max_context: spec.max_context,
            device: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PredictorSection {
    pub context_rows: usize,
    pub pred_days: usize,
    pub temperature: f64,
    pub top_p: f64,
    pub sample_count: usize,
    pub verbose: bool,
    pub seed: Option<u64>,
}

impl Default for PredictorSection {
    fn default() -> Self {
        let sampling = SamplingParams::default();
        Self {
            context_rows: PredictorConfig::default().context_rows,
            pred_days: 7,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            sample_count: sampling.sample_count,
            verbose: sampling.verbose,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    pub id_column: String,
    pub progress_every: usize,
    pub parallel: bool,
}

impl Default for BatchSection {
    fn default() -> Self {
        let options = BatchOptions::default();
        Self {
            id_column: DEFAULT_ID_COLUMN.to_string(),
            progress_every: options.progress_every,
            parallel: options.parallel,
        }
    }
}

impl ForecastConfig {
    /// Load and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ForecastError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks
    pub fn validate(&self) -> Result<()> {
        if self.model.max_context == 0 {
            return Err(ForecastError::Config(
                "model.max_context must be at least 1".to_string(),
            ));
        }
        if self.predictor.context_rows == 0 {
            return Err(ForecastError::Config(
                "predictor.context_rows must be at least 1".to_string(),
            ));
        }
        if self.predictor.context_rows > self.model.max_context {
            return Err(ForecastError::Config(format!(
                "predictor.context_rows ({}) exceeds model.max_context ({})",
                self.predictor.context_rows, self.model.max_context
            )));
        }
        if self.predictor.pred_days == 0 {
            return Err(ForecastError::Config(
                "predictor.pred_days must be at least 1".to_string(),
            ));
        }
        if self.batch.id_column.trim().is_empty() {
            return Err(ForecastError::Config(
                "batch.id_column must not be empty".to_string(),
            ));
        }
        self.sampling()
            .validate()
            .map_err(|e| ForecastError::Config(e.to_string()))
    }

    pub fn model_spec(&self) -> ModelSpec {
        ModelSpec {
            model_name: self.model.model_name.clone(),
            tokenizer_name: self.model.tokenizer_name.clone(),
            max_context: self.model.max_context,
        }
    }

    /// Resolve the compute device; call once at startup
    pub fn device(&self) -> Result<Device> {
        Device::resolve(self.model.device)
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.predictor.temperature,
            top_p: self.predictor.top_p,
            sample_count: self.predictor.sample_count,
            verbose: self.predictor.verbose,
        }
    }

    pub fn predictor_config(&self) -> PredictorConfig {
        PredictorConfig {
            context_rows: self.predictor.context_rows,
        }
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            progress_every: self.batch.progress_every,
            parallel: self.batch.parallel,
            cancel: None,
        }
    }
}
