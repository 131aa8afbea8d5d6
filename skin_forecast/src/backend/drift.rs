//! Log-return drift backend
//!
//! A local stand-in for the pretrained model with the same contract. It fits the
//! mean and spread of daily log returns of `close` over the context and averages
//! `sample_count` simulated paths. Temperature scales the shocks and `top_p`
//! clamps each standard-normal draw to the central `top_p` mass.

use super::{Device, ForecastBackend, ForecastRequest, ForecastRows, ModelSpec};
use crate::data::Field;
use crate::error::{ForecastError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use statrs::distribution::{ContinuousCDF, Normal};

/// Context rows averaged for the volume forecast
const VOLUME_WINDOW: usize = 20;

/// Drift-and-volatility simulation backend
#[derive(Debug, Clone)]
pub struct DriftBackend {
    spec: ModelSpec,
    device: Device,
    seed: Option<u64>,
}

impl DriftBackend {
    /// Create a backend for the given model spec on an already resolved device
    pub fn new(spec: ModelSpec, device: Device) -> Self {
        tracing::info!(
            model = %spec.model_name,
            tokenizer = %spec.tokenizer_name,
            max_context = spec.max_context,
            device = %device,
            "Drift backend ready"
        );
        Self {
            spec,
            device,
            seed: None,
        }
    }

    /// Make every call deterministic
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Model spec the backend was built for
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Device the backend was built for
    pub fn device(&self) -> Device {
        self.device
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Mean and population standard deviation of the finite log returns
fn log_return_stats(closes: &[f64]) -> (f64, f64) {
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .filter(|r| r.is_finite())
        .collect();

    if returns.is_empty() {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Largest |z| kept for a nucleus threshold
fn shock_bound(top_p: f64) -> Result<f64> {
    if top_p >= 1.0 {
        return Ok(f64::INFINITY);
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| ForecastError::Backend(e.to_string()))?;
    Ok(normal.inverse_cdf(0.5 + top_p / 2.0))
}

impl ForecastBackend for DriftBackend {
    fn name(&self) -> &str {
        &self.spec.model_name
    }

    fn max_context(&self) -> usize {
        self.spec.max_context
    }

    fn predict(&self, request: &ForecastRequest) -> Result<ForecastRows> {
        let context = &request.context;
        if context.is_empty() {
            return Err(ForecastError::Backend("empty context".to_string()));
        }
        if context.len() > self.spec.max_context {
            return Err(ForecastError::Backend(format!(
                "context of {} rows exceeds max_context {}",
                context.len(),
                self.spec.max_context
            )));
        }
        let closes = context
            .column(Field::Close)
            .ok_or_else(|| ForecastError::Backend("context has no close column".to_string()))?;

        let sampling = &request.sampling;
        let (mu, sigma) = log_return_stats(&closes);
        let bound = shock_bound(sampling.top_p)?;
        let mut rng = self.rng();

        let mut ratios = vec![0.0; request.pred_len];
        for sample in 0..sampling.sample_count {
            let mut cumulative = 0.0;
            for ratio in ratios.iter_mut() {
                let z: f64 = StandardNormal.sample(&mut rng);
                cumulative += mu + sigma * sampling.temperature * z.clamp(-bound, bound);
                *ratio += cumulative.exp();
            }
            if sampling.verbose {
                tracing::info!(sample = sample + 1, of = sampling.sample_count, "Sample drawn");
            }
        }
        for ratio in ratios.iter_mut() {
            *ratio /= sampling.sample_count as f64;
        }

        let last = context.rows.last().cloned().unwrap_or_default();
        let last_close = closes.last().copied().unwrap_or(f64::NAN);
        let volume = context.column(Field::Volume).map(|volumes| {
            let window = &volumes[volumes.len().saturating_sub(VOLUME_WINDOW)..];
            window.iter().sum::<f64>() / window.len() as f64
        });

        let rows = ratios
            .iter()
            .map(|ratio| {
                context
                    .fields
                    .iter()
                    .zip(last.iter())
                    .map(|(field, last_value)| match (field, volume) {
                        (Field::Volume, Some(volume)) => volume,
                        (Field::Amount, Some(volume)) => last_close * ratio * volume,
                        _ => last_value * ratio,
                    })
                    .collect()
            })
            .collect();

        Ok(ForecastRows {
            fields: context.fields.clone(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn flat_prices_have_no_drift() {
        let (mu, sigma) = log_return_stats(&[10.0, 10.0, 10.0]);
        assert_eq!(mu, 0.0);
        assert_eq!(sigma, 0.0);
    }

    #[test]
    fn single_row_has_no_returns() {
        assert_eq!(log_return_stats(&[10.0]), (0.0, 0.0));
    }

    #[test]
    fn constant_growth_drift() {
        let (mu, sigma) = log_return_stats(&[100.0, 110.0, 121.0]);
        assert_relative_eq!(mu, 1.1_f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(sigma, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn nucleus_bound() {
        assert!(shock_bound(1.0).unwrap().is_infinite());
        assert_relative_eq!(shock_bound(0.95).unwrap(), 1.959964, epsilon = 1e-5);
    }
}
