//! Synthetic price path generators
//!
//! Every generator is driven by a single seeded [`StdRng`], so a seed always
//! reproduces the same series. Prices follow a multiplicative daily walk
//!
//! ```text
//! price[t] = max(price[t-1] * (1 + trend + event + crash + noise), 0.1)
//! ```
//!
//! where only `noise ~ N(0, volatility)` is always present. Volumes are drawn
//! after the whole price path.

use crate::{Result, SkinBar, SynthError};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};

/// Lowest price a skin can fall to
pub const PRICE_FLOOR: f64 = 0.1;

/// Default price of a freshly generated skin
pub const DEFAULT_BASE_PRICE: f64 = 10.0;

/// Default standard deviation of the daily return
pub const DEFAULT_VOLATILITY: f64 = 0.02;

/// Per-day trend range of the market-dynamics model (about 15-30% a year)
pub const MARKET_TREND: (f64, f64) = (0.0005, 0.001);

const EVENT_PERIOD_MIN: i64 = 80;
const EVENT_PERIOD_MAX: i64 = 120;
const EVENT_SPAN: i64 = 3;
const EVENT_RETURN: (f64, f64) = (0.03, 0.1);
const CRASH_PROBABILITY: f64 = 0.002;
const CRASH_DROP: (f64, f64) = (0.1, 0.4);

/// Base price range of a skin in a generated universe
const UNIVERSE_PRICE: (f64, f64) = (5.0, 50.0);

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// How daily traded volume is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeModel {
    /// `Poisson(rate)` independent of the price
    Flat(f64),
    /// `Poisson(base + per_price * price)`; pricier skins trade more
    PriceLinked { base: f64, per_price: f64 },
}

impl VolumeModel {
    fn rate(&self, price: f64) -> f64 {
        match *self {
            VolumeModel::Flat(rate) => rate,
            VolumeModel::PriceLinked { base, per_price } => base + per_price * price,
        }
    }

    fn validate(&self) -> Result<()> {
        let valid = match *self {
            VolumeModel::Flat(rate) => rate.is_finite() && rate > 0.0,
            VolumeModel::PriceLinked { base, per_price } => {
                base.is_finite() && base > 0.0 && per_price.is_finite() && per_price >= 0.0
            }
        };
        if valid {
            Ok(())
        } else {
            Err(SynthError::InvalidParameter(format!(
                "volume model {:?} does not give a positive rate",
                self
            )))
        }
    }
}

impl Default for VolumeModel {
    fn default() -> Self {
        VolumeModel::Flat(50.0)
    }
}

/// Builder for one synthetic skin series
#[derive(Debug, Clone)]
pub struct SkinGenerator {
    start_date: NaiveDate,
    days: usize,
    base_price: f64,
    volatility: f64,
    trend: Option<(f64, f64)>,
    events: bool,
    crashes: bool,
    volume: Option<VolumeModel>,
    seed: u64,
}

impl Default for SkinGenerator {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            days: 1000,
            base_price: DEFAULT_BASE_PRICE,
            volatility: DEFAULT_VOLATILITY,
            trend: None,
            events: false,
            crashes: false,
            volume: Some(VolumeModel::default()),
            seed: 42,
        }
    }
}

impl SkinGenerator {
    /// Plain random walk from $10 with flat volume
    pub fn new() -> Self {
        Self::default()
    }

    /// The market-dynamics model: trend, heat events, crashes and
    /// price-linked volume
    pub fn market() -> Self {
        Self::default()
            .trend(MARKET_TREND.0, MARKET_TREND.1)
            .events(true)
            .crashes(true)
            .volume_model(VolumeModel::PriceLinked {
                base: 30.0,
                per_price: 3.0,
            })
    }

    pub fn start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = start_date;
        self
    }

    pub fn days(mut self, days: usize) -> Self {
        self.days = days;
        self
    }

    pub fn base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    pub fn volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    /// Draw a fresh daily trend from `[low, high)` every day
    pub fn trend(mut self, low: f64, high: f64) -> Self {
        self.trend = Some((low, high));
        self
    }

    /// Recurring heat events that lift the price for a few days
    pub fn events(mut self, enabled: bool) -> Self {
        self.events = enabled;
        self
    }

    /// Rare one-day crashes
    pub fn crashes(mut self, enabled: bool) -> Self {
        self.crashes = enabled;
        self
    }

    /// Include volume and amount; keeps an explicitly chosen volume model
    pub fn ohlcva(mut self, enabled: bool) -> Self {
        self.volume = match (enabled, self.volume) {
            (false, _) => None,
            (true, Some(model)) => Some(model),
            (true, None) => Some(VolumeModel::default()),
        };
        self
    }

    pub fn volume_model(mut self, model: VolumeModel) -> Self {
        self.volume = Some(model);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.base_price.is_finite() && self.base_price > 0.0) {
            return Err(SynthError::InvalidParameter(format!(
                "base_price must be positive, got {}",
                self.base_price
            )));
        }
        if !(self.volatility.is_finite() && self.volatility >= 0.0) {
            return Err(SynthError::InvalidParameter(format!(
                "volatility must be non-negative, got {}",
                self.volatility
            )));
        }
        if let Some((low, high)) = self.trend {
            if !(low.is_finite() && high.is_finite() && low <= high) {
                return Err(SynthError::InvalidParameter(format!(
                    "trend range [{}, {}) is invalid",
                    low, high
                )));
            }
        }
        if let Some(model) = &self.volume {
            model.validate()?;
        }
        Ok(())
    }

    /// Generate the series
    pub fn generate(&self) -> Result<Vec<SkinBar>> {
        self.validate()?;
        if self.days == 0 {
            return Ok(Vec::new());
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let noise = Normal::new(0.0, self.volatility)
            .map_err(|e| SynthError::InvalidParameter(e.to_string()))?;

        let mut price = self.base_price;
        let mut prices = Vec::with_capacity(self.days);
        prices.push(price);
        for t in 1..self.days {
            let trend = match self.trend {
                Some((low, high)) => uniform(&mut rng, low, high),
                None => 0.0,
            };
            let event = if self.events && is_event_day(&mut rng, t as i64) {
                uniform(&mut rng, EVENT_RETURN.0, EVENT_RETURN.1)
            } else {
                0.0
            };
            let crash = if self.crashes && rng.gen::<f64>() < CRASH_PROBABILITY {
                -uniform(&mut rng, CRASH_DROP.0, CRASH_DROP.1)
            } else {
                0.0
            };

            let daily_return = trend + event + crash + noise.sample(&mut rng);
            price = (price * (1.0 + daily_return)).max(PRICE_FLOOR);
            prices.push(price);
        }

        let mut bars = Vec::with_capacity(self.days);
        for (i, price) in prices.into_iter().enumerate() {
            let timestamp = self
                .start_date
                .checked_add_signed(Duration::days(i as i64))
                .ok_or_else(|| {
                    SynthError::InvalidParameter(format!(
                        "{} days from {} leaves the calendar",
                        self.days, self.start_date
                    ))
                })?;
            bars.push(SkinBar::flat(timestamp, price));
        }

        if let Some(model) = self.volume {
            for bar in bars.iter_mut() {
                let poisson = Poisson::new(model.rate(bar.close))
                    .map_err(|e| SynthError::InvalidParameter(e.to_string()))?;
                let volume: f64 = poisson.sample(&mut rng);
                bar.volume = Some(volume);
                bar.amount = Some(bar.close * volume);
            }
        }

        Ok(bars)
    }
}

fn uniform(rng: &mut StdRng, low: f64, high: f64) -> f64 {
    if low < high {
        rng.gen_range(low..high)
    } else {
        low
    }
}

/// Each of the last `EVENT_SPAN` days is checked against a freshly drawn event
/// period; the check stops at the first hit.
fn is_event_day(rng: &mut StdRng, t: i64) -> bool {
    (0..EVENT_SPAN).any(|offset| {
        let period = rng.gen_range(EVENT_PERIOD_MIN..EVENT_PERIOD_MAX);
        (t - offset).rem_euclid(period) == 0
    })
}

/// Random walk from $10: daily return `N(0, 0.02)`, volume `Poisson(50)`,
/// starting 2021-01-01
pub fn generate_synthetic_skin(days: usize, seed: u64) -> Result<Vec<SkinBar>> {
    SkinGenerator::new().days(days).seed(seed).generate()
}

/// A skin with market dynamics starting at `base_price`
pub fn generate_one_skin(days: usize, seed: u64, base_price: f64) -> Result<Vec<SkinBar>> {
    SkinGenerator::market()
        .days(days)
        .seed(seed)
        .base_price(base_price)
        .generate()
}

/// `n_skins` independent market-dynamics skins named `skin_000`, `skin_001`, ...
///
/// Base prices are drawn from `U(5, 50)` with `seed`; skin `i` is generated
/// with seed `seed + i`.
pub fn generate_skin_universe(
    n_skins: usize,
    days: usize,
    seed: u64,
) -> Result<Vec<(String, Vec<SkinBar>)>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut universe = Vec::with_capacity(n_skins);
    for i in 0..n_skins {
        let base_price = uniform(&mut rng, UNIVERSE_PRICE.0, UNIVERSE_PRICE.1);
        let bars = generate_one_skin(days, seed.wrapping_add(i as u64), base_price)?;
        universe.push((format!("skin_{:03}", i), bars));
    }
    Ok(universe)
}
