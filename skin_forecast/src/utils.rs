//! Utility functions for the skin_forecast crate

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};

/// Step between consecutive horizon dates
pub fn frequency_step(frequency: &str) -> Result<Duration> {
    match frequency {
        "daily" | "d" | "D" | "1d" => Ok(Duration::days(1)),
        "weekly" | "w" | "W" | "1w" => Ok(Duration::weeks(1)),
        _ => Err(ForecastError::InvalidParameter(format!(
            "Unsupported frequency: {}",
            frequency
        ))),
    }
}

/// Create the forecast horizon: `horizon` dates after `last`, spaced by `frequency`
///
/// ```
/// use chrono::NaiveDate;
/// use skin_forecast::utils::future_dates;
///
/// let last = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
/// let dates = future_dates(last, 3, "D").unwrap();
/// assert_eq!(dates[0], NaiveDate::from_ymd_opt(2024, 2, 28).unwrap());
/// assert_eq!(dates[2], NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
/// ```
pub fn future_dates(last: NaiveDate, horizon: usize, frequency: &str) -> Result<Vec<NaiveDate>> {
    let step = frequency_step(frequency)?;
    let mut dates = Vec::with_capacity(horizon);
    let mut current = last;

    for _ in 0..horizon {
        current = current.checked_add_signed(step).ok_or_else(|| {
            ForecastError::Data(format!("Horizon date overflows after {}", current))
        })?;
        dates.push(current);
    }

    Ok(dates)
}
