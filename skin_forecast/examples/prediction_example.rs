use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use skin_forecast::backend::{Device, DriftBackend, ModelSpec, SamplingParams};
use skin_forecast::data::{date_series, DEFAULT_ID_COLUMN};
use skin_forecast::SkinPredictor;

const PRED_DAYS: usize = 7;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Skin Forecast: Prediction Example");
    println!("=================================\n");

    let device = Device::resolve(None)?;
    let backend = DriftBackend::new(ModelSpec::default(), device).with_seed(42);
    let predictor = SkinPredictor::new(backend);
    let sampling = SamplingParams::default();

    // Single series, OHLC plus volume/amount
    let history = create_sample_skin(120, 10.0, 0.0008)?;
    let forecast = predictor.predict(&history, PRED_DAYS, &sampling)?;
    println!("Single skin forecast ({} days):", PRED_DAYS);
    println!("{}\n", forecast.to_dataframe()?);

    // Three skins in one long table; skin_002 has no `low` values and is skipped
    let mut table = tag(create_sample_skin(90, 12.0, 0.001)?, "skin_000")?;
    table.vstack_mut(&tag(create_sample_skin(90, 35.0, -0.0005)?, "skin_001")?)?;
    let mut broken = create_sample_skin(30, 8.0, 0.0)?;
    broken.with_column(Series::full_null("low", 30, &DataType::Float64))?;
    table.vstack_mut(&tag(broken, "skin_002")?)?;

    let combined = predictor.predict_batch(&table, DEFAULT_ID_COLUMN, PRED_DAYS, &sampling)?;
    println!("Batch forecast for {:?}:", combined.ids());
    println!("{}", combined.to_dataframe()?);
    for (id, error) in combined.failures() {
        println!("  {} failed: {}", id, error);
    }

    Ok(())
}

/// Smooth upward-drifting price path with a weekly cycle
fn create_sample_skin(days: usize, base_price: f64, trend: f64) -> Result<DataFrame, Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).ok_or("invalid start date")?;
    let dates: Vec<NaiveDate> = (0..days).map(|i| start + Duration::days(i as i64)).collect();
    let prices: Vec<f64> = (0..days)
        .map(|i| {
            let t = i as f64;
            base_price * (1.0 + trend).powf(t) * (1.0 + 0.02 * (t * std::f64::consts::TAU / 7.0).sin())
        })
        .collect();
    let volume: Vec<f64> = (0..days).map(|i| 40.0 + (i % 5) as f64 * 3.0).collect();
    let amount: Vec<f64> = prices.iter().zip(&volume).map(|(p, v)| p * v).collect();

    let df = DataFrame::new(vec![
        date_series("timestamps", &dates)?,
        Series::new("open", &prices),
        Series::new("high", &prices),
        Series::new("low", &prices),
        Series::new("close", &prices),
        Series::new("volume", volume),
        Series::new("amount", amount),
    ])?;
    Ok(df)
}

fn tag(mut df: DataFrame, id: &str) -> PolarsResult<DataFrame> {
    let ids = Series::new(DEFAULT_ID_COLUMN, vec![id; df.height()]);
    df.with_column(ids)?;
    Ok(df)
}
