mod common;

use common::{daily_frame, day, ohlc_frame, FixedRowsBackend, RecordingBackend};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use skin_forecast::backend::SamplingParams;
use skin_forecast::data::Field;
use skin_forecast::{ForecastError, PredictorConfig, SkinPredictor};

const CONTEXT_ROWS: usize = 16;

fn predictor() -> SkinPredictor<RecordingBackend> {
    SkinPredictor::with_config(
        RecordingBackend::new(32),
        PredictorConfig {
            context_rows: CONTEXT_ROWS,
        },
    )
}

#[rstest]
#[case(1)]
#[case(CONTEXT_ROWS - 1)]
#[case(CONTEXT_ROWS)]
#[case(CONTEXT_ROWS + 1)]
#[case(CONTEXT_ROWS * 10)]
fn test_context_is_most_recent_suffix(#[case] rows: usize) {
    let predictor = predictor();
    let df = ohlc_frame(rows);

    predictor
        .predict(&df, 3, &SamplingParams::default())
        .unwrap();

    let request = predictor.backend().last_request();
    let expected = rows.min(CONTEXT_ROWS);
    assert_eq!(request.context.len(), expected);
    assert_eq!(request.context.timestamps.len(), expected);

    let first = (rows - expected) as i64;
    let expected_dates: Vec<_> = (first..rows as i64).map(day).collect();
    assert_eq!(request.context.timestamps, expected_dates);

    let closes = request.context.column(Field::Close).unwrap();
    let expected_closes: Vec<f64> = (rows - expected + 1..=rows).map(|v| v as f64).collect();
    assert_eq!(closes, expected_closes);
}

#[test]
fn test_empty_series_fails() {
    let predictor = predictor();
    let df = ohlc_frame(0);

    let result = predictor.predict(&df, 3, &SamplingParams::default());
    assert!(matches!(result, Err(ForecastError::EmptySeries)));
    assert_eq!(predictor.backend().calls(), 0);
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(14)]
#[case(40)]
fn test_horizon_follows_last_context_date(#[case] pred_days: usize) {
    let predictor = predictor();
    let df = ohlc_frame(20);

    let forecast = predictor
        .predict(&df, pred_days, &SamplingParams::default())
        .unwrap();

    let expected: Vec<_> = (20..20 + pred_days as i64).map(day).collect();
    let request = predictor.backend().last_request();
    assert_eq!(request.future_timestamps, expected);
    assert_eq!(request.pred_len, pred_days);
    assert_eq!(forecast.len(), pred_days);
    assert_eq!(forecast.timestamps(), expected.as_slice());
    assert!(forecast.timestamps().windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_thirty_day_ohlc_scenario() {
    let predictor = predictor();
    let df = ohlc_frame(30);

    let forecast = predictor
        .predict(&df, 7, &SamplingParams::default())
        .unwrap();

    assert_eq!(forecast.len(), 7);
    assert_eq!(forecast.timestamps()[0], day(30));
    assert_eq!(forecast.timestamps()[6], day(36));
    assert_eq!(forecast.fields(), Field::PRICES.as_slice());

    let table = forecast.to_dataframe().unwrap();
    assert_eq!(
        table.get_column_names(),
        vec!["timestamps", "open", "high", "low", "close"]
    );
    assert_eq!(table.column("timestamps").unwrap().dtype(), &DataType::Date);
}

#[rstest]
#[case(&[Field::Open, Field::High, Field::Low, Field::Close, Field::Volume], Field::PRICES.to_vec())]
#[case(&[Field::Open, Field::High, Field::Low, Field::Close, Field::Amount], Field::PRICES.to_vec())]
#[case(&Field::PRICES, Field::PRICES.to_vec())]
#[case(&Field::ALL, Field::ALL.to_vec())]
fn test_volume_amount_travel_together(#[case] columns: &[Field], #[case] forwarded: Vec<Field>) {
    let predictor = predictor();
    let df = daily_frame(10, columns);

    let forecast = predictor
        .predict(&df, 2, &SamplingParams::default())
        .unwrap();

    let request = predictor.backend().last_request();
    assert_eq!(request.context.fields, forwarded);
    assert!(request
        .context
        .rows
        .iter()
        .all(|row| row.len() == forwarded.len()));
    assert_eq!(forecast.fields(), forwarded.as_slice());
}

#[test]
fn test_missing_mandatory_columns() {
    let predictor = predictor();
    let df = daily_frame(10, &[Field::Open, Field::Close]);

    match predictor.predict(&df, 3, &SamplingParams::default()) {
        Err(ForecastError::Schema(missing)) => {
            assert_eq!(missing, vec!["high".to_string(), "low".to_string()])
        }
        other => panic!("expected schema error, got {:?}", other),
    }
    assert_eq!(predictor.backend().calls(), 0);
}

#[test]
fn test_missing_timestamp_column() {
    let predictor = predictor();
    let df = ohlc_frame(10).drop("timestamps").unwrap();

    let result = predictor.predict(&df, 3, &SamplingParams::default());
    assert!(matches!(result, Err(ForecastError::Schema(cols)) if cols == vec!["timestamps".to_string()]));
}

#[test]
fn test_sampling_params_are_forwarded() {
    let predictor = predictor();
    let sampling = SamplingParams {
        temperature: 1.2,
        top_p: 0.5,
        sample_count: 4,
        verbose: true,
    };

    predictor.predict(&ohlc_frame(10), 2, &sampling).unwrap();
    assert_eq!(predictor.backend().last_request().sampling, sampling);
}

#[test]
fn test_row_count_mismatch() {
    let predictor = SkinPredictor::new(FixedRowsBackend { rows: 6 });

    let result = predictor.predict(&ohlc_frame(30), 7, &SamplingParams::default());
    assert!(matches!(
        result,
        Err(ForecastError::IndexMismatch {
            expected: 7,
            actual: 6
        })
    ));
}

#[test]
fn test_context_above_backend_ceiling_is_rejected() {
    let predictor = SkinPredictor::with_config(
        RecordingBackend::new(8),
        PredictorConfig { context_rows: 400 },
    );

    let result = predictor.predict(&ohlc_frame(20), 3, &SamplingParams::default());
    assert!(matches!(
        result,
        Err(ForecastError::ContextOverflow { rows: 20, max: 8 })
    ));
    assert_eq!(predictor.backend().calls(), 0);

    // Short series still fit
    assert!(predictor
        .predict(&ohlc_frame(8), 3, &SamplingParams::default())
        .is_ok());
}

#[test]
fn test_zero_horizon_is_rejected() {
    let predictor = predictor();
    let result = predictor.predict(&ohlc_frame(10), 0, &SamplingParams::default());
    assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
}

#[test]
fn test_invalid_sampling_is_rejected() {
    let predictor = predictor();
    let sampling = SamplingParams {
        top_p: 0.0,
        ..SamplingParams::default()
    };
    let result = predictor.predict(&ohlc_frame(10), 3, &sampling);
    assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
}

#[test]
fn test_input_is_not_mutated() {
    let predictor = predictor();
    let df = daily_frame(25, &Field::ALL);
    let before = df.clone();

    predictor
        .predict(&df, 5, &SamplingParams::default())
        .unwrap();
    assert!(df.frame_equal(&before));
}

#[test]
fn test_negative_prices_are_accepted() {
    let predictor = predictor();
    let mut df = ohlc_frame(5);
    df.with_column(Series::new("close", vec![-1.0, -2.0, 3.0, -4.0, 5.0]))
        .unwrap();

    let forecast = predictor
        .predict(&df, 2, &SamplingParams::default())
        .unwrap();
    assert_eq!(forecast.column(Field::Close), Some(vec![5.0, 5.0]));
}
