use crate::config::{DATE_FORMAT, MAX_FORECAST_DAYS};
use crate::data::{is_trading_day, next_trading_day, PricePoint, PriceSeries};
use crate::error::InputError;
use crate::train::TrainedPredictor;
use anyhow::Result;
use candle_core::Tensor;
use chrono::NaiveDate;

/// Predicts the close that follows `last_sequence` (raw prices, oldest first).
pub fn predict_next_price(predictor: &TrainedPredictor, last_sequence: &[f64]) -> Result<f64> {
    if last_sequence.len() != predictor.look_back {
        anyhow::bail!(
            "Prediction needs exactly {} closes, got {}",
            predictor.look_back,
            last_sequence.len()
        );
    }

    let scaled: Vec<f32> = predictor
        .scaler
        .transform(last_sequence)
        .into_iter()
        .map(|v| v as f32)
        .collect();
    let x = Tensor::from_vec(scaled, (1, predictor.look_back, 1), &predictor.device)?;
    let y = predictor.model.forward(&x, false)?;
    let scaled_prediction = y.flatten_all()?.to_vec1::<f32>()?;
    let scaled_prediction = scaled_prediction
        .first()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("Model produced no output"))?;

    Ok(predictor.scaler.inverse_one(scaled_prediction as f64))
}

/// Predicts the close of the trading day after the end of `series`.
pub fn predict_next_close(predictor: &TrainedPredictor, series: &PriceSeries) -> Result<PricePoint> {
    let closes = series.closes();
    if closes.len() < predictor.look_back {
        return Err(InputError::NotEnoughData {
            len: closes.len(),
            look_back: predictor.look_back,
        }
        .into());
    }
    let last = series
        .last()
        .ok_or_else(|| InputError::NoData { symbol: series.symbol.clone() })?;
    let window = &closes[closes.len() - predictor.look_back..];
    Ok(PricePoint {
        date: next_trading_day(last.date),
        close: predict_next_price(predictor, window)?,
    })
}

/// Rolls predictions forward one weekday at a time until `target`, feeding
/// each prediction back into the window. `target` must be a weekday after the
/// end of `series`; the last point is the target day.
pub fn forecast_until(
    predictor: &TrainedPredictor,
    series: &PriceSeries,
    target: NaiveDate,
) -> Result<Vec<PricePoint>> {
    if !is_trading_day(target) {
        return Err(InputError::PredictDateNotTradingDay {
            date: target.format(DATE_FORMAT).to_string(),
        }
        .into());
    }
    let last = series
        .last()
        .ok_or_else(|| InputError::NoData { symbol: series.symbol.clone() })?;
    if target <= last.date {
        return Err(InputError::PredictDateNotAhead {
            last: last.date.format(DATE_FORMAT).to_string(),
        }
        .into());
    }

    let closes = series.closes();
    if closes.len() < predictor.look_back {
        return Err(InputError::NotEnoughData {
            len: closes.len(),
            look_back: predictor.look_back,
        }
        .into());
    }
    let mut window: Vec<f64> = closes[closes.len() - predictor.look_back..].to_vec();

    let mut forecast = Vec::new();
    let mut date = last.date;
    while date < target {
        if forecast.len() >= MAX_FORECAST_DAYS {
            anyhow::bail!(
                "Predict date is more than {} trading days ahead",
                MAX_FORECAST_DAYS
            );
        }
        date = next_trading_day(date);
        let close = predict_next_price(predictor, &window)?;
        window.remove(0);
        window.push(close);
        forecast.push(PricePoint { date, close });
    }

    Ok(forecast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::{train_blocking, TrainOptions};

    fn quick_predictor(series: &PriceSeries, dir: &std::path::Path) -> TrainedPredictor {
        let options = TrainOptions {
            epochs: 2,
            batch_size: 16,
            checkpoint_path: dir.join("best.safetensors"),
            log_dir: None,
            ..TrainOptions::default()
        };
        train_blocking(series, &options, None).unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_predict_next_price_is_finite_and_checks_length() {
        let dir = tempfile::tempdir().unwrap();
        let series = PriceSeries::new_mock("TEST", 60);
        let predictor = quick_predictor(&series, dir.path());

        let closes = series.closes();
        let window = &closes[closes.len() - 10..];
        let price = predict_next_price(&predictor, window).unwrap();
        assert!(price.is_finite());

        assert!(predict_next_price(&predictor, &closes[..5]).is_err());
    }

    #[test]
    fn test_forecast_until_steps_weekdays() {
        let dir = tempfile::tempdir().unwrap();
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        // 60 weekdays from Monday 2024-01-01 end on Friday 2024-03-22.
        let series = PriceSeries::from_closes("SINE", d("2024-01-01"), &closes);
        assert_eq!(series.last().unwrap().date, d("2024-03-22"));
        let predictor = quick_predictor(&series, dir.path());

        let forecast = forecast_until(&predictor, &series, d("2024-03-27")).unwrap();
        let dates: Vec<NaiveDate> = forecast.iter().map(|p| p.date).collect();
        assert_eq!(
            dates,
            vec![d("2024-03-25"), d("2024-03-26"), d("2024-03-27")]
        );
        assert!(forecast.iter().all(|p| p.close.is_finite()));

        let next = predict_next_close(&predictor, &series).unwrap();
        assert_eq!(next.date, d("2024-03-25"));
        assert_eq!(next.close, forecast[0].close);
    }

    #[test]
    fn test_forecast_until_rejects_weekend_target() {
        let dir = tempfile::tempdir().unwrap();
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let series = PriceSeries::from_closes("SINE", d("2024-01-01"), &closes);
        let predictor = quick_predictor(&series, dir.path());

        for weekend in ["2024-03-23", "2024-03-24", "2024-03-30"] {
            let err = forecast_until(&predictor, &series, d(weekend)).unwrap_err();
            assert_eq!(
                err.downcast_ref::<InputError>(),
                Some(&InputError::PredictDateNotTradingDay { date: weekend.into() })
            );
        }

        let forecast = forecast_until(&predictor, &series, d("2024-03-29")).unwrap();
        assert_eq!(forecast.len(), 5);
        assert_eq!(forecast.last().unwrap().date, d("2024-03-29"));
    }

    #[test]
    fn test_forecast_until_rejects_past_dates() {
        let dir = tempfile::tempdir().unwrap();
        let series = PriceSeries::from_closes("T", d("2024-01-01"), &[1.0; 30]);
        let predictor = quick_predictor(&series, dir.path());
        let err = forecast_until(&predictor, &series, d("2024-01-05")).unwrap_err();
        assert!(err.to_string().starts_with("Predict date must be after"));
    }
}
