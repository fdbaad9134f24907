use crate::core::fit::{fit_logistic, FitOptions, FitReport};
use crate::domain::model::{CumulativeSeries, Forecast, LogisticModel};
use crate::utils::error::{Result, ScurveError};

pub const MIN_HISTORY_POINTS: usize = 3;
pub const DEFAULT_FUTURE_YEARS: usize = 20;
pub const MAX_FUTURE_YEARS: usize = 500;
pub const SATURATION_FRACTION: f64 = 0.99;
const INITIAL_GROWTH_RATE: f64 = 0.1;

/// Fits the logistic S-curve to a cumulative series and projects it forward.
#[derive(Debug, Clone, Copy, Default)]
pub struct SCurveForecaster {
    options: FitOptions,
}

impl SCurveForecaster {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    pub fn with_max_evaluations(max_evaluations: usize) -> Self {
        Self::new(FitOptions {
            max_evaluations,
            ..FitOptions::default()
        })
    }

    pub fn fit(&self, series: &CumulativeSeries) -> Result<FitReport> {
        if series.len() < MIN_HISTORY_POINTS {
            return Err(ScurveError::InsufficientData {
                points: series.len(),
                required: MIN_HISTORY_POINTS,
            });
        }

        let ts: Vec<f64> = series.points().iter().map(|(year, _)| f64::from(*year)).collect();
        let ys: Vec<f64> = series.points().iter().map(|(_, count)| *count as f64).collect();

        let initial = LogisticModel {
            k: ys.iter().cloned().fold(0.0, f64::max),
            t_m: ts.iter().sum::<f64>() / ts.len() as f64,
            r: INITIAL_GROWTH_RATE,
        };

        let report = fit_logistic(&ts, &ys, initial, &self.options)?;
        let model = report.model;
        if !(model.k.is_finite() && model.t_m.is_finite() && model.r.is_finite()) {
            return Err(ScurveError::FitDivergence {
                message: format!("non-finite parameters {:?}", model),
            });
        }

        tracing::info!(
            "Fitted logistic model K={:.4}, t_m={:.4}, r={:.6} ({} evaluations)",
            model.k,
            model.t_m,
            model.r,
            report.evaluations
        );
        Ok(report)
    }

    pub fn forecast(
        &self,
        code: &str,
        series: &CumulativeSeries,
        future_years: usize,
    ) -> Result<Forecast> {
        if future_years == 0 || future_years > MAX_FUTURE_YEARS {
            return Err(ScurveError::invalid_request(format!(
                "future_years must be between 1 and {}, got {}",
                MAX_FUTURE_YEARS, future_years
            )));
        }

        let model = self.fit(series)?.model;
        // fit() guarantees at least MIN_HISTORY_POINTS points
        let last_year = series.last_year().unwrap_or_default();

        let future: Vec<(i32, f64)> = (1..=future_years as i32)
            .map(|offset| {
                let year = last_year + offset;
                (year, model.evaluate(f64::from(year)))
            })
            .collect();

        let saturation_level = SATURATION_FRACTION * model.k;
        let saturation = saturation_year(&future, saturation_level);
        let horizon_end_year = future.last().map(|(year, _)| *year);

        if saturation.is_none() {
            tracing::info!(
                "CPC code {} does not reach {:.2} within {} projected years",
                code,
                saturation_level,
                future_years
            );
        }

        Ok(Forecast {
            code: code.to_string(),
            historical: series.clone(),
            future,
            model,
            saturation_level,
            saturation_year: saturation,
            saturation_beyond_horizon: saturation.is_none(),
            horizon_end_year,
        })
    }
}

/// First projected year whose value reaches `level`. Predictions are
/// non-decreasing because `r ≥ 0`, so a lower-bound search is enough.
pub fn saturation_year(future: &[(i32, f64)], level: f64) -> Option<i32> {
    let index = future.partition_point(|(_, value)| *value < level);
    future.get(index).map(|(year, _)| *year)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact_series(model: LogisticModel, years: std::ops::RangeInclusive<i32>) -> CumulativeSeries {
        CumulativeSeries::from_points(
            years
                .map(|year| (year, model.evaluate(f64::from(year)).round() as u64))
                .collect(),
        )
    }

    #[test]
    fn test_fewer_than_three_points_is_insufficient() {
        let series = CumulativeSeries::from_points(vec![(2010, 2), (2012, 3)]);

        let err = SCurveForecaster::default()
            .forecast("A01B", &series, DEFAULT_FUTURE_YEARS)
            .unwrap_err();

        assert!(matches!(
            err,
            ScurveError::InsufficientData {
                points: 2,
                required: 3
            }
        ));
    }

    #[test]
    fn test_insufficient_data_is_checked_before_solving() {
        // A zero evaluation budget would fail any solver call.
        let forecaster = SCurveForecaster::with_max_evaluations(0);
        let series = CumulativeSeries::from_points(vec![(2010, 1)]);

        assert!(matches!(
            forecaster.fit(&series),
            Err(ScurveError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_forecast_future_years_and_saturation() {
        let truth = LogisticModel {
            k: 10_000.0,
            t_m: 2008.0,
            r: 0.5,
        };
        let series = exact_series(truth, 2000..=2012);

        let forecast = SCurveForecaster::default()
            .forecast("B64C39/024", &series, 20)
            .unwrap();

        assert_eq!(forecast.future.len(), 20);
        assert_eq!(forecast.future[0].0, 2013);
        assert!(forecast
            .future
            .windows(2)
            .all(|pair| pair[1].0 == pair[0].0 + 1));
        assert_eq!(forecast.horizon_end_year, Some(2032));

        assert!((forecast.model.k - truth.k).abs() / truth.k < 0.01);
        assert!((forecast.saturation_level - 0.99 * forecast.model.k).abs() < 1e-9);

        // r (t - t_m) >= ln 99 first holds at t = 2018
        assert_eq!(forecast.saturation_year, Some(2018));
        assert!(!forecast.saturation_beyond_horizon);

        let year = forecast.saturation_year.unwrap();
        let (_, value) = forecast.future.iter().find(|(y, _)| *y == year).unwrap();
        assert!(*value >= forecast.saturation_level);
        let (_, previous) = forecast.future.iter().find(|(y, _)| *y == year - 1).unwrap();
        assert!(*previous < forecast.saturation_level);
    }

    #[test]
    fn test_saturation_beyond_horizon_is_explicit() {
        let truth = LogisticModel {
            k: 5_000.0,
            t_m: 2008.0,
            r: 0.3,
        };
        let series = exact_series(truth, 2000..=2012);

        let forecast = SCurveForecaster::default()
            .forecast("A01B", &series, 3)
            .unwrap();

        assert_eq!(forecast.saturation_year, None);
        assert!(forecast.saturation_beyond_horizon);
        assert_eq!(forecast.horizon_end_year, Some(2015));
    }

    #[test]
    fn test_zero_future_years_is_rejected() {
        let series = CumulativeSeries::from_points(vec![(2010, 1), (2011, 2), (2012, 4)]);

        let err = SCurveForecaster::default()
            .forecast("A01B", &series, 0)
            .unwrap_err();

        assert!(matches!(err, ScurveError::InvalidRequest { .. }));
    }

    #[test]
    fn test_saturation_year_search() {
        let future = vec![(2021, 10.0), (2022, 50.0), (2023, 99.0), (2024, 99.5)];

        assert_eq!(saturation_year(&future, 99.0), Some(2023));
        assert_eq!(saturation_year(&future, 5.0), Some(2021));
        assert_eq!(saturation_year(&future, 100.0), None);
        assert_eq!(saturation_year(&[], 1.0), None);
    }

    #[test]
    fn test_forecast_serializes_with_response_keys() {
        let future = vec![(2013, 1.0)];
        let forecast = Forecast {
            code: "A01B".to_string(),
            historical: CumulativeSeries::from_points(vec![(2010, 1)]),
            future,
            model: LogisticModel {
                k: 2.0,
                t_m: 2011.0,
                r: 0.5,
            },
            saturation_level: 1.98,
            saturation_year: None,
            saturation_beyond_horizon: true,
            horizon_end_year: Some(2013),
        };

        let value = serde_json::to_value(&forecast).unwrap();

        assert_eq!(value["cpc_code"], "A01B");
        assert_eq!(value["historical_data"], serde_json::json!([[2010, 1]]));
        assert_eq!(value["future_predictions"], serde_json::json!([[2013, 1.0]]));
        assert_eq!(value["logistic_parameters"]["K"], 2.0);
        assert_eq!(value["99_saturation_level"], 1.98);
        assert!(value["estimated_saturation_year"].is_null());
        assert_eq!(value["saturation_beyond_horizon"], true);
    }
}
