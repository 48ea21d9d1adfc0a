//! lag_correlation
//!
//! Measures how strongly a policy-index series leads an outcome series. For
//! every requested lag `L` the outcome series is advanced by `L` days, the two
//! series are joined on calendar date, and a dependence statistic is computed
//! over the days where both values are present.
//!
//! A lag whose score cannot be computed (fewer than two paired days, or a
//! sample without spread) is reported as `None` rather than NaN.

pub mod query;
pub mod stats;

use std::fmt;
use std::str::FromStr;

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use series_common::TimeSeries;
use thiserror::Error;

pub use query::{
    run_query, CorrelationQuery, InMemorySource, LagLine, LagReport, QueryError, QueryRequest, SeriesSource,
};

/// Minimum number of paired days for a defined score.
pub const MIN_PAIRS: usize = 2;

/// Dependence statistic computed at each lag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Spearman's rank correlation, in [-1, 1].
    #[default]
    Spearman,
    /// Distance correlation, in [0, 1].
    DistanceCorrelation,
}

impl Method {
    pub fn score(&self, x: &[f64], y: &[f64]) -> Option<f64> {
        match self {
            Method::Spearman => stats::spearman(x, y),
            Method::DistanceCorrelation => stats::distance_correlation(x, y),
        }
    }

    /// Human readable name used in chart captions.
    pub fn title(&self) -> &'static str {
        match self {
            Method::Spearman => "Spearman Correlation",
            Method::DistanceCorrelation => "Distance Correlation",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Spearman => f.write_str("spearman"),
            Method::DistanceCorrelation => f.write_str("distance_correlation"),
        }
    }
}

impl FromStr for Method {
    type Err = CorrelationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spearman" | "rank" => Ok(Method::Spearman),
            "distance_correlation" | "distance" | "dcor" => Ok(Method::DistanceCorrelation),
            other => Err(CorrelationError::InvalidArgument(format!("unknown method '{}'", other))),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorrelationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Lags swept by the dashboard: 0 to 480 days every 60 days.
pub fn default_lags() -> Vec<i64> {
    (0..=480).step_by(60).collect()
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagParams {
    pub method: Method,
    pub lags: Vec<i64>, // days, non-negative
}

impl Default for LagParams {
    fn default() -> Self {
        LagParams {
            method: Method::default(),
            lags: default_lags(),
        }
    }
}

/// Score at a single lag. `score` is `None` when undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagScore {
    pub lag: i64,
    pub score: Option<f64>,
}

/// One score per requested lag, in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub method: Method,
    pub scores: Vec<LagScore>,
}

impl CorrelationResult {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LagScore> {
        self.scores.iter()
    }

    /// Score of the first entry for `lag`, flattening "not requested" and
    /// "undefined".
    pub fn score_at(&self, lag: i64) -> Option<f64> {
        self.scores.iter().find(|s| s.lag == lag).and_then(|s| s.score)
    }

    pub fn undefined_lags(&self) -> Vec<i64> {
        self.scores.iter().filter(|s| s.score.is_none()).map(|s| s.lag).collect()
    }

    /// The defined score with the largest magnitude.
    pub fn strongest(&self) -> Option<LagScore> {
        self.scores
            .iter()
            .filter(|s| s.score.is_some())
            .copied()
            .max_by(|a, b| {
                let (x, y) = (a.score.unwrap_or(0.0).abs(), b.score.unwrap_or(0.0).abs());
                x.total_cmp(&y)
            })
    }
}

/// Reject the whole lag list if any lag is negative.
pub fn validate_lags(lags: &[i64]) -> Result<(), CorrelationError> {
    match lags.iter().find(|l| **l < 0) {
        Some(bad) => Err(CorrelationError::InvalidArgument(format!("lag must be non-negative, got {}", bad))),
        None => Ok(()),
    }
}

/// Score `series_a` against `series_b` advanced by each lag.
///
/// All lags are validated before any work is done; a negative lag fails the
/// whole call with `InvalidArgument`.
pub fn compute(
    series_a: &TimeSeries,
    series_b: &TimeSeries,
    lags: &[i64],
    method: Method,
) -> Result<CorrelationResult, CorrelationError> {
    validate_lags(lags)?;

    let scores = lags
        .iter()
        .map(|&lag| {
            let shifted = series_b.shifted(lag.unsigned_abs());
            let (x, y) = series_a.aligned_with(&shifted);
            let score = if x.len() < MIN_PAIRS { None } else { method.score(&x, &y) };
            trace!("lag {}: aligned {} of {} days", lag, x.len(), series_a.len());
            debug!("{} at lag {} over {} pairs: {:?}", method, lag, x.len(), score);
            LagScore { lag, score }
        })
        .collect();

    Ok(CorrelationResult { method, scores })
}

/// `compute` with lags and method taken from `params`.
pub fn compute_with_params(
    series_a: &TimeSeries,
    series_b: &TimeSeries,
    params: &LagParams,
) -> Result<CorrelationResult, CorrelationError> {
    compute(series_a, series_b, &params.lags, params.method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn d0() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
    }

    fn series(values: &[f64]) -> TimeSeries {
        TimeSeries::from_values(d0(), values.iter().map(|v| Some(*v)))
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_default_lags() {
        assert_eq!(default_lags(), vec![0, 60, 120, 180, 240, 300, 360, 420, 480]);
        let params = LagParams::default();
        assert_eq!(params.method, Method::Spearman);
        assert_eq!(params.lags.len(), 9);
    }

    #[test]
    fn test_inverse_series_rank_correlation() {
        let a = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let b = series(&[5.0, 4.0, 3.0, 2.0, 1.0]);
        let res = compute(&a, &b, &[0], Method::Spearman).unwrap();
        assert!(close(res.score_at(0).unwrap(), -1.0));
    }

    #[test]
    fn test_self_correlation_is_one() {
        let a = series(&[3.0, 1.0, 4.0, 1.5, 5.0, 9.0, 2.0, 6.0]);
        let rho = compute(&a, &a, &[0], Method::Spearman).unwrap();
        let dcor = compute(&a, &a, &[0], Method::DistanceCorrelation).unwrap();
        assert!(close(rho.score_at(0).unwrap(), 1.0));
        assert!(close(dcor.score_at(0).unwrap(), 1.0));
    }

    #[test]
    fn test_output_preserves_lag_order() {
        let a = series(&(0..40).map(|i| (i % 7) as f64).collect::<Vec<_>>());
        let b = series(&(0..40).map(|i| (i * i % 11) as f64).collect::<Vec<_>>());
        let lags = [30, 0, 5, 5, 12];
        let res = compute(&a, &b, &lags, Method::DistanceCorrelation).unwrap();
        assert_eq!(res.len(), lags.len());
        let got: Vec<i64> = res.iter().map(|s| s.lag).collect();
        assert_eq!(got, lags.to_vec());
        assert_eq!(res.scores[2], res.scores[3]);

        assert!(compute(&a, &b, &[], Method::Spearman).unwrap().is_empty());
    }

    #[test]
    fn test_negative_lag_rejected() {
        let a = series(&[1.0, 2.0, 3.0]);
        let err = compute(&a, &a, &[0, -1], Method::Spearman).unwrap_err();
        assert!(matches!(err, CorrelationError::InvalidArgument(_)));
    }

    #[test]
    fn test_validate_lags_message() {
        assert_eq!(validate_lags(&[0, 60, 120]), Ok(()));
        assert_eq!(validate_lags(&[]), Ok(()));
        assert_eq!(
            validate_lags(&[0, -7, -1]),
            Err(CorrelationError::InvalidArgument("lag must be non-negative, got -7".to_string()))
        );
    }

    #[test]
    fn test_shift_then_lag_zero_matches_lag() {
        let a = series(&[2.0, 7.0, 1.0, 8.0, 2.5, 8.5, 1.5, 4.0, 5.0, 9.0, 0.5, 3.0]);
        let b = series(&[6.0, 2.0, 9.0, 4.0, 4.5, 1.0, 7.0, 3.0, 8.0, 2.0, 5.5, 6.5]);
        for method in [Method::Spearman, Method::DistanceCorrelation] {
            for lag in [0i64, 1, 3, 5] {
                let raw = compute(&a, &b, &[lag], method).unwrap();
                let pre = compute(&a, &b.shifted(lag as u64), &[0], method).unwrap();
                assert_eq!(raw.scores[0].score, pre.scores[0].score);
            }
        }
    }

    #[test]
    fn test_lag_advances_outcome() {
        // b repeats a three days later, so lag 3 lines them up exactly
        let base = [1.0, 5.0, 2.0, 8.0, 3.0, 9.0, 4.0, 7.0, 6.0, 0.0];
        let a = series(&base);
        let mut delayed = vec![0.5, 0.25, 0.75];
        delayed.extend_from_slice(&base);
        let b = series(&delayed);
        let res = compute(&a, &b, &[0, 3], Method::Spearman).unwrap();
        assert!(close(res.score_at(3).unwrap(), 1.0));
        assert!(res.score_at(0).unwrap() < 1.0);
        assert_eq!(res.strongest().map(|s| s.lag), Some(3));
    }

    #[test]
    fn test_insufficient_overlap_is_undefined() {
        let a = series(&[1.0, 2.0, 3.0, 4.0]);
        let b = series(&[4.0, 3.0, 2.0, 1.0]);
        let res = compute(&a, &b, &[0, 2, 3, 10], Method::Spearman).unwrap();
        assert!(res.score_at(0).is_some());
        assert!(res.score_at(2).is_some());
        assert_eq!(res.undefined_lags(), vec![3, 10]);

        let sparse = TimeSeries::from_values(d0(), [Some(1.0), None, None, Some(4.0)]);
        let res = compute(&sparse, &b, &[1], Method::DistanceCorrelation).unwrap();
        assert_eq!(res.scores[0].score, None);
    }

    #[test]
    fn test_disjoint_series_all_undefined() {
        let a = series(&[1.0, 2.0, 3.0]);
        let later = TimeSeries::from_values(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(), [Some(1.0), Some(2.0), Some(3.0)]);
        let res = compute(&a, &later, &default_lags(), Method::Spearman).unwrap();
        assert_eq!(res.undefined_lags(), default_lags());
    }

    #[test]
    fn test_constant_series_is_undefined() {
        let a = series(&[2.0, 2.0, 2.0, 2.0]);
        let b = series(&[1.0, 3.0, 2.0, 4.0]);
        for method in [Method::Spearman, Method::DistanceCorrelation] {
            let res = compute(&a, &b, &[0], method).unwrap();
            assert_eq!(res.scores[0].score, None);
        }
    }

    #[test]
    fn test_scores_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let xs: Vec<f64> = (0..60).map(|_| rng.random_range(-5.0..5.0)).collect();
            let ys: Vec<f64> = (0..60).map(|_| rng.random_range(0.0..100.0)).collect();
            let (a, b) = (series(&xs), series(&ys));
            let lags = [0, 1, 10, 30];
            for s in compute(&a, &b, &lags, Method::Spearman).unwrap().iter() {
                let v = s.score.unwrap();
                assert!((-1.0..=1.0).contains(&v));
            }
            for s in compute(&a, &b, &lags, Method::DistanceCorrelation).unwrap().iter() {
                let v = s.score.unwrap();
                assert!((0.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn test_noise_has_small_rank_correlation() {
        let mut rng = StdRng::seed_from_u64(42);
        let trials = 50;
        let mut total = 0.0;
        for _ in 0..trials {
            let xs: Vec<f64> = (0..300).map(|i| (i as f64 / 20.0).sin()).collect();
            let noise: Vec<f64> = (0..300).map(|_| rng.random::<f64>()).collect();
            let res = compute(&series(&xs), &series(&noise), &[0], Method::Spearman).unwrap();
            total += res.score_at(0).unwrap().abs();
        }
        // E|rho| for n = 300 under independence is about 0.046
        assert!(total / (trials as f64) < 0.1);
    }

    #[test]
    fn test_method_parsing_and_params_serde() {
        assert_eq!("dcor".parse::<Method>().unwrap(), Method::DistanceCorrelation);
        assert_eq!(" Spearman ".parse::<Method>().unwrap(), Method::Spearman);
        assert!("kendall".parse::<Method>().is_err());

        let params: LagParams = serde_json::from_str(r#"{"method":"distance_correlation"}"#).unwrap();
        assert_eq!(params.method, Method::DistanceCorrelation);
        assert_eq!(params.lags, default_lags());

        let a = series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let res = compute_with_params(&a, &a, &LagParams { method: Method::Spearman, lags: vec![1] }).unwrap();
        assert_eq!(res.scores.len(), 1);
        let json = serde_json::to_string(&res).unwrap();
        assert!(json.contains(r#""method":"spearman""#));
    }
}
