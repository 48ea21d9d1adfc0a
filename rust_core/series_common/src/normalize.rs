//! Derived columns shared by every dashboard view.
//!
//! Raw OxCGRT counts are cumulative and absolute; charts compare jurisdictions
//! of very different size, so everything goes through the helpers below
//! instead of being rescaled ad hoc per view.

use log::debug;

use crate::errors::SeriesError;
use crate::types::{Observation, TimeSeries};

pub const PER_100K: f64 = 100_000.0;

fn check_population(population: f64) -> Result<(), SeriesError> {
    if population.is_finite() && population > 0.0 {
        Ok(())
    } else {
        Err(SeriesError::InvalidPopulation(population))
    }
}

/// `count / population * 100_000`.
pub fn per_100k(count: f64, population: f64) -> Result<f64, SeriesError> {
    check_population(population)?;
    Ok(count / population * PER_100K)
}

/// `count / population * 100`.
pub fn percent_of_population(count: f64, population: f64) -> Result<f64, SeriesError> {
    check_population(population)?;
    Ok(count / population * 100.0)
}

/// Scale every present value of `series` to a per-100K figure.
pub fn scale_per_100k(series: &TimeSeries, population: f64) -> Result<TimeSeries, SeriesError> {
    check_population(population)?;
    Ok(series.map_values(|v| v / population * PER_100K))
}

/// Day-over-day increase of a cumulative count.
///
/// Downward revisions are clamped to 0. The first day, a missing day and the
/// day after a missing one have no defined difference and report 0.
pub fn daily_increments(series: &TimeSeries) -> TimeSeries {
    let mut prev: Option<f64> = None;
    let points: Vec<Observation> = series
        .iter()
        .map(|p| {
            let current = p.present();
            let increase = match (prev, current) {
                (Some(before), Some(now)) => (now - before).max(0.0),
                _ => 0.0,
            };
            prev = current;
            Observation::new(p.date, Some(increase))
        })
        .collect();
    debug!("derived {} daily increments", points.len());
    from_sorted(points)
}

/// Daily increments of a cumulative count, per 100K population.
pub fn daily_rate_per_100k(series: &TimeSeries, population: f64) -> Result<TimeSeries, SeriesError> {
    scale_per_100k(&daily_increments(series), population)
}

/// Running total; missing days contribute nothing but keep the running value.
pub fn cumulative_sum(series: &TimeSeries) -> TimeSeries {
    let mut total = 0.0;
    let points = series
        .iter()
        .map(|p| {
            total += p.present().unwrap_or(0.0);
            Observation::new(p.date, Some(total))
        })
        .collect();
    from_sorted(points)
}

/// Replace zero or missing values by the most recent non-zero value.
///
/// Reporting gaps show up as zeros in the vaccination feed. Days before the
/// first non-zero value take the last non-zero value of the whole series. A
/// series with no non-zero value is returned unchanged.
pub fn fill_zero_gaps(series: &TimeSeries) -> TimeSeries {
    let non_zero = |p: &Observation| p.present().filter(|v| *v != 0.0);
    let Some(last_non_zero) = series.iter().rev().find_map(non_zero) else {
        return series.clone();
    };
    let mut carry: Option<f64> = None;
    let points = series
        .iter()
        .map(|p| {
            if let Some(v) = non_zero(p) {
                carry = Some(v);
            }
            Observation::new(p.date, Some(carry.unwrap_or(last_non_zero)))
        })
        .collect();
    from_sorted(points)
}

/// Date-aligned `numerator / denominator`; zero denominators give missing.
pub fn ratio(numerator: &TimeSeries, denominator: &TimeSeries) -> TimeSeries {
    let points = numerator
        .iter()
        .map(|p| {
            let value = match (p.present(), denominator.get(p.date)) {
                (Some(n), Some(d)) if d != 0.0 => Some(n / d),
                _ => None,
            };
            Observation::new(p.date, value)
        })
        .collect();
    from_sorted(points)
}

// Inputs come from an already valid series, so order and uniqueness hold.
fn from_sorted(points: Vec<Observation>) -> TimeSeries {
    TimeSeries::from_sorted_unchecked(points)
}
