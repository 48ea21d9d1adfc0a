use std::cmp::Ordering;
use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::SeriesError;

/// One calendar day of a single indicator. `None` marks a missing value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Observation { date, value }
    }

    /// The value if it is present and finite.
    pub fn present(&self) -> Option<f64> {
        self.value.filter(|v| v.is_finite())
    }
}

/// Daily series for one jurisdiction, sorted by date with no duplicate days.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Observation>", into = "Vec<Observation>")]
pub struct TimeSeries {
    points: Vec<Observation>,
}

impl TimeSeries {
    pub fn new(mut points: Vec<Observation>) -> Result<Self, SeriesError> {
        points.sort_by_key(|p| p.date);
        if let Some(dup) = points.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(SeriesError::DuplicateDate(dup[0].date));
        }
        Ok(TimeSeries { points })
    }

    /// Wrap points that are already sorted by date with no duplicate days.
    pub(crate) fn from_sorted_unchecked(points: Vec<Observation>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].date < w[1].date));
        TimeSeries { points }
    }

    /// Consecutive days starting at `start`.
    pub fn from_values<I>(start: NaiveDate, values: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let points = values
            .into_iter()
            .enumerate()
            .filter_map(|(i, value)| {
                start
                    .checked_add_days(Days::new(i as u64))
                    .map(|date| Observation { date, value })
            })
            .collect();
        TimeSeries { points }
    }

    /// Build from parallel ISO-8601 date strings and values.
    pub fn from_iso(dates: &[String], values: &[Option<f64>]) -> Result<Self, SeriesError> {
        if dates.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }
        let points = dates
            .iter()
            .zip(values)
            .map(|(d, v)| {
                NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")
                    .map(|date| Observation::new(date, *v))
                    .map_err(|_| SeriesError::InvalidDate(d.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        TimeSeries::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.points.iter()
    }

    /// Number of days carrying a usable value.
    pub fn present_count(&self) -> usize {
        self.points.iter().filter(|p| p.present().is_some()).count()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .and_then(|i| self.points[i].present())
    }

    /// Relabel every observation `lag_days` earlier: the value seen on
    /// `d + lag_days` is reported on `d`. Days that would fall before the
    /// representable calendar are dropped.
    pub fn shifted(&self, lag_days: u64) -> TimeSeries {
        let points = self
            .points
            .iter()
            .filter_map(|p| {
                p.date
                    .checked_sub_days(Days::new(lag_days))
                    .map(|date| Observation { date, value: p.value })
            })
            .collect();
        TimeSeries { points }
    }

    /// Inner join on date, keeping only days where both sides are present.
    pub fn aligned_with(&self, other: &TimeSeries) -> (Vec<f64>, Vec<f64>) {
        let mut left = Vec::new();
        let mut right = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.points.len() && j < other.points.len() {
            let (a, b) = (&self.points[i], &other.points[j]);
            match a.date.cmp(&b.date) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    if let (Some(x), Some(y)) = (a.present(), b.present()) {
                        left.push(x);
                        right.push(y);
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        (left, right)
    }

    /// Apply `f` to every present value; missing days stay missing.
    pub fn map_values<F>(&self, mut f: F) -> TimeSeries
    where
        F: FnMut(f64) -> f64,
    {
        let points = self
            .points
            .iter()
            .map(|p| Observation { date: p.date, value: p.present().map(&mut f) })
            .collect();
        TimeSeries { points }
    }
}

impl TryFrom<Vec<Observation>> for TimeSeries {
    type Error = SeriesError;

    fn try_from(points: Vec<Observation>) -> Result<Self, Self::Error> {
        TimeSeries::new(points)
    }
}

impl From<TimeSeries> for Vec<Observation> {
    fn from(series: TimeSeries) -> Self {
        series.points
    }
}

/// A country or region whose series are compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub code: String,
    pub name: String,
}

impl Jurisdiction {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Jurisdiction { code: code.into(), name: name.into() }
    }

    pub fn united_states() -> Self {
        Jurisdiction::new("USA", "US")
    }

    pub fn canada() -> Self {
        Jurisdiction::new("CAN", "Canada")
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Outcome series a policy index is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    DailyCaseRate,
    DailyDeathRate,
}

impl Outcome {
    pub const ALL: [Outcome; 2] = [Outcome::DailyCaseRate, Outcome::DailyDeathRate];

    /// Column name used by the dashboard tables.
    pub fn column(&self) -> &'static str {
        match self {
            Outcome::DailyCaseRate => "DailyCaseRate",
            Outcome::DailyDeathRate => "DailyDeathRate",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::DailyCaseRate => "Daily Case Count",
            Outcome::DailyDeathRate => "Daily Death Count",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    #[test]
    fn test_new_sorts_and_rejects_duplicates() {
        let ts = TimeSeries::new(vec![
            Observation::new(day(3), Some(3.0)),
            Observation::new(day(1), Some(1.0)),
        ])
        .unwrap();
        assert_eq!(ts.first_date(), Some(day(1)));
        assert_eq!(ts.last_date(), Some(day(3)));

        let err = TimeSeries::new(vec![
            Observation::new(day(2), Some(1.0)),
            Observation::new(day(2), Some(5.0)),
        ])
        .unwrap_err();
        assert_eq!(err, SeriesError::DuplicateDate(day(2)));
    }

    #[test]
    fn test_iter_walks_both_ends() {
        let ts = TimeSeries::from_values(day(1), [Some(1.0), None, Some(3.0)]);
        let newest = ts.iter().rev().find_map(Observation::present);
        assert_eq!(newest, Some(3.0));
        assert_eq!(ts.iter().len(), 3);
        assert_eq!(ts.iter().next_back().map(|p| p.date), Some(day(3)));
    }

    #[test]
    fn test_shifted_relabels_backward() {
        let ts = TimeSeries::from_values(day(1), [Some(10.0), Some(20.0), Some(30.0)]);
        let shifted = ts.shifted(2);
        assert_eq!(shifted.get(day(1)), Some(30.0));
        assert_eq!(shifted.first_date(), Some(NaiveDate::from_ymd_opt(2020, 2, 28).unwrap()));
        assert_eq!(ts.shifted(0), ts);
    }

    #[test]
    fn test_aligned_with_skips_missing_and_disjoint_days() {
        let a = TimeSeries::from_values(day(1), [Some(1.0), None, Some(3.0), Some(4.0)]);
        let b = TimeSeries::from_values(day(2), [Some(20.0), Some(30.0), Some(f64::NAN)]);
        let (x, y) = a.aligned_with(&b);
        assert_eq!(x, vec![3.0]);
        assert_eq!(y, vec![30.0]);
    }

    #[test]
    fn test_from_iso_validates_input() {
        let dates = vec!["2021-01-02".to_string(), "2021-01-01".to_string()];
        let ts = TimeSeries::from_iso(&dates, &[Some(2.0), None]).unwrap();
        assert_eq!(ts.len(), 2);
        assert_eq!(ts.present_count(), 1);

        let bad = vec!["20210101".to_string()];
        assert!(matches!(
            TimeSeries::from_iso(&bad, &[Some(1.0)]),
            Err(SeriesError::InvalidDate(_))
        ));
        assert!(matches!(
            TimeSeries::from_iso(&dates, &[Some(1.0)]),
            Err(SeriesError::LengthMismatch { dates: 2, values: 1 })
        ));
    }

    #[test]
    fn test_serde_roundtrip_rejects_duplicates() {
        let json = r#"[{"date":"2020-03-02","value":2.0},{"date":"2020-03-01","value":null}]"#;
        let ts: TimeSeries = serde_json::from_str(json).unwrap();
        assert_eq!(ts.first_date(), Some(day(1)));
        assert_eq!(ts.get(day(1)), None);

        let dup = r#"[{"date":"2020-03-01","value":1.0},{"date":"2020-03-01","value":2.0}]"#;
        assert!(serde_json::from_str::<TimeSeries>(dup).is_err());
    }
}
