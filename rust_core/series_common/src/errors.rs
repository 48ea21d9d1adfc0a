use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("duplicate observation for {0}")]
    DuplicateDate(NaiveDate),

    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("{dates} dates but {values} values")]
    LengthMismatch { dates: usize, values: usize },

    #[error("population must be positive, got {0}")]
    InvalidPopulation(f64),
}
