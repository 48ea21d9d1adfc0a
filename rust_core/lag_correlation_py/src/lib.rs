use lag_correlation::{
    compute, validate_lags, CorrelationError, CorrelationResult, LagParams, Method, QueryError, QueryRequest,
};
use log::debug;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use series_common::{normalize, SeriesError, TimeSeries};
use thiserror::Error;

/// Error wrapper for Python
#[derive(Error, Debug)]
enum PyLagError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Series(#[from] SeriesError),
    #[error(transparent)]
    Correlation(#[from] CorrelationError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl From<PyLagError> for PyErr {
    fn from(e: PyLagError) -> PyErr {
        PyValueError::new_err(e.to_string())
    }
}

type PyScores = Vec<(i64, Option<f64>)>;

fn to_pairs(result: &CorrelationResult) -> PyScores {
    result.iter().map(|s| (s.lag, s.score)).collect()
}

fn parse_method(method: &str) -> Result<Method, PyLagError> {
    Ok(method.parse::<Method>()?)
}

fn correlate(
    dates_a: &[String],
    values_a: &[Option<f64>],
    dates_b: &[String],
    values_b: &[Option<f64>],
    lags: &[i64],
    method: Method,
) -> Result<PyScores, PyLagError> {
    let a = TimeSeries::from_iso(dates_a, values_a)?;
    let b = TimeSeries::from_iso(dates_b, values_b)?;
    debug!("python call: {} vs {} days, {} lags", a.len(), b.len(), lags.len());
    let result = compute(&a, &b, lags, method)?;
    Ok(to_pairs(&result))
}

/// lag_correlation(dates_a, values_a, dates_b, values_b, lags, method="spearman") -> list[tuple[int, float | None]]
/// Dates are "YYYY-MM-DD" strings; None marks a missing value. An undefined score is returned as None.
#[pyfunction]
#[pyo3(name = "lag_correlation", signature = (dates_a, values_a, dates_b, values_b, lags, method = "spearman"))]
fn py_lag_correlation(
    dates_a: Vec<String>,
    values_a: Vec<Option<f64>>,
    dates_b: Vec<String>,
    values_b: Vec<Option<f64>>,
    lags: Vec<i64>,
    method: &str,
) -> PyResult<PyScores> {
    let method = parse_method(method)?;
    Ok(correlate(&dates_a, &values_a, &dates_b, &values_b, &lags, method)?)
}

/// run_query_json(request_json: str) -> str
/// Expects {"query": {...}, "series": {"policy": {...}, "outcomes": {...}}} and returns the report as JSON.
#[pyfunction]
fn run_query_json(request_json: &str) -> PyResult<String> {
    let request: QueryRequest =
        serde_json::from_str(request_json).map_err(|e| PyLagError::InvalidInput(format!("invalid json: {}", e)))?;
    let report = request.run().map_err(PyLagError::from)?;
    let out = serde_json::to_string(&report).map_err(|e| PyLagError::InvalidInput(format!("serialize: {}", e)))?;
    Ok(out)
}

/// per_100k(count: float, population: float) -> float
#[pyfunction]
fn per_100k(count: f64, population: f64) -> PyResult<f64> {
    Ok(normalize::per_100k(count, population).map_err(PyLagError::from)?)
}

/// default_lags() -> list[int]
#[pyfunction]
fn default_lags() -> Vec<i64> {
    lag_correlation::default_lags()
}

#[pyclass]
struct PyLagCorrelationEngine {
    params: LagParams,
}

#[pymethods]
impl PyLagCorrelationEngine {
    /// new(method: str = "spearman", lags: Optional[list[int]] = None)
    /// Lags default to 0..=480 every 60 days. Negative lags are rejected here.
    #[new]
    #[pyo3(signature = (method = None, lags = None))]
    fn new(method: Option<&str>, lags: Option<Vec<i64>>) -> PyResult<Self> {
        let mut params = LagParams::default();
        if let Some(m) = method {
            params.method = parse_method(m)?;
        }
        if let Some(lags) = lags {
            validate_lags(&lags).map_err(PyLagError::from)?;
            params.lags = lags;
        }
        Ok(PyLagCorrelationEngine { params })
    }

    /// compute(dates_a, values_a, dates_b, values_b) -> list[tuple[int, float | None]]
    fn compute(
        &self,
        dates_a: Vec<String>,
        values_a: Vec<Option<f64>>,
        dates_b: Vec<String>,
        values_b: Vec<Option<f64>>,
    ) -> PyResult<PyScores> {
        Ok(correlate(&dates_a, &values_a, &dates_b, &values_b, &self.params.lags, self.params.method)?)
    }

    /// params() -> dict {"method": str, "lags": list[int]}
    fn params(&self, py: Python<'_>) -> PyResult<PyObject> {
        let out = PyDict::new(py);
        out.set_item("method", self.params.method.to_string())?;
        out.set_item("lags", self.params.lags.clone())?;
        Ok(out.to_object(py))
    }
}

/// Python module
#[pymodule]
fn lag_correlation_py(_py: Python, m: &PyModule) -> PyResult<()> {
    let _ = env_logger::try_init();
    m.add_function(wrap_pyfunction!(py_lag_correlation, m)?)?;
    m.add_function(wrap_pyfunction!(run_query_json, m)?)?;
    m.add_function(wrap_pyfunction!(per_100k, m)?)?;
    m.add_function(wrap_pyfunction!(default_lags, m)?)?;
    m.add_class::<PyLagCorrelationEngine>()?;
    Ok(())
}
