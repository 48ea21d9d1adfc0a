//! Explicit query object and data-access seam.
//!
//! A dashboard selection (policy index, outcomes, jurisdictions, lags) is a
//! plain `CorrelationQuery`. Series are pulled from a `SeriesSource` built for
//! the request, so nothing is cached between queries.

use std::collections::HashMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use series_common::{Jurisdiction, Outcome, SeriesError, TimeSeries};
use thiserror::Error;

use crate::{compute, validate_lags, CorrelationError, CorrelationResult, LagParams, Method};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("no series '{series}' for {jurisdiction}")]
    MissingSeries { jurisdiction: String, series: String },

    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    #[error(transparent)]
    Series(#[from] SeriesError),
}

impl QueryError {
    fn missing(jurisdiction: &Jurisdiction, series: impl Into<String>) -> Self {
        QueryError::MissingSeries {
            jurisdiction: jurisdiction.code.clone(),
            series: series.into(),
        }
    }
}

/// Provides the series a query needs.
pub trait SeriesSource {
    fn policy_series(&self, jurisdiction: &Jurisdiction, index: &str) -> Result<TimeSeries, QueryError>;

    fn outcome_series(&self, jurisdiction: &Jurisdiction, outcome: Outcome) -> Result<TimeSeries, QueryError>;
}

/// Series held in memory, keyed by jurisdiction code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InMemorySource {
    #[serde(default)]
    policy: HashMap<String, HashMap<String, TimeSeries>>,
    #[serde(default)]
    outcomes: HashMap<String, HashMap<Outcome, TimeSeries>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_policy(&mut self, jurisdiction: &Jurisdiction, index: impl Into<String>, series: TimeSeries) {
        self.policy
            .entry(jurisdiction.code.clone())
            .or_default()
            .insert(index.into(), series);
    }

    pub fn insert_outcome(&mut self, jurisdiction: &Jurisdiction, outcome: Outcome, series: TimeSeries) {
        self.outcomes
            .entry(jurisdiction.code.clone())
            .or_default()
            .insert(outcome, series);
    }

    pub fn with_policy(mut self, jurisdiction: &Jurisdiction, index: impl Into<String>, series: TimeSeries) -> Self {
        self.insert_policy(jurisdiction, index, series);
        self
    }

    pub fn with_outcome(mut self, jurisdiction: &Jurisdiction, outcome: Outcome, series: TimeSeries) -> Self {
        self.insert_outcome(jurisdiction, outcome, series);
        self
    }
}

impl SeriesSource for InMemorySource {
    fn policy_series(&self, jurisdiction: &Jurisdiction, index: &str) -> Result<TimeSeries, QueryError> {
        self.policy
            .get(&jurisdiction.code)
            .and_then(|m| m.get(index))
            .cloned()
            .ok_or_else(|| QueryError::missing(jurisdiction, index))
    }

    fn outcome_series(&self, jurisdiction: &Jurisdiction, outcome: Outcome) -> Result<TimeSeries, QueryError> {
        self.outcomes
            .get(&jurisdiction.code)
            .and_then(|m| m.get(&outcome))
            .cloned()
            .ok_or_else(|| QueryError::missing(jurisdiction, outcome.column()))
    }
}

fn default_outcomes() -> Vec<Outcome> {
    Outcome::ALL.to_vec()
}

fn default_jurisdictions() -> Vec<Jurisdiction> {
    vec![Jurisdiction::united_states(), Jurisdiction::canada()]
}

/// What to correlate and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationQuery {
    pub policy_index: String,
    #[serde(default = "default_outcomes")]
    pub outcomes: Vec<Outcome>,
    #[serde(default = "default_jurisdictions")]
    pub jurisdictions: Vec<Jurisdiction>,
    #[serde(default)]
    pub params: LagParams,
}

impl CorrelationQuery {
    /// Both outcomes, U.S. and Canada, default lags and method.
    pub fn new(policy_index: impl Into<String>) -> Self {
        CorrelationQuery {
            policy_index: policy_index.into(),
            outcomes: default_outcomes(),
            jurisdictions: default_jurisdictions(),
            params: LagParams::default(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.params.method = method;
        self
    }

    pub fn with_lags(mut self, lags: Vec<i64>) -> Self {
        self.params.lags = lags;
        self
    }

    pub fn with_jurisdictions(mut self, jurisdictions: Vec<Jurisdiction>) -> Self {
        self.jurisdictions = jurisdictions;
        self
    }

    pub fn with_outcomes(mut self, outcomes: Vec<Outcome>) -> Self {
        self.outcomes = outcomes;
        self
    }
}

/// One plotted line: a jurisdiction's scores for one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagLine {
    pub jurisdiction: Jurisdiction,
    pub outcome: Outcome,
    pub result: CorrelationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagReport {
    pub policy_index: String,
    pub method: Method,
    pub lags: Vec<i64>,
    pub lines: Vec<LagLine>,
}

impl LagReport {
    /// Chart caption, e.g. "Spearman Correlation of E1_Income support and Lagged Daily Case Count".
    pub fn title(&self, outcome: Outcome) -> String {
        format!("{} of {} and Lagged {}", self.method.title(), self.policy_index, outcome.label())
    }

    pub fn lines_for(&self, outcome: Outcome) -> impl Iterator<Item = &LagLine> {
        self.lines.iter().filter(move |l| l.outcome == outcome)
    }

    pub fn line(&self, jurisdiction_code: &str, outcome: Outcome) -> Option<&LagLine> {
        self.lines
            .iter()
            .find(|l| l.outcome == outcome && l.jurisdiction.code == jurisdiction_code)
    }
}

/// Self-contained request: the query plus the series it reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: CorrelationQuery,
    pub series: InMemorySource,
}

impl QueryRequest {
    pub fn run(&self) -> Result<LagReport, QueryError> {
        run_query(&self.series, &self.query)
    }
}

/// Run `query` against `source`: one line per (outcome, jurisdiction).
pub fn run_query<S>(source: &S, query: &CorrelationQuery) -> Result<LagReport, QueryError>
where
    S: SeriesSource + ?Sized,
{
    validate_lags(&query.params.lags)?;
    info!(
        "correlating '{}' ({}) over {} lags for {} jurisdictions",
        query.policy_index,
        query.params.method,
        query.params.lags.len(),
        query.jurisdictions.len()
    );

    let mut lines = Vec::with_capacity(query.outcomes.len() * query.jurisdictions.len());
    for &outcome in &query.outcomes {
        for jurisdiction in &query.jurisdictions {
            let policy = source.policy_series(jurisdiction, &query.policy_index)?;
            let target = source.outcome_series(jurisdiction, outcome)?;
            let result = compute(&policy, &target, &query.params.lags, query.params.method)?;
            let undefined = result.undefined_lags();
            if !undefined.is_empty() {
                warn!("{} / {}: undefined at lags {:?}", jurisdiction, outcome, undefined);
            }
            lines.push(LagLine {
                jurisdiction: jurisdiction.clone(),
                outcome,
                result,
            });
        }
    }

    Ok(LagReport {
        policy_index: query.policy_index.clone(),
        method: query.params.method,
        lags: query.params.lags.clone(),
        lines,
    })
}
