//! Turns reported metric values into scores against a template.
//!
//! Entry keys are matched to template metric names with three matchers, tried in order:
//! exact, normalized (lowercase ASCII alphanumerics only), then case-insensitive. Metrics
//! with `darj`/`nirakrit` sub-values derive their percentage from the ratio of the two.

use serde::Serialize;
use tracing::warn;

use super::domain::{Metric, MetricValue};

/// Sub-metric key holding the number of registered items.
pub const TOTAL_KEY: &str = "darj";
/// Sub-metric key holding the number of resolved items.
pub const COMPLETED_KEY: &str = "nirakrit";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("KPI key not found in template: {key}. Available KPIs: {}", .available.join(", "))]
    InvalidKpiKey { key: String, available: Vec<String> },
    #[error("missing value for KPI: {metric}")]
    MissingKpiValue { metric: String },
    #[error("missing sub-KPIs for {metric}: {}", .missing.join(", "))]
    MissingSubKpi { metric: String, missing: Vec<String> },
}

/// Which matcher resolved a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMatch {
    Exact,
    Normalized,
    CaseInsensitive,
}

pub type KeyMatcher = fn(&str, &str) -> bool;

pub const KEY_MATCHERS: [(KeyMatch, KeyMatcher); 3] = [
    (KeyMatch::Exact, exact_match),
    (KeyMatch::Normalized, normalized_match),
    (KeyMatch::CaseInsensitive, case_insensitive_match),
];

/// Lowercases and drops everything outside `[a-z0-9]`.
pub fn normalize_key(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Form key for a metric: its normalized name, or the name itself when nothing survives
/// normalization.
pub fn metric_key(name: &str) -> String {
    let key = normalize_key(name);
    if key.is_empty() {
        name.to_string()
    } else {
        key
    }
}

fn exact_match(left: &str, right: &str) -> bool {
    left == right
}

// Names written entirely in non-Latin script normalize to "" and must not match each other.
fn normalized_match(left: &str, right: &str) -> bool {
    let left = normalize_key(left);
    !left.is_empty() && left == normalize_key(right)
}

fn case_insensitive_match(left: &str, right: &str) -> bool {
    left.to_lowercase() == right.to_lowercase()
}

/// Finds the metric a key refers to, trying each matcher across all metrics before the next.
pub fn match_metric<'a>(metrics: &'a [Metric], key: &str) -> Option<(&'a Metric, KeyMatch)> {
    KEY_MATCHERS.iter().find_map(|(kind, matcher)| {
        metrics
            .iter()
            .find(|metric| matcher(&metric.name, key))
            .map(|metric| (metric, *kind))
    })
}

fn match_value<'a>(values: &'a [MetricValue], metric: &Metric) -> Option<&'a MetricValue> {
    KEY_MATCHERS.iter().find_map(|(_, matcher)| {
        values
            .iter()
            .find(|value| matcher(&metric.name, &value.key))
    })
}

/// Percentage a value represents. With sub-values this is `nirakrit / darj * 100`,
/// and a zero `darj` yields 0. Results are not clamped.
pub fn calculated_value(value: &MetricValue) -> f64 {
    if value.sub_metric_values.is_empty() {
        return value.value.unwrap_or(0.0);
    }

    let total = value.sub_value(TOTAL_KEY).unwrap_or(0.0);
    let completed = value.sub_value(COMPLETED_KEY).unwrap_or(0.0);
    if total > 0.0 {
        completed / total * 100.0
    } else {
        0.0
    }
}

pub fn metric_score(percentage: f64, max_marks: u32) -> f64 {
    percentage / 100.0 * f64::from(max_marks)
}

/// Scored copy of the reported values plus their total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSheet {
    pub values: Vec<MetricValue>,
    pub total_score: f64,
}

/// Scores every reported value, then checks the template is fully covered.
pub fn score_entry(metrics: &[Metric], values: &[MetricValue]) -> Result<ScoreSheet, ScoringError> {
    let mut scored = Vec::with_capacity(values.len());
    let mut total_score = 0.0;

    for value in values {
        let Some((metric, _)) = match_metric(metrics, &value.key) else {
            let available: Vec<String> = metrics.iter().map(|m| m.name.clone()).collect();
            warn!(key = %value.key, available = ?available, "KPI key did not match the template");
            return Err(ScoringError::InvalidKpiKey {
                key: value.key.clone(),
                available,
            });
        };

        let percentage = calculated_value(value);
        let score = metric_score(percentage, metric.max_marks);
        total_score += score;

        scored.push(MetricValue {
            key: value.key.clone(),
            value: Some(percentage),
            score: Some(score),
            sub_metric_values: value.sub_metric_values.clone(),
        });
    }

    for metric in metrics {
        let Some(value) = match_value(values, metric) else {
            return Err(ScoringError::MissingKpiValue {
                metric: metric.name.clone(),
            });
        };

        if metric.sub_metrics.is_empty() || value.sub_metric_values.is_empty() {
            continue;
        }

        let missing: Vec<String> = metric
            .sub_metrics
            .iter()
            .filter(|sub| !value.has_sub_metric(&sub.key))
            .map(|sub| sub.key.clone())
            .collect();
        if !missing.is_empty() {
            return Err(ScoringError::MissingSubKpi {
                metric: metric.name.clone(),
                missing,
            });
        }
    }

    Ok(ScoreSheet {
        values: scored,
        total_score,
    })
}
