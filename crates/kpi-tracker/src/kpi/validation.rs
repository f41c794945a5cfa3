use std::collections::HashSet;

use super::domain::{
    DepartmentDraft, EmployeeDraft, EntryDraft, Metric, MetricLabel, MetricValue, TemplateDraft,
    PERCENT_UNIT,
};
use super::scoring::{COMPLETED_KEY, TOTAL_KEY};

pub const MIN_METRICS: usize = 2;
pub const MIN_YEAR: i32 = 2000;

/// Shape errors caught before any engine runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },
    #[error("a template needs at least 2 KPIs")]
    TooFewMetrics,
    #[error("KPI names must be unique within a template (duplicate '{0}')")]
    DuplicateMetric(String),
    #[error("KPI '{metric}' must use the '%' unit (found '{unit}')")]
    InvalidUnit { metric: String, unit: String },
    #[error("month must be between 1 and 12 (found {0})")]
    InvalidMonth(u32),
    #[error("year must be 2000 or later (found {0})")]
    InvalidYear(i32),
    #[error("at least one KPI label is required")]
    MissingLabels,
    #[error("at least one KPI value is required")]
    MissingValues,
    #[error("value for '{key}' must be between 0 and 100 (found {value})")]
    ValueOutOfRange { key: String, value: f64 },
    #[error("score for '{key}' cannot be negative")]
    NegativeScore { key: String },
    #[error("sub-KPI '{sub_key}' of '{key}' cannot be negative")]
    NegativeSubValue { key: String, sub_key: String },
    #[error("sub-KPIs of '{key}' must include both 'darj' and 'nirakrit'")]
    IncompleteSubKpis { key: String },
    #[error("unknown {field} '{value}'")]
    UnknownValue { field: &'static str, value: String },
}

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required { field })
    } else {
        Ok(())
    }
}

pub fn validate_period(month: u32, year: i32) -> Result<(), ValidationError> {
    if !(1..=12).contains(&month) {
        return Err(ValidationError::InvalidMonth(month));
    }
    if year < MIN_YEAR {
        return Err(ValidationError::InvalidYear(year));
    }
    Ok(())
}

pub fn validate_metrics(metrics: &[Metric]) -> Result<(), ValidationError> {
    if metrics.len() < MIN_METRICS {
        return Err(ValidationError::TooFewMetrics);
    }

    let mut seen = HashSet::new();
    for metric in metrics {
        require(&metric.name, "KPI name")?;
        require(&metric.description, "KPI description")?;
        if metric.unit != PERCENT_UNIT {
            return Err(ValidationError::InvalidUnit {
                metric: metric.name.clone(),
                unit: metric.unit.clone(),
            });
        }
        if !seen.insert(metric.name.as_str()) {
            return Err(ValidationError::DuplicateMetric(metric.name.clone()));
        }
    }
    Ok(())
}

pub fn validate_template(draft: &TemplateDraft) -> Result<(), ValidationError> {
    require(&draft.name, "name")?;
    require(&draft.description, "description")?;
    require(&draft.role, "role")?;
    require(&draft.department_slug, "department_slug")?;
    validate_metrics(&draft.metrics)
}

/// Range checks for reported values. Sub-metric lists, when present, must carry both keys.
pub fn validate_metric_values(values: &[MetricValue]) -> Result<(), ValidationError> {
    for value in values {
        if let Some(reported) = value.value {
            if !(0.0..=100.0).contains(&reported) {
                return Err(ValidationError::ValueOutOfRange {
                    key: value.key.clone(),
                    value: reported,
                });
            }
        }
        if value.score.is_some_and(|score| score < 0.0) {
            return Err(ValidationError::NegativeScore {
                key: value.key.clone(),
            });
        }
        for sub in &value.sub_metric_values {
            if sub.value.is_some_and(|v| v < 0.0) {
                return Err(ValidationError::NegativeSubValue {
                    key: value.key.clone(),
                    sub_key: sub.key.clone(),
                });
            }
        }
        if !value.sub_metric_values.is_empty()
            && !(value.has_sub_metric(TOTAL_KEY) && value.has_sub_metric(COMPLETED_KEY))
        {
            return Err(ValidationError::IncompleteSubKpis {
                key: value.key.clone(),
            });
        }
    }
    Ok(())
}

pub fn validate_labels(labels: &[MetricLabel]) -> Result<(), ValidationError> {
    if labels.is_empty() {
        return Err(ValidationError::MissingLabels);
    }
    Ok(())
}

pub fn validate_entry(draft: &EntryDraft) -> Result<(), ValidationError> {
    require(draft.employee_id.as_str(), "employee_id")?;
    require(draft.template_id.as_str(), "template_id")?;
    validate_period(draft.month, draft.year)?;
    validate_labels(&draft.metric_labels)?;
    if draft.metric_values.is_empty() {
        return Err(ValidationError::MissingValues);
    }
    validate_metric_values(&draft.metric_values)
}

pub fn validate_employee(draft: &EmployeeDraft) -> Result<(), ValidationError> {
    require(&draft.name, "name")?;
    require(&draft.contact.phone, "contact.phone")?;
    require(&draft.department, "department")?;
    require(&draft.department_role, "department_role")
}

pub fn validate_department(draft: &DepartmentDraft) -> Result<(), ValidationError> {
    require(&draft.name, "name")?;
    require(&draft.slug, "slug")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::domain::{EmployeeId, MetricLabel, SubMetricValue, TemplateId};

    fn metric(name: &str) -> Metric {
        Metric {
            name: name.to_string(),
            description: format!("{name} description"),
            max_marks: 50,
            unit: PERCENT_UNIT.to_string(),
            sub_metrics: Vec::new(),
        }
    }

    fn draft_with_values(values: Vec<MetricValue>) -> EntryDraft {
        EntryDraft {
            employee_id: EmployeeId::from("emp-1"),
            template_id: TemplateId::from("tpl-1"),
            month: 4,
            year: 2024,
            metric_labels: vec![MetricLabel {
                label: "monthly".to_string(),
                value: None,
            }],
            metric_values: values,
            status: None,
            data_source: None,
        }
    }

    #[test]
    fn templates_need_two_distinct_percent_metrics() {
        assert_eq!(
            validate_metrics(&[metric("A")]),
            Err(ValidationError::TooFewMetrics)
        );
        assert_eq!(
            validate_metrics(&[metric("A"), metric("A")]),
            Err(ValidationError::DuplicateMetric("A".to_string()))
        );

        let mut counted = metric("B");
        counted.unit = "count".to_string();
        assert!(matches!(
            validate_metrics(&[metric("A"), counted]),
            Err(ValidationError::InvalidUnit { .. })
        ));
        assert!(validate_metrics(&[metric("A"), metric("B")]).is_ok());
    }

    #[test]
    fn periods_reject_out_of_range_months_and_old_years() {
        assert_eq!(validate_period(0, 2024), Err(ValidationError::InvalidMonth(0)));
        assert_eq!(validate_period(13, 2024), Err(ValidationError::InvalidMonth(13)));
        assert_eq!(validate_period(5, 1999), Err(ValidationError::InvalidYear(1999)));
        assert!(validate_period(12, 2000).is_ok());
    }

    #[test]
    fn entries_require_labels_and_bounded_values() {
        let mut draft = draft_with_values(Vec::new());
        assert_eq!(validate_entry(&draft), Err(ValidationError::MissingValues));

        draft.metric_values = vec![MetricValue {
            key: "A".to_string(),
            value: Some(120.0),
            score: None,
            sub_metric_values: Vec::new(),
        }];
        assert!(matches!(
            validate_entry(&draft),
            Err(ValidationError::ValueOutOfRange { .. })
        ));

        draft.metric_labels.clear();
        assert_eq!(validate_entry(&draft), Err(ValidationError::MissingLabels));
    }

    #[test]
    fn sub_metric_lists_must_carry_both_keys() {
        let draft = draft_with_values(vec![MetricValue {
            key: "A".to_string(),
            value: None,
            score: None,
            sub_metric_values: vec![SubMetricValue {
                key: TOTAL_KEY.to_string(),
                value: Some(10.0),
            }],
        }]);

        assert_eq!(
            validate_entry(&draft),
            Err(ValidationError::IncompleteSubKpis {
                key: "A".to_string()
            })
        );
    }
}
