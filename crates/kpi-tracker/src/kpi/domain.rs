use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! document_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

document_id!(
    /// Identifier of a KPI template.
    TemplateId
);
document_id!(
    /// Identifier of a monthly KPI entry.
    EntryId
);
document_id!(
    /// Identifier of an employee record.
    EmployeeId
);
document_id!(DepartmentId);
document_id!(TemplateVersionId);

/// Reporting cadence a template is designed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl Frequency {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            _ => None,
        }
    }
}

pub const PERCENT_UNIT: &str = "%";

fn percent_unit() -> String {
    PERCENT_UNIT.to_string()
}

/// Named component of a metric, e.g. `darj` (registered) and `nirakrit` (resolved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMetric {
    pub name: String,
    pub key: String,
}

/// One scored dimension of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub description: String,
    pub max_marks: u32,
    #[serde(default = "percent_unit")]
    pub unit: String,
    #[serde(default)]
    pub sub_metrics: Vec<SubMetric>,
}

/// Role-specific scoring rubric for a department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub kpi_name: String,
    pub description: String,
    pub role: String,
    pub frequency: Frequency,
    pub department_slug: String,
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Sum of `max_marks` across all metrics.
    pub fn max_attainable_score(&self) -> f64 {
        self.metrics.iter().map(|metric| f64::from(metric.max_marks)).sum()
    }

    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
            department_slug: self.department_slug.clone(),
            frequency: self.frequency,
            max_score: self.max_attainable_score(),
        }
    }
}

/// Caller-supplied template content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub name: String,
    #[serde(default)]
    pub kpi_name: String,
    pub description: String,
    pub role: String,
    pub frequency: Frequency,
    pub department_slug: String,
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub created_by: String,
}

/// Partial template update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub kpi_name: Option<String>,
    pub description: Option<String>,
    pub role: Option<String>,
    pub frequency: Option<Frequency>,
    pub department_slug: Option<String>,
    pub metrics: Option<Vec<Metric>>,
    pub updated_by: Option<String>,
}

/// Immutable snapshot of a template at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateVersion {
    pub id: TemplateVersionId,
    pub template_id: TemplateId,
    pub version: u32,
    pub name: String,
    pub kpi_name: String,
    pub description: String,
    pub role: String,
    pub frequency: Frequency,
    pub department_slug: String,
    pub metrics: Vec<Metric>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Compact template reference embedded in entry and ranking views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: TemplateId,
    pub name: String,
    pub role: String,
    pub department_slug: String,
    pub frequency: Frequency,
    pub max_score: f64,
}

/// Lifecycle of a monthly entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Initiated,
    InProgress,
    Generated,
}

impl EntryStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::InProgress => "inprogress",
            Self::Generated => "generated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "initiated" => Some(Self::Initiated),
            "inprogress" | "in_progress" => Some(Self::InProgress),
            "generated" => Some(Self::Generated),
            _ => None,
        }
    }

    /// `generated` is terminal; any other move is allowed.
    pub fn can_transition_to(self, next: EntryStatus) -> bool {
        self != Self::Generated || next == Self::Generated
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Free-form tag attached to an entry, optionally carrying a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricLabel {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubMetricValue {
    pub key: String,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Reported value for one metric, plus the score computed from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub key: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub sub_metric_values: Vec<SubMetricValue>,
}

impl MetricValue {
    pub fn sub_value(&self, key: &str) -> Option<f64> {
        self.sub_metric_values
            .iter()
            .find(|sub| sub.key == key)
            .and_then(|sub| sub.value)
    }

    pub fn has_sub_metric(&self, key: &str) -> bool {
        self.sub_metric_values.iter().any(|sub| sub.key == key)
    }
}

/// One employee's scored record for one template and month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub employee_id: EmployeeId,
    pub template_id: TemplateId,
    pub month: u32,
    pub year: i32,
    #[serde(default)]
    pub metric_labels: Vec<MetricLabel>,
    pub metric_values: Vec<MetricValue>,
    pub total_score: f64,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    pub fn period(&self) -> Period {
        Period {
            month: self.month,
            year: self.year,
        }
    }

    /// Labels in a canonical order so uniqueness checks ignore ordering.
    pub fn label_set(&self) -> Vec<MetricLabel> {
        let mut labels = self.metric_labels.clone();
        labels.sort();
        labels
    }

    /// Uniqueness key: employee, month, year and labels. The template is not part of it.
    pub fn collides_with(&self, other: &Entry) -> bool {
        self.id != other.id
            && self.employee_id == other.employee_id
            && self.month == other.month
            && self.year == other.year
            && self.label_set() == other.label_set()
    }
}

/// Caller-supplied entry content. Scores are always recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub employee_id: EmployeeId,
    pub template_id: TemplateId,
    pub month: u32,
    pub year: i32,
    #[serde(default)]
    pub metric_labels: Vec<MetricLabel>,
    #[serde(default)]
    pub metric_values: Vec<MetricValue>,
    #[serde(default)]
    pub status: Option<EntryStatus>,
    #[serde(default)]
    pub data_source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPatch {
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub metric_labels: Option<Vec<MetricLabel>>,
    pub metric_values: Option<Vec<MetricValue>>,
    pub status: Option<EntryStatus>,
    pub data_source: Option<String>,
}

/// Calendar month a set of entries belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub month: u32,
    pub year: i32,
}

impl Period {
    pub const fn new(month: u32, year: i32) -> Self {
        Self { month, year }
    }

    /// `YYYY-MM`, used as a grouping key in summaries.
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.month, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub contact: Contact,
    pub department: String,
    pub department_role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    pub fn summary(&self) -> EmployeeSummary {
        EmployeeSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            phone: self.contact.phone.clone(),
            department: self.department.clone(),
            department_role: self.department_role.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeDraft {
    pub name: String,
    pub contact: Contact,
    pub department: String,
    pub department_role: String,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeePatch {
    pub name: Option<String>,
    pub contact: Option<Contact>,
    pub department: Option<String>,
    pub department_role: Option<String>,
    pub metadata: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeSummary {
    pub id: EmployeeId,
    pub name: String,
    pub phone: String,
    pub department: String,
    pub department_role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentDraft {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_as_lowercase_labels() {
        let encoded = serde_json::to_string(&EntryStatus::InProgress).expect("serializes");
        assert_eq!(encoded, "\"inprogress\"");
        assert_eq!(EntryStatus::parse("in_progress"), Some(EntryStatus::InProgress));
        assert_eq!(EntryStatus::parse("archived"), None);
    }

    #[test]
    fn generated_is_terminal() {
        assert!(EntryStatus::Initiated.can_transition_to(EntryStatus::Generated));
        assert!(EntryStatus::InProgress.can_transition_to(EntryStatus::Initiated));
        assert!(!EntryStatus::Generated.can_transition_to(EntryStatus::InProgress));
        assert!(EntryStatus::Generated.can_transition_to(EntryStatus::Generated));
    }

    #[test]
    fn metric_unit_defaults_to_percent() {
        let metric: Metric = serde_json::from_str(
            r#"{"name":"Disposal","description":"Cases disposed","max_marks":40}"#,
        )
        .expect("metric parses");
        assert_eq!(metric.unit, PERCENT_UNIT);
        assert!(metric.sub_metrics.is_empty());
    }

    #[test]
    fn period_key_is_zero_padded() {
        assert_eq!(Period::new(3, 2024).key(), "2024-03");
    }
}
