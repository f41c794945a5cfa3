//! Renderers for department reports, ranking exports and WhatsApp messages.

pub mod csv;
pub mod html;
pub mod pdf;
pub mod whatsapp;

use std::io;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{EntryStatus, Period};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to render PDF: {0}")]
    Pdf(#[source] io::Error),
    #[error("failed to write CSV: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("report io: {0}")]
    Io(#[from] io::Error),
}

/// Scores of one department for a period, grouped by role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentReport {
    pub department: String,
    pub department_name: Option<String>,
    pub period: Period,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<RoleSection>,
}

impl DepartmentReport {
    pub fn title(&self) -> String {
        let name = self
            .department_name
            .as_deref()
            .unwrap_or(self.department.as_str());
        format!("{name} Performance Report")
    }

    pub fn total_rows(&self) -> usize {
        self.sections.iter().map(|section| section.rows.len()).sum()
    }
}

/// One role's table, sorted by score descending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleSection {
    pub role: String,
    pub template_name: String,
    pub max_score: f64,
    pub metric_names: Vec<String>,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub rank: usize,
    pub employee_name: String,
    pub phone: String,
    /// Score per template metric, in `metric_names` order.
    pub metric_scores: Vec<f64>,
    pub total_score: f64,
    pub percentage: f64,
    pub status: EntryStatus,
}

/// `<department>_Performance_Report_<month>_<year>.pdf`
pub fn pdf_file_name(department: &str, period: Period) -> String {
    format!(
        "{}_Performance_Report_{}_{}.pdf",
        department, period.month, period.year
    )
}

pub(crate) fn format_score(score: f64, max_score: f64) -> String {
    format!("{score:.2} / {max_score:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_names_follow_department_and_period() {
        assert_eq!(
            pdf_file_name("revenue", Period::new(3, 2025)),
            "revenue_Performance_Report_3_2025.pdf"
        );
    }

    #[test]
    fn scores_render_with_two_decimals() {
        assert_eq!(format_score(66.0, 100.0), "66.00 / 100.00");
        assert_eq!(format_score(12.346, 40.0), "12.35 / 40.00");
    }
}
