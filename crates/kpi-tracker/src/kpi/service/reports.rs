use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::statistics::{cohort_key, StatisticsQuery};
use super::{missing, KpiService, KpiServiceError, Resource};
use crate::kpi::domain::{
    EmployeeSummary, EntryId, Period, Template, TemplateId, TemplateSummary,
};
use crate::kpi::ranking::{period_or_default, rank_entries, RankedEntry, SelectionCounts};
use crate::kpi::report::csv::render_ranking_csv;
use crate::kpi::report::html::render_department_html;
use crate::kpi::report::pdf::render_department_pdf;
use crate::kpi::report::whatsapp::{render_cohort_messages, CampaignMessage};
use crate::kpi::report::{pdf_file_name, DepartmentReport, ReportRow, RoleSection};
use crate::kpi::repository::{KpiStore, TemplateFilter};
use crate::kpi::scoring::match_metric;
use crate::kpi::validation::validate_period;

/// Rendered messages for one cohort, without sending anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhatsAppRanking {
    pub period: Period,
    pub department: String,
    pub role: String,
    pub template: TemplateSummary,
    pub max_score: f64,
    pub total: usize,
    pub selection: SelectionCounts,
    pub messages: Vec<CampaignMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// Where one entry stands in its cohort.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleUserReport {
    pub entry_id: EntryId,
    pub employee: EmployeeSummary,
    pub template: TemplateSummary,
    pub period: Period,
    pub total_score: f64,
    pub max_score: f64,
    pub rank: usize,
    pub cohort_size: usize,
    pub message: CampaignMessage,
}

/// A message queued for dispatch, tagged with its template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedMessage {
    pub template_id: TemplateId,
    pub template_name: String,
    pub message: CampaignMessage,
}

/// Rendered PDF with its download name.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPdf {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

fn percentage(score: f64, max_score: f64) -> f64 {
    if max_score > 0.0 {
        (score / max_score * 10_000.0).round() / 100.0
    } else {
        0.0
    }
}

fn report_row(template: &Template, item: &RankedEntry, max_score: f64) -> ReportRow {
    let metric_scores = template
        .metrics
        .iter()
        .map(|metric| {
            item.entry
                .metric_values
                .iter()
                .find(|value| {
                    match_metric(&template.metrics, &value.key)
                        .is_some_and(|(matched, _)| matched.name == metric.name)
                })
                .and_then(|value| value.score)
                .unwrap_or(0.0)
        })
        .collect();

    ReportRow {
        rank: item.position,
        employee_name: item.employee.name.clone(),
        phone: item.employee.contact.phone.clone(),
        metric_scores,
        total_score: item.entry.total_score,
        percentage: percentage(item.entry.total_score, max_score),
        status: item.entry.status,
    }
}

impl<S> KpiService<S>
where
    S: KpiStore,
{
    /// Every template of the department with its ranked entries for the period, one section per
    /// template ordered by role.
    pub fn department_report(
        &self,
        department: &str,
        query: ReportQuery,
        today: NaiveDate,
    ) -> Result<DepartmentReport, KpiServiceError> {
        let period = period_or_default(query.month, query.year, &today);
        validate_period(period.month, period.year)?;

        let mut templates = self.store.find_templates(&TemplateFilter {
            department_slug: Some(department.to_string()),
            ..TemplateFilter::default()
        })?;
        templates.sort_by(|a, b| a.role.cmp(&b.role));

        let mut sections = Vec::new();
        for template in templates {
            let (resolved, _) = self.cohort(&template, period, None)?;
            if resolved.is_empty() {
                continue;
            }
            let max_score = template.max_attainable_score();
            let rows = rank_entries(resolved)
                .iter()
                .map(|item| report_row(&template, item, max_score))
                .collect();
            sections.push(RoleSection {
                role: template.role.clone(),
                template_name: template.name.clone(),
                max_score,
                metric_names: template.metrics.iter().map(|m| m.name.clone()).collect(),
                rows,
            });
        }

        let department_name = self
            .store
            .department_by_slug(department)?
            .map(|found| found.name);
        let report = DepartmentReport {
            department: department.to_string(),
            department_name,
            period,
            generated_at: Utc::now(),
            sections,
        };
        debug!(
            department,
            period = %period,
            sections = report.sections.len(),
            rows = report.total_rows(),
            "department report assembled"
        );
        Ok(report)
    }

    pub fn department_pdf(
        &self,
        department: &str,
        query: ReportQuery,
        today: NaiveDate,
    ) -> Result<RenderedPdf, KpiServiceError> {
        let report = self.department_report(department, query, today)?;
        let bytes = render_department_pdf(&report)?;
        info!(department, period = %report.period, size = bytes.len(), "department pdf rendered");
        Ok(RenderedPdf {
            file_name: pdf_file_name(department, report.period),
            bytes,
        })
    }

    pub fn department_html(
        &self,
        department: &str,
        query: ReportQuery,
        today: NaiveDate,
    ) -> Result<String, KpiServiceError> {
        let report = self.department_report(department, query, today)?;
        Ok(render_department_html(&report))
    }

    /// Full ranking of one cohort as CSV, ignoring any paging in the query.
    pub fn ranking_csv(
        &self,
        query: StatisticsQuery,
        today: NaiveDate,
    ) -> Result<Vec<u8>, KpiServiceError> {
        let report = self.statistics(
            StatisticsQuery {
                page: Some(1),
                limit: Some(usize::MAX),
                ..query
            },
            today,
        )?;
        Ok(render_ranking_csv(&report)?)
    }

    /// Renders every message of one cohort without sending.
    pub fn whatsapp_ranking(
        &self,
        query: StatisticsQuery,
        today: NaiveDate,
    ) -> Result<WhatsAppRanking, KpiServiceError> {
        let (department, role) = cohort_key(&query.department, &query.role)?;
        let period = period_or_default(query.month, query.year, &today);
        validate_period(period.month, period.year)?;

        let template = self.template_for(&department, &role)?;
        let (resolved, _) = self.cohort(&template, period, None)?;
        let ranked = rank_entries(resolved);
        let max_score = template.max_attainable_score();

        Ok(WhatsAppRanking {
            period,
            department,
            role,
            max_score,
            total: ranked.len(),
            selection: SelectionCounts::for_total(ranked.len()),
            messages: render_cohort_messages(&ranked, max_score),
            template: template.summary(),
        })
    }

    /// Rank, tier and message of a single entry within its template and period.
    pub fn single_user_report(&self, id: &EntryId) -> Result<SingleUserReport, KpiServiceError> {
        let entry = self
            .store
            .fetch_entry(id)?
            .ok_or_else(|| missing(Resource::Entry))?;
        let template = self.get_template(&entry.template_id)?;
        let (resolved, _) = self.cohort(&template, entry.period(), None)?;
        let ranked = rank_entries(resolved);
        let max_score = template.max_attainable_score();

        let index = ranked
            .iter()
            .position(|item| item.entry.id == entry.id)
            .ok_or_else(|| KpiServiceError::OrphanedEntry {
                entry: entry.id.clone(),
                employee: entry.employee_id.clone(),
            })?;
        let message = render_cohort_messages(&ranked, max_score).swap_remove(index);
        let item = &ranked[index];

        Ok(SingleUserReport {
            entry_id: entry.id.clone(),
            employee: item.employee.summary(),
            template: template.summary(),
            period: entry.period(),
            total_score: entry.total_score,
            max_score,
            rank: item.position,
            cohort_size: ranked.len(),
            message,
        })
    }

    /// Messages for every cohort of the period, optionally narrowed to a department or role.
    pub fn notification_plan(
        &self,
        period: Period,
        department: Option<String>,
        role: Option<String>,
    ) -> Result<Vec<PlannedMessage>, KpiServiceError> {
        validate_period(period.month, period.year)?;
        let templates = self.store.find_templates(&TemplateFilter {
            department_slug: department,
            role,
            ..TemplateFilter::default()
        })?;

        let mut plan = Vec::new();
        for template in templates {
            let (resolved, _) = self.cohort(&template, period, None)?;
            if resolved.is_empty() {
                continue;
            }
            let ranked = rank_entries(resolved);
            let messages = render_cohort_messages(&ranked, template.max_attainable_score());
            plan.extend(messages.into_iter().map(|message| PlannedMessage {
                template_id: template.id.clone(),
                template_name: template.name.clone(),
                message,
            }));
        }
        debug!(period = %period, messages = plan.len(), "notification plan built");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_guard_against_empty_templates() {
        assert_eq!(percentage(66.0, 100.0), 66.0);
        assert_eq!(percentage(1.0, 3.0), 33.33);
        assert_eq!(percentage(5.0, 0.0), 0.0);
    }
}
