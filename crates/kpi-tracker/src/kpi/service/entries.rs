use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{missing, KpiService, KpiServiceError, Resource};
use crate::kpi::domain::{
    Employee, EmployeeId, EmployeeSummary, Entry, EntryDraft, EntryId, EntryPatch, EntryStatus,
    MetricLabel, MetricValue, Period, SubMetricValue, Template, TemplateId, TemplateSummary,
};
use crate::kpi::pagination::{Page, PageRequest};
use crate::kpi::ranking::{join_entries, split_joined, OrphanedEntry};
use crate::kpi::repository::{EmployeeFilter, EntryFilter, KpiStore, TemplateFilter};
use crate::kpi::scoring::{metric_key, score_entry, COMPLETED_KEY, TOTAL_KEY};
use crate::kpi::validation::{
    validate_entry, validate_labels, validate_metric_values, validate_period,
};

pub const MANUAL_SOURCE: &str = "manual";

/// Entry with its employee and template attached when they still resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: Entry,
    pub employee: Option<EmployeeSummary>,
    pub template: Option<TemplateSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
    pub employee_id: Option<EmployeeId>,
    pub template_id: Option<TemplateId>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub status: Option<EntryStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntrySearch {
    pub employee_id: Option<EmployeeId>,
    pub template_id: Option<TemplateId>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    #[serde(default)]
    pub labels: Vec<MetricLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetOrCreateOutcome {
    pub entry: EntryView,
    pub is_new: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailablePeriod {
    pub entry_id: EntryId,
    pub month: u32,
    pub year: i32,
    pub status: EntryStatus,
    pub total_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSnapshot {
    pub entry_id: EntryId,
    pub status: EntryStatus,
    pub score: f64,
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationFailure {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub reason: String,
}

/// Outcome of creating skeleton entries for a whole period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationSummary {
    pub period: Period,
    pub created: usize,
    pub existing: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<GenerationFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanReport {
    pub total: usize,
    pub orphaned: Vec<OrphanedEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrphanCleanup {
    pub deleted: usize,
}

/// Zeroed value for a metric. Templates naming two or more sub-metrics get theirs,
/// everything else gets `darj`/`nirakrit`.
fn skeleton_value(metric: &crate::kpi::domain::Metric) -> MetricValue {
    let keys: Vec<String> = if metric.sub_metrics.len() >= 2 {
        metric.sub_metrics.iter().map(|sub| sub.key.clone()).collect()
    } else {
        vec![TOTAL_KEY.to_string(), COMPLETED_KEY.to_string()]
    };

    MetricValue {
        key: metric_key(&metric.name),
        value: Some(0.0),
        score: Some(0.0),
        sub_metric_values: keys
            .into_iter()
            .map(|key| SubMetricValue {
                key,
                value: Some(0.0),
            })
            .collect(),
    }
}

fn newest_first(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.reverse();
    entries
}

impl<S> KpiService<S>
where
    S: KpiStore,
{
    fn view(&self, entry: Entry) -> Result<EntryView, KpiServiceError> {
        let employee = self.store.fetch_employee(&entry.employee_id)?;
        let template = self.store.fetch_template(&entry.template_id)?;
        Ok(EntryView {
            employee: employee.map(|e| e.summary()),
            template: template.map(|t| t.summary()),
            entry,
        })
    }

    fn views(&self, entries: Vec<Entry>) -> Result<Vec<EntryView>, KpiServiceError> {
        let mut employees: HashMap<EmployeeId, Option<EmployeeSummary>> = HashMap::new();
        let mut templates: HashMap<TemplateId, Option<TemplateSummary>> = HashMap::new();
        let mut views = Vec::with_capacity(entries.len());

        for entry in entries {
            if !employees.contains_key(&entry.employee_id) {
                let found = self.store.fetch_employee(&entry.employee_id)?;
                employees.insert(entry.employee_id.clone(), found.map(|e| e.summary()));
            }
            if !templates.contains_key(&entry.template_id) {
                let found = self.store.fetch_template(&entry.template_id)?;
                templates.insert(entry.template_id.clone(), found.map(|t| t.summary()));
            }
            views.push(EntryView {
                employee: employees.get(&entry.employee_id).cloned().flatten(),
                template: templates.get(&entry.template_id).cloned().flatten(),
                entry,
            });
        }
        Ok(views)
    }

    fn fetch_entry(&self, id: &EntryId) -> Result<Entry, KpiServiceError> {
        self.store
            .fetch_entry(id)?
            .ok_or_else(|| missing(Resource::Entry))
    }

    /// Validates, scores and stores a fully specified entry.
    pub fn create_entry(&self, draft: EntryDraft) -> Result<EntryView, KpiServiceError> {
        validate_entry(&draft)?;
        let template = self.get_template(&draft.template_id)?;
        self.get_employee(&draft.employee_id)?;

        let sheet = score_entry(&template.metrics, &draft.metric_values)?;
        let now = Utc::now();
        let entry = Entry {
            id: EntryId::generate(),
            employee_id: draft.employee_id,
            template_id: draft.template_id,
            month: draft.month,
            year: draft.year,
            metric_labels: draft.metric_labels,
            metric_values: sheet.values,
            total_score: sheet.total_score,
            status: draft.status.unwrap_or(EntryStatus::InProgress),
            data_source: draft.data_source,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.insert_entry(entry)?;
        info!(
            entry_id = %stored.id,
            employee_id = %stored.employee_id,
            period = %stored.period(),
            total_score = stored.total_score,
            "entry created"
        );
        self.view(stored)
    }

    pub fn get_entry(&self, id: &EntryId) -> Result<EntryView, KpiServiceError> {
        let entry = self.fetch_entry(id)?;
        self.view(entry)
    }

    /// Applies a partial update. New values are rescored from scratch against the template.
    pub fn update_entry(
        &self,
        id: &EntryId,
        patch: EntryPatch,
    ) -> Result<EntryView, KpiServiceError> {
        let mut entry = self.fetch_entry(id)?;

        if patch.month.is_some() || patch.year.is_some() {
            let month = patch.month.unwrap_or(entry.month);
            let year = patch.year.unwrap_or(entry.year);
            validate_period(month, year)?;
            entry.month = month;
            entry.year = year;
        }
        if let Some(labels) = patch.metric_labels {
            validate_labels(&labels)?;
            entry.metric_labels = labels;
        }
        if let Some(source) = patch.data_source {
            entry.data_source = Some(source);
        }
        if let Some(values) = patch.metric_values {
            validate_metric_values(&values)?;
            let template = self.get_template(&entry.template_id)?;
            let sheet = score_entry(&template.metrics, &values)?;
            entry.metric_values = sheet.values;
            entry.total_score = sheet.total_score;
            if entry.status == EntryStatus::Initiated {
                entry.status = EntryStatus::InProgress;
            }
        }
        if let Some(status) = patch.status {
            self.transition(&mut entry, status)?;
        }

        entry.updated_at = Utc::now();
        self.store.update_entry(entry.clone())?;
        info!(entry_id = %entry.id, status = %entry.status, total_score = entry.total_score, "entry updated");
        self.view(entry)
    }

    fn transition(&self, entry: &mut Entry, next: EntryStatus) -> Result<(), KpiServiceError> {
        if !entry.status.can_transition_to(next) {
            return Err(KpiServiceError::InvalidStatusTransition {
                from: entry.status,
                to: next,
            });
        }
        entry.status = next;
        Ok(())
    }

    pub fn update_entry_status(
        &self,
        id: &EntryId,
        status: EntryStatus,
    ) -> Result<EntryView, KpiServiceError> {
        let mut entry = self.fetch_entry(id)?;
        self.transition(&mut entry, status)?;
        entry.updated_at = Utc::now();
        self.store.update_entry(entry.clone())?;
        info!(entry_id = %entry.id, status = %entry.status, "entry status changed");
        self.view(entry)
    }

    pub fn delete_entry(&self, id: &EntryId) -> Result<Entry, KpiServiceError> {
        let removed = self
            .store
            .delete_entry(id)?
            .ok_or_else(|| missing(Resource::Entry))?;
        info!(entry_id = %id, "entry deleted");
        Ok(removed)
    }

    pub fn list_entries(&self, query: EntryListQuery) -> Result<Page<EntryView>, KpiServiceError> {
        let filter = EntryFilter {
            employee_id: query.employee_id,
            template_id: query.template_id,
            month: query.month,
            year: query.year,
            status: query.status,
            label_search: query.search,
            ..EntryFilter::default()
        };
        let entries = newest_first(self.store.find_entries(&filter)?);
        let page = PageRequest::new(query.page, query.limit).apply(&entries);
        let docs = self.views(page.docs)?;
        Ok(Page {
            docs,
            meta: page.meta,
        })
    }

    fn entries_where(&self, filter: EntryFilter) -> Result<Vec<EntryView>, KpiServiceError> {
        let entries = newest_first(self.store.find_entries(&filter)?);
        self.views(entries)
    }

    pub fn entries_by_employee(
        &self,
        employee_id: &EmployeeId,
    ) -> Result<Vec<EntryView>, KpiServiceError> {
        self.entries_where(EntryFilter {
            employee_id: Some(employee_id.clone()),
            ..EntryFilter::default()
        })
    }

    pub fn entries_by_template(
        &self,
        template_id: &TemplateId,
    ) -> Result<Vec<EntryView>, KpiServiceError> {
        self.entries_where(EntryFilter {
            template_id: Some(template_id.clone()),
            ..EntryFilter::default()
        })
    }

    pub fn entries_by_period(
        &self,
        month: u32,
        year: i32,
    ) -> Result<Vec<EntryView>, KpiServiceError> {
        validate_period(month, year)?;
        self.entries_where(EntryFilter {
            month: Some(month),
            year: Some(year),
            ..EntryFilter::default()
        })
    }

    pub fn entries_by_status(
        &self,
        status: EntryStatus,
    ) -> Result<Vec<EntryView>, KpiServiceError> {
        self.entries_where(EntryFilter {
            status: Some(status),
            ..EntryFilter::default()
        })
    }

    fn entry_for(
        &self,
        employee_id: &EmployeeId,
        template_id: &TemplateId,
        period: Period,
    ) -> Result<Option<Entry>, KpiServiceError> {
        let filter = EntryFilter {
            employee_id: Some(employee_id.clone()),
            template_id: Some(template_id.clone()),
            month: Some(period.month),
            year: Some(period.year),
            ..EntryFilter::default()
        };
        Ok(self.store.find_entries(&filter)?.into_iter().next())
    }

    pub fn entry_exists(
        &self,
        employee_id: &EmployeeId,
        template_id: &TemplateId,
        month: u32,
        year: i32,
    ) -> Result<bool, KpiServiceError> {
        validate_period(month, year)?;
        Ok(self
            .entry_for(employee_id, template_id, Period::new(month, year))?
            .is_some())
    }

    pub fn find_entry(
        &self,
        employee_id: &EmployeeId,
        template_id: &TemplateId,
        month: u32,
        year: i32,
    ) -> Result<EntryView, KpiServiceError> {
        validate_period(month, year)?;
        let entry = self
            .entry_for(employee_id, template_id, Period::new(month, year))?
            .ok_or_else(|| missing(Resource::Entry))?;
        self.view(entry)
    }

    /// Returns the entry for the slot, creating a zeroed skeleton when none exists yet.
    pub fn get_or_create_entry(
        &self,
        employee_id: &EmployeeId,
        template_id: &TemplateId,
        month: u32,
        year: i32,
    ) -> Result<GetOrCreateOutcome, KpiServiceError> {
        validate_period(month, year)?;
        let period = Period::new(month, year);
        let template = self.get_template(template_id)?;
        self.get_employee(employee_id)?;

        if let Some(existing) = self.entry_for(employee_id, template_id, period)? {
            return Ok(GetOrCreateOutcome {
                entry: self.view(existing)?,
                is_new: false,
                message: "Existing entry found".to_string(),
            });
        }

        let entry = self.insert_skeleton(employee_id, &template, period)?;
        Ok(GetOrCreateOutcome {
            entry: self.view(entry)?,
            is_new: true,
            message: "New entry created".to_string(),
        })
    }

    fn insert_skeleton(
        &self,
        employee_id: &EmployeeId,
        template: &Template,
        period: Period,
    ) -> Result<Entry, KpiServiceError> {
        if template.metrics.is_empty() {
            return Err(KpiServiceError::EmptyTemplate(template.id.clone()));
        }

        let now = Utc::now();
        let entry = Entry {
            id: EntryId::generate(),
            employee_id: employee_id.clone(),
            template_id: template.id.clone(),
            month: period.month,
            year: period.year,
            metric_labels: Vec::new(),
            metric_values: template.metrics.iter().map(skeleton_value).collect(),
            total_score: 0.0,
            status: EntryStatus::Initiated,
            data_source: Some(MANUAL_SOURCE.to_string()),
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.insert_entry(entry)?;
        info!(entry_id = %stored.id, employee_id = %employee_id, period = %period, "skeleton entry created");
        Ok(stored)
    }

    /// Periods already recorded for an employee and template, newest first.
    pub fn available_periods(
        &self,
        employee_id: &EmployeeId,
        template_id: &TemplateId,
    ) -> Result<Vec<AvailablePeriod>, KpiServiceError> {
        let filter = EntryFilter {
            employee_id: Some(employee_id.clone()),
            template_id: Some(template_id.clone()),
            ..EntryFilter::default()
        };
        let mut periods: Vec<AvailablePeriod> = self
            .store
            .find_entries(&filter)?
            .into_iter()
            .map(|entry| AvailablePeriod {
                entry_id: entry.id,
                month: entry.month,
                year: entry.year,
                status: entry.status,
                total_score: entry.total_score,
            })
            .collect();
        periods.sort_by(|a, b| (b.year, b.month).cmp(&(a.year, a.month)));
        Ok(periods)
    }

    /// Template name, then `YYYY-MM`, to the entry recorded for that slot.
    pub fn employee_summary(
        &self,
        employee_id: &EmployeeId,
    ) -> Result<BTreeMap<String, BTreeMap<String, PeriodSnapshot>>, KpiServiceError> {
        self.get_employee(employee_id)?;
        let filter = EntryFilter {
            employee_id: Some(employee_id.clone()),
            ..EntryFilter::default()
        };

        let mut names: HashMap<TemplateId, String> = HashMap::new();
        let mut summary: BTreeMap<String, BTreeMap<String, PeriodSnapshot>> = BTreeMap::new();
        for entry in self.store.find_entries(&filter)? {
            if !names.contains_key(&entry.template_id) {
                let name = self
                    .store
                    .fetch_template(&entry.template_id)?
                    .map(|template| template.name)
                    .unwrap_or_else(|| entry.template_id.to_string());
                names.insert(entry.template_id.clone(), name);
            }
            let template_name = names
                .get(&entry.template_id)
                .cloned()
                .unwrap_or_default();
            summary.entry(template_name).or_default().insert(
                entry.period().key(),
                PeriodSnapshot {
                    entry_id: entry.id,
                    status: entry.status,
                    score: entry.total_score,
                    month: entry.month,
                    year: entry.year,
                },
            );
        }
        Ok(summary)
    }

    pub fn search_entries(&self, criteria: EntrySearch) -> Result<Vec<EntryView>, KpiServiceError> {
        self.entries_where(EntryFilter {
            employee_id: criteria.employee_id,
            template_id: criteria.template_id,
            month: criteria.month,
            year: criteria.year,
            labels: criteria.labels,
            ..EntryFilter::default()
        })
    }

    /// Creates skeleton entries for every employee whose (department, role) has a template.
    /// One employee failing does not stop the rest.
    pub fn generate_entries(
        &self,
        month: u32,
        year: i32,
        department: Option<String>,
    ) -> Result<GenerationSummary, KpiServiceError> {
        validate_period(month, year)?;
        let period = Period::new(month, year);
        let employees = self.store.find_employees(&EmployeeFilter {
            department,
            ..EmployeeFilter::default()
        })?;

        let mut summary = GenerationSummary {
            period,
            created: 0,
            existing: 0,
            skipped: 0,
            failed: 0,
            failures: Vec::new(),
        };

        for employee in employees {
            match self.generate_for(&employee, period) {
                Ok(Some(true)) => summary.created += 1,
                Ok(Some(false)) => summary.existing += 1,
                Ok(None) => summary.skipped += 1,
                Err(err) => {
                    warn!(employee_id = %employee.id, error = %err, "entry generation failed");
                    summary.failed += 1;
                    summary.failures.push(GenerationFailure {
                        employee_id: employee.id,
                        employee_name: employee.name,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            period = %period,
            created = summary.created,
            existing = summary.existing,
            skipped = summary.skipped,
            failed = summary.failed,
            "entry generation finished"
        );
        Ok(summary)
    }

    fn generate_for(
        &self,
        employee: &Employee,
        period: Period,
    ) -> Result<Option<bool>, KpiServiceError> {
        let template = match self.template_for(&employee.department, &employee.department_role) {
            Ok(template) => template,
            Err(KpiServiceError::TemplateNotFound { .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        if self.entry_for(&employee.id, &template.id, period)?.is_some() {
            return Ok(Some(false));
        }
        self.insert_skeleton(&employee.id, &template, period)?;
        Ok(Some(true))
    }

    /// Entries whose employee or template no longer exists.
    pub fn orphaned_report(&self) -> Result<OrphanReport, KpiServiceError> {
        let employees: HashMap<EmployeeId, Employee> = self
            .store
            .find_employees(&EmployeeFilter::default())?
            .into_iter()
            .map(|employee| (employee.id.clone(), employee))
            .collect();
        let templates: HashSet<TemplateId> = self
            .store
            .find_templates(&TemplateFilter::default())?
            .into_iter()
            .map(|template| template.id)
            .collect();

        let entries = self.store.find_entries(&EntryFilter::default())?;
        let joined = join_entries(
            entries,
            |id| employees.get(id).cloned(),
            |id| templates.contains(id),
        );
        let (_, orphaned) = split_joined(joined);
        Ok(OrphanReport {
            total: orphaned.len(),
            orphaned,
        })
    }

    pub fn cleanup_orphaned(&self) -> Result<OrphanCleanup, KpiServiceError> {
        let report = self.orphaned_report()?;
        let ids: Vec<EntryId> = report
            .orphaned
            .into_iter()
            .map(|orphan| orphan.entry.id)
            .collect();
        let deleted = if ids.is_empty() {
            0
        } else {
            self.store.delete_entries(&ids)?
        };
        info!(deleted, "orphaned entries removed");
        Ok(OrphanCleanup { deleted })
    }
}
