use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{KpiService, KpiServiceError};
use crate::kpi::domain::{Employee, EmployeeId, Entry, EntryStatus, Period, Template, TemplateId, TemplateSummary};
use crate::kpi::pagination::PageRequest;
use crate::kpi::ranking::{
    build_report, extremes, group_statistics, join_entries, period_or_default, rank_entries,
    split_joined, Cohort, GroupStatistic, RankingReport, RankingRow, ResolvedEntry,
    SelectionCounts,
};
use crate::kpi::repository::{EntryFilter, KpiStore, TemplateFilter};
use crate::kpi::validation::validate_period;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatisticsQuery {
    pub department: Option<String>,
    pub role: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableFilters {
    pub departments: Vec<String>,
    pub roles: Vec<String>,
    pub months: Vec<u32>,
    pub years: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentOverview {
    pub period: Period,
    pub departments: Vec<GroupStatistic>,
}

/// Head and tail of one template's ranking, as printed by the overview command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateOverview {
    pub template: TemplateSummary,
    pub total: usize,
    pub selection: SelectionCounts,
    pub top: Vec<RankingRow>,
    pub middle: usize,
    pub bottom: Vec<RankingRow>,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Department and role, both required to pick a cohort.
pub(crate) fn cohort_key(
    department: &Option<String>,
    role: &Option<String>,
) -> Result<(String, String), KpiServiceError> {
    match (present(department), present(role)) {
        (Some(department), Some(role)) => Ok((department, role)),
        (department, role) => {
            let mut missing = Vec::new();
            if department.is_none() {
                missing.push("department");
            }
            if role.is_none() {
                missing.push("role");
            }
            Err(KpiServiceError::MissingRequiredParameters { missing })
        }
    }
}

impl<S> KpiService<S>
where
    S: KpiStore,
{
    fn employee_lookup(
        &self,
        entries: &[Entry],
    ) -> Result<HashMap<EmployeeId, Employee>, KpiServiceError> {
        let mut employees = HashMap::new();
        for entry in entries {
            if employees.contains_key(&entry.employee_id) {
                continue;
            }
            if let Some(employee) = self.store.fetch_employee(&entry.employee_id)? {
                employees.insert(entry.employee_id.clone(), employee);
            }
        }
        Ok(employees)
    }

    /// Entries of one template and period with their employees. Orphans are dropped and counted.
    pub(crate) fn cohort(
        &self,
        template: &Template,
        period: Period,
        exclude_status: Option<EntryStatus>,
    ) -> Result<(Vec<ResolvedEntry>, usize), KpiServiceError> {
        let filter = EntryFilter {
            template_id: Some(template.id.clone()),
            month: Some(period.month),
            year: Some(period.year),
            ..EntryFilter::default()
        };
        let entries: Vec<Entry> = self
            .store
            .find_entries(&filter)?
            .into_iter()
            .filter(|entry| exclude_status.map_or(true, |status| entry.status != status))
            .collect();

        let employees = self.employee_lookup(&entries)?;
        let joined = join_entries(entries, |id| employees.get(id).cloned(), |_| true);
        let (resolved, orphaned) = split_joined(joined);
        if !orphaned.is_empty() {
            warn!(
                template_id = %template.id,
                period = %period,
                orphaned = orphaned.len(),
                "entries without an employee were left out of the ranking"
            );
        }
        Ok((resolved, orphaned.len()))
    }

    /// Ranks one (department, role) cohort for a period. Missing month/year default to the
    /// month before `today`.
    pub fn statistics(
        &self,
        query: StatisticsQuery,
        today: NaiveDate,
    ) -> Result<RankingReport, KpiServiceError> {
        let (department, role) = cohort_key(&query.department, &query.role)?;
        let period = period_or_default(query.month, query.year, &today);
        validate_period(period.month, period.year)?;

        let template = self.template_for(&department, &role)?;
        let (resolved, excluded_orphans) = self.cohort(&template, period, None)?;
        debug!(
            template_id = %template.id,
            period = %period,
            entries = resolved.len(),
            "ranking cohort loaded"
        );

        Ok(build_report(
            Cohort {
                period,
                department,
                role,
                template,
                resolved,
                excluded_orphans,
            },
            PageRequest::new(query.page, query.limit),
        ))
    }

    /// Departments, roles, months and years that appear across stored entries.
    pub fn available_filters(&self) -> Result<AvailableFilters, KpiServiceError> {
        let templates: HashMap<TemplateId, Template> = self
            .store
            .find_templates(&TemplateFilter::default())?
            .into_iter()
            .map(|template| (template.id.clone(), template))
            .collect();

        let mut departments = BTreeSet::new();
        let mut roles = BTreeSet::new();
        let mut months = BTreeSet::new();
        let mut years = BTreeSet::new();
        for entry in self.store.find_entries(&EntryFilter::default())? {
            if let Some(template) = templates.get(&entry.template_id) {
                departments.insert(template.department_slug.clone());
                roles.insert(template.role.clone());
            }
            months.insert(entry.month);
            years.insert(entry.year);
        }

        Ok(AvailableFilters {
            departments: departments.into_iter().collect(),
            roles: roles.into_iter().collect(),
            months: months.into_iter().collect(),
            years: years.into_iter().rev().collect(),
        })
    }

    /// Count, average and best score per department for a period.
    pub fn department_overview(
        &self,
        month: Option<u32>,
        year: Option<i32>,
        today: NaiveDate,
    ) -> Result<DepartmentOverview, KpiServiceError> {
        let period = period_or_default(month, year, &today);
        validate_period(period.month, period.year)?;

        let templates: HashMap<TemplateId, Template> = self
            .store
            .find_templates(&TemplateFilter::default())?
            .into_iter()
            .map(|template| (template.id.clone(), template))
            .collect();
        let entries = self.store.find_entries(&EntryFilter {
            month: Some(period.month),
            year: Some(period.year),
            ..EntryFilter::default()
        })?;
        let employees = self.employee_lookup(&entries)?;
        let joined = join_entries(
            entries,
            |id| employees.get(id).cloned(),
            |id| templates.contains_key(id),
        );
        let (resolved, _) = split_joined(joined);

        let departments = group_statistics(
            resolved.iter().map(|item| (&item.entry, &item.employee)),
            |entry, _| {
                templates
                    .get(&entry.template_id)
                    .map(|template| template.department_slug.clone())
                    .unwrap_or_default()
            },
        );

        Ok(DepartmentOverview {
            period,
            departments,
        })
    }

    /// Rankings of every template with entries in the period.
    pub fn template_overview(
        &self,
        period: Period,
        exclude_status: Option<EntryStatus>,
    ) -> Result<Vec<TemplateOverview>, KpiServiceError> {
        validate_period(period.month, period.year)?;
        let mut overview = Vec::new();
        for template in self.store.find_templates(&TemplateFilter::default())? {
            let (resolved, _) = self.cohort(&template, period, exclude_status)?;
            if resolved.is_empty() {
                continue;
            }

            let ranked = rank_entries(resolved);
            let selection = SelectionCounts::for_total(ranked.len());
            let (top, bottom) = extremes(&ranked);
            overview.push(TemplateOverview {
                template: template.summary(),
                total: ranked.len(),
                selection,
                middle: ranked.len() - top.len() - bottom.len(),
                top,
                bottom,
            });
        }
        Ok(overview)
    }
}
