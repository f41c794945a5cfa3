use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{missing, KpiService, KpiServiceError, Resource};
use crate::kpi::domain::{
    EmployeeId, Frequency, SubMetric, Template, TemplateDraft, TemplateId, TemplatePatch,
    TemplateVersion, TemplateVersionId,
};
use crate::kpi::pagination::{Page, PageRequest};
use crate::kpi::repository::{KpiStore, TemplateFilter};
use crate::kpi::scoring::metric_key;
use crate::kpi::validation::{validate_metrics, validate_template};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
    pub department_slug: Option<String>,
    pub frequency: Option<Frequency>,
    pub role: Option<String>,
}

/// Shape a client needs to render an entry form for a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormStructure {
    pub template_id: TemplateId,
    pub name: String,
    pub description: String,
    pub role: String,
    pub frequency: Frequency,
    pub department_slug: String,
    pub max_score: f64,
    pub metrics: Vec<FormMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormMetric {
    pub key: String,
    pub name: String,
    pub description: String,
    pub max_marks: u32,
    pub unit: String,
    pub sub_metrics: Vec<SubMetric>,
}

fn newest_first(mut templates: Vec<Template>) -> Vec<Template> {
    templates.reverse();
    templates
}

impl<S> KpiService<S>
where
    S: KpiStore,
{
    pub fn create_template(&self, draft: TemplateDraft) -> Result<Template, KpiServiceError> {
        validate_template(&draft)?;

        let now = Utc::now();
        let template = Template {
            id: TemplateId::generate(),
            name: draft.name.trim().to_string(),
            kpi_name: draft.kpi_name,
            description: draft.description,
            role: draft.role.trim().to_string(),
            frequency: draft.frequency,
            department_slug: draft.department_slug.trim().to_string(),
            metrics: draft.metrics,
            updated_by: draft.created_by.clone(),
            created_by: draft.created_by,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.insert_template(template)?;
        info!(
            template_id = %stored.id,
            department = %stored.department_slug,
            role = %stored.role,
            metrics = stored.metrics.len(),
            "template created"
        );
        Ok(stored)
    }

    pub fn get_template(&self, id: &TemplateId) -> Result<Template, KpiServiceError> {
        self.store
            .fetch_template(id)?
            .ok_or_else(|| missing(Resource::Template))
    }

    pub fn update_template(
        &self,
        id: &TemplateId,
        patch: TemplatePatch,
    ) -> Result<Template, KpiServiceError> {
        let mut template = self.get_template(id)?;

        if let Some(name) = patch.name {
            template.name = name;
        }
        if let Some(kpi_name) = patch.kpi_name {
            template.kpi_name = kpi_name;
        }
        if let Some(description) = patch.description {
            template.description = description;
        }
        if let Some(role) = patch.role {
            template.role = role;
        }
        if let Some(frequency) = patch.frequency {
            template.frequency = frequency;
        }
        if let Some(slug) = patch.department_slug {
            template.department_slug = slug;
        }
        if let Some(metrics) = patch.metrics {
            validate_metrics(&metrics)?;
            template.metrics = metrics;
        }
        if let Some(updated_by) = patch.updated_by {
            template.updated_by = updated_by;
        }

        validate_template(&TemplateDraft {
            name: template.name.clone(),
            kpi_name: template.kpi_name.clone(),
            description: template.description.clone(),
            role: template.role.clone(),
            frequency: template.frequency,
            department_slug: template.department_slug.clone(),
            metrics: template.metrics.clone(),
            created_by: template.created_by.clone(),
        })?;

        template.updated_at = Utc::now();
        self.store.update_template(template.clone())?;
        info!(template_id = %template.id, "template updated");
        Ok(template)
    }

    pub fn delete_template(&self, id: &TemplateId) -> Result<Template, KpiServiceError> {
        let removed = self
            .store
            .delete_template(id)?
            .ok_or_else(|| missing(Resource::Template))?;
        info!(template_id = %id, "template deleted");
        Ok(removed)
    }

    pub fn list_templates(
        &self,
        query: TemplateListQuery,
    ) -> Result<Page<Template>, KpiServiceError> {
        let filter = TemplateFilter {
            search: query.search,
            department_slug: query.department_slug,
            frequency: query.frequency,
            role: query.role,
        };
        let templates = newest_first(self.store.find_templates(&filter)?);
        Ok(PageRequest::new(query.page, query.limit).apply(&templates))
    }

    pub fn templates_by_department(&self, slug: &str) -> Result<Vec<Template>, KpiServiceError> {
        let filter = TemplateFilter {
            department_slug: Some(slug.to_string()),
            ..TemplateFilter::default()
        };
        Ok(newest_first(self.store.find_templates(&filter)?))
    }

    pub fn templates_by_frequency(
        &self,
        frequency: Frequency,
    ) -> Result<Vec<Template>, KpiServiceError> {
        let filter = TemplateFilter {
            frequency: Some(frequency),
            ..TemplateFilter::default()
        };
        Ok(newest_first(self.store.find_templates(&filter)?))
    }

    pub fn templates_by_role(&self, role: &str) -> Result<Vec<Template>, KpiServiceError> {
        let filter = TemplateFilter {
            role: Some(role.to_string()),
            ..TemplateFilter::default()
        };
        Ok(newest_first(self.store.find_templates(&filter)?))
    }

    /// Templates matching the employee's department and role.
    pub fn templates_for_employee(
        &self,
        employee_id: &EmployeeId,
    ) -> Result<Vec<Template>, KpiServiceError> {
        let employee = self.get_employee(employee_id)?;
        let filter = TemplateFilter {
            department_slug: Some(employee.department),
            role: Some(employee.department_role),
            ..TemplateFilter::default()
        };
        Ok(newest_first(self.store.find_templates(&filter)?))
    }

    /// The template ranking a (department, role) pair. The first one created wins.
    pub(crate) fn template_for(
        &self,
        department: &str,
        role: &str,
    ) -> Result<Template, KpiServiceError> {
        let filter = TemplateFilter {
            department_slug: Some(department.to_string()),
            role: Some(role.to_string()),
            ..TemplateFilter::default()
        };
        self.store
            .find_templates(&filter)?
            .into_iter()
            .next()
            .ok_or_else(|| KpiServiceError::TemplateNotFound {
                department: department.to_string(),
                role: role.to_string(),
            })
    }

    /// Snapshots the template as its next version.
    pub fn create_template_version(
        &self,
        id: &TemplateId,
        created_by: Option<String>,
    ) -> Result<TemplateVersion, KpiServiceError> {
        let template = self.get_template(id)?;
        let next = self
            .store
            .template_versions(id)?
            .iter()
            .map(|version| version.version)
            .max()
            .unwrap_or(0)
            + 1;

        let version = TemplateVersion {
            id: TemplateVersionId::generate(),
            template_id: template.id.clone(),
            version: next,
            name: template.name,
            kpi_name: template.kpi_name,
            description: template.description,
            role: template.role,
            frequency: template.frequency,
            department_slug: template.department_slug,
            metrics: template.metrics,
            created_by: created_by.unwrap_or(template.updated_by),
            created_at: Utc::now(),
        };

        let stored = self.store.insert_version(version)?;
        info!(template_id = %id, version = stored.version, "template version recorded");
        Ok(stored)
    }

    pub fn template_versions(
        &self,
        id: &TemplateId,
    ) -> Result<Vec<TemplateVersion>, KpiServiceError> {
        self.get_template(id)?;
        let mut versions = self.store.template_versions(id)?;
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }

    pub fn template_version(
        &self,
        id: &TemplateId,
        version: u32,
    ) -> Result<TemplateVersion, KpiServiceError> {
        self.store
            .template_versions(id)?
            .into_iter()
            .find(|candidate| candidate.version == version)
            .ok_or_else(|| missing(Resource::TemplateVersion))
    }

    pub fn form_structure(&self, id: &TemplateId) -> Result<FormStructure, KpiServiceError> {
        let template = self.get_template(id)?;
        let max_score = template.max_attainable_score();
        let metrics = template
            .metrics
            .into_iter()
            .map(|metric| FormMetric {
                key: metric_key(&metric.name),
                name: metric.name,
                description: metric.description,
                max_marks: metric.max_marks,
                unit: metric.unit,
                sub_metrics: metric.sub_metrics,
            })
            .collect();

        Ok(FormStructure {
            template_id: template.id,
            name: template.name,
            description: template.description,
            role: template.role,
            frequency: template.frequency,
            department_slug: template.department_slug,
            max_score,
            metrics,
        })
    }
}
