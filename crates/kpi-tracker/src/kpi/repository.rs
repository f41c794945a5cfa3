use crate::kpi::domain::{
    Department, DepartmentId, Employee, EmployeeId, Entry, EntryId, EntryStatus, Frequency,
    MetricLabel, Template, TemplateId, TemplateVersion,
};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn search_term(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateFilter {
    /// Case-insensitive match on name, description or role.
    pub search: Option<String>,
    pub department_slug: Option<String>,
    pub frequency: Option<Frequency>,
    pub role: Option<String>,
}

impl TemplateFilter {
    pub fn matches(&self, template: &Template) -> bool {
        if let Some(term) = search_term(&self.search) {
            let hit = contains_folded(&template.name, &term)
                || contains_folded(&template.description, &term)
                || contains_folded(&template.role, &term);
            if !hit {
                return false;
            }
        }
        self.department_slug
            .as_ref()
            .map_or(true, |slug| &template.department_slug == slug)
            && self.frequency.map_or(true, |f| template.frequency == f)
            && self.role.as_ref().map_or(true, |role| &template.role == role)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    pub employee_id: Option<EmployeeId>,
    pub template_id: Option<TemplateId>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub status: Option<EntryStatus>,
    /// Case-insensitive match on label names and values.
    pub label_search: Option<String>,
    /// Every listed label must be present; labels carrying a value must match it too.
    pub labels: Vec<MetricLabel>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &Entry) -> bool {
        let scalar = self
            .employee_id
            .as_ref()
            .map_or(true, |id| &entry.employee_id == id)
            && self
                .template_id
                .as_ref()
                .map_or(true, |id| &entry.template_id == id)
            && self.month.map_or(true, |month| entry.month == month)
            && self.year.map_or(true, |year| entry.year == year)
            && self.status.map_or(true, |status| entry.status == status);
        if !scalar {
            return false;
        }

        if let Some(term) = search_term(&self.label_search) {
            let hit = entry.metric_labels.iter().any(|label| {
                contains_folded(&label.label, &term)
                    || label
                        .value
                        .as_deref()
                        .is_some_and(|value| contains_folded(value, &term))
            });
            if !hit {
                return false;
            }
        }

        self.labels.iter().all(|wanted| {
            entry.metric_labels.iter().any(|label| {
                label.label == wanted.label
                    && wanted
                        .value
                        .as_ref()
                        .map_or(true, |value| label.value.as_ref() == Some(value))
            })
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeeFilter {
    /// Case-insensitive match on name, email, phone, department or role.
    pub search: Option<String>,
    pub department: Option<String>,
    pub department_role: Option<String>,
}

impl EmployeeFilter {
    pub fn matches(&self, employee: &Employee) -> bool {
        if let Some(term) = search_term(&self.search) {
            let hit = contains_folded(&employee.name, &term)
                || employee
                    .contact
                    .email
                    .as_deref()
                    .is_some_and(|email| contains_folded(email, &term))
                || contains_folded(&employee.contact.phone, &term)
                || contains_folded(&employee.department, &term)
                || contains_folded(&employee.department_role, &term);
            if !hit {
                return false;
            }
        }
        self.department
            .as_ref()
            .map_or(true, |department| &employee.department == department)
            && self
                .department_role
                .as_ref()
                .map_or(true, |role| &employee.department_role == role)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepartmentFilter {
    pub search: Option<String>,
}

impl DepartmentFilter {
    pub fn matches(&self, department: &Department) -> bool {
        search_term(&self.search).map_or(true, |term| {
            contains_folded(&department.name, &term) || contains_folded(&department.slug, &term)
        })
    }
}

/// Template documents and their version snapshots. Lookups return creation order.
pub trait TemplateRepository: Send + Sync {
    fn insert_template(&self, template: Template) -> Result<Template, RepositoryError>;
    fn update_template(&self, template: Template) -> Result<(), RepositoryError>;
    fn fetch_template(&self, id: &TemplateId) -> Result<Option<Template>, RepositoryError>;
    fn delete_template(&self, id: &TemplateId) -> Result<Option<Template>, RepositoryError>;
    fn find_templates(&self, filter: &TemplateFilter) -> Result<Vec<Template>, RepositoryError>;
    fn insert_version(&self, version: TemplateVersion)
        -> Result<TemplateVersion, RepositoryError>;
    fn template_versions(&self, id: &TemplateId) -> Result<Vec<TemplateVersion>, RepositoryError>;
}

/// Entry documents. Inserts and updates enforce the (employee, month, year, labels) key.
pub trait EntryRepository: Send + Sync {
    fn insert_entry(&self, entry: Entry) -> Result<Entry, RepositoryError>;
    fn update_entry(&self, entry: Entry) -> Result<(), RepositoryError>;
    fn fetch_entry(&self, id: &EntryId) -> Result<Option<Entry>, RepositoryError>;
    fn delete_entry(&self, id: &EntryId) -> Result<Option<Entry>, RepositoryError>;
    fn find_entries(&self, filter: &EntryFilter) -> Result<Vec<Entry>, RepositoryError>;
    fn delete_entries(&self, ids: &[EntryId]) -> Result<usize, RepositoryError>;
}

pub trait EmployeeRepository: Send + Sync {
    fn insert_employee(&self, employee: Employee) -> Result<Employee, RepositoryError>;
    fn update_employee(&self, employee: Employee) -> Result<(), RepositoryError>;
    fn fetch_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, RepositoryError>;
    fn delete_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, RepositoryError>;
    fn find_employees(&self, filter: &EmployeeFilter) -> Result<Vec<Employee>, RepositoryError>;
}

/// Department documents. Slugs are unique.
pub trait DepartmentRepository: Send + Sync {
    fn insert_department(&self, department: Department) -> Result<Department, RepositoryError>;
    fn update_department(&self, department: Department) -> Result<(), RepositoryError>;
    fn fetch_department(&self, id: &DepartmentId) -> Result<Option<Department>, RepositoryError>;
    fn delete_department(&self, id: &DepartmentId)
        -> Result<Option<Department>, RepositoryError>;
    fn find_departments(
        &self,
        filter: &DepartmentFilter,
    ) -> Result<Vec<Department>, RepositoryError>;
    fn department_by_slug(&self, slug: &str) -> Result<Option<Department>, RepositoryError>;
}

/// Everything the KPI service reads and writes.
pub trait KpiStore:
    TemplateRepository + EntryRepository + EmployeeRepository + DepartmentRepository + 'static
{
}

impl<T> KpiStore for T where
    T: TemplateRepository + EntryRepository + EmployeeRepository + DepartmentRepository + 'static
{
}
