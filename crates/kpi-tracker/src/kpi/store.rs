use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{
    Department, DepartmentId, Employee, EmployeeId, Entry, EntryId, Template, TemplateId,
    TemplateVersion,
};
use super::repository::{
    DepartmentFilter, DepartmentRepository, EmployeeFilter, EmployeeRepository, EntryFilter,
    EntryRepository, RepositoryError, TemplateFilter, TemplateRepository,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Collections {
    #[serde(default)]
    templates: Vec<Template>,
    #[serde(default)]
    template_versions: Vec<TemplateVersion>,
    #[serde(default)]
    entries: Vec<Entry>,
    #[serde(default)]
    employees: Vec<Employee>,
    #[serde(default)]
    departments: Vec<Department>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read snapshot {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("snapshot {} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Document store kept in memory, optionally mirrored to a JSON snapshot after each write.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `path` when it exists; later writes go back to it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let collections = if path.exists() {
            let raw = fs::read(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            let collections: Collections =
                serde_json::from_slice(&raw).map_err(|source| StoreError::Parse {
                    path: path.clone(),
                    source,
                })?;
            info!(
                path = %path.display(),
                templates = collections.templates.len(),
                entries = collections.entries.len(),
                employees = collections.employees.len(),
                "loaded KPI snapshot"
            );
            collections
        } else {
            Collections::default()
        };

        Ok(Self {
            collections: Arc::new(RwLock::new(collections)),
            snapshot: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    fn read<T>(&self, query: impl FnOnce(&Collections) -> T) -> Result<T, RepositoryError> {
        let guard = self
            .collections
            .read()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))?;
        Ok(query(&guard))
    }

    fn write<T>(
        &self,
        mutation: impl FnOnce(&mut Collections) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut guard = self
            .collections
            .write()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))?;
        if self.snapshot.is_none() {
            return mutation(&mut guard);
        }

        // Staged on a copy so a failed snapshot write leaves memory untouched.
        let mut staged = guard.clone();
        let outcome = mutation(&mut staged)?;
        self.persist(&staged)?;
        *guard = staged;
        Ok(outcome)
    }

    fn persist(&self, collections: &Collections) -> Result<(), RepositoryError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        let unavailable = |err: &dyn std::fmt::Display| {
            RepositoryError::Unavailable(format!("snapshot {}: {err}", path.display()))
        };
        let encoded = serde_json::to_vec_pretty(collections).map_err(|err| unavailable(&err))?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, encoded).map_err(|err| unavailable(&err))?;
        fs::rename(&staging, path).map_err(|err| unavailable(&err))?;
        debug!(path = %path.display(), "snapshot written");
        Ok(())
    }
}

fn replace<T>(
    items: &mut [T],
    replacement: T,
    same: impl Fn(&T, &T) -> bool,
) -> Result<(), RepositoryError> {
    match items.iter_mut().find(|item| same(item, &replacement)) {
        Some(slot) => {
            *slot = replacement;
            Ok(())
        }
        None => Err(RepositoryError::NotFound),
    }
}

fn take<T>(items: &mut Vec<T>, matches: impl Fn(&T) -> bool) -> Option<T> {
    items
        .iter()
        .position(matches)
        .map(|index| items.remove(index))
}

impl TemplateRepository for MemoryStore {
    fn insert_template(&self, template: Template) -> Result<Template, RepositoryError> {
        self.write(|c| {
            if c.templates.iter().any(|existing| existing.id == template.id) {
                return Err(RepositoryError::Conflict(format!("template {}", template.id)));
            }
            c.templates.push(template.clone());
            Ok(template)
        })
    }

    fn update_template(&self, template: Template) -> Result<(), RepositoryError> {
        self.write(|c| replace(&mut c.templates, template, |a, b| a.id == b.id))
    }

    fn fetch_template(&self, id: &TemplateId) -> Result<Option<Template>, RepositoryError> {
        self.read(|c| c.templates.iter().find(|t| &t.id == id).cloned())
    }

    fn delete_template(&self, id: &TemplateId) -> Result<Option<Template>, RepositoryError> {
        self.write(|c| {
            let removed = take(&mut c.templates, |t| &t.id == id);
            if removed.is_some() {
                c.template_versions.retain(|v| &v.template_id != id);
            }
            Ok(removed)
        })
    }

    fn find_templates(&self, filter: &TemplateFilter) -> Result<Vec<Template>, RepositoryError> {
        self.read(|c| {
            c.templates
                .iter()
                .filter(|t| filter.matches(t))
                .cloned()
                .collect()
        })
    }

    fn insert_version(
        &self,
        version: TemplateVersion,
    ) -> Result<TemplateVersion, RepositoryError> {
        self.write(|c| {
            let taken = c
                .template_versions
                .iter()
                .any(|v| v.template_id == version.template_id && v.version == version.version);
            if taken {
                return Err(RepositoryError::Conflict(format!(
                    "version {} of template {}",
                    version.version, version.template_id
                )));
            }
            c.template_versions.push(version.clone());
            Ok(version)
        })
    }

    fn template_versions(&self, id: &TemplateId) -> Result<Vec<TemplateVersion>, RepositoryError> {
        self.read(|c| {
            c.template_versions
                .iter()
                .filter(|v| &v.template_id == id)
                .cloned()
                .collect()
        })
    }
}

impl EntryRepository for MemoryStore {
    fn insert_entry(&self, entry: Entry) -> Result<Entry, RepositoryError> {
        self.write(|c| {
            if let Some(existing) = c
                .entries
                .iter()
                .find(|existing| existing.id == entry.id || existing.collides_with(&entry))
            {
                return Err(RepositoryError::Conflict(format!(
                    "entry {} already covers employee {} for {}",
                    existing.id,
                    entry.employee_id,
                    entry.period()
                )));
            }
            c.entries.push(entry.clone());
            Ok(entry)
        })
    }

    fn update_entry(&self, entry: Entry) -> Result<(), RepositoryError> {
        self.write(|c| {
            if let Some(existing) = c.entries.iter().find(|other| other.collides_with(&entry)) {
                return Err(RepositoryError::Conflict(format!(
                    "entry {} already covers employee {} for {}",
                    existing.id,
                    entry.employee_id,
                    entry.period()
                )));
            }
            replace(&mut c.entries, entry, |a, b| a.id == b.id)
        })
    }

    fn fetch_entry(&self, id: &EntryId) -> Result<Option<Entry>, RepositoryError> {
        self.read(|c| c.entries.iter().find(|e| &e.id == id).cloned())
    }

    fn delete_entry(&self, id: &EntryId) -> Result<Option<Entry>, RepositoryError> {
        self.write(|c| Ok(take(&mut c.entries, |e| &e.id == id)))
    }

    fn find_entries(&self, filter: &EntryFilter) -> Result<Vec<Entry>, RepositoryError> {
        self.read(|c| {
            c.entries
                .iter()
                .filter(|e| filter.matches(e))
                .cloned()
                .collect()
        })
    }

    fn delete_entries(&self, ids: &[EntryId]) -> Result<usize, RepositoryError> {
        self.write(|c| {
            let before = c.entries.len();
            c.entries.retain(|e| !ids.contains(&e.id));
            Ok(before - c.entries.len())
        })
    }
}

impl EmployeeRepository for MemoryStore {
    fn insert_employee(&self, employee: Employee) -> Result<Employee, RepositoryError> {
        self.write(|c| {
            if c.employees.iter().any(|existing| existing.id == employee.id) {
                return Err(RepositoryError::Conflict(format!("employee {}", employee.id)));
            }
            c.employees.push(employee.clone());
            Ok(employee)
        })
    }

    fn update_employee(&self, employee: Employee) -> Result<(), RepositoryError> {
        self.write(|c| replace(&mut c.employees, employee, |a, b| a.id == b.id))
    }

    fn fetch_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        self.read(|c| c.employees.iter().find(|e| &e.id == id).cloned())
    }

    fn delete_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        self.write(|c| Ok(take(&mut c.employees, |e| &e.id == id)))
    }

    fn find_employees(&self, filter: &EmployeeFilter) -> Result<Vec<Employee>, RepositoryError> {
        self.read(|c| {
            c.employees
                .iter()
                .filter(|e| filter.matches(e))
                .cloned()
                .collect()
        })
    }
}

impl DepartmentRepository for MemoryStore {
    fn insert_department(&self, department: Department) -> Result<Department, RepositoryError> {
        self.write(|c| {
            if c.departments.iter().any(|d| d.slug == department.slug) {
                return Err(RepositoryError::Conflict(format!(
                    "department slug '{}'",
                    department.slug
                )));
            }
            c.departments.push(department.clone());
            Ok(department)
        })
    }

    fn update_department(&self, department: Department) -> Result<(), RepositoryError> {
        self.write(|c| {
            if c
                .departments
                .iter()
                .any(|d| d.slug == department.slug && d.id != department.id)
            {
                return Err(RepositoryError::Conflict(format!(
                    "department slug '{}'",
                    department.slug
                )));
            }
            replace(&mut c.departments, department, |a, b| a.id == b.id)
        })
    }

    fn fetch_department(&self, id: &DepartmentId) -> Result<Option<Department>, RepositoryError> {
        self.read(|c| c.departments.iter().find(|d| &d.id == id).cloned())
    }

    fn delete_department(
        &self,
        id: &DepartmentId,
    ) -> Result<Option<Department>, RepositoryError> {
        self.write(|c| Ok(take(&mut c.departments, |d| &d.id == id)))
    }

    fn find_departments(
        &self,
        filter: &DepartmentFilter,
    ) -> Result<Vec<Department>, RepositoryError> {
        self.read(|c| {
            c.departments
                .iter()
                .filter(|d| filter.matches(d))
                .cloned()
                .collect()
        })
    }

    fn department_by_slug(&self, slug: &str) -> Result<Option<Department>, RepositoryError> {
        self.read(|c| c.departments.iter().find(|d| d.slug == slug).cloned())
    }
}
