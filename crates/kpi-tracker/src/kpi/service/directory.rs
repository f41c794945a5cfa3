use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::{missing, KpiService, KpiServiceError, Resource};
use crate::kpi::domain::{
    Department, DepartmentDraft, DepartmentId, Employee, EmployeeDraft, EmployeeId, EmployeePatch,
};
use crate::kpi::pagination::{Page, PageRequest};
use crate::kpi::repository::{DepartmentFilter, EmployeeFilter, KpiStore};
use crate::kpi::validation::{validate_department, validate_employee};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
    pub department: Option<String>,
    pub department_role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
}

impl<S> KpiService<S>
where
    S: KpiStore,
{
    pub fn create_employee(&self, draft: EmployeeDraft) -> Result<Employee, KpiServiceError> {
        validate_employee(&draft)?;
        let now = Utc::now();
        let employee = Employee {
            id: EmployeeId::generate(),
            name: draft.name.trim().to_string(),
            contact: draft.contact,
            department: draft.department,
            department_role: draft.department_role,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        };
        let stored = self.store.insert_employee(employee)?;
        info!(employee_id = %stored.id, department = %stored.department, "employee created");
        Ok(stored)
    }

    pub fn get_employee(&self, id: &EmployeeId) -> Result<Employee, KpiServiceError> {
        self.store
            .fetch_employee(id)?
            .ok_or_else(|| missing(Resource::Employee))
    }

    pub fn update_employee(
        &self,
        id: &EmployeeId,
        patch: EmployeePatch,
    ) -> Result<Employee, KpiServiceError> {
        let mut employee = self.get_employee(id)?;
        if let Some(name) = patch.name {
            employee.name = name;
        }
        if let Some(contact) = patch.contact {
            employee.contact = contact;
        }
        if let Some(department) = patch.department {
            employee.department = department;
        }
        if let Some(role) = patch.department_role {
            employee.department_role = role;
        }
        if let Some(metadata) = patch.metadata {
            employee.metadata = Some(metadata);
        }
        validate_employee(&EmployeeDraft {
            name: employee.name.clone(),
            contact: employee.contact.clone(),
            department: employee.department.clone(),
            department_role: employee.department_role.clone(),
            metadata: None,
        })?;

        employee.updated_at = Utc::now();
        self.store.update_employee(employee.clone())?;
        Ok(employee)
    }

    /// Removes the employee. Their entries stay behind and surface in the orphan report.
    pub fn delete_employee(&self, id: &EmployeeId) -> Result<Employee, KpiServiceError> {
        let removed = self
            .store
            .delete_employee(id)?
            .ok_or_else(|| missing(Resource::Employee))?;
        info!(employee_id = %id, "employee deleted");
        Ok(removed)
    }

    pub fn list_employees(
        &self,
        query: EmployeeListQuery,
    ) -> Result<Page<Employee>, KpiServiceError> {
        let filter = EmployeeFilter {
            search: query.search,
            department: query.department,
            department_role: query.department_role,
        };
        let mut employees = self.store.find_employees(&filter)?;
        employees.reverse();
        Ok(PageRequest::new(query.page, query.limit).apply(&employees))
    }

    pub fn employees_by_department(
        &self,
        department: &str,
    ) -> Result<Vec<Employee>, KpiServiceError> {
        let filter = EmployeeFilter {
            department: Some(department.to_string()),
            ..EmployeeFilter::default()
        };
        Ok(self.store.find_employees(&filter)?)
    }

    pub fn employees_by_role(&self, role: &str) -> Result<Vec<Employee>, KpiServiceError> {
        let filter = EmployeeFilter {
            department_role: Some(role.to_string()),
            ..EmployeeFilter::default()
        };
        Ok(self.store.find_employees(&filter)?)
    }

    pub fn create_department(
        &self,
        draft: DepartmentDraft,
    ) -> Result<Department, KpiServiceError> {
        validate_department(&draft)?;
        let now = Utc::now();
        let department = Department {
            id: DepartmentId::generate(),
            name: draft.name.trim().to_string(),
            slug: draft.slug.trim().to_string(),
            logo: draft.logo,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        };
        let stored = self.store.insert_department(department)?;
        info!(department_id = %stored.id, slug = %stored.slug, "department created");
        Ok(stored)
    }

    pub fn get_department(&self, id: &DepartmentId) -> Result<Department, KpiServiceError> {
        self.store
            .fetch_department(id)?
            .ok_or_else(|| missing(Resource::Department))
    }

    pub fn update_department(
        &self,
        id: &DepartmentId,
        draft: DepartmentDraft,
    ) -> Result<Department, KpiServiceError> {
        validate_department(&draft)?;
        let mut department = self.get_department(id)?;
        department.name = draft.name.trim().to_string();
        department.slug = draft.slug.trim().to_string();
        department.logo = draft.logo;
        department.metadata = draft.metadata;
        department.updated_at = Utc::now();
        self.store.update_department(department.clone())?;
        Ok(department)
    }

    pub fn delete_department(&self, id: &DepartmentId) -> Result<Department, KpiServiceError> {
        self.store
            .delete_department(id)?
            .ok_or_else(|| missing(Resource::Department))
    }

    pub fn list_departments(
        &self,
        query: DepartmentListQuery,
    ) -> Result<Page<Department>, KpiServiceError> {
        let filter = DepartmentFilter {
            search: query.search,
        };
        let mut departments = self.store.find_departments(&filter)?;
        departments.reverse();
        Ok(PageRequest::new(query.page, query.limit).apply(&departments))
    }
}
