use serde::Serialize;

use crate::kpi::domain::{Employee, EmployeeId, Entry, TemplateId};

/// Entry whose employee resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry {
    pub entry: Entry,
    pub employee: Employee,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MissingReference {
    Employee(EmployeeId),
    Template(TemplateId),
}

/// Entry pointing at an employee or template that no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanedEntry {
    pub entry: Entry,
    pub missing: Vec<MissingReference>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinedEntry {
    Resolved(ResolvedEntry),
    Orphaned(OrphanedEntry),
}

/// Attaches employees to entries, keeping the input order.
pub fn join_entries<E, T>(
    entries: Vec<Entry>,
    mut employee_for: E,
    mut template_exists: T,
) -> Vec<JoinedEntry>
where
    E: FnMut(&EmployeeId) -> Option<Employee>,
    T: FnMut(&TemplateId) -> bool,
{
    entries
        .into_iter()
        .map(|entry| {
            let employee = employee_for(&entry.employee_id);
            let mut missing = Vec::new();
            if employee.is_none() {
                missing.push(MissingReference::Employee(entry.employee_id.clone()));
            }
            if !template_exists(&entry.template_id) {
                missing.push(MissingReference::Template(entry.template_id.clone()));
            }

            match employee {
                Some(employee) if missing.is_empty() => {
                    JoinedEntry::Resolved(ResolvedEntry { entry, employee })
                }
                _ => JoinedEntry::Orphaned(OrphanedEntry { entry, missing }),
            }
        })
        .collect()
}

pub fn split_joined(joined: Vec<JoinedEntry>) -> (Vec<ResolvedEntry>, Vec<OrphanedEntry>) {
    let mut resolved = Vec::new();
    let mut orphaned = Vec::new();
    for item in joined {
        match item {
            JoinedEntry::Resolved(entry) => resolved.push(entry),
            JoinedEntry::Orphaned(entry) => orphaned.push(entry),
        }
    }
    (resolved, orphaned)
}
