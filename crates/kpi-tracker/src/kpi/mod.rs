//! KPI templates, scored monthly entries, rankings and their exports.
//!
//! Templates define weighted metrics per (department, role). Entries record an employee's
//! values for one month and are scored against their template. Entries sharing a template and
//! period form a cohort that the ranking engine orders, summarizes and turns into reports and
//! WhatsApp campaign messages.

pub mod domain;
pub mod notify;
pub mod pagination;
pub mod ranking;
pub mod report;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use domain::{
    Contact, Department, DepartmentDraft, DepartmentId, Employee, EmployeeDraft, EmployeeId,
    EmployeePatch, Entry, EntryDraft, EntryId, EntryPatch, EntryStatus, Frequency, Metric,
    MetricLabel, MetricValue, Period, SubMetric, SubMetricValue, Template, TemplateDraft,
    TemplateId, TemplatePatch, TemplateVersion,
};
pub use notify::{DispatchSummary, MessagingGateway, NotificationDispatcher, WhatsAppClient};
pub use repository::{KpiStore, RepositoryError};
pub use router::kpi_router;
pub use service::{KpiService, KpiServiceError};
pub use store::{MemoryStore, StoreError};
