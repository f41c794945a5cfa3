//! Application service composing the store with the scoring and ranking engines.

mod directory;
mod entries;
mod reports;
mod statistics;
mod templates;

use std::fmt;
use std::sync::Arc;

use super::domain::{EmployeeId, EntryId, EntryStatus, TemplateId};
use super::report::ReportError;
use super::repository::{KpiStore, RepositoryError};
use super::scoring::ScoringError;
use super::validation::ValidationError;

pub use directory::{DepartmentListQuery, EmployeeListQuery};
pub use entries::{
    AvailablePeriod, EntryListQuery, EntrySearch, EntryView, GenerationFailure, GenerationSummary,
    GetOrCreateOutcome, OrphanCleanup, OrphanReport, PeriodSnapshot,
};
pub use reports::{PlannedMessage, RenderedPdf, ReportQuery, SingleUserReport, WhatsAppRanking};
pub use statistics::{AvailableFilters, DepartmentOverview, StatisticsQuery, TemplateOverview};
pub use templates::{FormMetric, FormStructure, TemplateListQuery};

/// Service composing the document store with the scoring and ranking engines.
pub struct KpiService<S> {
    store: Arc<S>,
}

impl<S> Clone for KpiService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> KpiService<S>
where
    S: KpiStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Template,
    TemplateVersion,
    Entry,
    Employee,
    Department,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Template => "template",
            Resource::TemplateVersion => "template version",
            Resource::Entry => "entry",
            Resource::Employee => "employee",
            Resource::Department => "department",
        })
    }
}

/// Error raised by the KPI service.
#[derive(Debug, thiserror::Error)]
pub enum KpiServiceError {
    #[error("{0} not found")]
    NotFound(Resource),
    #[error("no template found for department '{department}' and role '{role}'")]
    TemplateNotFound { department: String, role: String },
    #[error("missing required parameters: {}", .missing.join(", "))]
    MissingRequiredParameters { missing: Vec<&'static str> },
    #[error("entry status cannot change from {from} to {to}")]
    InvalidStatusTransition { from: EntryStatus, to: EntryStatus },
    #[error("template {0} has no KPIs defined")]
    EmptyTemplate(TemplateId),
    #[error("entry {entry} belongs to employee {employee}, who no longer exists")]
    OrphanedEntry { entry: EntryId, employee: EmployeeId },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

impl KpiServiceError {
    /// Short machine-friendly title used as the `error` field of HTTP bodies.
    pub fn title(&self) -> &'static str {
        match self {
            KpiServiceError::NotFound(_) | KpiServiceError::Repository(RepositoryError::NotFound) => {
                "not_found"
            }
            KpiServiceError::TemplateNotFound { .. } => "template_not_found",
            KpiServiceError::MissingRequiredParameters { .. } => "missing_required_parameters",
            KpiServiceError::InvalidStatusTransition { .. } => "invalid_status_transition",
            KpiServiceError::EmptyTemplate(_) => "empty_template",
            KpiServiceError::OrphanedEntry { .. } => "orphaned_entry",
            KpiServiceError::Validation(_) => "invalid_input",
            KpiServiceError::Scoring(ScoringError::InvalidKpiKey { .. }) => "invalid_kpi_key",
            KpiServiceError::Scoring(ScoringError::MissingKpiValue { .. }) => "missing_kpi_value",
            KpiServiceError::Scoring(ScoringError::MissingSubKpi { .. }) => "missing_sub_kpi",
            KpiServiceError::Repository(RepositoryError::Conflict(_)) => "conflict",
            KpiServiceError::Repository(RepositoryError::Unavailable(_)) => "store_unavailable",
            KpiServiceError::Report(_) => "report_failed",
        }
    }
}

pub(crate) fn missing(resource: Resource) -> KpiServiceError {
    KpiServiceError::NotFound(resource)
}
