use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    DepartmentDraft, DepartmentId, EmployeeDraft, EmployeeId, EmployeePatch, EntryDraft, EntryId,
    EntryPatch, EntryStatus, Frequency, MetricLabel, TemplateDraft, TemplateId, TemplatePatch,
};
use super::repository::{KpiStore, RepositoryError};
use super::service::{
    DepartmentListQuery, EmployeeListQuery, EntryListQuery, EntrySearch, KpiService,
    KpiServiceError, ReportQuery, StatisticsQuery, TemplateListQuery,
};
use super::validation::ValidationError;

type SharedService<S> = State<Arc<KpiService<S>>>;

/// HTTP surface of the KPI service, mounted under `/api/v1`.
pub fn kpi_router<S>(service: Arc<KpiService<S>>) -> Router
where
    S: KpiStore,
{
    Router::new()
        .route(
            "/api/v1/departments",
            get(list_departments::<S>).post(create_department::<S>),
        )
        .route(
            "/api/v1/departments/:id",
            get(get_department::<S>)
                .put(update_department::<S>)
                .delete(delete_department::<S>),
        )
        .route(
            "/api/v1/employees",
            get(list_employees::<S>).post(create_employee::<S>),
        )
        .route(
            "/api/v1/employees/department/:department",
            get(employees_by_department::<S>),
        )
        .route("/api/v1/employees/role/:role", get(employees_by_role::<S>))
        .route(
            "/api/v1/employees/:id",
            get(get_employee::<S>)
                .put(update_employee::<S>)
                .delete(delete_employee::<S>),
        )
        .route(
            "/api/v1/templates",
            get(list_templates::<S>).post(create_template::<S>),
        )
        .route(
            "/api/v1/templates/department/:slug",
            get(templates_by_department::<S>),
        )
        .route(
            "/api/v1/templates/frequency/:frequency",
            get(templates_by_frequency::<S>),
        )
        .route("/api/v1/templates/role/:role", get(templates_by_role::<S>))
        .route(
            "/api/v1/templates/employee/:employee_id",
            get(templates_for_employee::<S>),
        )
        .route(
            "/api/v1/templates/:id",
            get(get_template::<S>)
                .put(update_template::<S>)
                .delete(delete_template::<S>),
        )
        .route(
            "/api/v1/templates/:id/versions",
            get(template_versions::<S>).post(create_template_version::<S>),
        )
        .route(
            "/api/v1/templates/:id/versions/:version",
            get(template_version::<S>),
        )
        .route(
            "/api/v1/templates/:id/form-structure",
            get(form_structure::<S>),
        )
        .route(
            "/api/v1/entries",
            get(list_entries::<S>).post(create_entry::<S>),
        )
        .route("/api/v1/entries/search", get(search_entries::<S>))
        .route("/api/v1/entries/statistics", get(statistics::<S>))
        .route("/api/v1/entries/available-filters", get(available_filters::<S>))
        .route(
            "/api/v1/entries/all-department-stats",
            get(department_overview::<S>),
        )
        .route("/api/v1/entries/whatsapp-ranking", get(whatsapp_ranking::<S>))
        .route("/api/v1/entries/ranking-csv", get(ranking_csv::<S>))
        .route(
            "/api/v1/entries/single-user-report/:id",
            get(single_user_report::<S>),
        )
        .route("/api/v1/entries/orphaned-report", get(orphaned_report::<S>))
        .route("/api/v1/entries/cleanup-orphaned", post(cleanup_orphaned::<S>))
        .route("/api/v1/entries/generate", post(generate_entries::<S>))
        .route("/api/v1/entries/pdf/:department", get(department_pdf::<S>))
        .route("/api/v1/entries/report/:department", get(department_html::<S>))
        .route(
            "/api/v1/entries/employee/:employee_id",
            get(entries_by_employee::<S>),
        )
        .route(
            "/api/v1/entries/template/:template_id",
            get(entries_by_template::<S>),
        )
        .route(
            "/api/v1/entries/month/:month/year/:year",
            get(entries_by_period::<S>),
        )
        .route("/api/v1/entries/status/:status", get(entries_by_status::<S>))
        .route(
            "/api/v1/entries/check/:employee_id/:template_id/:month/:year",
            get(entry_exists::<S>),
        )
        .route(
            "/api/v1/entries/find/:employee_id/:template_id/:month/:year",
            get(find_entry::<S>),
        )
        .route(
            "/api/v1/entries/workflow/:employee_id/:template_id/:month/:year",
            get(get_or_create_entry::<S>),
        )
        .route(
            "/api/v1/entries/available/:employee_id/:template_id",
            get(available_periods::<S>),
        )
        .route(
            "/api/v1/entries/summary/:employee_id",
            get(employee_summary::<S>),
        )
        .route(
            "/api/v1/entries/:id",
            get(get_entry::<S>)
                .put(update_entry::<S>)
                .delete(delete_entry::<S>),
        )
        .route("/api/v1/entries/:id/status", put(update_entry_status::<S>))
        .with_state(service)
}

impl KpiServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            KpiServiceError::NotFound(_)
            | KpiServiceError::TemplateNotFound { .. }
            | KpiServiceError::OrphanedEntry { .. }
            | KpiServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            KpiServiceError::MissingRequiredParameters { .. }
            | KpiServiceError::InvalidStatusTransition { .. }
            | KpiServiceError::EmptyTemplate(_)
            | KpiServiceError::Validation(_)
            | KpiServiceError::Scoring(_) => StatusCode::BAD_REQUEST,
            KpiServiceError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            KpiServiceError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            KpiServiceError::Report(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for KpiServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "kpi request failed");
        }
        let payload = json!({
            "error": self.title(),
            "message": self.to_string(),
        });
        (status, Json(payload)).into_response()
    }
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, KpiServiceError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn ok<T: Serialize>(result: Result<T, KpiServiceError>) -> Response {
    respond(StatusCode::OK, result)
}

fn created<T: Serialize>(result: Result<T, KpiServiceError>) -> Response {
    respond(StatusCode::CREATED, result)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_status(value: &str) -> Result<EntryStatus, KpiServiceError> {
    EntryStatus::parse(value).ok_or_else(|| {
        ValidationError::UnknownValue {
            field: "status",
            value: value.to_string(),
        }
        .into()
    })
}

async fn list_departments<S: KpiStore>(
    State(service): SharedService<S>,
    Query(query): Query<DepartmentListQuery>,
) -> Response {
    ok(service.list_departments(query))
}

async fn create_department<S: KpiStore>(
    State(service): SharedService<S>,
    Json(draft): Json<DepartmentDraft>,
) -> Response {
    created(service.create_department(draft))
}

async fn get_department<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
) -> Response {
    ok(service.get_department(&DepartmentId::from(id.as_str())))
}

async fn update_department<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
    Json(draft): Json<DepartmentDraft>,
) -> Response {
    ok(service.update_department(&DepartmentId::from(id.as_str()), draft))
}

async fn delete_department<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
) -> Response {
    ok(service.delete_department(&DepartmentId::from(id.as_str())))
}

async fn list_employees<S: KpiStore>(
    State(service): SharedService<S>,
    Query(query): Query<EmployeeListQuery>,
) -> Response {
    ok(service.list_employees(query))
}

async fn create_employee<S: KpiStore>(
    State(service): SharedService<S>,
    Json(draft): Json<EmployeeDraft>,
) -> Response {
    created(service.create_employee(draft))
}

async fn employees_by_department<S: KpiStore>(
    State(service): SharedService<S>,
    Path(department): Path<String>,
) -> Response {
    ok(service.employees_by_department(&department))
}

async fn employees_by_role<S: KpiStore>(
    State(service): SharedService<S>,
    Path(role): Path<String>,
) -> Response {
    ok(service.employees_by_role(&role))
}

async fn get_employee<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
) -> Response {
    ok(service.get_employee(&EmployeeId::from(id.as_str())))
}

async fn update_employee<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
    Json(patch): Json<EmployeePatch>,
) -> Response {
    ok(service.update_employee(&EmployeeId::from(id.as_str()), patch))
}

async fn delete_employee<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
) -> Response {
    ok(service.delete_employee(&EmployeeId::from(id.as_str())))
}

async fn list_templates<S: KpiStore>(
    State(service): SharedService<S>,
    Query(query): Query<TemplateListQuery>,
) -> Response {
    ok(service.list_templates(query))
}

async fn create_template<S: KpiStore>(
    State(service): SharedService<S>,
    Json(draft): Json<TemplateDraft>,
) -> Response {
    created(service.create_template(draft))
}

async fn templates_by_department<S: KpiStore>(
    State(service): SharedService<S>,
    Path(slug): Path<String>,
) -> Response {
    ok(service.templates_by_department(&slug))
}

async fn templates_by_frequency<S: KpiStore>(
    State(service): SharedService<S>,
    Path(frequency): Path<String>,
) -> Response {
    let result = Frequency::parse(&frequency)
        .ok_or_else(|| {
            KpiServiceError::from(ValidationError::UnknownValue {
                field: "frequency",
                value: frequency.clone(),
            })
        })
        .and_then(|frequency| service.templates_by_frequency(frequency));
    ok(result)
}

async fn templates_by_role<S: KpiStore>(
    State(service): SharedService<S>,
    Path(role): Path<String>,
) -> Response {
    ok(service.templates_by_role(&role))
}

async fn templates_for_employee<S: KpiStore>(
    State(service): SharedService<S>,
    Path(employee_id): Path<String>,
) -> Response {
    ok(service.templates_for_employee(&EmployeeId::from(employee_id.as_str())))
}

async fn get_template<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
) -> Response {
    ok(service.get_template(&TemplateId::from(id.as_str())))
}

async fn update_template<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
    Json(patch): Json<TemplatePatch>,
) -> Response {
    ok(service.update_template(&TemplateId::from(id.as_str()), patch))
}

async fn delete_template<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
) -> Response {
    ok(service.delete_template(&TemplateId::from(id.as_str())))
}

#[derive(Debug, Default, Deserialize)]
struct VersionRequest {
    #[serde(default)]
    created_by: Option<String>,
}

async fn create_template_version<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
    Json(request): Json<VersionRequest>,
) -> Response {
    created(service.create_template_version(&TemplateId::from(id.as_str()), request.created_by))
}

async fn template_versions<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
) -> Response {
    ok(service.template_versions(&TemplateId::from(id.as_str())))
}

async fn template_version<S: KpiStore>(
    State(service): SharedService<S>,
    Path((id, version)): Path<(String, u32)>,
) -> Response {
    ok(service.template_version(&TemplateId::from(id.as_str()), version))
}

async fn form_structure<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
) -> Response {
    ok(service.form_structure(&TemplateId::from(id.as_str())))
}

async fn list_entries<S: KpiStore>(
    State(service): SharedService<S>,
    Query(query): Query<EntryListQuery>,
) -> Response {
    ok(service.list_entries(query))
}

async fn create_entry<S: KpiStore>(
    State(service): SharedService<S>,
    Json(draft): Json<EntryDraft>,
) -> Response {
    created(service.create_entry(draft))
}

/// Query form of an entry search; `labels` carries a JSON array of `{label, value}`.
#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    employee_id: Option<EmployeeId>,
    template_id: Option<TemplateId>,
    month: Option<u32>,
    year: Option<i32>,
    labels: Option<String>,
}

impl SearchParams {
    fn into_search(self) -> Result<EntrySearch, KpiServiceError> {
        let labels = match self.labels.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str::<Vec<MetricLabel>>(raw).map_err(|_| {
                ValidationError::UnknownValue {
                    field: "labels",
                    value: raw.to_string(),
                }
            })?,
        };
        Ok(EntrySearch {
            employee_id: self.employee_id,
            template_id: self.template_id,
            month: self.month,
            year: self.year,
            labels,
        })
    }
}

async fn search_entries<S: KpiStore>(
    State(service): SharedService<S>,
    Query(params): Query<SearchParams>,
) -> Response {
    ok(params
        .into_search()
        .and_then(|criteria| service.search_entries(criteria)))
}

async fn statistics<S: KpiStore>(
    State(service): SharedService<S>,
    Query(query): Query<StatisticsQuery>,
) -> Response {
    ok(service.statistics(query, today()))
}

async fn available_filters<S: KpiStore>(State(service): SharedService<S>) -> Response {
    ok(service.available_filters())
}

async fn department_overview<S: KpiStore>(
    State(service): SharedService<S>,
    Query(query): Query<ReportQuery>,
) -> Response {
    ok(service.department_overview(query.month, query.year, today()))
}

async fn whatsapp_ranking<S: KpiStore>(
    State(service): SharedService<S>,
    Query(query): Query<StatisticsQuery>,
) -> Response {
    ok(service.whatsapp_ranking(query, today()))
}

async fn ranking_csv<S: KpiStore>(
    State(service): SharedService<S>,
    Query(query): Query<StatisticsQuery>,
) -> Response {
    match service.ranking_csv(query, today()) {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string())],
            bytes,
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn single_user_report<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
) -> Response {
    ok(service.single_user_report(&EntryId::from(id.as_str())))
}

async fn orphaned_report<S: KpiStore>(State(service): SharedService<S>) -> Response {
    ok(service.orphaned_report())
}

async fn cleanup_orphaned<S: KpiStore>(State(service): SharedService<S>) -> Response {
    ok(service.cleanup_orphaned())
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    month: u32,
    year: i32,
    #[serde(default)]
    department: Option<String>,
}

async fn generate_entries<S: KpiStore>(
    State(service): SharedService<S>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    ok(service.generate_entries(request.month, request.year, request.department))
}

async fn department_pdf<S: KpiStore>(
    State(service): SharedService<S>,
    Path(department): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Response {
    match service.department_pdf(&department, query, today()) {
        Ok(pdf) => (
            [
                (header::CONTENT_TYPE, mime::APPLICATION_PDF.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", pdf.file_name),
                ),
            ],
            pdf.bytes,
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn department_html<S: KpiStore>(
    State(service): SharedService<S>,
    Path(department): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Response {
    match service.department_html(&department, query, today()) {
        Ok(html) => Html(html).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn entries_by_employee<S: KpiStore>(
    State(service): SharedService<S>,
    Path(employee_id): Path<String>,
) -> Response {
    ok(service.entries_by_employee(&EmployeeId::from(employee_id.as_str())))
}

async fn entries_by_template<S: KpiStore>(
    State(service): SharedService<S>,
    Path(template_id): Path<String>,
) -> Response {
    ok(service.entries_by_template(&TemplateId::from(template_id.as_str())))
}

async fn entries_by_period<S: KpiStore>(
    State(service): SharedService<S>,
    Path((month, year)): Path<(u32, i32)>,
) -> Response {
    ok(service.entries_by_period(month, year))
}

async fn entries_by_status<S: KpiStore>(
    State(service): SharedService<S>,
    Path(status): Path<String>,
) -> Response {
    ok(parse_status(&status).and_then(|status| service.entries_by_status(status)))
}

type SlotPath = Path<(String, String, u32, i32)>;

async fn entry_exists<S: KpiStore>(
    State(service): SharedService<S>,
    Path((employee_id, template_id, month, year)): SlotPath,
) -> Response {
    let result = service
        .entry_exists(
            &EmployeeId::from(employee_id.as_str()),
            &TemplateId::from(template_id.as_str()),
            month,
            year,
        )
        .map(|exists| json!({ "exists": exists }));
    ok(result)
}

async fn find_entry<S: KpiStore>(
    State(service): SharedService<S>,
    Path((employee_id, template_id, month, year)): SlotPath,
) -> Response {
    ok(service.find_entry(
        &EmployeeId::from(employee_id.as_str()),
        &TemplateId::from(template_id.as_str()),
        month,
        year,
    ))
}

async fn get_or_create_entry<S: KpiStore>(
    State(service): SharedService<S>,
    Path((employee_id, template_id, month, year)): SlotPath,
) -> Response {
    match service.get_or_create_entry(
        &EmployeeId::from(employee_id.as_str()),
        &TemplateId::from(template_id.as_str()),
        month,
        year,
    ) {
        Ok(outcome) if outcome.is_new => (StatusCode::CREATED, Json(outcome)).into_response(),
        other => ok(other),
    }
}

async fn available_periods<S: KpiStore>(
    State(service): SharedService<S>,
    Path((employee_id, template_id)): Path<(String, String)>,
) -> Response {
    ok(service.available_periods(
        &EmployeeId::from(employee_id.as_str()),
        &TemplateId::from(template_id.as_str()),
    ))
}

async fn employee_summary<S: KpiStore>(
    State(service): SharedService<S>,
    Path(employee_id): Path<String>,
) -> Response {
    ok(service.employee_summary(&EmployeeId::from(employee_id.as_str())))
}

async fn get_entry<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
) -> Response {
    ok(service.get_entry(&EntryId::from(id.as_str())))
}

async fn update_entry<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
    Json(patch): Json<EntryPatch>,
) -> Response {
    ok(service.update_entry(&EntryId::from(id.as_str()), patch))
}

async fn delete_entry<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
) -> Response {
    ok(service.delete_entry(&EntryId::from(id.as_str())))
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: EntryStatus,
}

async fn update_entry_status<S: KpiStore>(
    State(service): SharedService<S>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Response {
    ok(service.update_entry_status(&EntryId::from(id.as_str()), update.status))
}
