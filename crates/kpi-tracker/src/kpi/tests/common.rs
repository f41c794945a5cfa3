use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use serde_json::Value;

use crate::kpi::domain::{
    Contact, DepartmentDraft, Employee, EmployeeDraft, EntryDraft, Frequency, Metric, MetricLabel,
    MetricValue, SubMetric, SubMetricValue, Template, TemplateDraft, PERCENT_UNIT,
};
use crate::kpi::router::kpi_router;
use crate::kpi::scoring::{COMPLETED_KEY, TOTAL_KEY};
use crate::kpi::service::KpiService;
use crate::kpi::store::MemoryStore;

pub(super) const DEPARTMENT: &str = "revenue";
pub(super) const ROLE: &str = "tehsildar";

pub(super) fn build_service() -> KpiService<MemoryStore> {
    KpiService::new(Arc::new(MemoryStore::new()))
}

pub(super) fn router_for(service: &KpiService<MemoryStore>) -> Router {
    kpi_router(Arc::new(service.clone()))
}

/// "Case Disposal" (60 marks, darj/nirakrit) and "Field Visits" (40 marks).
pub(super) fn template_draft() -> TemplateDraft {
    TemplateDraft {
        name: "Tehsildar Monthly KPI".to_string(),
        kpi_name: "Tehsildar".to_string(),
        description: "Monthly performance of tehsildars".to_string(),
        role: ROLE.to_string(),
        frequency: Frequency::Monthly,
        department_slug: DEPARTMENT.to_string(),
        metrics: vec![
            Metric {
                name: "Case Disposal".to_string(),
                description: "Share of registered cases disposed".to_string(),
                max_marks: 60,
                unit: PERCENT_UNIT.to_string(),
                sub_metrics: vec![
                    SubMetric {
                        name: "Registered".to_string(),
                        key: TOTAL_KEY.to_string(),
                    },
                    SubMetric {
                        name: "Resolved".to_string(),
                        key: COMPLETED_KEY.to_string(),
                    },
                ],
            },
            Metric {
                name: "Field Visits".to_string(),
                description: "Planned inspections completed".to_string(),
                max_marks: 40,
                unit: PERCENT_UNIT.to_string(),
                sub_metrics: Vec::new(),
            },
        ],
        created_by: "collector".to_string(),
    }
}

pub(super) fn employee_draft(name: &str, phone: &str) -> EmployeeDraft {
    EmployeeDraft {
        name: name.to_string(),
        contact: Contact {
            email: None,
            phone: phone.to_string(),
        },
        department: DEPARTMENT.to_string(),
        department_role: ROLE.to_string(),
        metadata: None,
    }
}

pub(super) fn department_draft() -> DepartmentDraft {
    DepartmentDraft {
        name: "Revenue Department".to_string(),
        slug: DEPARTMENT.to_string(),
        logo: None,
        metadata: None,
    }
}

/// Values scoring `registered`/`resolved` on case disposal and `visits` percent on field visits.
pub(super) fn metric_values(registered: f64, resolved: f64, visits: f64) -> Vec<MetricValue> {
    vec![
        MetricValue {
            key: "Case Disposal".to_string(),
            value: None,
            score: None,
            sub_metric_values: vec![
                SubMetricValue {
                    key: TOTAL_KEY.to_string(),
                    value: Some(registered),
                },
                SubMetricValue {
                    key: COMPLETED_KEY.to_string(),
                    value: Some(resolved),
                },
            ],
        },
        MetricValue {
            key: "fieldvisits".to_string(),
            value: Some(visits),
            score: None,
            sub_metric_values: Vec::new(),
        },
    ]
}

pub(super) fn entry_draft(
    employee: &Employee,
    template: &Template,
    month: u32,
    year: i32,
    values: Vec<MetricValue>,
) -> EntryDraft {
    EntryDraft {
        employee_id: employee.id.clone(),
        template_id: template.id.clone(),
        month,
        year,
        metric_labels: vec![MetricLabel {
            label: "monthly-review".to_string(),
            value: None,
        }],
        metric_values: values,
        status: None,
        data_source: None,
    }
}

/// A template and `scores.len()` employees, each with an entry for 1/2025. Each score is the
/// field-visit percentage with a fully resolved case disposal, so the total is `60 + 0.4 * score`.
pub(super) fn seeded_cohort(
    service: &KpiService<MemoryStore>,
    scores: &[f64],
) -> (Template, Vec<Employee>) {
    let template = service
        .create_template(template_draft())
        .expect("template created");
    let mut employees = Vec::new();
    for (index, visits) in scores.iter().enumerate() {
        let employee = service
            .create_employee(employee_draft(
                &format!("Officer {}", index + 1),
                &format!("98765432{:02}", index),
            ))
            .expect("employee created");
        service
            .create_entry(entry_draft(
                &employee,
                &template,
                1,
                2025,
                metric_values(10.0, 10.0, *visits),
            ))
            .expect("entry created");
        employees.push(employee);
    }
    (template, employees)
}

pub(super) fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

pub(super) fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

pub(super) async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 4 * 1024 * 1024)
        .await
        .expect("body readable")
        .to_vec()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = read_body(response).await;
    serde_json::from_slice(&bytes).expect("valid json body")
}
