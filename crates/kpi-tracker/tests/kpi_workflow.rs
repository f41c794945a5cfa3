//! End-to-end scenarios through the public HTTP router and service facade, backed by a JSON
//! snapshot on disk so persistence is exercised alongside scoring and ranking.

mod common {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    pub(super) async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request builds");

        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("route executes");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body readable");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    pub(super) fn template_body() -> Value {
        json!({
            "name": "Patwari Monthly KPI",
            "kpi_name": "Patwari",
            "description": "Monthly performance of patwaris",
            "role": "patwari",
            "frequency": "monthly",
            "department_slug": "revenue",
            "created_by": "collector",
            "metrics": [
                {
                    "name": "Case Disposal",
                    "description": "Share of registered cases disposed",
                    "max_marks": 60,
                    "sub_metrics": [
                        { "name": "Registered", "key": "darj" },
                        { "name": "Resolved", "key": "nirakrit" }
                    ]
                },
                {
                    "name": "Field Visits",
                    "description": "Planned inspections completed",
                    "max_marks": 40
                }
            ]
        })
    }

    pub(super) fn employee_body(name: &str, phone: &str) -> Value {
        json!({
            "name": name,
            "contact": { "phone": phone },
            "department": "revenue",
            "department_role": "patwari"
        })
    }

    pub(super) fn entry_body(
        employee_id: &str,
        template_id: &str,
        resolved: f64,
        visits: f64,
    ) -> Value {
        json!({
            "employee_id": employee_id,
            "template_id": template_id,
            "month": 1,
            "year": 2025,
            "metric_labels": [{ "label": "monthly-review" }],
            "metric_values": [
                {
                    "key": "Case Disposal",
                    "sub_metric_values": [
                        { "key": "darj", "value": 10 },
                        { "key": "nirakrit", "value": resolved }
                    ]
                },
                { "key": "fieldvisits", "value": visits }
            ]
        })
    }
}

use std::sync::Arc;

use axum::http::StatusCode;
use kpi_tracker::kpi::ranking::PerformanceTier;
use kpi_tracker::kpi::report::whatsapp::TOP_CAMPAIGN;
use kpi_tracker::kpi::service::StatisticsQuery;
use kpi_tracker::kpi::{kpi_router, EntryId, KpiService, MemoryStore, Period};
use serde_json::json;

use common::*;

#[tokio::test]
async fn scored_entries_survive_a_restart_and_rank() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("kpi.json");

    let store = Arc::new(MemoryStore::open(&path).expect("store opens"));
    let router = kpi_router(Arc::new(KpiService::new(store)));

    let (status, _) = send(
        &router,
        "POST",
        "/api/v1/departments",
        Some(json!({ "name": "Revenue Department", "slug": "revenue" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, template) = send(&router, "POST", "/api/v1/templates", Some(template_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    let template_id = template["id"].as_str().expect("template id").to_string();

    let mut entry_ids = Vec::new();
    for (name, phone, resolved, visits) in [
        ("Asha Verma", "9876543210", 5.0, 90.0),
        ("Bala Singh", "09876543211", 10.0, 50.0),
        ("Chetan Rao", "919876543212", 2.0, 10.0),
    ] {
        let (status, employee) =
            send(&router, "POST", "/api/v1/employees", Some(employee_body(name, phone))).await;
        assert_eq!(status, StatusCode::CREATED);
        let employee_id = employee["id"].as_str().expect("employee id").to_string();

        let (status, entry) = send(
            &router,
            "POST",
            "/api/v1/entries",
            Some(entry_body(&employee_id, &template_id, resolved, visits)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        entry_ids.push(entry["id"].as_str().expect("entry id").to_string());
    }

    let reopened = Arc::new(MemoryStore::open(&path).expect("store reopens"));
    let service = KpiService::new(reopened);

    let asha = service
        .get_entry(&EntryId::from(entry_ids[0].as_str()))
        .expect("entry persisted");
    assert_eq!(asha.entry.total_score, 66.0);

    let report = service
        .statistics(
            StatisticsQuery {
                department: Some("revenue".to_string()),
                role: Some("patwari".to_string()),
                month: Some(1),
                year: Some(2025),
                ..StatisticsQuery::default()
            },
            chrono::NaiveDate::from_ymd_opt(2025, 2, 10).expect("valid date"),
        )
        .expect("statistics");
    let names: Vec<&str> = report
        .ranking
        .iter()
        .map(|row| row.employee.name.as_str())
        .collect();
    assert_eq!(names, ["Bala Singh", "Asha Verma", "Chetan Rao"]);
    assert_eq!(report.statistics.total_entries, 3);
    assert_eq!(report.selection.top, 1);
    assert_eq!(report.selection.bottom, 1);

    let single = service
        .single_user_report(&EntryId::from(entry_ids[1].as_str()))
        .expect("single user report");
    assert_eq!(single.rank, 1);
    assert_eq!(single.cohort_size, 3);
    assert_eq!(single.message.tier, PerformanceTier::Top);
    assert_eq!(single.message.campaign_name, TOP_CAMPAIGN);
    assert_eq!(single.message.destination.as_deref(), Some("919876543211"));

    let plan = service
        .notification_plan(Period::new(1, 2025), Some("revenue".to_string()), None)
        .expect("plan");
    assert_eq!(plan.len(), 3);
}

#[tokio::test]
async fn generation_fills_the_next_month_without_duplicates() {
    let service = Arc::new(KpiService::new(Arc::new(MemoryStore::new())));
    let router = kpi_router(service.clone());

    send(&router, "POST", "/api/v1/templates", Some(template_body())).await;
    for (name, phone) in [("Asha Verma", "9876543210"), ("Bala Singh", "9876543211")] {
        send(&router, "POST", "/api/v1/employees", Some(employee_body(name, phone))).await;
    }

    let (status, summary) = send(
        &router,
        "POST",
        "/api/v1/entries/generate",
        Some(json!({ "month": 2, "year": 2025 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["created"], json!(2));

    let (_, summary) = send(
        &router,
        "POST",
        "/api/v1/entries/generate",
        Some(json!({ "month": 2, "year": 2025 })),
    )
    .await;
    assert_eq!(summary["created"], json!(0));
    assert_eq!(summary["existing"], json!(2));

    let (status, entries) = send(&router, "GET", "/api/v1/entries/month/2/year/2025", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = entries.as_array().expect("entry list");
    assert_eq!(entries.len(), 2);
    assert!(entries
        .iter()
        .all(|entry| entry["status"] == json!("initiated") && entry["total_score"] == json!(0.0)));
}
