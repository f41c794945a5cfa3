use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::common::*;
use crate::kpi::domain::{EntryStatus, Period};
use crate::kpi::notify::dispatcher::DispatchOutcome;
use crate::kpi::notify::gateway::{GatewayError, GatewayReceipt, MessagingGateway, OutboundMessage};
use crate::kpi::notify::NotificationDispatcher;
use crate::kpi::report::whatsapp::{BOTTOM_CAMPAIGN, TOP_CAMPAIGN};
use crate::kpi::service::KpiService;
use crate::kpi::store::MemoryStore;

/// Records every message; destinations listed in `rejecting` get an unsuccessful receipt.
#[derive(Default)]
struct RecordingGateway {
    sent: Mutex<Vec<OutboundMessage>>,
    rejecting: Vec<String>,
}

impl RecordingGateway {
    fn rejecting(destination: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            rejecting: vec![destination.to_string()],
        }
    }

    fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().expect("gateway lock").clone()
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send(&self, message: OutboundMessage) -> Result<GatewayReceipt, GatewayError> {
        let rejected = self.rejecting.contains(&message.destination);
        let id = format!("msg-{}", message.destination);
        self.sent.lock().expect("gateway lock").push(message);
        if rejected {
            return Ok(GatewayReceipt {
                message: Some("template paused".to_string()),
                success: Some(false),
                submitted_message_id: None,
            });
        }
        Ok(GatewayReceipt {
            message: Some("accepted".to_string()),
            success: Some(true),
            submitted_message_id: Some(id),
        })
    }
}

fn dispatcher(
    service: &KpiService<MemoryStore>,
    gateway: &Arc<RecordingGateway>,
) -> NotificationDispatcher<MemoryStore, RecordingGateway> {
    NotificationDispatcher::new(service.clone(), Arc::clone(gateway), Duration::ZERO)
}

fn january() -> Period {
    Period::new(1, 2025)
}

#[tokio::test]
async fn dry_run_renders_without_sending() {
    let service = build_service();
    seeded_cohort(&service, &[90.0, 60.0, 30.0]);
    let gateway = Arc::new(RecordingGateway::default());
    let plan = service
        .notification_plan(january(), Some(DEPARTMENT.to_string()), None)
        .expect("plan");

    let summary = dispatcher(&service, &gateway).dispatch(plan, true).await;

    assert!(summary.dry_run);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.sent, 0);
    assert_eq!(summary.skipped, 0);
    assert!(summary
        .details
        .iter()
        .all(|detail| detail.outcome == DispatchOutcome::Rendered));
    assert!(gateway.sent().is_empty());

    let pending = service
        .entries_by_status(EntryStatus::InProgress)
        .expect("entries");
    assert_eq!(pending.len(), 3);
}

#[tokio::test]
async fn sent_messages_mark_entries_generated() {
    let service = build_service();
    seeded_cohort(&service, &[90.0, 60.0, 30.0]);
    let gateway = Arc::new(RecordingGateway::default());
    let plan = service
        .notification_plan(january(), None, None)
        .expect("plan");

    let summary = dispatcher(&service, &gateway).dispatch(plan, false).await;

    assert_eq!(summary.sent, 3);
    assert_eq!(summary.failed, 0);
    let sent = gateway.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].campaign_name, TOP_CAMPAIGN);
    assert_eq!(sent[0].destination, "919876543200");
    assert_eq!(sent[0].template_params.len(), 4);
    assert_eq!(sent[2].campaign_name, BOTTOM_CAMPAIGN);
    assert_eq!(sent[2].template_params.len(), 5);

    let generated = service
        .entries_by_status(EntryStatus::Generated)
        .expect("entries");
    assert_eq!(generated.len(), 3);

    let replay = service
        .notification_plan(january(), None, None)
        .expect("plan");
    let summary = dispatcher(&service, &gateway).dispatch(replay, false).await;
    assert_eq!(summary.skipped, 3);
    assert_eq!(gateway.sent().len(), 3);
}

#[tokio::test]
async fn invalid_phones_are_skipped() {
    let service = build_service();
    let (template, _) = seeded_cohort(&service, &[90.0]);
    let unreachable = service
        .create_employee(employee_draft("Officer Without Phone", "12345"))
        .expect("employee");
    service
        .create_entry(entry_draft(
            &unreachable,
            &template,
            1,
            2025,
            metric_values(10.0, 10.0, 40.0),
        ))
        .expect("entry");
    let gateway = Arc::new(RecordingGateway::default());
    let plan = service
        .notification_plan(january(), None, None)
        .expect("plan");

    let summary = dispatcher(&service, &gateway).dispatch(plan, false).await;

    assert_eq!(summary.sent, 1);
    assert_eq!(summary.skipped, 1);
    let skipped = summary
        .details
        .iter()
        .find(|detail| detail.employee_name == "Officer Without Phone")
        .expect("skipped detail");
    assert!(skipped.destination.is_none());
    match &skipped.outcome {
        DispatchOutcome::Skipped { reason } => assert!(reason.contains("12345")),
        other => panic!("expected skipped outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_sends_do_not_stop_the_batch() {
    let service = build_service();
    seeded_cohort(&service, &[90.0, 60.0, 30.0]);
    let gateway = Arc::new(RecordingGateway::rejecting("919876543201"));
    let plan = service
        .notification_plan(january(), None, None)
        .expect("plan");

    let summary = dispatcher(&service, &gateway).dispatch(plan, false).await;

    assert_eq!(summary.sent, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(gateway.sent().len(), 3);
    match &summary.details[1].outcome {
        DispatchOutcome::Failed { reason } => assert_eq!(reason, "template paused"),
        other => panic!("expected failed outcome, got {other:?}"),
    }

    let pending = service
        .entries_by_status(EntryStatus::InProgress)
        .expect("entries");
    assert_eq!(pending.len(), 1);
    assert_eq!(
        pending[0].employee.as_ref().map(|employee| employee.name.as_str()),
        Some("Officer 2")
    );
}
