use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::gateway::{MessagingGateway, OutboundMessage};
use crate::kpi::domain::{EntryId, EntryStatus};
use crate::kpi::repository::KpiStore;
use crate::kpi::service::{KpiService, PlannedMessage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Sent { submitted_message_id: Option<String> },
    Rendered,
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchDetail {
    pub entry_id: EntryId,
    pub employee_name: String,
    pub campaign_name: String,
    pub destination: Option<String>,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub dry_run: bool,
    pub details: Vec<DispatchDetail>,
}

impl DispatchSummary {
    fn record(&mut self, detail: DispatchDetail) {
        match detail.outcome {
            DispatchOutcome::Sent { .. } => self.sent += 1,
            DispatchOutcome::Failed { .. } => self.failed += 1,
            DispatchOutcome::Skipped { .. } => self.skipped += 1,
            DispatchOutcome::Rendered => {}
        }
        self.details.push(detail);
    }
}

/// Sends planned messages one at a time, pausing between sends.
pub struct NotificationDispatcher<S, G> {
    service: KpiService<S>,
    gateway: Arc<G>,
    delay: Duration,
}

impl<S, G> NotificationDispatcher<S, G>
where
    S: KpiStore,
    G: MessagingGateway,
{
    pub fn new(service: KpiService<S>, gateway: Arc<G>, delay: Duration) -> Self {
        Self {
            service,
            gateway,
            delay,
        }
    }

    /// Never retries. A failed send is logged and the batch moves on; a successful one marks
    /// the entry `generated` so it is not messaged twice.
    pub async fn dispatch(&self, plan: Vec<PlannedMessage>, dry_run: bool) -> DispatchSummary {
        let mut summary = DispatchSummary {
            total: plan.len(),
            dry_run,
            ..DispatchSummary::default()
        };
        let mut attempted = 0usize;

        for planned in plan {
            let message = planned.message;
            let detail = |outcome| DispatchDetail {
                entry_id: message.entry_id.clone(),
                employee_name: message.employee_name.clone(),
                campaign_name: message.campaign_name.to_string(),
                destination: message.destination.clone(),
                outcome,
            };

            if message.status == EntryStatus::Generated {
                summary.record(detail(DispatchOutcome::Skipped {
                    reason: "report already generated".to_string(),
                }));
                continue;
            }
            let Some(destination) = message.destination.clone() else {
                warn!(entry_id = %message.entry_id, phone = %message.phone, "invalid phone number, message skipped");
                summary.record(detail(DispatchOutcome::Skipped {
                    reason: format!("invalid phone number '{}'", message.phone),
                }));
                continue;
            };
            if dry_run {
                summary.record(detail(DispatchOutcome::Rendered));
                continue;
            }

            if attempted > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            attempted += 1;

            let outbound = OutboundMessage {
                campaign_name: message.campaign_name.to_string(),
                destination,
                template_params: message.template_params.clone(),
            };
            let outcome = match self.gateway.send(outbound).await {
                Ok(receipt) if receipt.success == Some(false) => DispatchOutcome::Failed {
                    reason: receipt
                        .message
                        .unwrap_or_else(|| "provider reported failure".to_string()),
                },
                Ok(receipt) => {
                    if let Err(err) = self
                        .service
                        .update_entry_status(&message.entry_id, EntryStatus::Generated)
                    {
                        warn!(entry_id = %message.entry_id, error = %err, "sent but could not mark entry generated");
                    }
                    DispatchOutcome::Sent {
                        submitted_message_id: receipt.submitted_message_id,
                    }
                }
                Err(err) => DispatchOutcome::Failed {
                    reason: err.to_string(),
                },
            };

            match &outcome {
                DispatchOutcome::Failed { reason } => {
                    warn!(entry_id = %message.entry_id, campaign = message.campaign_name, %reason, "message failed");
                }
                _ => {
                    info!(entry_id = %message.entry_id, campaign = message.campaign_name, "message sent");
                }
            }
            summary.record(detail(outcome));
        }

        info!(
            total = summary.total,
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            dry_run,
            "dispatch finished"
        );
        summary
    }
}
