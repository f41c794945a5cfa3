use serde::Serialize;

use super::format_score;
use crate::kpi::domain::{EmployeeId, EntryId, EntryStatus, MetricValue};
use crate::kpi::ranking::{PerformanceTier, RankedEntry, SelectionCounts};

pub const TOP_CAMPAIGN: &str = "Top_Perfomer_API";
pub const BOTTOM_CAMPAIGN: &str = "Bottom_Performer";
pub const MIDDLE_CAMPAIGN: &str = "Medium_Perfomer_API";

pub const fn campaign_name(tier: PerformanceTier) -> &'static str {
    match tier {
        PerformanceTier::Top => TOP_CAMPAIGN,
        PerformanceTier::Middle => MIDDLE_CAMPAIGN,
        PerformanceTier::Bottom => BOTTOM_CAMPAIGN,
    }
}

/// Normalizes an Indian mobile number to `91XXXXXXXXXX`.
pub fn format_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        12 if digits.starts_with("91") => Some(digits),
        10 => Some(format!("91{digits}")),
        11 if digits.starts_with('0') => Some(format!("91{}", &digits[1..])),
        _ => None,
    }
}

/// `key: score` pairs joined by ` | `.
pub fn kpi_summary(values: &[MetricValue]) -> String {
    values
        .iter()
        .map(|value| format!("{}: {:.2}", value.key, value.score.unwrap_or(0.0)))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// `Rank r : name - score / max`, one per line.
pub fn top_performer_lines(top: &[RankedEntry], max_score: f64) -> String {
    top.iter()
        .map(|item| {
            format!(
                "Rank {} : {} - {}",
                item.position,
                item.employee.name,
                format_score(item.entry.total_score, max_score)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rendered campaign message for one ranked entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignMessage {
    pub entry_id: EntryId,
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub phone: String,
    pub destination: Option<String>,
    pub tier: PerformanceTier,
    pub rank: usize,
    pub status: EntryStatus,
    pub campaign_name: &'static str,
    pub template_params: Vec<String>,
}

pub fn render_message(
    item: &RankedEntry,
    tier: PerformanceTier,
    max_score: f64,
    top_lines: &str,
) -> CampaignMessage {
    let mut template_params = vec![
        item.employee.name.clone(),
        format_score(item.entry.total_score, max_score),
        item.position.to_string(),
        kpi_summary(&item.entry.metric_values),
    ];
    if tier != PerformanceTier::Top {
        template_params.push(top_lines.to_string());
    }

    CampaignMessage {
        entry_id: item.entry.id.clone(),
        employee_id: item.employee.id.clone(),
        employee_name: item.employee.name.clone(),
        phone: item.employee.contact.phone.clone(),
        destination: format_phone(&item.employee.contact.phone),
        tier,
        rank: item.position,
        status: item.entry.status,
        campaign_name: campaign_name(tier),
        template_params,
    }
}

/// Messages for a whole ranked cohort, in rank order.
pub fn render_cohort_messages(ranked: &[RankedEntry], max_score: f64) -> Vec<CampaignMessage> {
    let total = ranked.len();
    let counts = SelectionCounts::for_total(total);
    let top_lines = top_performer_lines(&ranked[..counts.top.min(total)], max_score);

    ranked
        .iter()
        .map(|item| render_message(item, counts.tier(item.position, total), max_score, &top_lines))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::domain::{Contact, Employee, Entry, TemplateId};
    use crate::kpi::ranking::{rank_entries, ResolvedEntry};
    use chrono::Utc;

    fn resolved(name: &str, score: f64, phone: &str) -> ResolvedEntry {
        let now = Utc::now();
        let employee_id = EmployeeId::from(format!("emp-{name}").as_str());
        ResolvedEntry {
            entry: Entry {
                id: EntryId::from(format!("entry-{name}").as_str()),
                employee_id: employee_id.clone(),
                template_id: TemplateId::from("tpl"),
                month: 1,
                year: 2025,
                metric_labels: Vec::new(),
                metric_values: vec![
                    MetricValue {
                        key: "A".to_string(),
                        value: Some(50.0),
                        score: Some(score / 2.0),
                        sub_metric_values: Vec::new(),
                    },
                    MetricValue {
                        key: "B".to_string(),
                        value: Some(50.0),
                        score: Some(score / 2.0),
                        sub_metric_values: Vec::new(),
                    },
                ],
                total_score: score,
                status: EntryStatus::InProgress,
                data_source: None,
                created_at: now,
                updated_at: now,
            },
            employee: Employee {
                id: employee_id,
                name: name.to_string(),
                contact: Contact {
                    email: None,
                    phone: phone.to_string(),
                },
                department: "revenue".to_string(),
                department_role: "patwari".to_string(),
                metadata: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    #[test]
    fn phone_numbers_normalize_to_country_prefix() {
        assert_eq!(format_phone("98765 43210").as_deref(), Some("919876543210"));
        assert_eq!(format_phone("09876543210").as_deref(), Some("919876543210"));
        assert_eq!(format_phone("+91-98765-43210").as_deref(), Some("919876543210"));
        assert_eq!(format_phone("12345"), None);
        assert_eq!(format_phone("19876543210"), None);
    }

    #[test]
    fn summary_joins_metric_scores() {
        let item = resolved("Asha", 66.0, "9876543210");
        assert_eq!(kpi_summary(&item.entry.metric_values), "A: 33.00 | B: 33.00");
    }

    #[test]
    fn cohort_messages_follow_tiers() {
        let ranked = rank_entries(vec![
            resolved("Asha", 90.0, "9876543210"),
            resolved("Bala", 70.0, "9876543211"),
            resolved("Chitra", 50.0, "9876543212"),
            resolved("Dev", 30.0, "bad"),
            resolved("Esha", 10.0, "9876543214"),
        ]);

        let messages = render_cohort_messages(&ranked, 100.0);

        let campaigns: Vec<&str> = messages.iter().map(|m| m.campaign_name).collect();
        assert_eq!(
            campaigns,
            vec![TOP_CAMPAIGN, TOP_CAMPAIGN, MIDDLE_CAMPAIGN, BOTTOM_CAMPAIGN, BOTTOM_CAMPAIGN]
        );
        assert_eq!(messages[0].template_params.len(), 4);
        assert_eq!(messages[0].template_params[1], "90.00 / 100.00");
        assert_eq!(messages[2].template_params[2], "3");
        assert_eq!(
            messages[4].template_params[4],
            "Rank 1 : Asha - 90.00 / 100.00\nRank 2 : Bala - 70.00 / 100.00"
        );
        assert_eq!(messages[3].destination, None);
    }
}
