use crate::infra::{build_dispatcher, build_service};
use chrono::Local;
use clap::{Args, ValueEnum};
use kpi_tracker::config::AppConfig;
use kpi_tracker::error::AppError;
use kpi_tracker::kpi::notify::DispatchOutcome;
use kpi_tracker::kpi::ranking::period::period_or_default;
use kpi_tracker::kpi::service::{ReportQuery, StatisticsQuery};
use kpi_tracker::kpi::{EntryStatus, Period};
use kpi_tracker::telemetry;
use std::path::PathBuf;
use tracing::warn;

#[derive(Args, Debug, Default)]
pub(crate) struct OverviewArgs {
    /// Month to rank (1-12). Defaults to the previous month.
    #[arg(long)]
    pub(crate) month: Option<u32>,
    /// Year to rank. Defaults to the year of the previous month.
    #[arg(long)]
    pub(crate) year: Option<i32>,
    /// Leave out entries in this status, e.g. `generated`
    #[arg(long, value_parser = parse_status)]
    pub(crate) status_not: Option<EntryStatus>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct NotifyArgs {
    #[arg(long)]
    pub(crate) month: Option<u32>,
    #[arg(long)]
    pub(crate) year: Option<i32>,
    /// Only message cohorts of this department slug
    #[arg(long)]
    pub(crate) department: Option<String>,
    /// Only message cohorts of this role
    #[arg(long)]
    pub(crate) role: Option<String>,
    /// Render every message without sending or changing entry status
    #[arg(long)]
    pub(crate) dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ExportFormat {
    Pdf,
    Html,
    Csv,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Department slug to export
    #[arg(long)]
    pub(crate) department: String,
    /// Role of the cohort; required for csv exports
    #[arg(long)]
    pub(crate) role: Option<String>,
    #[arg(long)]
    pub(crate) month: Option<u32>,
    #[arg(long)]
    pub(crate) year: Option<i32>,
    #[arg(long, value_enum)]
    pub(crate) format: ExportFormat,
    /// Output file
    #[arg(long)]
    pub(crate) out: PathBuf,
}

pub(crate) fn parse_status(raw: &str) -> Result<EntryStatus, String> {
    EntryStatus::parse(raw)
        .ok_or_else(|| format!("unknown status '{raw}' (initiated, inprogress, generated)"))
}

fn resolve(month: Option<u32>, year: Option<i32>) -> Period {
    period_or_default(month, year, &Local::now().date_naive())
}

fn bootstrap() -> Result<AppConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    Ok(config)
}

pub(crate) fn run_overview(args: OverviewArgs) -> Result<(), AppError> {
    let config = bootstrap()?;
    let service = build_service(&config)?;
    let period = resolve(args.month, args.year);
    let overview = service.template_overview(period, args.status_not)?;

    println!("KPI rankings for {period}");
    if overview.is_empty() {
        println!("No scored entries for this period.");
        return Ok(());
    }

    for section in &overview {
        println!(
            "\n{} ({} / {}) - {} entries, max {:.2}",
            section.template.name,
            section.template.department_slug,
            section.template.role,
            section.total,
            section.template.max_score
        );
        println!("  Top performers:");
        for row in &section.top {
            println!(
                "    {}. {} - {:.2} ({})",
                row.position,
                row.employee.name,
                row.total_score,
                row.bucket.label()
            );
        }
        if section.middle > 0 {
            println!("  ... {} in the middle tier", section.middle);
        }
        if !section.bottom.is_empty() {
            println!("  Bottom performers:");
            for row in &section.bottom {
                println!(
                    "    {}. {} - {:.2} ({})",
                    row.position,
                    row.employee.name,
                    row.total_score,
                    row.bucket.label()
                );
            }
        }
    }
    Ok(())
}

pub(crate) async fn run_notify(args: NotifyArgs) -> Result<(), AppError> {
    let config = bootstrap()?;
    let service = build_service(&config)?;
    let period = resolve(args.month, args.year);

    let mut dry_run = args.dry_run;
    if !dry_run && !config.messaging.can_send() {
        warn!("WHATSAPP_API_KEY not set, rendering messages without sending");
        dry_run = true;
    }

    let plan = service.notification_plan(period, args.department, args.role)?;
    let dispatcher = build_dispatcher(&config, service);
    let summary = dispatcher.dispatch(plan, dry_run).await;

    println!(
        "Notifications for {period}{}",
        if summary.dry_run { " (dry run)" } else { "" }
    );
    for detail in &summary.details {
        let destination = detail.destination.as_deref().unwrap_or("-");
        let outcome = match &detail.outcome {
            DispatchOutcome::Sent { .. } => "sent".to_string(),
            DispatchOutcome::Rendered => "rendered".to_string(),
            DispatchOutcome::Skipped { reason } => format!("skipped: {reason}"),
            DispatchOutcome::Failed { reason } => format!("failed: {reason}"),
        };
        println!(
            "- {} [{}] -> {} ({})",
            detail.employee_name, detail.campaign_name, destination, outcome
        );
    }
    println!(
        "{} total | {} sent | {} failed | {} skipped",
        summary.total, summary.sent, summary.failed, summary.skipped
    );
    Ok(())
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let config = bootstrap()?;
    let service = build_service(&config)?;
    let today = Local::now().date_naive();
    let query = ReportQuery {
        month: args.month,
        year: args.year,
    };

    let bytes = match args.format {
        ExportFormat::Pdf => service.department_pdf(&args.department, query, today)?.bytes,
        ExportFormat::Html => service
            .department_html(&args.department, query, today)?
            .into_bytes(),
        ExportFormat::Csv => service.ranking_csv(
            StatisticsQuery {
                department: Some(args.department.clone()),
                role: args.role,
                month: args.month,
                year: args.year,
                ..StatisticsQuery::default()
            },
            today,
        )?,
    };

    std::fs::write(&args.out, &bytes)?;
    println!(
        "Wrote {} bytes of {:?} export for {} to {}",
        bytes.len(),
        args.format,
        args.department,
        args.out.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_flag_accepts_known_statuses() {
        assert_eq!(parse_status("generated"), Ok(EntryStatus::Generated));
        assert_eq!(parse_status("in_progress"), Ok(EntryStatus::InProgress));
        assert!(parse_status("archived").is_err());
    }

    #[test]
    fn explicit_period_wins_over_the_default() {
        assert_eq!(resolve(Some(4), Some(2024)), Period::new(4, 2024));
    }
}
