use std::io::Write;

use serde::Serialize;

use super::ReportError;
use crate::kpi::ranking::{RankingReport, RankingRow};

#[derive(Debug, Serialize)]
struct RankingRecord<'a> {
    rank: usize,
    employee: &'a str,
    phone: &'a str,
    department: &'a str,
    role: &'a str,
    score: String,
    max_score: String,
    normalized_score: String,
    bucket: &'static str,
    status: &'static str,
}

fn record<'a>(row: &'a RankingRow, report: &'a RankingReport) -> RankingRecord<'a> {
    RankingRecord {
        rank: row.position,
        employee: &row.employee.name,
        phone: &row.employee.phone,
        department: &report.department,
        role: &report.role,
        score: format!("{:.2}", row.total_score),
        max_score: format!("{:.2}", report.max_score),
        normalized_score: format!("{:.2}", row.normalized_score),
        bucket: row.bucket.label(),
        status: row.status.label(),
    }
}

/// Writes the report's ranking rows with their overall positions.
pub fn write_ranking_csv<W: Write>(report: &RankingReport, writer: W) -> Result<(), ReportError> {
    let mut csv = ::csv::Writer::from_writer(writer);
    for row in &report.ranking {
        csv.serialize(record(row, report))?;
    }
    csv.flush()?;
    Ok(())
}

pub fn render_ranking_csv(report: &RankingReport) -> Result<Vec<u8>, ReportError> {
    let mut buffer = Vec::new();
    write_ranking_csv(report, &mut buffer)?;
    Ok(buffer)
}
