use std::fmt::Write as _;

use super::{format_score, DepartmentReport, RoleSection};

const STYLE: &str = "body{font-family:Arial,sans-serif;margin:24px;color:#222}\
h1{font-size:20px;margin-bottom:4px}h2{font-size:16px;margin-top:24px}\
table{border-collapse:collapse;width:100%;font-size:12px}\
th,td{border:1px solid #999;padding:4px 6px;text-align:left}\
th{background:#eee}td.num{text-align:right}\
.role-section{page-break-inside:avoid}.role-section+.role-section{page-break-before:always}";

pub(crate) fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// One table per role; every section after the first starts on a new printed page.
pub fn render_department_html(report: &DepartmentReport) -> String {
    let mut html = String::new();
    let title = escape(&report.title());
    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{STYLE}</style></head><body>"
    );
    let _ = write!(
        html,
        "<h1>{title}</h1><p>Period: {:02}/{} &middot; Generated {}</p>",
        report.period.month,
        report.period.year,
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    if report.sections.is_empty() {
        html.push_str("<p>No entries recorded for this period.</p>");
    }
    for section in &report.sections {
        render_section(&mut html, section);
    }

    html.push_str("</body></html>");
    html
}

fn render_section(html: &mut String, section: &RoleSection) {
    let _ = write!(
        html,
        "<section class=\"role-section\"><h2>{} &middot; {}</h2><table><thead><tr><th>Rank</th><th>Name</th>",
        escape(&section.role),
        escape(&section.template_name)
    );
    for name in &section.metric_names {
        let _ = write!(html, "<th>{}</th>", escape(name));
    }
    html.push_str("<th>Total</th><th>%</th></tr></thead><tbody>");

    for row in &section.rows {
        let _ = write!(
            html,
            "<tr><td class=\"num\">{}</td><td>{}</td>",
            row.rank,
            escape(&row.employee_name)
        );
        for score in &row.metric_scores {
            let _ = write!(html, "<td class=\"num\">{score:.2}</td>");
        }
        let _ = write!(
            html,
            "<td class=\"num\">{}</td><td class=\"num\">{:.2}</td></tr>",
            format_score(row.total_score, section.max_score),
            row.percentage
        );
    }
    html.push_str("</tbody></table></section>");
}
