use std::fs;
use std::path::Path;

use pdf_canvas::{BuiltinFont, Canvas, FontSource, Pdf};
use tracing::warn;
use uuid::Uuid;

use super::{format_score, DepartmentReport, ReportError, ReportRow, RoleSection};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const TOP: f32 = 800.0;
const BOTTOM_MARGIN: f32 = 60.0;
const LINE: f32 = 16.0;
const LEFT: f32 = 40.0;
const TABLE_SIZE: f32 = 9.0;
const CELL_GAP: f32 = 6.0;
const NAME_X: f32 = LEFT + 30.0;
const METRICS_X: f32 = LEFT + 150.0;
const PERCENT_X: f32 = PAGE_WIDTH - LEFT - 35.0;
const TOTAL_X: f32 = PERCENT_X - 80.0;

/// Rows that fit below a section header (title, period, role heading, column header).
fn first_page_capacity() -> usize {
    let used = 24.0 + 20.0 + 28.0 + 20.0;
    ((TOP - used - BOTTOM_MARGIN) / LINE).floor() as usize
}

fn continuation_capacity() -> usize {
    let used = 24.0 + 20.0;
    ((TOP - used - BOTTOM_MARGIN) / LINE).floor() as usize
}

/// Row ranges per page: the first page of a section holds fewer rows than the rest.
fn partition_rows(total: usize, first: usize, follow: usize) -> Vec<(usize, usize)> {
    let first_end = first.min(total);
    let mut ranges = vec![(0, first_end)];
    let mut start = first_end;
    let follow = follow.max(1);
    while start < total {
        let end = (start + follow).min(total);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Text the builtin fonts have no glyphs for. Those characters are drawn as `?`.
fn unencodable_text(report: &DepartmentReport) -> Vec<&str> {
    let font = BuiltinFont::Helvetica;
    let encoding = font.get_encoding();
    let encodable = |text: &str| text.chars().all(|c| encoding.encode_char(c).is_some());

    let mut texts = vec![report.department.as_str()];
    for section in &report.sections {
        texts.push(&section.role);
        texts.push(&section.template_name);
        texts.extend(section.metric_names.iter().map(String::as_str));
        texts.extend(section.rows.iter().map(|row| row.employee_name.as_str()));
    }
    texts.retain(|text| !encodable(*text));
    texts.dedup();
    texts
}

/// Trims `text` with a trailing `.` until it fits in `width` points.
fn fit(font: BuiltinFont, text: &str, width: f32) -> String {
    if font.get_width(TABLE_SIZE, text) <= width {
        return text.to_string();
    }
    let mut chars: Vec<char> = text.chars().collect();
    while !chars.is_empty() {
        chars.pop();
        let candidate: String = chars.iter().chain(std::iter::once(&'.')).collect();
        if font.get_width(TABLE_SIZE, &candidate) <= width {
            return candidate;
        }
    }
    String::new()
}

/// Draws the report into `path`. Each role section starts on a fresh page.
pub fn write_department_pdf(report: &DepartmentReport, path: &Path) -> Result<(), ReportError> {
    let unencodable = unencodable_text(report);
    if !unencodable.is_empty() {
        warn!(
            department = %report.department,
            count = unencodable.len(),
            sample = ?unencodable.iter().take(3).collect::<Vec<_>>(),
            "PDF fonts cannot draw some names; use the HTML report for full Unicode text"
        );
    }

    let mut document = Pdf::create(&path.to_string_lossy()).map_err(ReportError::Pdf)?;
    let title = report.title();
    let period = format!("Period: {:02}/{}", report.period.month, report.period.year);

    if report.sections.is_empty() {
        document
            .render_page(PAGE_WIDTH, PAGE_HEIGHT, |canvas| {
                canvas.left_text(LEFT, TOP, BuiltinFont::Helvetica_Bold, 18.0, &title)?;
                canvas.left_text(LEFT, TOP - 24.0, BuiltinFont::Helvetica, 12.0, &period)?;
                canvas.left_text(
                    LEFT,
                    TOP - 56.0,
                    BuiltinFont::Helvetica,
                    12.0,
                    "No entries recorded for this period.",
                )
            })
            .map_err(ReportError::Pdf)?;
    }

    for section in &report.sections {
        let ranges = partition_rows(
            section.rows.len(),
            first_page_capacity(),
            continuation_capacity(),
        );
        for (page_index, &(start, end)) in ranges.iter().enumerate() {
            let rows = &section.rows[start..end];
            document
                .render_page(PAGE_WIDTH, PAGE_HEIGHT, |canvas| {
                    if page_index == 0 {
                        render_section_page(canvas, &title, &period, section, rows)
                    } else {
                        render_continuation_page(canvas, &title, section, page_index, rows)
                    }
                })
                .map_err(ReportError::Pdf)?;
        }
    }

    document.finish().map_err(ReportError::Pdf)
}

/// Renders into a scratch file and returns the bytes.
pub fn render_department_pdf(report: &DepartmentReport) -> Result<Vec<u8>, ReportError> {
    let path = std::env::temp_dir().join(format!("kpi-report-{}.pdf", Uuid::new_v4().simple()));
    let rendered = write_department_pdf(report, &path).and_then(|_| Ok(fs::read(&path)?));
    let _ = fs::remove_file(&path);
    rendered
}

fn render_section_page(
    canvas: &mut Canvas<'_>,
    title: &str,
    period: &str,
    section: &RoleSection,
    rows: &[ReportRow],
) -> std::io::Result<()> {
    let mut cursor_y = TOP;
    canvas.left_text(LEFT, cursor_y, BuiltinFont::Helvetica_Bold, 18.0, title)?;
    cursor_y -= 24.0;
    canvas.left_text(LEFT, cursor_y, BuiltinFont::Helvetica, 12.0, period)?;
    cursor_y -= 28.0;
    let heading = format!(
        "{} - {} (max {:.2})",
        section.role, section.template_name, section.max_score
    );
    canvas.left_text(LEFT, cursor_y, BuiltinFont::Helvetica_Bold, 14.0, &heading)?;
    cursor_y -= 20.0;
    render_rows(canvas, cursor_y, section, rows)
}

fn render_continuation_page(
    canvas: &mut Canvas<'_>,
    title: &str,
    section: &RoleSection,
    page_index: usize,
    rows: &[ReportRow],
) -> std::io::Result<()> {
    let mut cursor_y = TOP;
    let header = format!("{title} - {} (continued {page_index})", section.role);
    canvas.left_text(LEFT, cursor_y, BuiltinFont::Helvetica_Bold, 14.0, &header)?;
    cursor_y -= 24.0;
    render_rows(canvas, cursor_y, section, rows)
}

fn render_rows(
    canvas: &mut Canvas<'_>,
    mut cursor_y: f32,
    section: &RoleSection,
    rows: &[ReportRow],
) -> std::io::Result<()> {
    let bold = BuiltinFont::Helvetica_Bold;
    let regular = BuiltinFont::Helvetica;
    let metric_count = section.metric_names.len().max(1) as f32;
    let metric_width = (TOTAL_X - METRICS_X) / metric_count;
    let metric_x = |index: usize| METRICS_X + metric_width * index as f32;
    let name_width = METRICS_X - NAME_X - CELL_GAP;
    let cell_width = metric_width - CELL_GAP;

    canvas.left_text(LEFT, cursor_y, bold, TABLE_SIZE, "Rank")?;
    canvas.left_text(NAME_X, cursor_y, bold, TABLE_SIZE, "Name")?;
    for (index, name) in section.metric_names.iter().enumerate() {
        let header = fit(bold, name, cell_width);
        canvas.left_text(metric_x(index), cursor_y, bold, TABLE_SIZE, &header)?;
    }
    canvas.left_text(TOTAL_X, cursor_y, bold, TABLE_SIZE, "Total")?;
    canvas.left_text(PERCENT_X, cursor_y, bold, TABLE_SIZE, "%")?;
    cursor_y -= LINE;

    for row in rows {
        let name = fit(regular, &row.employee_name, name_width);
        canvas.left_text(LEFT, cursor_y, regular, TABLE_SIZE, &row.rank.to_string())?;
        canvas.left_text(NAME_X, cursor_y, regular, TABLE_SIZE, &name)?;
        for (index, score) in row.metric_scores.iter().enumerate() {
            let cell = fit(regular, &format!("{score:.2}"), cell_width);
            canvas.left_text(metric_x(index), cursor_y, regular, TABLE_SIZE, &cell)?;
        }
        let total = format_score(row.total_score, section.max_score);
        canvas.left_text(TOTAL_X, cursor_y, regular, TABLE_SIZE, &total)?;
        let percentage = format!("{:.2}", row.percentage);
        canvas.left_text(PERCENT_X, cursor_y, regular, TABLE_SIZE, &percentage)?;
        cursor_y -= LINE;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::domain::{EntryStatus, Period};
    use chrono::Utc;

    fn row(rank: usize) -> ReportRow {
        ReportRow {
            rank,
            employee_name: format!("Officer {rank}"),
            phone: "9876543210".to_string(),
            metric_scores: vec![10.0, 20.0],
            total_score: 30.0,
            percentage: 30.0,
            status: EntryStatus::InProgress,
        }
    }

    #[test]
    fn partitions_overflowing_sections() {
        assert_eq!(partition_rows(0, 10, 20), vec![(0, 0)]);
        assert_eq!(partition_rows(5, 10, 20), vec![(0, 5)]);
        assert_eq!(partition_rows(35, 10, 20), vec![(0, 10), (10, 30), (30, 35)]);
    }

    #[test]
    fn continuation_pages_hold_more_rows() {
        assert!(continuation_capacity() > first_page_capacity());
        assert!(first_page_capacity() > 0);
    }

    #[test]
    fn renders_a_pdf_document() {
        let report = DepartmentReport {
            department: "revenue".to_string(),
            department_name: None,
            period: Period::new(2, 2025),
            generated_at: Utc::now(),
            sections: vec![RoleSection {
                role: "tehsildar".to_string(),
                template_name: "Tehsildar KPI".to_string(),
                max_score: 100.0,
                metric_names: vec!["Disposal".to_string(), "Visits".to_string()],
                rows: (1..=60).map(row).collect(),
            }],
        };

        let bytes = render_department_pdf(&report).expect("pdf renders");
        assert!(bytes.starts_with(b"%PDF"));
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|window| window == needle.as_bytes())
    }

    #[test]
    fn rows_carry_a_column_per_metric() {
        let mut first = row(1);
        first.metric_scores = vec![12.5, 47.25];
        let report = DepartmentReport {
            department: "revenue".to_string(),
            department_name: None,
            period: Period::new(2, 2025),
            generated_at: Utc::now(),
            sections: vec![RoleSection {
                role: "tehsildar".to_string(),
                template_name: "Tehsildar KPI".to_string(),
                max_score: 100.0,
                metric_names: vec!["Disposal".to_string(), "Visits".to_string()],
                rows: vec![first],
            }],
        };

        let bytes = render_department_pdf(&report).expect("pdf renders");
        for text in ["(Disposal)", "(Visits)", "(12.50)", "(47.25)", "(Total)"] {
            assert!(contains(&bytes, text), "missing {text}");
        }
    }

    #[test]
    fn long_headers_are_trimmed_to_their_column() {
        let trimmed = fit(BuiltinFont::Helvetica_Bold, "Revenue Case Disposal Rate", 40.0);
        assert!(trimmed.ends_with('.'));
        assert!(BuiltinFont::Helvetica_Bold.get_width(TABLE_SIZE, &trimmed) <= 40.0);
        assert_eq!(fit(BuiltinFont::Helvetica, "12.50", 40.0), "12.50");
    }

    #[test]
    fn devanagari_names_are_flagged() {
        let mut officer = row(1);
        officer.employee_name = "राम कुमार".to_string();
        let report = DepartmentReport {
            department: "revenue".to_string(),
            department_name: None,
            period: Period::new(2, 2025),
            generated_at: Utc::now(),
            sections: vec![RoleSection {
                role: "patwari".to_string(),
                template_name: "Patwari KPI".to_string(),
                max_score: 100.0,
                metric_names: vec!["दर्ज प्रकरण".to_string(), "Visits".to_string()],
                rows: vec![officer, row(2)],
            }],
        };

        assert_eq!(unencodable_text(&report), vec!["दर्ज प्रकरण", "राम कुमार"]);
        let bytes = render_department_pdf(&report).expect("pdf still renders");
        assert!(bytes.starts_with(b"%PDF"));
    }
}
