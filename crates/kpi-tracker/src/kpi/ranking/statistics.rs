use std::collections::BTreeMap;

use serde::Serialize;

use super::join::ResolvedEntry;
use super::selection::{normalized_score, PerformanceBucket, SelectionCounts};
use crate::kpi::domain::{
    Employee, EmployeeSummary, Entry, EntryId, EntryStatus, MetricValue, Period, Template,
    TemplateSummary,
};
use crate::kpi::pagination::{PageMeta, PageRequest};

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Entry with its overall position in the score-sorted cohort.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub position: usize,
    pub entry: Entry,
    pub employee: Employee,
    pub normalized_score: f64,
    pub bucket: PerformanceBucket,
}

impl RankedEntry {
    fn row(&self, rank: usize) -> RankingRow {
        RankingRow {
            rank,
            position: self.position,
            entry_id: self.entry.id.clone(),
            employee: self.employee.summary(),
            period: self.entry.period(),
            status: self.entry.status,
            total_score: self.entry.total_score,
            normalized_score: round2(self.normalized_score),
            bucket: self.bucket,
            metric_values: self.entry.metric_values.clone(),
        }
    }
}

/// Stable descending sort by total score; ties keep their retrieval order.
pub fn rank_entries(resolved: Vec<ResolvedEntry>) -> Vec<RankedEntry> {
    let mut resolved = resolved;
    resolved.sort_by(|a, b| b.entry.total_score.total_cmp(&a.entry.total_score));

    let top_score = resolved
        .first()
        .map(|item| item.entry.total_score)
        .unwrap_or(0.0);

    resolved
        .into_iter()
        .enumerate()
        .map(|(index, ResolvedEntry { entry, employee })| {
            let normalized = normalized_score(entry.total_score, top_score);
            RankedEntry {
                position: index + 1,
                bucket: PerformanceBucket::for_normalized(normalized),
                normalized_score: normalized,
                entry,
                employee,
            }
        })
        .collect()
}

/// Row of a ranking table. `rank` restarts at 1 on every page; `position` is overall.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    pub rank: usize,
    pub position: usize,
    pub entry_id: EntryId,
    pub employee: EmployeeSummary,
    pub period: Period,
    pub status: EntryStatus,
    pub total_score: f64,
    pub normalized_score: f64,
    pub bucket: PerformanceBucket,
    pub metric_values: Vec<MetricValue>,
}

pub fn page_rows(ranked: &[RankedEntry], request: PageRequest) -> (Vec<RankingRow>, PageMeta) {
    let rows = ranked
        .iter()
        .skip(request.offset())
        .take(request.limit)
        .enumerate()
        .map(|(index, item)| item.row(index + 1))
        .collect();
    (rows, request.meta(ranked.len()))
}

/// Head and tail of the full ranking. The tail is ordered worst first.
pub fn extremes(ranked: &[RankedEntry]) -> (Vec<RankingRow>, Vec<RankingRow>) {
    let counts = SelectionCounts::for_total(ranked.len());
    let top = ranked
        .iter()
        .take(counts.top)
        .map(|item| item.row(item.position))
        .collect();
    let bottom = ranked
        .iter()
        .rev()
        .take(counts.bottom)
        .map(|item| item.row(item.position))
        .collect();
    (top, bottom)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketShare {
    pub bucket: PerformanceBucket,
    pub label: &'static str,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStatistic {
    pub name: String,
    pub total_entries: usize,
    pub average_score: f64,
    pub top_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingStatistics {
    pub total_entries: usize,
    pub average_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    pub distribution: Vec<BucketShare>,
    pub department_stats: Vec<GroupStatistic>,
    pub role_stats: Vec<GroupStatistic>,
}

/// Per-group count, average (2 dp) and best score, ordered by group name.
pub fn group_statistics<'a, I, K>(items: I, key: K) -> Vec<GroupStatistic>
where
    I: IntoIterator<Item = (&'a Entry, &'a Employee)>,
    K: Fn(&Entry, &Employee) -> String,
{
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (entry, employee) in items {
        groups
            .entry(key(entry, employee))
            .or_default()
            .push(entry.total_score);
    }

    groups
        .into_iter()
        .map(|(name, scores)| GroupStatistic {
            total_entries: scores.len(),
            average_score: round2(scores.iter().sum::<f64>() / scores.len() as f64),
            top_score: scores.iter().copied().fold(f64::MIN, f64::max),
            name,
        })
        .collect()
}

pub fn summarize(ranked: &[RankedEntry]) -> RankingStatistics {
    let total = ranked.len();
    let scores: Vec<f64> = ranked.iter().map(|item| item.entry.total_score).collect();
    let (average_score, max_score, min_score) = if scores.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        (
            round2(scores.iter().sum::<f64>() / total as f64),
            scores.iter().copied().fold(f64::MIN, f64::max),
            scores.iter().copied().fold(f64::MAX, f64::min),
        )
    };

    let distribution = PerformanceBucket::ALL
        .iter()
        .map(|bucket| {
            let count = ranked.iter().filter(|item| item.bucket == *bucket).count();
            let percentage = if total == 0 {
                0.0
            } else {
                round2(count as f64 / total as f64 * 100.0)
            };
            BucketShare {
                bucket: *bucket,
                label: bucket.label(),
                count,
                percentage,
            }
        })
        .collect();

    let pairs = || ranked.iter().map(|item| (&item.entry, &item.employee));

    RankingStatistics {
        total_entries: total,
        average_score,
        max_score,
        min_score,
        distribution,
        department_stats: group_statistics(pairs(), |_, employee| employee.department.clone()),
        role_stats: group_statistics(pairs(), |_, employee| employee.department_role.clone()),
    }
}

/// Resolved entries of one template and period, ready to rank.
#[derive(Debug, Clone)]
pub struct Cohort {
    pub period: Period,
    pub department: String,
    pub role: String,
    pub template: Template,
    pub resolved: Vec<ResolvedEntry>,
    pub excluded_orphans: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingReport {
    pub period: Period,
    pub department: String,
    pub role: String,
    pub template: TemplateSummary,
    pub max_score: f64,
    pub ranking: Vec<RankingRow>,
    pub pagination: PageMeta,
    pub statistics: RankingStatistics,
    pub selection: SelectionCounts,
    pub top_performers: Vec<RankingRow>,
    pub bottom_performers: Vec<RankingRow>,
    pub excluded_orphans: usize,
}

pub fn build_report(cohort: Cohort, request: PageRequest) -> RankingReport {
    let ranked = rank_entries(cohort.resolved);
    let (ranking, pagination) = page_rows(&ranked, request);
    let (top_performers, bottom_performers) = extremes(&ranked);

    RankingReport {
        period: cohort.period,
        department: cohort.department,
        role: cohort.role,
        max_score: cohort.template.max_attainable_score(),
        template: cohort.template.summary(),
        ranking,
        pagination,
        statistics: summarize(&ranked),
        selection: SelectionCounts::for_total(ranked.len()),
        top_performers,
        bottom_performers,
        excluded_orphans: cohort.excluded_orphans,
    }
}
