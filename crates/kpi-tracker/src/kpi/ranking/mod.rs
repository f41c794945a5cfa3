//! Ranking and statistics over one template's entries for a period.

pub mod join;
pub mod period;
pub mod selection;
pub mod statistics;

pub use join::{join_entries, split_joined, JoinedEntry, MissingReference, OrphanedEntry, ResolvedEntry};
pub use period::{period_or_default, resolve_period};
pub use selection::{normalized_score, PerformanceBucket, PerformanceTier, SelectionCounts};
pub use statistics::{
    build_report, extremes, group_statistics, page_rows, rank_entries, summarize, BucketShare,
    Cohort, GroupStatistic, RankedEntry, RankingReport, RankingRow, RankingStatistics,
};
