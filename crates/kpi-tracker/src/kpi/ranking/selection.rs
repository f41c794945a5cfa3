use serde::Serialize;

/// How many entries the top and bottom slices hold for a cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectionCounts {
    pub top: usize,
    pub bottom: usize,
}

impl SelectionCounts {
    pub fn for_total(total: usize) -> Self {
        let (top, bottom) = match total {
            0 => (0, 0),
            1 => (1, 0),
            2..=4 => (1, 1),
            5..=9 => (2, 2),
            10..=15 => {
                let count = ((total as f64) * 0.05).ceil().max(1.0) as usize;
                (count, count)
            }
            _ => (5, 5),
        };
        Self { top, bottom }
    }

    /// Tier for a 1-based position in a cohort of `total` ranked entries.
    pub fn tier(&self, position: usize, total: usize) -> PerformanceTier {
        if position <= self.top {
            PerformanceTier::Top
        } else if position + self.bottom > total {
            PerformanceTier::Bottom
        } else {
            PerformanceTier::Middle
        }
    }
}

/// Message tier an entry falls in once the cohort is ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    Top,
    Middle,
    Bottom,
}

/// Performance band for a score normalized to a 0-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceBucket {
    Excellent,
    Good,
    Average,
    Poor,
}

impl PerformanceBucket {
    pub const ALL: [PerformanceBucket; 4] = [Self::Excellent, Self::Good, Self::Average, Self::Poor];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Average => "Average",
            Self::Poor => "Poor",
        }
    }

    pub fn for_normalized(normalized: f64) -> Self {
        if normalized >= 9.0 {
            Self::Excellent
        } else if normalized >= 7.0 {
            Self::Good
        } else if normalized >= 4.0 {
            Self::Average
        } else {
            Self::Poor
        }
    }
}

/// `score / top * 10`; a zero top score puts everyone at 0.
pub fn normalized_score(score: f64, top_score: f64) -> f64 {
    if top_score > 0.0 {
        score / top_score * 10.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_cohort_size() {
        let cases = [
            (0, 0, 0),
            (1, 1, 0),
            (4, 1, 1),
            (9, 2, 2),
            (12, 1, 1),
            (20, 5, 5),
            (300, 5, 5),
        ];
        for (total, top, bottom) in cases {
            assert_eq!(
                SelectionCounts::for_total(total),
                SelectionCounts { top, bottom },
                "total {total}"
            );
        }
    }

    #[test]
    fn tiers_split_head_tail_and_middle() {
        let counts = SelectionCounts::for_total(9);
        assert_eq!(counts.tier(1, 9), PerformanceTier::Top);
        assert_eq!(counts.tier(2, 9), PerformanceTier::Top);
        assert_eq!(counts.tier(3, 9), PerformanceTier::Middle);
        assert_eq!(counts.tier(7, 9), PerformanceTier::Middle);
        assert_eq!(counts.tier(8, 9), PerformanceTier::Bottom);
        assert_eq!(counts.tier(9, 9), PerformanceTier::Bottom);

        let single = SelectionCounts::for_total(1);
        assert_eq!(single.tier(1, 1), PerformanceTier::Top);
    }

    #[test]
    fn buckets_use_half_open_bands() {
        assert_eq!(PerformanceBucket::for_normalized(10.0), PerformanceBucket::Excellent);
        assert_eq!(PerformanceBucket::for_normalized(9.0), PerformanceBucket::Excellent);
        assert_eq!(PerformanceBucket::for_normalized(8.99), PerformanceBucket::Good);
        assert_eq!(PerformanceBucket::for_normalized(7.0), PerformanceBucket::Good);
        assert_eq!(PerformanceBucket::for_normalized(4.0), PerformanceBucket::Average);
        assert_eq!(PerformanceBucket::for_normalized(3.99), PerformanceBucket::Poor);
    }

    #[test]
    fn zero_top_score_normalizes_to_zero() {
        assert_eq!(normalized_score(0.0, 0.0), 0.0);
        assert_eq!(
            PerformanceBucket::for_normalized(normalized_score(0.0, 0.0)),
            PerformanceBucket::Poor
        );
        assert!((normalized_score(45.0, 90.0) - 5.0).abs() < 1e-9);
    }
}
