use chrono::Datelike;

use crate::kpi::domain::Period;

/// Reports cover the month before `now`; January resolves to December of the previous year.
pub fn resolve_period(now: &impl Datelike) -> Period {
    match now.month0() {
        0 => Period::new(12, now.year() - 1),
        month0 => Period::new(month0, now.year()),
    }
}

/// Fills each missing half of a period independently from [`resolve_period`].
pub fn period_or_default(month: Option<u32>, year: Option<i32>, now: &impl Datelike) -> Period {
    let fallback = resolve_period(now);
    Period::new(month.unwrap_or(fallback.month), year.unwrap_or(fallback.year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn january_rolls_back_to_previous_december() {
        assert_eq!(resolve_period(&date(2025, 1, 15)), Period::new(12, 2024));
    }

    #[test]
    fn other_months_use_the_previous_month() {
        assert_eq!(resolve_period(&date(2025, 3, 1)), Period::new(2, 2025));
        assert_eq!(resolve_period(&date(2025, 12, 31)), Period::new(11, 2025));
    }

    #[test]
    fn explicit_values_override_each_half() {
        let now = date(2025, 1, 10);
        assert_eq!(period_or_default(Some(6), None, &now), Period::new(6, 2024));
        assert_eq!(period_or_default(None, Some(2023), &now), Period::new(12, 2023));
    }
}
