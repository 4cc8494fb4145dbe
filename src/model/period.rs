use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// The `days` days before `day` plus `day` itself.
    pub fn trailing(day: NaiveDate, days: i64) -> Self {
        Self {
            start: day - Duration::days(days),
            end: day,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// A calendar month, used by the history and summary queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthPeriod {
    pub year: i32,
    pub month: u32,
    range: DateRange,
}

impl MonthPeriod {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        let end = next.pred_opt()?;

        Some(Self {
            year,
            month,
            range: DateRange::new(start, end),
        })
    }

    pub fn containing(now: NaiveDateTime) -> Option<Self> {
        Self::new(now.year(), now.month())
    }

    /// Missing parts fall back to the month of `now`.
    pub fn resolve(month: Option<u32>, year: Option<i32>, now: NaiveDateTime) -> Option<Self> {
        Self::new(year.unwrap_or(now.year()), month.unwrap_or(now.month()))
    }

    /// Only when both parts are given; otherwise there is no window.
    pub fn both(month: Option<u32>, year: Option<i32>) -> Option<Option<Self>> {
        match (month, year) {
            (Some(month), Some(year)) => Self::new(year, month).map(Some),
            _ => Some(None),
        }
    }

    pub fn range(&self) -> DateRange {
        self.range
    }
}
