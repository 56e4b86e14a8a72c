//! Local calendar arithmetic

use chrono::{DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, NaiveTime, Offset, Utc, Weekday};

/// The locale inputs analytics depend on: the UTC offset that decides where
/// midnight falls and the first day of the week.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Calendar {
    pub offset: FixedOffset,
    pub week_start: Weekday,
}

impl Default for Calendar {
    fn default() -> Self {
        Self { offset: Utc.fix(), week_start: Weekday::Mon }
    }
}

/// Half-open `[start, end)` interval in epoch milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: i64,
    pub end: i64,
}

impl Span {
    pub fn contains(&self, millis: i64) -> bool { millis >= self.start && millis < self.end }
}

impl Calendar {
    pub fn new(offset: FixedOffset, week_start: Weekday) -> Self { Self { offset, week_start } }

    pub fn local_date(&self, millis: i64) -> Option<NaiveDate> {
        DateTime::from_timestamp_millis(millis).map(|t| t.with_timezone(&self.offset).date_naive())
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate { now.with_timezone(&self.offset).date_naive() }

    /// Epoch milliseconds of local midnight starting `date`.
    pub fn midnight(&self, date: NaiveDate) -> i64 {
        date.and_time(NaiveTime::MIN).and_utc().timestamp_millis() - i64::from(self.offset.local_minus_utc()) * 1000
    }

    pub fn day(&self, date: NaiveDate) -> Span {
        Span { start: self.midnight(date), end: self.midnight(date + Days::new(1)) }
    }

    pub fn week_start_of(&self, date: NaiveDate) -> NaiveDate {
        let back = (date.weekday().num_days_from_monday() + 7 - self.week_start.num_days_from_monday()) % 7;
        date - Days::new(u64::from(back))
    }

    pub fn week(&self, date: NaiveDate) -> Span {
        let first = self.week_start_of(date);
        Span { start: self.midnight(first), end: self.midnight(first + Days::new(7)) }
    }

    /// Calendar month containing `date`, shifted back by `months_back` months.
    pub fn month(&self, date: NaiveDate, months_back: u32) -> Span {
        let first = first_of_month(date) - Months::new(months_back);
        Span { start: self.midnight(first), end: self.midnight(first + Months::new(1)) }
    }

    pub fn month_start(&self, date: NaiveDate, months_back: u32) -> NaiveDate { first_of_month(date) - Months::new(months_back) }

    pub fn year(&self, date: NaiveDate) -> Span {
        let first = first_of_month(date) - Months::new(date.month0());
        Span { start: self.midnight(first), end: self.midnight(first + Months::new(12)) }
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate { date - Days::new(u64::from(date.day0())) }

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

    #[test]
    fn test_week_start_respects_locale() {
        let monday = Calendar::default();
        let sunday = Calendar::new(FixedOffset::east_opt(0).unwrap(), Weekday::Sun);
        // 2024-03-13 is a Wednesday
        assert_eq!(monday.week_start_of(date(2024, 3, 13)), date(2024, 3, 11));
        assert_eq!(sunday.week_start_of(date(2024, 3, 13)), date(2024, 3, 10));
        assert_eq!(sunday.week_start_of(date(2024, 3, 10)), date(2024, 3, 10));
    }

    #[test]
    fn test_midnight_uses_offset() {
        let belgrade = Calendar::new(FixedOffset::east_opt(3600).unwrap(), Weekday::Mon);
        let utc_midnight = Calendar::default().midnight(date(2024, 1, 1));
        assert_eq!(belgrade.midnight(date(2024, 1, 1)), utc_midnight - 3_600_000);
    }

    #[test]
    fn test_month_spans_cross_year() {
        let cal = Calendar::default();
        let jan = cal.month(date(2024, 1, 20), 0);
        let dec = cal.month(date(2024, 1, 20), 1);
        assert_eq!(dec.end, jan.start);
        assert_eq!(dec.start, cal.midnight(date(2023, 12, 1)));
        assert_eq!(cal.year(date(2024, 7, 4)).start, cal.midnight(date(2024, 1, 1)));
    }
}
