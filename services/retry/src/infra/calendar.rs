use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};
use chrono_tz::Tz;

use crate::domain::calendar::BusinessCalendar;

/// Closed dates per zone, optionally closing every weekend as well.
///
/// Built once from configuration; zones without an entry only observe the
/// weekend rule.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    skip_weekends: bool,
    holidays: HashMap<Tz, HashSet<NaiveDate>>,
}

impl HolidayCalendar {
    pub fn new(skip_weekends: bool) -> Self {
        Self {
            skip_weekends,
            holidays: HashMap::new(),
        }
    }

    pub fn with_holidays(mut self, zone: Tz, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.entry(zone).or_default().extend(dates);
        self
    }

    /// Parse a comma-separated list of `YYYY-MM-DD` dates. Blank entries are
    /// ignored.
    pub fn parse_dates(raw: &str) -> Result<Vec<NaiveDate>, chrono::ParseError> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .collect()
    }
}

impl BusinessCalendar for HolidayCalendar {
    fn is_business_day(&self, zone: Tz, date: NaiveDate) -> bool {
        if self.skip_weekends && matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        !self
            .holidays
            .get(&zone)
            .is_some_and(|dates| dates.contains(&date))
    }
}
