use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

/// Answers "may a collection be presented on `date` in `zone`".
///
/// Implementations are built once at startup and read-only afterwards.
pub trait BusinessCalendar: Send + Sync {
    fn is_business_day(&self, zone: Tz, date: NaiveDate) -> bool;
}

impl<T: BusinessCalendar + ?Sized> BusinessCalendar for std::sync::Arc<T> {
    fn is_business_day(&self, zone: Tz, date: NaiveDate) -> bool {
        (**self).is_business_day(zone, date)
    }
}

/// Calendar that accepts every date.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCalendar;

impl BusinessCalendar for OpenCalendar {
    fn is_business_day(&self, _zone: Tz, _date: NaiveDate) -> bool {
        true
    }
}

/// Longest run of closed days the planner will roll across.
pub const MAX_CLOSED_DAYS: u32 = 31;

/// Wall-clock moment of the daily retry run in its zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWindow {
    pub zone: Tz,
    pub cutoff: NaiveTime,
}

impl RunWindow {
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.zone).date_naive()
    }

    /// The cutoff on `date` as a UTC instant. A cutoff that falls into a DST
    /// gap is moved forward by one hour.
    pub fn cutoff_on(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(self.cutoff);
        local
            .and_local_timezone(self.zone)
            .earliest()
            .or_else(|| {
                (local + Duration::hours(1))
                    .and_local_timezone(self.zone)
                    .earliest()
            })
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| local.and_utc())
    }

    /// First business day on or after `date`, bounded by [`MAX_CLOSED_DAYS`].
    pub fn roll_forward<C: BusinessCalendar + ?Sized>(
        &self,
        calendar: &C,
        date: NaiveDate,
    ) -> NaiveDate {
        let mut candidate = date;
        for _ in 0..MAX_CLOSED_DAYS {
            if calendar.is_business_day(self.zone, candidate) {
                return candidate;
            }
            candidate += Duration::days(1);
        }
        candidate
    }
}
