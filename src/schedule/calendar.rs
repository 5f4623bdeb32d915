//! Working-day calendar.
//!
//! A date is a working day when it falls on Monday to Friday and is not a public
//! holiday of the configured region. Holidays are resolved once per year and cached:
//! the external holiday source wins when configured, and the computed set below is
//! the fallback for any failure.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use dashmap::DashMap;
use tracing::{debug, instrument, warn};

use crate::{
    base::{
        config::{Config, FirstMondayHoliday, FixedHoliday},
        types::Holiday,
    },
    service::holiday::HolidayClient,
};

/// Upper bound for day-by-day searches.
const MAX_SEARCH_DAYS: u64 = 366;

/// Easter Sunday for `year` (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    // Month is always 3 or 4, and the day is in range for it.
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).unwrap_or_default()
}

/// The first Monday of `month` in `year`.
pub fn first_monday(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (7 - first.weekday().num_days_from_monday()) % 7;

    first.checked_add_days(Days::new(offset as u64))
}

/// Computes the hardcoded holiday set for `year`, ordered by date.
pub fn computed_holidays(year: i32, fixed: &[FixedHoliday], first_mondays: &[FirstMondayHoliday]) -> Vec<Holiday> {
    let mut holidays = BTreeMap::new();

    for holiday in fixed {
        if let Some(date) = NaiveDate::from_ymd_opt(year, holiday.month, holiday.day) {
            holidays.entry(date).or_insert_with(|| holiday.name.clone());
        }
    }

    let easter = easter_sunday(year);
    if let Some(good_friday) = easter.checked_sub_days(Days::new(2)) {
        holidays.entry(good_friday).or_insert_with(|| "Good Friday".to_string());
    }
    if let Some(easter_monday) = easter.checked_add_days(Days::new(1)) {
        holidays.entry(easter_monday).or_insert_with(|| "Easter Monday".to_string());
    }

    for holiday in first_mondays {
        if let Some(date) = first_monday(year, holiday.month) {
            holidays.entry(date).or_insert_with(|| holiday.name.clone());
        }
    }

    holidays.into_iter().map(|(date, name)| Holiday { date, name }).collect()
}

/// Whether `date` falls on Monday to Friday.
pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Working-day service.
///
/// This is trivially cloneable; the per-year holiday cache is shared between clones.
#[derive(Clone)]
pub struct WorkingDayService {
    inner: Arc<WorkingDayServiceInner>,
}

struct WorkingDayServiceInner {
    timezone: Tz,
    fixed: Vec<FixedHoliday>,
    first_mondays: Vec<FirstMondayHoliday>,
    source: Option<HolidayClient>,
    cache: DashMap<i32, Arc<Vec<Holiday>>>,
}

impl WorkingDayService {
    /// Creates a calendar from the configured region, with an optional external source.
    pub fn new(config: &Config, source: Option<HolidayClient>) -> Self {
        Self {
            inner: Arc::new(WorkingDayServiceInner {
                timezone: config.timezone,
                fixed: config.holiday_fixed_dates.clone(),
                first_mondays: config.holiday_first_mondays.clone(),
                source,
                cache: DashMap::new(),
            }),
        }
    }

    /// The configured timezone.
    pub fn timezone(&self) -> Tz {
        self.inner.timezone
    }

    /// The calendar day of `instant` in the configured timezone.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.inner.timezone).date_naive()
    }

    /// Today's calendar day in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        self.date_of(Utc::now())
    }

    /// Returns the ordered holiday set for `year`.
    ///
    /// Never fails: any problem with the external source falls back to the computed set.
    #[instrument(skip(self))]
    pub async fn get_holidays(&self, year: i32) -> Arc<Vec<Holiday>> {
        if let Some(cached) = self.inner.cache.get(&year) {
            return cached.value().clone();
        }

        let mut holidays = match &self.inner.source {
            Some(source) => match source.get_public_holidays(year).await {
                Ok(holidays) => holidays,
                Err(err) => {
                    warn!("Holiday source failed for {year}, using computed holidays: {err}");
                    computed_holidays(year, &self.inner.fixed, &self.inner.first_mondays)
                }
            },
            None => computed_holidays(year, &self.inner.fixed, &self.inner.first_mondays),
        };

        holidays.retain(|holiday| holiday.date.year() == year);
        holidays.sort();
        holidays.dedup_by(|a, b| a.date == b.date);

        debug!("Resolved {} holidays for {year}.", holidays.len());

        let holidays = Arc::new(holidays);
        self.inner.cache.entry(year).or_insert(holidays).value().clone()
    }

    /// Returns the holiday falling on `date`, if any.
    pub async fn holiday_on(&self, date: NaiveDate) -> Option<Holiday> {
        self.get_holidays(date.year()).await.iter().find(|holiday| holiday.date == date).cloned()
    }

    /// Whether `date` is a working day.
    pub async fn is_working_day(&self, date: NaiveDate) -> bool {
        is_weekday(date) && self.holiday_on(date).await.is_none()
    }

    /// The first working day strictly after `from`.
    pub async fn get_next_working_day(&self, from: NaiveDate) -> NaiveDate {
        let mut candidate = from;

        for _ in 0..MAX_SEARCH_DAYS {
            let Some(next) = candidate.succ_opt() else { break };
            candidate = next;

            if self.is_working_day(candidate).await {
                return candidate;
            }
        }

        warn!("No working day found within {MAX_SEARCH_DAYS} days of {from}.");

        candidate
    }

    /// Holidays on or after `from`, up to `limit`, spanning into the next year if needed.
    pub async fn get_upcoming_holidays(&self, from: NaiveDate, limit: usize) -> Vec<Holiday> {
        let years = [from.year(), from.year() + 1];
        let sets = futures::future::join_all(years.iter().map(|year| self.get_holidays(*year))).await;

        sets.iter().flat_map(|set| set.iter()).filter(|holiday| holiday.date >= from).take(limit).cloned().collect()
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        base::{config::ConfigInner, types::Res},
        service::holiday::GenericHolidayClient,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calendar() -> WorkingDayService {
        WorkingDayService::new(&Config::from(ConfigInner::default()), None)
    }

    struct FailingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenericHolidayClient for FailingSource {
        async fn get_public_holidays(&self, _year: i32) -> Res<Vec<Holiday>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    struct FixedSource;

    #[async_trait]
    impl GenericHolidayClient for FixedSource {
        async fn get_public_holidays(&self, year: i32) -> Res<Vec<Holiday>> {
            Ok(vec![Holiday {
                date: NaiveDate::from_ymd_opt(year, 3, 4).unwrap(),
                name: "Company Day".to_string(),
            }])
        }
    }

    #[test]
    fn test_easter_sunday_known_years() {
        assert_eq!(easter_sunday(2024), date(2024, 3, 31));
        assert_eq!(easter_sunday(2025), date(2025, 4, 20));
        assert_eq!(easter_sunday(2026), date(2026, 4, 5));
        assert_eq!(easter_sunday(2038), date(2038, 4, 25));
        assert_eq!(easter_sunday(2285), date(2285, 3, 22));
    }

    #[test]
    fn test_easter_derived_holidays_fall_on_friday_and_monday() {
        for year in 1900..=2200 {
            let holidays = computed_holidays(year, &[], &[]);
            let good_friday = holidays.iter().find(|h| h.name == "Good Friday").unwrap();
            let easter_monday = holidays.iter().find(|h| h.name == "Easter Monday").unwrap();

            assert_eq!(good_friday.date.weekday(), Weekday::Fri, "{year}");
            assert_eq!(easter_monday.date.weekday(), Weekday::Mon, "{year}");
        }
    }

    #[test]
    fn test_first_monday() {
        // 1 May 2023 is itself a Monday.
        assert_eq!(first_monday(2023, 5), Some(date(2023, 5, 1)));
        // 1 May 2025 is a Thursday.
        assert_eq!(first_monday(2025, 5), Some(date(2025, 5, 5)));
        assert_eq!(first_monday(2025, 10), Some(date(2025, 10, 6)));
        assert_eq!(first_monday(2025, 13), None);
    }

    #[test]
    fn test_computed_holidays_are_ordered_and_complete() {
        let inner = ConfigInner::default();
        let holidays = computed_holidays(2025, &inner.holiday_fixed_dates, &inner.holiday_first_mondays);

        assert_eq!(holidays.len(), 9);
        assert!(holidays.windows(2).all(|pair| pair[0].date < pair[1].date));
        assert_eq!(holidays[0].date, date(2025, 1, 1));
        assert!(holidays.iter().any(|h| h.date == date(2025, 4, 18) && h.name == "Good Friday"));
        assert!(holidays.iter().any(|h| h.date == date(2025, 5, 5) && h.name == "Labour Day"));
    }

    #[tokio::test]
    async fn test_weekends_are_never_working_days() {
        let calendar = calendar();
        let mut day = date(2025, 1, 1);

        for _ in 0..400 {
            if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                assert!(!calendar.is_working_day(day).await, "{day}");
            }
            day = day.succ_opt().unwrap();
        }
    }

    #[tokio::test]
    async fn test_holidays_are_not_working_days() {
        let calendar = calendar();

        // Good Friday 2025.
        assert!(!calendar.is_working_day(date(2025, 4, 18)).await);
        // Ordinary Tuesday.
        assert!(calendar.is_working_day(date(2025, 4, 22)).await);
    }

    #[tokio::test]
    async fn test_next_working_day_skips_easter_weekend() {
        let calendar = calendar();

        // Thursday before Good Friday -> Tuesday after Easter Monday.
        assert_eq!(calendar.get_next_working_day(date(2025, 4, 17)).await, date(2025, 4, 22));
        // Friday -> Monday.
        assert_eq!(calendar.get_next_working_day(date(2025, 6, 13)).await, date(2025, 6, 16));
    }

    #[tokio::test]
    async fn test_failing_source_falls_back_and_is_cached() {
        let source = Arc::new(FailingSource { calls: AtomicUsize::new(0) });
        let calendar = WorkingDayService::new(&Config::from(ConfigInner::default()), Some(HolidayClient::new(source.clone())));

        let first = calendar.get_holidays(2025).await;
        let second = calendar.get_holidays(2025).await;

        assert_eq!(first.len(), 9);
        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(!calendar.is_working_day(date(2025, 12, 25)).await);
    }

    #[tokio::test]
    async fn test_external_source_is_preferred() {
        let calendar = WorkingDayService::new(&Config::from(ConfigInner::default()), Some(HolidayClient::new(Arc::new(FixedSource))));

        // Tuesday 4 March 2025 comes from the source, Christmas does not.
        assert!(!calendar.is_working_day(date(2025, 3, 4)).await);
        assert!(calendar.is_working_day(date(2025, 12, 25)).await);
    }

    #[tokio::test]
    async fn test_upcoming_holidays_span_year_end() {
        let calendar = calendar();

        let upcoming = calendar.get_upcoming_holidays(date(2025, 12, 20), 3).await;

        assert_eq!(upcoming.iter().map(|h| h.date).collect::<Vec<_>>(), vec![date(2025, 12, 25), date(2025, 12, 26), date(2026, 1, 1)]);
    }

    #[test]
    fn test_date_of_uses_configured_timezone() {
        let calendar = calendar();
        // 20:00 UTC on the 5th is 06:00 on the 6th in Brisbane.
        let instant = DateTime::parse_from_rfc3339("2025-05-05T20:00:00Z").unwrap().with_timezone(&Utc);

        assert_eq!(calendar.date_of(instant), date(2025, 5, 6));
    }
}
