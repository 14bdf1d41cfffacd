//! Workday calendar.
//!
//! A date is a workday unless the override table says otherwise; weekends
//! are not special. Every forward or backward scan is bounded by
//! `max_scan_days` and reports through [`WorkdayScan::exhausted`] when the
//! bound was reached before enough workdays were found.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::{CalendarOverride, CalendarRules};
use crate::models::YearMonth;

/// The result of a bounded workday scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkdayScan {
    /// Workdays found, oldest first.
    pub days: Vec<NaiveDate>,
    /// The scan stopped at its bound before finding every requested day.
    pub exhausted: bool,
}

impl WorkdayScan {
    /// Number of workdays found.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// Whether nothing was found.
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// First workday found.
    pub fn first(&self) -> Option<NaiveDate> {
        self.days.first().copied()
    }

    /// Last workday found.
    pub fn last(&self) -> Option<NaiveDate> {
        self.days.last().copied()
    }
}

/// The work calendar: a date-keyed override table plus a scan bound.
///
/// # Example
///
/// ```
/// use callcenter_engine::calculation::WorkCalendar;
/// use chrono::NaiveDate;
///
/// let mut calendar = WorkCalendar::new(365);
/// let holiday = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
/// calendar.set_override(holiday, false, Some("国庆节".to_string()));
///
/// assert!(!calendar.is_workday(holiday));
/// assert!(calendar.is_workday(NaiveDate::from_ymd_opt(2025, 10, 4).unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCalendar {
    overrides: BTreeMap<NaiveDate, CalendarOverride>,
    max_scan_days: u32,
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::from_rules(&CalendarRules::default())
    }
}

impl WorkCalendar {
    /// Creates an empty calendar.
    pub fn new(max_scan_days: u32) -> Self {
        Self {
            overrides: BTreeMap::new(),
            max_scan_days,
        }
    }

    /// Creates a calendar seeded with the configured overrides.
    pub fn from_rules(rules: &CalendarRules) -> Self {
        let mut calendar = Self::new(rules.max_scan_days);
        for day in &rules.overrides {
            calendar.overrides.insert(day.date, day.clone());
        }
        calendar
    }

    /// The scan bound.
    pub fn max_scan_days(&self) -> u32 {
        self.max_scan_days
    }

    /// Configures `date`, returning the previous override if there was one.
    pub fn set_override(
        &mut self,
        date: NaiveDate,
        is_workday: bool,
        reason: Option<String>,
    ) -> Option<CalendarOverride> {
        self.overrides.insert(
            date,
            CalendarOverride {
                date,
                is_workday,
                reason,
            },
        )
    }

    /// Removes the override for `date`; the date becomes a workday again.
    pub fn remove_override(&mut self, date: NaiveDate) -> Option<CalendarOverride> {
        self.overrides.remove(&date)
    }

    /// The override configured for `date`.
    pub fn override_for(&self, date: NaiveDate) -> Option<&CalendarOverride> {
        self.overrides.get(&date)
    }

    /// Overrides configured within `month`.
    pub fn overrides_in_month(&self, month: YearMonth) -> impl Iterator<Item = &CalendarOverride> {
        self.overrides
            .range(month.first_day()..=month.last_day())
            .map(|(_, day)| day)
    }

    /// Whether `date` counts as a business day.
    pub fn is_workday(&self, date: NaiveDate) -> bool {
        self.overrides
            .get(&date)
            .is_none_or(|day| day.is_workday)
    }

    /// Counts workdays from `start` to `end`.
    ///
    /// The flags decide whether the endpoints count. An empty or inverted
    /// range gives 0.
    ///
    /// # Example
    ///
    /// ```
    /// use callcenter_engine::calculation::WorkCalendar;
    /// use chrono::NaiveDate;
    ///
    /// let calendar = WorkCalendar::new(365);
    /// let d1 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    /// let d3 = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
    ///
    /// assert_eq!(calendar.count_workdays_between(d1, d3, true, true), 3);
    /// assert_eq!(calendar.count_workdays_between(d1, d3, false, true), 2);
    /// assert_eq!(calendar.count_workdays_between(d3, d1, true, true), 0);
    /// ```
    pub fn count_workdays_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        include_start: bool,
        include_end: bool,
    ) -> u32 {
        let start = if include_start {
            Some(start)
        } else {
            start.succ_opt()
        };
        let end = if include_end { Some(end) } else { end.pred_opt() };
        let (Some(start), Some(end)) = (start, end) else {
            return 0;
        };
        if start > end {
            return 0;
        }

        let calendar_days = (end - start).num_days() + 1;
        let rest_days = self
            .overrides
            .range(start..=end)
            .filter(|(_, day)| !day.is_workday)
            .count() as i64;
        u32::try_from(calendar_days - rest_days).unwrap_or(u32::MAX)
    }

    /// Counts the workdays of a calendar month.
    pub fn count_workdays_in_month(&self, month: YearMonth) -> u32 {
        self.count_workdays_between(month.first_day(), month.last_day(), true, true)
    }

    /// Every workday from `start` to `end`, both included.
    pub fn workdays_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        if start > end {
            return Vec::new();
        }
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .filter(|day| self.is_workday(*day))
            .collect()
    }

    /// The most recent `count` workdays ending at or before `end`.
    ///
    /// Returned oldest first. When the scan bound is hit before `count`
    /// workdays are found, the scan is `exhausted` and holds what was found.
    pub fn recent_workdays(&self, end: NaiveDate, count: u32, include_end: bool) -> WorkdayScan {
        let first = if include_end { Some(end) } else { end.pred_opt() };
        let mut days = self.scan(first, count, |day| day.pred_opt());
        days.reverse();
        self.finish(days, count)
    }

    /// The next `count` workdays starting at or after `start`, oldest first.
    pub fn next_n_workdays(&self, start: NaiveDate, count: u32, include_start: bool) -> WorkdayScan {
        let first = if include_start {
            Some(start)
        } else {
            start.succ_opt()
        };
        let days = self.scan(first, count, |day| day.succ_opt());
        self.finish(days, count)
    }

    /// The `offset`-th workday strictly after `from`.
    ///
    /// `None` when the scan bound is reached first.
    pub fn next_workday(&self, from: NaiveDate, offset: u32) -> Option<NaiveDate> {
        if offset == 0 {
            return Some(from);
        }
        let scan = self.next_n_workdays(from, offset, false);
        if scan.exhausted { None } else { scan.last() }
    }

    /// Workdays since joining, the join day itself excluded.
    pub fn workdays_since_join(&self, join_date: NaiveDate, today: NaiveDate) -> u32 {
        self.count_workdays_between(join_date, today, false, true)
    }

    /// Display text such as `2025-10-01至2025-10-15（10个工作日）`.
    pub fn describe_range(&self, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}至{}（{}个工作日）",
            start,
            end,
            self.count_workdays_between(start, end, true, true)
        )
    }

    fn scan(
        &self,
        first: Option<NaiveDate>,
        count: u32,
        step: impl Fn(NaiveDate) -> Option<NaiveDate>,
    ) -> Vec<NaiveDate> {
        let mut days = Vec::with_capacity(count as usize);
        let mut current = first;
        let mut checked = 0;
        while let Some(day) = current {
            if days.len() >= count as usize || checked >= self.max_scan_days {
                break;
            }
            if self.is_workday(day) {
                days.push(day);
            }
            checked += 1;
            current = step(day);
        }
        days
    }

    fn finish(&self, days: Vec<NaiveDate>, count: u32) -> WorkdayScan {
        let exhausted = days.len() < count as usize;
        WorkdayScan { days, exhausted }
    }
}

/// Adds calendar days, saturating at the last representable date.
pub(crate) fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}
