//! Read and write access to daily performance records.

use std::ops::RangeInclusive;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::EngineResult;
use crate::models::DailyPerformance;

use super::Datastore;

/// The performance ledger the rules read order counts from.
///
/// Records are keyed by (employee, work date); writing the same key twice
/// replaces the earlier record.
pub trait PerformanceLedger {
    /// Records of one employee dated within `range`, oldest first.
    fn records_in_range(
        &self,
        employee_id: u64,
        range: RangeInclusive<NaiveDate>,
    ) -> Vec<DailyPerformance>;

    /// Inserts or replaces the record for (employee, date).
    fn upsert_daily_record(
        &mut self,
        employee_id: u64,
        work_date: NaiveDate,
        orders_count: u32,
        commission: Decimal,
        is_valid_workday: bool,
    ) -> EngineResult<()>;

    /// Sums orders over `range`, optionally only valid workdays.
    fn sum_orders(
        &self,
        employee_id: u64,
        range: RangeInclusive<NaiveDate>,
        valid_only: bool,
    ) -> u32 {
        self.records_in_range(employee_id, range)
            .iter()
            .filter(|r| !valid_only || r.is_valid_workday)
            .fold(0u32, |sum, r| sum.saturating_add(r.orders_count))
    }

    /// Counts records over `range`, optionally only valid workdays.
    fn count_records(
        &self,
        employee_id: u64,
        range: RangeInclusive<NaiveDate>,
        valid_only: bool,
    ) -> u32 {
        self.records_in_range(employee_id, range)
            .iter()
            .filter(|r| !valid_only || r.is_valid_workday)
            .count() as u32
    }

    /// Sums orders on exactly the given dates.
    fn sum_orders_on_dates(&self, employee_id: u64, dates: &[NaiveDate], valid_only: bool) -> u32 {
        let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) else {
            return 0;
        };
        self.records_in_range(employee_id, *first..=*last)
            .iter()
            .filter(|r| dates.contains(&r.work_date))
            .filter(|r| !valid_only || r.is_valid_workday)
            .fold(0u32, |sum, r| sum.saturating_add(r.orders_count))
    }
}

impl PerformanceLedger for Datastore {
    fn records_in_range(
        &self,
        employee_id: u64,
        range: RangeInclusive<NaiveDate>,
    ) -> Vec<DailyPerformance> {
        let (start, end) = range.into_inner();
        if start > end {
            return Vec::new();
        }
        self.performance
            .range((employee_id, start)..=(employee_id, end))
            .map(|(_, record)| record.clone())
            .collect()
    }

    fn upsert_daily_record(
        &mut self,
        employee_id: u64,
        work_date: NaiveDate,
        orders_count: u32,
        commission: Decimal,
        is_valid_workday: bool,
    ) -> EngineResult<()> {
        self.employee(employee_id)?;
        let replaced = self.performance.insert(
            (employee_id, work_date),
            DailyPerformance {
                employee_id,
                work_date,
                orders_count,
                commission,
                is_valid_workday,
            },
        );
        debug!(
            employee_id,
            %work_date,
            orders_count,
            replaced = replaced.is_some(),
            "performance record written"
        );
        Ok(())
    }
}
