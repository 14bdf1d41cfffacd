//! Daily performance entry, training assessments and calendar administration.
//!
//! Performance records carry their own valid-workday flag. It is taken from
//! the calendar when a record is written and re-derived for a whole month
//! whenever a day of that month is reconfigured.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::calculation::daily_commission;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Actor, AuditEntry, Grade, OperationType, Role, TrainingAssessment, YearMonth,
};
use crate::store::{Datastore, PerformanceLedger};

use super::{EngineContext, Receipt};

/// Attendance of one employee over one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceReport {
    /// The employee.
    pub employee_id: u64,
    /// The month.
    pub year_month: YearMonth,
    /// Records flagged as valid workdays.
    pub valid_days: u32,
    /// Workdays the calendar has in the month.
    pub calendar_workdays: u32,
    /// `valid_days / calendar_workdays`, four decimal places; 0 for an empty month.
    pub attendance_rate: Decimal,
}

/// How a calendar change in a month touches one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkdayImpact {
    /// The employee.
    pub employee_id: u64,
    /// Employee number.
    pub employee_no: String,
    /// Employee name.
    pub name: String,
    /// Records in the month.
    pub recorded_days: u32,
    /// Of those, the ones counted as valid.
    pub valid_days: u32,
}

/// Writes one day's orders for an employee.
///
/// Commission and the valid-workday flag are derived, never supplied. An
/// existing record for the date is replaced.
pub fn record_daily_performance(
    ctx: &mut EngineContext<'_>,
    employee_id: u64,
    work_date: NaiveDate,
    orders: i64,
    actor: &Actor,
) -> EngineResult<Receipt> {
    if orders < 0 {
        return Err(EngineError::invalid_input("出单数不能为负数"));
    }
    let orders_count =
        u32::try_from(orders).map_err(|_| EngineError::invalid_input("出单数超出范围"))?;
    let employee = ctx.store.employee(employee_id)?;
    if !employee.is_active {
        return Err(EngineError::policy("员工已离职，不能录入业绩"));
    }
    if !actor.can_act_on_team(&employee.team) {
        return Err(EngineError::permission("无权限录入其他团队员工业绩"));
    }
    let employee_name = employee.name.clone();
    let commission = daily_commission(orders);
    let is_valid = ctx.store.calendar().is_workday(work_date);

    ctx.transact(|tx, audit| {
        tx.upsert_daily_record(employee_id, work_date, orders_count, commission, is_valid)?;
        audit.record(
            AuditEntry::new(OperationType::Performance, "业绩管理", "录入业绩", actor)
                .employee(employee_id, employee_name.as_str())
                .changes(json!({
                    "work_date": work_date.to_string(),
                    "orders_count": orders_count,
                    "commission": commission,
                    "is_valid_workday": is_valid,
                })),
        )?;
        Ok(())
    })?;
    info!(employee_id, %work_date, orders_count, %commission, is_valid, "daily performance recorded");

    Ok(Receipt::message(format!(
        "业绩录入成功：{}单，提成¥{:.2}",
        orders_count, commission
    )))
}

/// Records a trainee's assessment result.
pub fn record_training_assessment(
    ctx: &mut EngineContext<'_>,
    employee_id: u64,
    assessment_date: NaiveDate,
    script_passed: bool,
    mock_order_passed: bool,
    actor: &Actor,
) -> EngineResult<Receipt> {
    let employee = ctx.store.employee(employee_id)?;
    if !actor.can_act_on_team(&employee.team) {
        return Err(EngineError::permission("无权限考核其他团队员工"));
    }
    if employee.grade != Grade::Trainee {
        return Err(EngineError::policy("仅培训期员工需要考核"));
    }
    let employee_name = employee.name.clone();

    let assessment_id = ctx.transact(|tx, audit| {
        let assessment_id = tx.add_assessment(TrainingAssessment {
            id: 0,
            employee_id,
            assessment_date,
            script_passed,
            mock_order_passed,
            assessor_name: actor.name.clone(),
        });
        audit.record(
            AuditEntry::new(OperationType::Training, "培训管理", "录入考核", actor)
                .employee(employee_id, employee_name.as_str())
                .record(assessment_id)
                .changes(json!({
                    "script_passed": script_passed,
                    "mock_order_passed": mock_order_passed,
                })),
        )?;
        Ok(assessment_id)
    })?;

    let passed = script_passed && mock_order_passed;
    info!(employee_id, assessment_id, passed, "training assessment recorded");
    let message = if passed {
        "考核通过"
    } else {
        "考核未通过"
    };
    Ok(Receipt::new(assessment_id, message))
}

/// Re-derives the valid-workday flag of every record in `month`.
///
/// Returns how many records changed.
pub fn recalculate_month_validity(
    ctx: &mut EngineContext<'_>,
    month: YearMonth,
) -> EngineResult<usize> {
    ctx.store.atomically(|tx| Ok(revalidate(tx, month)))
}

fn revalidate(store: &mut Datastore, month: YearMonth) -> usize {
    let targets: Vec<(u64, NaiveDate, bool)> = store
        .performance_in_month(month)
        .map(|r| (r.employee_id, r.work_date, store.calendar().is_workday(r.work_date)))
        .collect();
    let mut changed = 0;
    for (employee_id, work_date, is_valid) in targets {
        if store.set_record_validity(employee_id, work_date, is_valid) {
            changed += 1;
        }
    }
    info!(year_month = %month, changed, "month validity recalculated");
    changed
}

/// Configures one calendar day and re-derives the month's record flags.
pub fn set_calendar_day(
    ctx: &mut EngineContext<'_>,
    date: NaiveDate,
    is_workday: bool,
    reason: Option<&str>,
    actor: &Actor,
) -> EngineResult<Receipt> {
    if actor.role != Role::Admin {
        return Err(EngineError::permission("仅管理员可设置工作日历"));
    }
    let reason = reason.map(str::trim).filter(|r| !r.is_empty());
    let month = YearMonth::of(date);

    let changed = ctx.transact(|tx, audit| {
        let previous = tx
            .calendar_mut()
            .set_override(date, is_workday, reason.map(str::to_string));
        let was_workday = previous.is_none_or(|day| day.is_workday);
        let changed = revalidate(tx, month);

        let mut entry = AuditEntry::new(OperationType::Calendar, "工作日历", "设置工作日", actor)
            .values(day_label(was_workday), day_label(is_workday))
            .changes(json!({ "date": date.to_string(), "records_changed": changed }));
        if let Some(reason) = reason {
            entry = entry.reason(reason);
        }
        audit.record(entry)?;
        Ok(changed)
    })?;
    debug!(%date, is_workday, changed, "calendar day configured");

    Ok(Receipt::message(format!(
        "{}已设置为{}，更新{}条业绩记录",
        date,
        day_label(is_workday),
        changed
    )))
}

fn day_label(is_workday: bool) -> &'static str {
    if is_workday { "工作日" } else { "休息日" }
}

/// Valid days against calendar workdays for one employee and month.
pub fn month_attendance(
    ctx: &EngineContext<'_>,
    employee_id: u64,
    month: YearMonth,
) -> EngineResult<AttendanceReport> {
    ctx.store.employee(employee_id)?;
    let valid_days = ctx
        .store
        .count_records(employee_id, month.first_day()..=month.last_day(), true);
    let calendar_workdays = ctx.store.calendar().count_workdays_in_month(month);
    let attendance_rate = if calendar_workdays == 0 {
        Decimal::ZERO
    } else {
        (Decimal::from(valid_days) / Decimal::from(calendar_workdays)).round_dp(4)
    };
    Ok(AttendanceReport {
        employee_id,
        year_month: month,
        valid_days,
        calendar_workdays,
        attendance_rate,
    })
}

/// Active employees with records in `month`, with their record counts.
pub fn workday_impact(ctx: &EngineContext<'_>, month: YearMonth) -> Vec<WorkdayImpact> {
    let range = month.first_day()..=month.last_day();
    ctx.store
        .active_employees()
        .filter_map(|employee| {
            let recorded_days = ctx.store.count_records(employee.id, range.clone(), false);
            (recorded_days > 0).then(|| WorkdayImpact {
                employee_id: employee.id,
                employee_no: employee.employee_no.clone(),
                name: employee.name.clone(),
                recorded_days,
                valid_days: ctx.store.count_records(employee.id, range.clone(), true),
            })
        })
        .collect()
}
