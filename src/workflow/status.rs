//! Grade transition checks and their explicit application.
//!
//! Checking never writes. [`batch_check_all_employees`] returns
//! recommendations for review, and [`apply_status_change`] /
//! [`apply_recommendations`] commit reviewed ones.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::calculation::{TransitionDecision, TransitionFacts, evaluate_transition, window_size};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Actor, AuditEntry, Grade, Notification, NotificationType, OperationType, YearMonth,
};
use crate::store::PerformanceLedger;

use super::{ChangeKind, EngineContext, days_in_status, write_grade_change};

/// A recommended grade change awaiting review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecommendation {
    /// The employee concerned.
    pub employee_id: u64,
    /// Employee number.
    pub employee_no: String,
    /// Employee name.
    pub name: String,
    /// Team.
    pub team: String,
    /// Grade when the check ran.
    pub old_grade: Grade,
    /// Recommended grade.
    pub new_grade: Grade,
    /// Why.
    pub reason: String,
    /// Days in `old_grade`.
    pub days_in_status: i64,
}

/// Result of committing a batch of recommendations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Employees whose grade changed.
    pub applied: Vec<u64>,
    /// Employees skipped, with the refusal message.
    pub skipped: Vec<(u64, String)>,
}

/// Evaluates the transition table for one employee on `ctx.today`.
///
/// Inactive employees never change.
pub fn check_status_transition(
    ctx: &EngineContext<'_>,
    employee_id: u64,
) -> EngineResult<TransitionDecision> {
    let employee = ctx.store.employee(employee_id)?;
    let days = days_in_status(&*ctx.store, employee_id, ctx.today)?;

    if !employee.is_active {
        return Ok(TransitionDecision {
            should_change: false,
            current_grade: employee.grade,
            new_grade: employee.grade,
            reason: "员工已离职".to_string(),
            days_in_status: days,
        });
    }

    let rules = &ctx.rules.transitions;
    let recent_orders = match window_size(employee.grade, rules) {
        Some(window) => {
            let scan = ctx.store.calendar().recent_workdays(ctx.today, window, true);
            if scan.exhausted {
                return Err(EngineError::policy(format!("工作日数不足{}天", window)));
            }
            ctx.store.sum_orders_on_dates(employee_id, &scan.days, true)
        }
        None => 0,
    };
    let month = YearMonth::of(ctx.today);
    let monthly_valid_days =
        ctx.store
            .count_records(employee_id, month.first_day()..=month.last_day(), true);

    let facts = TransitionFacts {
        days_in_status: days,
        recent_orders,
        day_of_month: ctx.today.day(),
        monthly_valid_days,
    };
    let decision = evaluate_transition(employee.grade, &facts, rules);
    debug!(
        employee_id,
        grade = %employee.grade,
        should_change = decision.should_change,
        reason = %decision.reason,
        "status transition checked"
    );
    Ok(decision)
}

/// Checks every active employee and lists the recommended changes.
///
/// Nothing is written. Employees whose window cannot be filled are skipped.
pub fn batch_check_all_employees(ctx: &EngineContext<'_>) -> EngineResult<Vec<StatusRecommendation>> {
    let mut changes = Vec::new();
    for employee in ctx.store.active_employees() {
        let decision = match check_status_transition(ctx, employee.id) {
            Ok(decision) => decision,
            Err(err) if err.is_refusal() => {
                warn!(employee_id = employee.id, reason = %err, "status check skipped");
                continue;
            }
            Err(err) => return Err(err),
        };
        if decision.should_change {
            changes.push(StatusRecommendation {
                employee_id: employee.id,
                employee_no: employee.employee_no.clone(),
                name: employee.name.clone(),
                team: employee.team.clone(),
                old_grade: employee.grade,
                new_grade: decision.new_grade,
                reason: decision.reason,
                days_in_status: decision.days_in_status,
            });
        }
    }
    info!(count = changes.len(), date = %ctx.today, "status batch check finished");
    Ok(changes)
}

/// Commits one reviewed recommendation.
///
/// Refused when the employee's grade moved since the check.
pub fn apply_status_change(
    ctx: &mut EngineContext<'_>,
    recommendation: &StatusRecommendation,
    actor: &Actor,
) -> EngineResult<()> {
    let employee = ctx.store.employee(recommendation.employee_id)?;
    if employee.grade != recommendation.old_grade {
        return Err(EngineError::invalid_state(format!(
            "员工当前状态为{}，与检查结果不符，请重新检查",
            employee.grade
        )));
    }
    let employee_name = employee.name.clone();
    let today = ctx.today;

    ctx.transact(|tx, audit| {
        write_grade_change(
            tx,
            recommendation.employee_id,
            recommendation.new_grade,
            today,
            recommendation.reason.clone(),
            Some(recommendation.days_in_status),
            ChangeKind::Rule,
        )?;
        audit.record(
            AuditEntry::new(OperationType::StatusChange, "状态流转", "状态变更", actor)
                .employee(recommendation.employee_id, employee_name.as_str())
                .values(recommendation.old_grade.as_str(), recommendation.new_grade.as_str())
                .changes(json!({ "days_in_status": recommendation.days_in_status }))
                .reason(recommendation.reason.as_str()),
        )?;
        Ok(())
    })?;

    let content = format!(
        "您的状态已由{}变更为{}：{}",
        recommendation.old_grade, recommendation.new_grade, recommendation.reason
    );
    ctx.notify_employee(recommendation.employee_id, |user_id| {
        Notification::new(user_id, "状态变更", content, NotificationType::StatusChange)
    });
    Ok(())
}

/// Commits a reviewed batch one employee at a time.
///
/// Refusals are collected in the report; infrastructure failures abort.
pub fn apply_recommendations(
    ctx: &mut EngineContext<'_>,
    recommendations: &[StatusRecommendation],
    actor: &Actor,
) -> EngineResult<ApplyReport> {
    let mut report = ApplyReport::default();
    for recommendation in recommendations {
        match apply_status_change(ctx, recommendation, actor) {
            Ok(()) => report.applied.push(recommendation.employee_id),
            Err(err) if err.is_refusal() => {
                report.skipped.push((recommendation.employee_id, err.user_message()));
            }
            Err(err) => return Err(err),
        }
    }
    info!(
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        "status recommendations applied"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::WorkCalendar;
    use crate::error::ErrorKind;
    use crate::workflow::testing::*;

    #[test]
    fn test_trainee_recommended_after_three_days() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));

        let ctx = h.ctx(date(2025, 1, 4));
        let decision = check_status_transition(&ctx, id).unwrap();
        assert!(decision.should_change);
        assert_eq!(decision.new_grade, Grade::C);
    }

    #[test]
    fn test_c_promotion_uses_recent_valid_workdays() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::C, date(2025, 1, 1));
        h.orders(id, date(2025, 1, 3), 1);
        h.orders(id, date(2025, 1, 4), 1);
        h.orders(id, date(2025, 1, 5), 1);

        let ctx = h.ctx(date(2025, 1, 5));
        let decision = check_status_transition(&ctx, id).unwrap();
        assert_eq!(decision.new_grade, Grade::B);
    }

    #[test]
    fn test_invalid_days_do_not_count() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::C, date(2025, 1, 1));
        h.orders(id, date(2025, 1, 4), 1);
        h.orders(id, date(2025, 1, 5), 1);
        h.store
            .upsert_daily_record(id, date(2025, 1, 3), 5, Harness::commission_of(5), false)
            .unwrap();

        let ctx = h.ctx(date(2025, 1, 5));
        assert!(!check_status_transition(&ctx, id).unwrap().should_change);
    }

    #[test]
    fn test_batch_is_read_only() {
        let mut h = Harness::new();
        let trainee = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        let fresh = h.hire("E002", Grade::Trainee, date(2025, 1, 3));

        let recommendations = {
            let ctx = h.ctx(date(2025, 1, 4));
            batch_check_all_employees(&ctx).unwrap()
        };
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].employee_id, trainee);
        assert_eq!(h.store.employee(trainee).unwrap().grade, Grade::Trainee);
        assert_eq!(h.store.employee(fresh).unwrap().grade, Grade::Trainee);
        assert!(h.audit.is_empty());
    }

    #[test]
    fn test_apply_writes_one_history_entry() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        let mut ctx = h.ctx(date(2025, 1, 4));
        let recommendations = batch_check_all_employees(&ctx).unwrap();

        let report = apply_recommendations(&mut ctx, &recommendations, &admin()).unwrap();
        assert_eq!(report.applied, vec![id]);

        assert_eq!(h.store.employee(id).unwrap().grade, Grade::C);
        let history: Vec<_> = h.store.history_of(id).collect();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, "培训期满3天");
        assert_eq!(history[0].days_in_previous_grade, Some(3));
        assert_eq!(h.audit.by_operation(OperationType::StatusChange).count(), 1);
    }

    #[test]
    fn test_stale_recommendation_is_skipped() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        let mut ctx = h.ctx(date(2025, 1, 4));
        let recommendations = batch_check_all_employees(&ctx).unwrap();

        apply_recommendations(&mut ctx, &recommendations, &admin()).unwrap();
        let second = apply_recommendations(&mut ctx, &recommendations, &admin()).unwrap();

        assert!(second.applied.is_empty());
        assert_eq!(second.skipped.len(), 1);
        assert_eq!(h.store.history_of(id).count(), 1);
    }

    #[test]
    fn test_inactive_employee_never_changes() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        h.store.employee_mut(id).unwrap().is_active = false;

        let ctx = h.ctx(date(2025, 2, 1));
        assert!(!check_status_transition(&ctx, id).unwrap().should_change);
        assert!(batch_check_all_employees(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_short_window_is_refused_not_evaluated() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::A, date(2024, 12, 1));
        let mut calendar = WorkCalendar::new(5);
        calendar.set_override(date(2025, 1, 8), false, None);
        calendar.set_override(date(2025, 1, 9), false, None);
        *h.store.calendar_mut() = calendar;
        for day in [2, 3, 4, 5, 6, 7, 10] {
            h.orders(id, date(2025, 1, day), 4);
        }

        let ctx = h.ctx(date(2025, 1, 10));
        let err = check_status_transition(&ctx, id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PolicyViolation);
        assert_eq!(err.user_message(), "工作日数不足6天");

        assert!(batch_check_all_employees(&ctx).unwrap().is_empty());
        assert_eq!(h.store.employee(id).unwrap().grade, Grade::A);
    }
}
