//! Promotion approval workflow.
//!
//! A confirmation is created when an employee passes the eligibility check
//! for their next grade and then moves `pending → approved | rejected`.
//! An admin override ends any confirmation and undoes an approved grade
//! change.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::WindowPromotionRule;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Actor, AuditEntry, ConfirmationAction, ConfirmationStatus, Employee, Grade, Notification,
    NotificationType, OperationType, PromotionConfirmation, Role,
};
use crate::store::PerformanceLedger;

use super::{ChangeKind, EngineContext, Receipt, write_grade_change};

/// Outcome of an eligibility check for one promotion edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityReport {
    /// Whether a confirmation may be created.
    pub eligible: bool,
    /// Workdays in the current grade, both ends counted.
    pub workdays: u32,
    /// Valid-day orders over the rolling window; 0 for trainees.
    pub recent_orders: u32,
    /// Whether a passed assessment exists; only checked for trainees.
    pub assessment_passed: Option<bool>,
    /// Explanation.
    pub reason: String,
}

impl EligibilityReport {
    fn refused(reason: impl Into<String>) -> Self {
        Self {
            eligible: false,
            workdays: 0,
            recent_orders: 0,
            assessment_passed: None,
            reason: reason.into(),
        }
    }
}

/// One confirmation created by the batch sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredPromotion {
    /// The new confirmation.
    pub promotion_id: u64,
    /// Employee number.
    pub employee_no: String,
    /// Employee name.
    pub name: String,
    /// Trigger message.
    pub message: String,
}

fn grade_start(ctx: &EngineContext<'_>, employee: &Employee) -> NaiveDate {
    let entry = match employee.grade {
        Grade::Trainee => ctx.store.latest_history(employee.id),
        grade => ctx.store.latest_history_into(employee.id, grade),
    };
    entry.map(|h| h.change_date).unwrap_or(employee.join_date)
}

fn workdays_in_grade(ctx: &EngineContext<'_>, employee: &Employee) -> u32 {
    let start = grade_start(ctx, employee);
    ctx.store
        .calendar()
        .count_workdays_between(start, ctx.today, true, true)
}

/// Trainee → C: enough workdays and a training assessment with both parts passed.
pub fn check_trainee_to_c(ctx: &EngineContext<'_>, employee_id: u64) -> EngineResult<EligibilityReport> {
    let employee = ctx.store.employee(employee_id)?;
    if employee.grade != Grade::Trainee {
        return Ok(EligibilityReport::refused("员工状态不是培训期"));
    }
    let rule = &ctx.rules.promotion.trainee_to_c;
    let workdays = workdays_in_grade(ctx, employee);
    let passed = ctx.store.latest_passed_assessment(employee_id).is_some();

    let workdays_met = workdays >= rule.workdays_required;
    let assessment_met = passed || !rule.requires_assessment;
    let reason = if !workdays_met {
        format!(
            "工作日不足（当前{}天，需要{}天）",
            workdays, rule.workdays_required
        )
    } else if !assessment_met {
        "未通过培训考核".to_string()
    } else {
        format!("已满足晋级条件（工作{}天，已通过考核）", workdays)
    };

    Ok(EligibilityReport {
        eligible: workdays_met && assessment_met,
        workdays,
        recent_orders: 0,
        assessment_passed: Some(passed),
        reason,
    })
}

fn check_window(
    ctx: &EngineContext<'_>,
    employee_id: u64,
    grade: Grade,
    rule: &WindowPromotionRule,
) -> EngineResult<EligibilityReport> {
    let employee = ctx.store.employee(employee_id)?;
    if employee.grade != grade {
        return Ok(EligibilityReport::refused(format!("员工状态不是{}级", grade)));
    }
    let workdays = workdays_in_grade(ctx, employee);
    let scan = ctx
        .store
        .calendar()
        .recent_workdays(ctx.today, rule.recent_workdays, true);
    if scan.len() < rule.recent_workdays as usize {
        return Ok(EligibilityReport {
            workdays,
            ..EligibilityReport::refused(format!("工作日数不足{}天", rule.recent_workdays))
        });
    }
    let recent_orders = ctx.store.sum_orders_on_dates(employee_id, &scan.days, true);

    let workdays_met = workdays <= rule.max_workdays;
    let orders_met = recent_orders >= rule.min_orders;
    let reason = if !workdays_met {
        format!(
            "{}级周期过长（当前{}天，要求≤{}天）",
            grade, workdays, rule.max_workdays
        )
    } else if !orders_met {
        format!(
            "最近{}个工作日出单不足（当前{}单，要求≥{}单）",
            rule.recent_workdays, recent_orders, rule.min_orders
        )
    } else {
        format!(
            "已满足晋级条件（{}级{}天，最近{}日出单{}单）",
            grade, workdays, rule.recent_workdays, recent_orders
        )
    };

    Ok(EligibilityReport {
        eligible: workdays_met && orders_met,
        workdays,
        recent_orders,
        assessment_passed: None,
        reason,
    })
}

/// C → B: short enough in C and enough recent orders.
pub fn check_c_to_b(ctx: &EngineContext<'_>, employee_id: u64) -> EngineResult<EligibilityReport> {
    check_window(ctx, employee_id, Grade::C, &ctx.rules.promotion.c_to_b)
}

/// B → A: short enough in B and enough recent orders.
pub fn check_b_to_a(ctx: &EngineContext<'_>, employee_id: u64) -> EngineResult<EligibilityReport> {
    check_window(ctx, employee_id, Grade::B, &ctx.rules.promotion.b_to_a)
}

/// Creates a pending confirmation when the employee is eligible for the next grade.
///
/// Refused, with nothing written, when a pending confirmation exists, the
/// grade has no promotion path or the eligibility check fails.
pub fn trigger_promotion_confirmation(
    ctx: &mut EngineContext<'_>,
    employee_id: u64,
    actor: &Actor,
) -> EngineResult<Receipt> {
    let employee = ctx.store.employee(employee_id)?.clone();

    if ctx.store.pending_promotion_of(employee_id).is_some() {
        return Err(EngineError::policy("已有待审批的晋级申请"));
    }
    let (report, to_grade) = match employee.grade {
        Grade::Trainee => (check_trainee_to_c(ctx, employee_id)?, Grade::C),
        Grade::C => (check_c_to_b(ctx, employee_id)?, Grade::B),
        Grade::B => (check_b_to_a(ctx, employee_id)?, Grade::A),
        Grade::A | Grade::Eliminated => {
            return Err(EngineError::policy(format!("状态{}无晋级路径", employee.grade)));
        }
    };
    if !report.eligible {
        debug!(employee_id, reason = %report.reason, "promotion not eligible");
        return Err(EngineError::policy(format!("不满足晋级条件：{}", report.reason)));
    }

    let today = ctx.today;
    let promotion_id = ctx.transact(|tx, audit| {
        let promotion_id = tx.insert_promotion(PromotionConfirmation {
            id: 0,
            employee_id,
            employee_no: employee.employee_no.clone(),
            employee_name: employee.name.clone(),
            from_grade: employee.grade,
            to_grade,
            trigger_date: today,
            trigger_reason: report.reason.clone(),
            days_in_status: report.workdays,
            recent_orders: report.recent_orders,
            status: ConfirmationStatus::Pending,
            approver_id: None,
            approver_name: None,
            decided_at: None,
            effective_date: None,
            rejection_reason: None,
            overridden_by: None,
            override_reason: None,
        });
        audit.record(
            AuditEntry::new(OperationType::Promotion, "晋级管理", "触发晋级", actor)
                .employee(employee_id, employee.name.as_str())
                .record(promotion_id)
                .values(employee.grade.as_str(), to_grade.as_str())
                .reason(report.reason.as_str()),
        )?;
        Ok(promotion_id)
    })?;
    info!(employee_id, promotion_id, from = %employee.grade, to = %to_grade, "promotion triggered");

    let content = format!(
        "员工 {}（{}）申请晋级，请及时审批",
        employee.name, employee.employee_no
    );
    ctx.notify_team_managers(&employee.team, |user_id| {
        Notification::new(user_id, "晋级待审批", content.as_str(), NotificationType::Promotion)
            .with_link(format!("/manager/promotions/{}", promotion_id))
    });

    Ok(Receipt::new(
        promotion_id,
        format!("晋级确认已触发：{} → {}", employee.grade, to_grade),
    ))
}

/// Approves a pending confirmation and applies the grade change.
///
/// The change takes effect on the next workday after `ctx.today`.
pub fn approve(ctx: &mut EngineContext<'_>, promotion_id: u64, actor: &Actor) -> EngineResult<Receipt> {
    let promotion = ctx.store.promotion(promotion_id)?.clone();
    let next = promotion
        .status
        .apply(ConfirmationAction::Approve)
        .ok_or_else(|| {
            EngineError::invalid_state(format!("当前状态为{}，不可批准", promotion.status.as_str()))
        })?;
    let current = ctx.store.employee(promotion.employee_id)?.grade;
    if current != promotion.from_grade {
        return Err(EngineError::invalid_state(format!(
            "员工当前状态为{}，与晋级申请不符",
            current
        )));
    }
    let effective_date = ctx.store.calendar().next_workday(ctx.today, 1).ok_or_else(|| {
        EngineError::policy(format!(
            "{}天内没有工作日，无法确定生效日期",
            ctx.store.calendar().max_scan_days()
        ))
    })?;

    ctx.transact(|tx, audit| {
        write_grade_change(
            tx,
            promotion.employee_id,
            promotion.to_grade,
            effective_date,
            format!("晋级确认通过（{}批准）", actor.name),
            Some(i64::from(promotion.days_in_status)),
            ChangeKind::Rule,
        )?;
        let record = tx.promotion_mut(promotion_id)?;
        record.status = next;
        record.approver_id = Some(actor.id);
        record.approver_name = Some(actor.name.clone());
        record.decided_at = Some(Utc::now());
        record.effective_date = Some(effective_date);
        audit.record(
            AuditEntry::new(OperationType::Promotion, "晋级管理", "批准晋级", actor)
                .employee(promotion.employee_id, promotion.employee_name.as_str())
                .record(promotion_id)
                .values(promotion.from_grade.as_str(), promotion.to_grade.as_str())
                .changes(json!({ "effective_date": effective_date })),
        )?;
        Ok(())
    })?;
    info!(promotion_id, employee_id = promotion.employee_id, %effective_date, "promotion approved");

    ctx.notify_employee(promotion.employee_id, |user_id| {
        Notification::new(
            user_id,
            "晋级通过",
            format!(
                "恭喜！您的晋级申请已通过，将于{}生效，晋升为{}级",
                effective_date, promotion.to_grade
            ),
            NotificationType::Promotion,
        )
    });
    Ok(Receipt::new(
        promotion_id,
        format!("晋级已批准，将于{}生效", effective_date),
    ))
}

/// Rejects a pending confirmation. A reason is required.
pub fn reject(
    ctx: &mut EngineContext<'_>,
    promotion_id: u64,
    actor: &Actor,
    reason: &str,
) -> EngineResult<Receipt> {
    let promotion = ctx.store.promotion(promotion_id)?.clone();
    let next = promotion
        .status
        .apply(ConfirmationAction::Reject)
        .ok_or_else(|| {
            EngineError::invalid_state(format!("当前状态为{}，不可驳回", promotion.status.as_str()))
        })?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(EngineError::invalid_input("必须填写驳回原因"));
    }

    ctx.transact(|tx, audit| {
        let record = tx.promotion_mut(promotion_id)?;
        record.status = next;
        record.approver_id = Some(actor.id);
        record.approver_name = Some(actor.name.clone());
        record.decided_at = Some(Utc::now());
        record.rejection_reason = Some(reason.to_string());
        audit.record(
            AuditEntry::new(OperationType::Promotion, "晋级管理", "驳回晋级", actor)
                .employee(promotion.employee_id, promotion.employee_name.as_str())
                .record(promotion_id)
                .values(promotion.from_grade.as_str(), promotion.to_grade.as_str())
                .reason(reason),
        )?;
        Ok(())
    })?;
    info!(promotion_id, employee_id = promotion.employee_id, "promotion rejected");

    ctx.notify_employee(promotion.employee_id, |user_id| {
        Notification::new(
            user_id,
            "晋级未通过",
            format!("您的晋级申请未通过。原因：{}", reason),
            NotificationType::Promotion,
        )
    });
    Ok(Receipt::new(promotion_id, "晋级已驳回"))
}

/// Admin override from any state.
///
/// When the confirmation had been approved the employee is moved back to
/// the confirmation's `from_grade`.
pub fn override_promotion(
    ctx: &mut EngineContext<'_>,
    promotion_id: u64,
    actor: &Actor,
    reason: &str,
) -> EngineResult<Receipt> {
    if actor.role != Role::Admin {
        return Err(EngineError::permission("仅管理员可否决晋级"));
    }
    let promotion = ctx.store.promotion(promotion_id)?.clone();
    let next = promotion
        .status
        .apply(ConfirmationAction::Override)
        .ok_or_else(|| {
            EngineError::invalid_state(format!("当前状态为{}，不可否决", promotion.status.as_str()))
        })?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(EngineError::invalid_input("必须填写否决原因"));
    }
    let original = promotion.status;
    let today = ctx.today;

    ctx.transact(|tx, audit| {
        if original == ConfirmationStatus::Approved {
            write_grade_change(
                tx,
                promotion.employee_id,
                promotion.from_grade,
                today,
                format!("晋级被管理员否决：{}", reason),
                None,
                ChangeKind::Rollback,
            )?;
        }
        let record = tx.promotion_mut(promotion_id)?;
        record.status = next;
        record.overridden_by = Some(actor.id);
        record.override_reason = Some(reason.to_string());
        audit.record(
            AuditEntry::new(OperationType::Promotion, "晋级管理", "否决晋级", actor)
                .employee(promotion.employee_id, promotion.employee_name.as_str())
                .record(promotion_id)
                .values(original.as_str(), next.as_str())
                .reason(reason),
        )?;
        Ok(())
    })?;
    info!(
        promotion_id,
        employee_id = promotion.employee_id,
        rolled_back = original == ConfirmationStatus::Approved,
        "promotion overridden"
    );
    Ok(Receipt::new(promotion_id, "晋级已被管理员否决"))
}

/// Triggers confirmations for every eligible active employee.
///
/// Refusals are skipped; infrastructure failures abort the sweep.
pub fn check_all_employees_for_promotion(
    ctx: &mut EngineContext<'_>,
    actor: &Actor,
) -> EngineResult<Vec<TriggeredPromotion>> {
    let candidates: Vec<(u64, String, String)> = ctx
        .store
        .active_employees()
        .filter(|e| e.grade.promotion_target().is_some())
        .map(|e| (e.id, e.employee_no.clone(), e.name.clone()))
        .collect();

    let mut triggered = Vec::new();
    for (employee_id, employee_no, name) in candidates {
        match trigger_promotion_confirmation(ctx, employee_id, actor) {
            Ok(receipt) => triggered.push(TriggeredPromotion {
                promotion_id: receipt.record_id.unwrap_or_default(),
                employee_no,
                name,
                message: receipt.message,
            }),
            Err(err) if err.is_refusal() => {
                debug!(employee_id, reason = %err, "promotion not triggered");
            }
            Err(err) => return Err(err),
        }
    }
    info!(count = triggered.len(), "promotion sweep finished");
    Ok(triggered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::TrainingAssessment;
    use crate::workflow::testing::*;

    fn pass_assessment(h: &mut Harness, employee_id: u64) {
        h.store.add_assessment(TrainingAssessment {
            id: 0,
            employee_id,
            assessment_date: date(2025, 1, 2),
            script_passed: true,
            mock_order_passed: true,
            assessor_name: "培训师".to_string(),
        });
    }

    #[test]
    fn test_trainee_without_assessment_is_refused() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        let mut ctx = h.ctx(date(2025, 1, 3));

        let err = trigger_promotion_confirmation(&mut ctx, id, &admin()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PolicyViolation);
        assert!(err.user_message().contains("未通过培训考核"));
        assert_eq!(h.store.promotions().count(), 0);
    }

    #[test]
    fn test_trainee_with_assessment_creates_pending() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        pass_assessment(&mut h, id);
        let mut ctx = h.ctx(date(2025, 1, 3));

        let receipt = trigger_promotion_confirmation(&mut ctx, id, &admin()).unwrap();
        let promotion = h.store.promotion(receipt.record_id.unwrap()).unwrap();
        assert_eq!(promotion.status, ConfirmationStatus::Pending);
        assert_eq!(promotion.from_grade, Grade::Trainee);
        assert_eq!(promotion.to_grade, Grade::C);
        assert_eq!(h.outbox.messages().filter(|m| m.title == "晋级待审批").count(), 1);
    }

    #[test]
    fn test_second_trigger_refused_while_pending() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        pass_assessment(&mut h, id);
        let mut ctx = h.ctx(date(2025, 1, 3));

        trigger_promotion_confirmation(&mut ctx, id, &admin()).unwrap();
        let err = trigger_promotion_confirmation(&mut ctx, id, &admin()).unwrap_err();
        assert_eq!(err.user_message(), "已有待审批的晋级申请");
        assert_eq!(h.store.promotions().count(), 1);
    }

    #[test]
    fn test_too_few_workdays() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        let ctx = h.ctx(date(2025, 1, 2));
        let report = check_trainee_to_c(&ctx, id).unwrap();
        assert!(!report.eligible);
        assert_eq!(report.reason, "工作日不足（当前2天，需要3天）");
    }

    #[test]
    fn test_c_to_b_window() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::C, date(2025, 1, 1));
        h.orders(id, date(2025, 1, 2), 1);
        h.orders(id, date(2025, 1, 3), 1);

        let ctx = h.ctx(date(2025, 1, 3));
        let report = check_c_to_b(&ctx, id).unwrap();
        assert!(!report.eligible);
        assert_eq!(report.reason, "最近3个工作日出单不足（当前2单，要求≥3单）");

        h.orders(id, date(2025, 1, 1), 1);
        let ctx = h.ctx(date(2025, 1, 3));
        assert!(check_c_to_b(&ctx, id).unwrap().eligible);
    }

    #[test]
    fn test_c_too_long_is_ineligible() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::C, date(2025, 1, 1));
        for day in 6..=8 {
            h.orders(id, date(2025, 1, day), 5);
        }
        let ctx = h.ctx(date(2025, 1, 8));
        let report = check_c_to_b(&ctx, id).unwrap();
        assert!(!report.eligible);
        assert_eq!(report.reason, "C级周期过长（当前8天，要求≤6天）");
    }

    #[test]
    fn test_window_needs_enough_workdays() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::B, date(2025, 1, 1));
        *h.store.calendar_mut() = crate::calculation::WorkCalendar::new(3);

        let ctx = h.ctx(date(2025, 1, 3));
        let report = check_b_to_a(&ctx, id).unwrap();
        assert!(!report.eligible);
        assert_eq!(report.reason, "工作日数不足6天");
    }

    #[test]
    fn test_approve_applies_grade_on_next_workday() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        pass_assessment(&mut h, id);
        h.store.calendar_mut().set_override(date(2025, 1, 4), false, Some("周六".to_string()));
        let mut ctx = h.ctx(date(2025, 1, 3));

        let promotion_id = trigger_promotion_confirmation(&mut ctx, id, &admin())
            .unwrap()
            .record_id
            .unwrap();
        let receipt = approve(&mut ctx, promotion_id, &manager()).unwrap();
        assert_eq!(receipt.message, "晋级已批准，将于2025-01-05生效");

        assert_eq!(h.store.employee(id).unwrap().grade, Grade::C);
        let promotion = h.store.promotion(promotion_id).unwrap();
        assert_eq!(promotion.status, ConfirmationStatus::Approved);
        assert_eq!(promotion.effective_date, Some(date(2025, 1, 5)));
        let history: Vec<_> = h.store.history_of(id).collect();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, "晋级确认通过（王经理批准）");
    }

    #[test]
    fn test_reapprove_is_invalid_state_without_side_effects() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        pass_assessment(&mut h, id);
        let mut ctx = h.ctx(date(2025, 1, 3));

        let promotion_id = trigger_promotion_confirmation(&mut ctx, id, &admin())
            .unwrap()
            .record_id
            .unwrap();
        approve(&mut ctx, promotion_id, &manager()).unwrap();
        let audit_before = h.audit.len();

        let mut ctx = h.ctx(date(2025, 1, 3));
        let err = approve(&mut ctx, promotion_id, &manager()).unwrap_err();
        assert_eq!(err.user_message(), "当前状态为approved，不可批准");
        assert_eq!(h.store.history_of(id).count(), 1);
        assert_eq!(h.audit.len(), audit_before);
    }

    #[test]
    fn test_reject_requires_reason() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        pass_assessment(&mut h, id);
        let mut ctx = h.ctx(date(2025, 1, 3));
        let promotion_id = trigger_promotion_confirmation(&mut ctx, id, &admin())
            .unwrap()
            .record_id
            .unwrap();

        let err = reject(&mut ctx, promotion_id, &manager(), "  ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let receipt = reject(&mut ctx, promotion_id, &manager(), "出单不稳定").unwrap();
        assert_eq!(receipt.message, "晋级已驳回");
        assert_eq!(h.store.employee(id).unwrap().grade, Grade::Trainee);
        let promotion = h.store.promotion(promotion_id).unwrap();
        assert_eq!(promotion.status, ConfirmationStatus::Rejected);
        assert_eq!(promotion.rejection_reason.as_deref(), Some("出单不稳定"));
    }

    #[test]
    fn test_override_rolls_back_approved_grade() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        pass_assessment(&mut h, id);
        let mut ctx = h.ctx(date(2025, 1, 3));
        let promotion_id = trigger_promotion_confirmation(&mut ctx, id, &admin())
            .unwrap()
            .record_id
            .unwrap();
        approve(&mut ctx, promotion_id, &manager()).unwrap();

        let err = override_promotion(&mut ctx, promotion_id, &manager(), "误批").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionScope);

        let receipt = override_promotion(&mut ctx, promotion_id, &admin(), "误批").unwrap();
        assert_eq!(receipt.message, "晋级已被管理员否决");
        assert_eq!(h.store.employee(id).unwrap().grade, Grade::Trainee);
        assert_eq!(
            h.store.promotion(promotion_id).unwrap().status,
            ConfirmationStatus::Overridden
        );
        assert_eq!(h.store.history_of(id).count(), 2);
    }

    #[test]
    fn test_same_day_override_restarts_trainee_clock() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        pass_assessment(&mut h, id);
        let mut ctx = h.ctx(date(2025, 1, 3));
        let promotion_id = trigger_promotion_confirmation(&mut ctx, id, &admin())
            .unwrap()
            .record_id
            .unwrap();
        approve(&mut ctx, promotion_id, &manager()).unwrap();
        override_promotion(&mut ctx, promotion_id, &admin(), "误批").unwrap();

        let latest = h.store.latest_history(id).unwrap();
        assert_eq!(latest.to_grade, Grade::Trainee);
        assert_eq!(latest.change_date, date(2025, 1, 3));

        let ctx = h.ctx(date(2025, 1, 6));
        let decision = crate::workflow::status::check_status_transition(&ctx, id).unwrap();
        assert!(decision.should_change);
        assert_eq!(decision.new_grade, Grade::C);
        assert_eq!(decision.days_in_status, 3);
    }

    #[test]
    fn test_override_pending_has_no_grade_effect() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        pass_assessment(&mut h, id);
        let mut ctx = h.ctx(date(2025, 1, 3));
        let promotion_id = trigger_promotion_confirmation(&mut ctx, id, &admin())
            .unwrap()
            .record_id
            .unwrap();

        override_promotion(&mut ctx, promotion_id, &admin(), "暂缓").unwrap();
        assert_eq!(h.store.history_of(id).count(), 0);
        assert_eq!(h.store.employee(id).unwrap().grade, Grade::Trainee);
    }

    #[test]
    fn test_sweep_triggers_only_eligible() {
        let mut h = Harness::new();
        let ready = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        h.hire("E002", Grade::Trainee, date(2025, 1, 1));
        h.hire("E003", Grade::A, date(2025, 1, 1));
        pass_assessment(&mut h, ready);

        let mut ctx = h.ctx(date(2025, 1, 3));
        let triggered = check_all_employees_for_promotion(&mut ctx, &admin()).unwrap();
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].employee_no, "E001");
    }
}
