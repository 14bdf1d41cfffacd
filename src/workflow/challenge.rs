//! Demotion challenge workflow for A-grade employees.
//!
//! A low rolling-window order count raises a pending alert. The manager
//! then downgrades, starts a challenge window or cancels. A challenge is
//! judged once its window has passed and finalised by the manager.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calculation::add_days;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Actor, AuditEntry, ChallengeDecision, ChallengeResult, DemotionChallenge, Grade, Notification,
    NotificationType, OperationType, YearMonth,
};
use crate::store::PerformanceLedger;

use super::{ChangeKind, EngineContext, Receipt, write_grade_change};

/// Whether an A-grade employee should get a demotion alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemotionAlertCheck {
    /// Whether the alert condition holds.
    pub should_alert: bool,
    /// Valid-day orders over the trigger window.
    pub recent_orders: u32,
    /// Alert when `recent_orders` is at or below this.
    pub threshold: u32,
    /// Explanation.
    pub reason: String,
}

/// Where a challenge stands on `ctx.today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChallengeProgress {
    /// The window has not ended yet.
    InProgress {
        /// Orders so far.
        current_orders: u32,
        /// Orders needed.
        target_orders: u32,
    },
    /// The window has ended.
    Completed {
        /// Whether the target was reached.
        success: bool,
        /// Orders over the whole window.
        orders: u32,
        /// Orders needed.
        target_orders: u32,
    },
}

impl ChallengeProgress {
    /// Whether the window has ended.
    pub fn is_completed(&self) -> bool {
        matches!(self, ChallengeProgress::Completed { .. })
    }

    /// Text for the user.
    pub fn message(&self) -> String {
        match self {
            ChallengeProgress::InProgress {
                current_orders,
                target_orders,
            } => format!("挑战进行中：当前{}单，目标{}单", current_orders, target_orders),
            ChallengeProgress::Completed {
                success,
                orders,
                target_orders,
            } => format!(
                "挑战{}：出单{}单（目标{}单）",
                if *success { "成功" } else { "失败" },
                orders,
                target_orders
            ),
        }
    }
}

/// A challenge whose window has ended but which nobody has finalised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeReview {
    /// The challenge.
    pub challenge_id: u64,
    /// The employee.
    pub employee_id: u64,
    /// Employee name.
    pub employee_name: String,
    /// The judged result.
    pub progress: ChallengeProgress,
}

/// Checks the alert condition for one employee.
///
/// Refused when the trigger window cannot be filled with workdays.
pub fn check_a_level_demotion_alert(
    ctx: &EngineContext<'_>,
    employee_id: u64,
) -> EngineResult<DemotionAlertCheck> {
    let employee = ctx.store.employee(employee_id)?;
    let trigger = &ctx.rules.challenge.trigger;
    let quiet = |reason: &str| DemotionAlertCheck {
        should_alert: false,
        recent_orders: 0,
        threshold: trigger.max_orders,
        reason: reason.to_string(),
    };

    if employee.grade != Grade::A {
        return Ok(quiet("员工状态不是A级"));
    }
    if ctx.store.challenges_of(employee_id).any(|c| c.is_ongoing()) {
        return Ok(quiet("正在进行保级挑战"));
    }

    let scan = ctx
        .store
        .calendar()
        .recent_workdays(ctx.today, trigger.recent_workdays, true);
    if scan.len() < trigger.recent_workdays as usize {
        return Err(EngineError::policy(format!(
            "工作日数不足{}天",
            trigger.recent_workdays
        )));
    }
    let recent_orders = ctx.store.sum_orders_on_dates(employee_id, &scan.days, true);
    let should_alert = recent_orders <= trigger.max_orders;
    let reason = if should_alert {
        format!(
            "最近{}个工作日出单{}单，低于{}单阈值",
            trigger.recent_workdays, recent_orders, trigger.max_orders
        )
    } else {
        format!(
            "最近{}个工作日出单{}单，表现良好",
            trigger.recent_workdays, recent_orders
        )
    };

    Ok(DemotionAlertCheck {
        should_alert,
        recent_orders,
        threshold: trigger.max_orders,
        reason,
    })
}

/// Raises a pending demotion alert.
pub fn trigger_demotion_alert(
    ctx: &mut EngineContext<'_>,
    employee_id: u64,
    actor: &Actor,
) -> EngineResult<Receipt> {
    let employee = ctx.store.employee(employee_id)?.clone();
    if employee.grade != Grade::A {
        return Err(EngineError::policy("仅A级员工可触发保级挑战"));
    }
    if ctx
        .store
        .challenges_of(employee_id)
        .any(|c| c.decision == ChallengeDecision::Pending)
    {
        return Err(EngineError::policy("已有待处理的降级预警"));
    }

    let month = YearMonth::of(ctx.today);
    let limit = ctx.rules.challenge.monthly_limit;
    let used = ctx
        .store
        .challenges_of(employee_id)
        .filter(|c| c.year_month == month && c.decision.counts_toward_limit())
        .count();
    if used >= limit as usize {
        return Err(EngineError::policy(format!(
            "本月已达到保级挑战次数上限（{}次）",
            limit
        )));
    }

    let check = check_a_level_demotion_alert(ctx, employee_id)?;
    if !check.should_alert {
        return Err(EngineError::policy(format!("未触发降级条件：{}", check.reason)));
    }

    let today = ctx.today;
    let challenge_id = ctx.transact(|tx, audit| {
        let challenge_id = tx.insert_challenge(DemotionChallenge {
            id: 0,
            employee_id,
            employee_no: employee.employee_no.clone(),
            employee_name: employee.name.clone(),
            year_month: month,
            trigger_date: today,
            trigger_orders: check.recent_orders,
            decision: ChallengeDecision::Pending,
            decision_by: None,
            decision_name: None,
            decision_at: None,
            decision_reason: None,
            effective_date: None,
            challenge_start_date: None,
            challenge_end_date: None,
            challenge_orders: None,
            challenge_result: None,
            result_confirmed_by: None,
            result_confirmed_name: None,
            result_confirmed_at: None,
            salary_calculation_type: None,
        });
        audit.record(
            AuditEntry::new(OperationType::Challenge, "保级挑战", "触发降级预警", actor)
                .employee(employee_id, employee.name.as_str())
                .record(challenge_id)
                .reason(check.reason.as_str()),
        )?;
        Ok(challenge_id)
    })?;
    info!(employee_id, challenge_id, recent_orders = check.recent_orders, "demotion alert raised");

    let manager_content = format!(
        "A级员工 {}（{}）触发降级预警，请尽快处理",
        employee.name, employee.employee_no
    );
    ctx.notify_team_managers(&employee.team, |user_id| {
        Notification::new(
            user_id,
            "降级预警待处理",
            manager_content.as_str(),
            NotificationType::ChallengeTriggered,
        )
        .with_link(format!("/manager/challenges/{}", challenge_id))
    });
    ctx.notify_employee(employee_id, |user_id| {
        Notification::new(
            user_id,
            "降级预警通知",
            "您的业绩触发降级预警，请关注主管的处理决定",
            NotificationType::ChallengeTriggered,
        )
    });

    Ok(Receipt::new(
        challenge_id,
        format!("降级预警已触发：{}", check.reason),
    ))
}

/// Records the manager's decision on a pending alert.
///
/// `downgrade` moves the employee to C from tomorrow. `challenge` opens a
/// window of the next workdays after today, falling back to consecutive
/// calendar days when the calendar cannot supply them. `cancelled` ends the
/// alert with no grade change.
pub fn decide(
    ctx: &mut EngineContext<'_>,
    challenge_id: u64,
    decision: ChallengeDecision,
    actor: &Actor,
    reason: Option<&str>,
) -> EngineResult<Receipt> {
    let challenge = ctx.store.challenge(challenge_id)?.clone();
    if challenge.decision != ChallengeDecision::Pending {
        return Err(EngineError::invalid_state(format!(
            "当前状态为{}，不可再次决策",
            challenge.decision.as_str()
        )));
    }
    let reason_text = reason.map(str::trim).unwrap_or_default().to_string();
    let employee_id = challenge.employee_id;
    let today = ctx.today;

    match decision {
        ChallengeDecision::Pending => Err(EngineError::invalid_input("无效的决策类型：pending")),
        ChallengeDecision::Downgrade => {
            if ctx.store.employee(employee_id)?.grade != Grade::A {
                return Err(EngineError::invalid_state("员工当前不是A级，不能降级"));
            }
            let effective_date = add_days(today, 1);
            ctx.transact(|tx, audit| {
                write_grade_change(
                    tx,
                    employee_id,
                    Grade::C,
                    effective_date,
                    format!("经理确认降级：{}", reason_text),
                    None,
                    ChangeKind::Rule,
                )?;
                let record = tx.challenge_mut(challenge_id)?;
                mark_decided(record, decision, actor, &reason_text);
                record.effective_date = Some(effective_date);
                record.challenge_result = Some(ChallengeResult::Failed);
                record_decision(audit, &challenge, decision, actor, &reason_text)
            })?;
            let message = format!("已确认降级，将于{}生效", effective_date);
            info!(challenge_id, employee_id, %effective_date, "downgrade confirmed");
            let content = message.clone();
            ctx.notify_employee(employee_id, |user_id| {
                Notification::new(user_id, "降级通知", content, NotificationType::ChallengeFailed)
            });
            Ok(Receipt::new(challenge_id, message))
        }
        ChallengeDecision::Challenge => {
            let period = ctx.rules.challenge.period;
            let scan = ctx
                .store
                .calendar()
                .next_n_workdays(today, period.workdays, false);
            let (start, end) = match (scan.first(), scan.last()) {
                (Some(first), Some(last)) if scan.len() >= period.workdays as usize => (first, last),
                _ => {
                    debug!(challenge_id, "not enough workdays ahead, using calendar days");
                    (
                        add_days(today, 1),
                        add_days(today, u64::from(period.workdays.max(1))),
                    )
                }
            };
            let display_label = ctx.rules.challenge.display_label.clone();

            ctx.transact(|tx, audit| {
                let record = tx.challenge_mut(challenge_id)?;
                mark_decided(record, decision, actor, &reason_text);
                record.challenge_start_date = Some(start);
                record.challenge_end_date = Some(end);
                record.challenge_result = Some(ChallengeResult::Ongoing);

                let employee = tx.employee_mut(employee_id)?;
                let same_month = employee
                    .last_challenge_date
                    .is_some_and(|last| YearMonth::of(last) == YearMonth::of(start));
                employee.challenge_count_this_month = if same_month {
                    employee.challenge_count_this_month + 1
                } else {
                    1
                };
                employee.current_challenge_id = Some(challenge_id);
                employee.last_challenge_date = Some(start);
                employee.status_display = Some(display_label);
                record_decision(audit, &challenge, decision, actor, &reason_text)
            })?;
            info!(challenge_id, employee_id, %start, %end, "challenge started");

            ctx.notify_employee(employee_id, |user_id| {
                Notification::new(
                    user_id,
                    "保级挑战已启动",
                    format!(
                        "保级挑战期：{} 至 {}，目标：{}单",
                        start, end, period.target_orders
                    ),
                    NotificationType::ChallengeTriggered,
                )
            });
            Ok(Receipt::new(
                challenge_id,
                format!("保级挑战已启动：{} 至 {}", start, end),
            ))
        }
        ChallengeDecision::Cancelled => {
            ctx.transact(|tx, audit| {
                let record = tx.challenge_mut(challenge_id)?;
                mark_decided(record, decision, actor, &reason_text);
                record.challenge_result = Some(ChallengeResult::Cancelled);
                record_decision(audit, &challenge, decision, actor, &reason_text)
            })?;
            info!(challenge_id, employee_id, "demotion alert cancelled");

            let content = format!("您的降级预警已取消。原因：{}", reason_text);
            ctx.notify_employee(employee_id, |user_id| {
                Notification::new(user_id, "降级预警已取消", content, NotificationType::StatusChange)
            });
            Ok(Receipt::new(
                challenge_id,
                format!("降级预警已取消：{}", reason_text),
            ))
        }
    }
}

fn mark_decided(
    record: &mut DemotionChallenge,
    decision: ChallengeDecision,
    actor: &Actor,
    reason: &str,
) {
    record.decision = decision;
    record.decision_by = Some(actor.id);
    record.decision_name = Some(actor.name.clone());
    record.decision_at = Some(Utc::now());
    record.decision_reason = (!reason.is_empty()).then(|| reason.to_string());
}

fn record_decision(
    audit: &mut dyn crate::store::AuditSink,
    challenge: &DemotionChallenge,
    decision: ChallengeDecision,
    actor: &Actor,
    reason: &str,
) -> EngineResult<()> {
    audit.record(
        AuditEntry::new(OperationType::Challenge, "保级挑战", "经理决策", actor)
            .employee(challenge.employee_id, challenge.employee_name.as_str())
            .record(challenge.id)
            .values(ChallengeDecision::Pending.as_str(), decision.as_str())
            .reason(reason),
    )?;
    Ok(())
}

/// Judges a challenge against its window on `ctx.today`.
pub fn check_challenge_completion(
    ctx: &EngineContext<'_>,
    challenge_id: u64,
) -> EngineResult<ChallengeProgress> {
    let challenge = ctx.store.challenge(challenge_id)?;
    if challenge.decision != ChallengeDecision::Challenge {
        return Err(EngineError::invalid_state("不是保级挑战"));
    }
    let target_orders = ctx.rules.challenge.period.target_orders;

    if challenge.challenge_result != Some(ChallengeResult::Ongoing) {
        return Ok(ChallengeProgress::Completed {
            success: challenge.challenge_result == Some(ChallengeResult::Success),
            orders: challenge.challenge_orders.unwrap_or_default(),
            target_orders,
        });
    }
    let (Some(start), Some(end)) = (challenge.challenge_start_date, challenge.challenge_end_date)
    else {
        return Err(EngineError::invalid_state("挑战期未设置"));
    };

    if ctx.today <= end {
        let current_orders = ctx
            .store
            .sum_orders(challenge.employee_id, start..=ctx.today, true);
        return Ok(ChallengeProgress::InProgress {
            current_orders,
            target_orders,
        });
    }
    let orders = ctx.store.sum_orders(challenge.employee_id, start..=end, true);
    Ok(ChallengeProgress::Completed {
        success: orders >= target_orders,
        orders,
        target_orders,
    })
}

/// Confirms the result of a completed challenge.
///
/// A failed challenge moves the employee to C from tomorrow; a successful
/// one keeps A. Either way the challenge flag on the employee is cleared.
pub fn finalize_challenge(
    ctx: &mut EngineContext<'_>,
    challenge_id: u64,
    actor: &Actor,
) -> EngineResult<Receipt> {
    let challenge = ctx.store.challenge(challenge_id)?.clone();
    if challenge.decision == ChallengeDecision::Challenge && !challenge.is_ongoing() {
        return Err(EngineError::invalid_state("挑战已完成"));
    }
    let progress = check_challenge_completion(ctx, challenge_id)?;
    let ChallengeProgress::Completed {
        success,
        orders,
        target_orders,
    } = progress
    else {
        return Err(EngineError::policy(progress.message()));
    };

    let employee_id = challenge.employee_id;
    let effective_date = add_days(ctx.today, 1);
    let result = if success {
        ChallengeResult::Success
    } else {
        ChallengeResult::Failed
    };

    ctx.transact(|tx, audit| {
        if !success {
            write_grade_change(
                tx,
                employee_id,
                Grade::C,
                effective_date,
                format!("保级挑战失败（{}单<{}单）", orders, target_orders),
                None,
                ChangeKind::Rule,
            )?;
        }
        let employee = tx.employee_mut(employee_id)?;
        employee.current_challenge_id = None;
        employee.status_display = None;

        let record = tx.challenge_mut(challenge_id)?;
        record.challenge_orders = Some(orders);
        record.challenge_result = Some(result);
        record.result_confirmed_by = Some(actor.id);
        record.result_confirmed_name = Some(actor.name.clone());
        record.result_confirmed_at = Some(Utc::now());
        record.salary_calculation_type = Some(
            if success {
                "challenge_success"
            } else {
                "challenge_failed"
            }
            .to_string(),
        );
        if !success {
            record.effective_date = Some(effective_date);
        }
        audit.record(
            AuditEntry::new(OperationType::Challenge, "保级挑战", "确认挑战结果", actor)
                .employee(employee_id, challenge.employee_name.as_str())
                .record(challenge_id)
                .values(ChallengeResult::Ongoing.as_str(), result.as_str())
                .reason(progress.message()),
        )?;
        Ok(())
    })?;
    info!(challenge_id, employee_id, success, orders, "challenge finalised");

    ctx.notify_employee(employee_id, |user_id| {
        if success {
            Notification::new(
                user_id,
                "保级挑战成功",
                format!("恭喜！您的保级挑战成功（{}单），继续保持A级", orders),
                NotificationType::ChallengeSuccess,
            )
        } else {
            Notification::new(
                user_id,
                "保级挑战失败",
                format!(
                    "很遗憾，保级挑战未达标（{}单<{}单），将降级为C级",
                    orders, target_orders
                ),
                NotificationType::ChallengeFailed,
            )
        }
    });

    let message = if success {
        "保级挑战成功，维持A级".to_string()
    } else {
        format!("保级挑战失败，将于{}降级为C级", effective_date)
    };
    Ok(Receipt::new(challenge_id, message))
}

/// Lists ongoing challenges whose window has ended, for manager review.
pub fn batch_check_challenges(ctx: &EngineContext<'_>) -> EngineResult<Vec<ChallengeReview>> {
    let mut reviews = Vec::new();
    for challenge in ctx.store.challenges().filter(|c| c.is_ongoing()) {
        let progress = check_challenge_completion(ctx, challenge.id)?;
        if progress.is_completed() {
            reviews.push(ChallengeReview {
                challenge_id: challenge.id,
                employee_id: challenge.employee_id,
                employee_name: challenge.employee_name.clone(),
                progress,
            });
        }
    }
    info!(pending = reviews.len(), "challenge batch check finished");
    Ok(reviews)
}
