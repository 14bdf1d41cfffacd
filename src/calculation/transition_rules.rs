//! The grade transition table as a pure function.
//!
//! The status engine gathers the facts (days in grade, rolling-window
//! orders, monthly valid days) and this module decides.

use serde::{Deserialize, Serialize};

use crate::config::TransitionRules;
use crate::models::Grade;

/// Facts about one employee on one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionFacts {
    /// Calendar days since the last grade change or joining.
    pub days_in_status: i64,
    /// Orders over the grade's rolling workday window.
    pub recent_orders: u32,
    /// Day of month of the evaluation date.
    pub day_of_month: u32,
    /// Valid workdays recorded in the current month.
    pub monthly_valid_days: u32,
}

/// What the table says about one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDecision {
    /// Whether a grade change is recommended.
    pub should_change: bool,
    /// Grade at evaluation time.
    pub current_grade: Grade,
    /// Recommended grade; equals `current_grade` when nothing changes.
    pub new_grade: Grade,
    /// Explanation for the decision.
    pub reason: String,
    /// Days in the current grade.
    pub days_in_status: i64,
}

impl TransitionDecision {
    fn change(facts: &TransitionFacts, from: Grade, to: Grade, reason: String) -> Self {
        Self {
            should_change: true,
            current_grade: from,
            new_grade: to,
            reason,
            days_in_status: facts.days_in_status,
        }
    }

    fn stay(facts: &TransitionFacts, grade: Grade, reason: String) -> Self {
        Self {
            should_change: false,
            current_grade: grade,
            new_grade: grade,
            reason,
            days_in_status: facts.days_in_status,
        }
    }
}

/// The rolling workday window a grade is judged on, if any.
pub fn window_size(grade: Grade, rules: &TransitionRules) -> Option<u32> {
    match grade {
        Grade::C => Some(rules.c_grade.recent_workdays),
        Grade::B => Some(rules.b_grade.recent_workdays),
        Grade::A => Some(rules.a_grade.recent_workdays),
        Grade::Trainee | Grade::Eliminated => None,
    }
}

/// Applies the transition table.
///
/// # Example
///
/// ```
/// use callcenter_engine::calculation::{TransitionFacts, evaluate_transition};
/// use callcenter_engine::config::TransitionRules;
/// use callcenter_engine::models::Grade;
///
/// let facts = TransitionFacts {
///     days_in_status: 4,
///     recent_orders: 3,
///     day_of_month: 10,
///     monthly_valid_days: 4,
/// };
/// let decision = evaluate_transition(Grade::C, &facts, &TransitionRules::default());
/// assert!(decision.should_change);
/// assert_eq!(decision.new_grade, Grade::B);
/// ```
pub fn evaluate_transition(
    grade: Grade,
    facts: &TransitionFacts,
    rules: &TransitionRules,
) -> TransitionDecision {
    let days = facts.days_in_status;
    let orders = facts.recent_orders;

    match grade {
        Grade::Trainee => {
            let min_days = rules.trainee.min_days;
            if days >= min_days {
                TransitionDecision::change(facts, grade, Grade::C, format!("培训期满{}天", min_days))
            } else {
                TransitionDecision::stay(
                    facts,
                    grade,
                    format!("培训期未满{}天（当前{}天）", min_days, days),
                )
            }
        }
        Grade::C | Grade::B => {
            let (rule, up, down) = if grade == Grade::C {
                (&rules.c_grade, Grade::B, Grade::Eliminated)
            } else {
                (&rules.b_grade, Grade::A, Grade::C)
            };
            let window = rule.recent_workdays;

            if days < rule.window_opens_days {
                return TransitionDecision::stay(
                    facts,
                    grade,
                    format!("{}状态未满{}天（当前{}天）", grade, rule.window_opens_days, days),
                );
            }
            if days <= rule.max_days && orders >= rule.min_orders {
                return TransitionDecision::change(
                    facts,
                    grade,
                    up,
                    format!(
                        "{}天内最近{}天出单≥{}单（实际{}单）",
                        rule.max_days, window, rule.min_orders, orders
                    ),
                );
            }
            if days > rule.max_days && orders < rule.min_orders {
                return TransitionDecision::change(
                    facts,
                    grade,
                    down,
                    format!(
                        "超{}天最近{}天出单<{}单（实际{}单）",
                        rule.max_days, window, rule.min_orders, orders
                    ),
                );
            }
            TransitionDecision::stay(
                facts,
                grade,
                format!(
                    "暂不符合流转条件（在岗{}天，最近{}天{}单）",
                    days, window, orders
                ),
            )
        }
        Grade::A => {
            let rule = &rules.a_grade;
            if orders <= rule.demotion_max_orders {
                return TransitionDecision::change(
                    facts,
                    grade,
                    Grade::C,
                    format!(
                        "最近{}天出单≤{}单（实际{}单）",
                        rule.recent_workdays, rule.demotion_max_orders, orders
                    ),
                );
            }
            if facts.day_of_month >= rule.month_end_day
                && facts.monthly_valid_days < rule.min_monthly_valid_days
            {
                return TransitionDecision::change(
                    facts,
                    grade,
                    Grade::C,
                    format!(
                        "月末有效工作日<{}天（实际{}天）",
                        rule.min_monthly_valid_days, facts.monthly_valid_days
                    ),
                );
            }
            TransitionDecision::stay(
                facts,
                grade,
                format!("维持A级（最近{}天{}单）", rule.recent_workdays, orders),
            )
        }
        Grade::Eliminated => TransitionDecision::stay(facts, grade, "已淘汰".to_string()),
    }
}
