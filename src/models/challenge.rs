//! Demotion challenge records.
//!
//! A challenge moves through a manager decision (`pending` → `downgrade` |
//! `challenge` | `cancelled`) and, for `challenge`, a result sub-state
//! (`ongoing` → `success` | `failed` | `cancelled`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::YearMonth;

/// The manager's decision on an at-risk A-grade employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeDecision {
    /// Awaiting a decision.
    Pending,
    /// Demote to C immediately.
    Downgrade,
    /// Give the employee a challenge window.
    Challenge,
    /// Withdraw the alert.
    Cancelled,
}

impl ChallengeDecision {
    /// The persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeDecision::Pending => "pending",
            ChallengeDecision::Downgrade => "downgrade",
            ChallengeDecision::Challenge => "challenge",
            ChallengeDecision::Cancelled => "cancelled",
        }
    }

    /// Whether this decision counts toward the monthly challenge limit.
    pub fn counts_toward_limit(&self) -> bool {
        match self {
            ChallengeDecision::Downgrade | ChallengeDecision::Challenge => true,
            ChallengeDecision::Pending | ChallengeDecision::Cancelled => false,
        }
    }
}

/// The outcome of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeResult {
    /// The challenge window is open.
    Ongoing,
    /// Target reached; the employee stays A.
    Success,
    /// Target missed or downgraded directly; the employee goes to C.
    Failed,
    /// The alert was withdrawn.
    Cancelled,
}

impl ChallengeResult {
    /// The persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeResult::Ongoing => "ongoing",
            ChallengeResult::Success => "success",
            ChallengeResult::Failed => "failed",
            ChallengeResult::Cancelled => "cancelled",
        }
    }
}

/// One at-risk event for an A-grade employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemotionChallenge {
    /// Record id.
    pub id: u64,
    /// The at-risk employee.
    pub employee_id: u64,
    /// Employee number at trigger time.
    pub employee_no: String,
    /// Employee name at trigger time.
    pub employee_name: String,
    /// The month the alert belongs to.
    pub year_month: YearMonth,
    /// When the alert was raised.
    pub trigger_date: NaiveDate,
    /// Orders in the trigger window.
    pub trigger_orders: u32,
    /// The manager's decision.
    pub decision: ChallengeDecision,
    /// Manager who decided.
    pub decision_by: Option<u64>,
    /// Name of the deciding manager.
    pub decision_name: Option<String>,
    /// When the decision was taken.
    pub decision_at: Option<DateTime<Utc>>,
    /// Reason given with the decision.
    pub decision_reason: Option<String>,
    /// When a demotion takes effect.
    pub effective_date: Option<NaiveDate>,
    /// First day of the challenge window.
    pub challenge_start_date: Option<NaiveDate>,
    /// Last day of the challenge window.
    pub challenge_end_date: Option<NaiveDate>,
    /// Orders achieved over the whole window, set on finalisation.
    pub challenge_orders: Option<u32>,
    /// Outcome; `None` until a decision is taken.
    pub challenge_result: Option<ChallengeResult>,
    /// Manager who confirmed the result.
    pub result_confirmed_by: Option<u64>,
    /// Name of the confirming manager.
    pub result_confirmed_name: Option<String>,
    /// When the result was confirmed.
    pub result_confirmed_at: Option<DateTime<Utc>>,
    /// Payroll treatment of the month: `challenge_success` or `challenge_failed`.
    pub salary_calculation_type: Option<String>,
}

impl DemotionChallenge {
    /// Pending decision or ongoing challenge.
    pub fn is_active(&self) -> bool {
        self.decision == ChallengeDecision::Pending
            || self.challenge_result == Some(ChallengeResult::Ongoing)
    }

    /// A running challenge window.
    pub fn is_ongoing(&self) -> bool {
        self.decision == ChallengeDecision::Challenge
            && self.challenge_result == Some(ChallengeResult::Ongoing)
    }
}
