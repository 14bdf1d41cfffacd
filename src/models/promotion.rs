//! Promotion confirmation records and their approval state machine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Grade;

/// Status of a promotion confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    /// Awaiting a manager decision.
    Pending,
    /// Approved; the grade change has been applied.
    Approved,
    /// Rejected; no grade change.
    Rejected,
    /// Overridden by an admin; any approved change was rolled back.
    Overridden,
}

/// An action on a promotion confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationAction {
    /// Manager approval.
    Approve,
    /// Manager rejection.
    Reject,
    /// Admin override.
    Override,
}

impl ConfirmationStatus {
    /// The persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationStatus::Pending => "pending",
            ConfirmationStatus::Approved => "approved",
            ConfirmationStatus::Rejected => "rejected",
            ConfirmationStatus::Overridden => "overridden",
        }
    }

    /// The status after `action`, or `None` when the action is not allowed.
    ///
    /// Approve and reject only leave `pending`; override is accepted from
    /// every state.
    pub fn apply(self, action: ConfirmationAction) -> Option<ConfirmationStatus> {
        match (self, action) {
            (ConfirmationStatus::Pending, ConfirmationAction::Approve) => {
                Some(ConfirmationStatus::Approved)
            }
            (ConfirmationStatus::Pending, ConfirmationAction::Reject) => {
                Some(ConfirmationStatus::Rejected)
            }
            (_, ConfirmationAction::Override) => Some(ConfirmationStatus::Overridden),
            (
                ConfirmationStatus::Approved
                | ConfirmationStatus::Rejected
                | ConfirmationStatus::Overridden,
                ConfirmationAction::Approve | ConfirmationAction::Reject,
            ) => None,
        }
    }
}

/// One triggered promotion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionConfirmation {
    /// Record id.
    pub id: u64,
    /// The employee to be promoted.
    pub employee_id: u64,
    /// Employee number at trigger time.
    pub employee_no: String,
    /// Employee name at trigger time.
    pub employee_name: String,
    /// Grade before promotion.
    pub from_grade: Grade,
    /// Grade after promotion.
    pub to_grade: Grade,
    /// When the eligibility check passed.
    pub trigger_date: NaiveDate,
    /// Eligibility explanation.
    pub trigger_reason: String,
    /// Workdays spent in `from_grade` at trigger time.
    pub days_in_status: u32,
    /// Orders in the evaluated window at trigger time.
    pub recent_orders: u32,
    /// Current status.
    pub status: ConfirmationStatus,
    /// Who approved or rejected the record.
    pub approver_id: Option<u64>,
    /// Name of the approver.
    pub approver_name: Option<String>,
    /// When the approval decision was taken.
    pub decided_at: Option<DateTime<Utc>>,
    /// When an approved change takes effect.
    pub effective_date: Option<NaiveDate>,
    /// Reason given on rejection.
    pub rejection_reason: Option<String>,
    /// Admin who overrode the record.
    pub overridden_by: Option<u64>,
    /// Reason given on override.
    pub override_reason: Option<String>,
}
