//! Audit log entries and user notifications.
//!
//! Both are produced by the workflows and handed to the audit and
//! notification sinks; the engine never reads them back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Actor;

/// The business area an audit entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Promotion triggers and decisions.
    Promotion,
    /// Demotion challenge events.
    Challenge,
    /// Training assessments.
    Training,
    /// Work calendar changes.
    Calendar,
    /// Payroll generation, adjustment and payment.
    Payroll,
    /// Direct grade changes from the status engine.
    StatusChange,
    /// Performance entry.
    Performance,
}

/// One append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Business area.
    pub operation_type: OperationType,
    /// Module name, e.g. `promotion_confirmation`.
    pub module: String,
    /// Action name, e.g. `approve`.
    pub action: String,
    /// Employee affected, if any.
    pub target_employee_id: Option<u64>,
    /// Name of the affected employee.
    pub target_employee_name: Option<String>,
    /// Record affected, if any.
    pub target_record_id: Option<u64>,
    /// Value before the change.
    pub before: Option<String>,
    /// Value after the change.
    pub after: Option<String>,
    /// Structured change detail.
    pub changes: Option<serde_json::Value>,
    /// Reason supplied with the action.
    pub reason: Option<String>,
    /// Who performed the action.
    pub operator: Actor,
    /// When the entry was produced.
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Starts an entry with the mandatory fields; the rest are set with the
    /// builder-style methods below.
    pub fn new(
        operation_type: OperationType,
        module: impl Into<String>,
        action: impl Into<String>,
        operator: &Actor,
    ) -> Self {
        Self {
            operation_type,
            module: module.into(),
            action: action.into(),
            target_employee_id: None,
            target_employee_name: None,
            target_record_id: None,
            before: None,
            after: None,
            changes: None,
            reason: None,
            operator: operator.clone(),
            recorded_at: Utc::now(),
        }
    }

    /// Sets the affected employee.
    pub fn employee(mut self, id: u64, name: impl Into<String>) -> Self {
        self.target_employee_id = Some(id);
        self.target_employee_name = Some(name.into());
        self
    }

    /// Sets the affected record.
    pub fn record(mut self, id: u64) -> Self {
        self.target_record_id = Some(id);
        self
    }

    /// Sets the before and after values.
    pub fn values(mut self, before: impl Into<String>, after: impl Into<String>) -> Self {
        self.before = Some(before.into());
        self.after = Some(after.into());
        self
    }

    /// Sets the structured change detail.
    pub fn changes(mut self, changes: serde_json::Value) -> Self {
        self.changes = Some(changes);
        self
    }

    /// Sets the reason.
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Category of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Generic system message.
    System,
    /// Grade or challenge state changed.
    StatusChange,
    /// Salary or payroll event.
    Salary,
    /// Performance related.
    Performance,
    /// A promotion awaits review or was decided.
    Promotion,
    /// A demotion alert was raised or a challenge started.
    ChallengeTriggered,
    /// A challenge was passed.
    ChallengeSuccess,
    /// A challenge was failed or the employee was downgraded.
    ChallengeFailed,
    /// Payroll payment event.
    PayrollPaid,
}

/// A message queued for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient user id.
    pub user_id: u64,
    /// Short title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Category.
    pub notification_type: NotificationType,
    /// Optional link into the caller's UI.
    pub link: Option<String>,
}

impl Notification {
    /// Creates a notification without a link.
    pub fn new(
        user_id: u64,
        title: impl Into<String>,
        content: impl Into<String>,
        notification_type: NotificationType,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            content: content.into(),
            notification_type,
            link: None,
        }
    }

    /// Attaches a link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}
