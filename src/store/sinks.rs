//! Audit and notification collaborators.
//!
//! The workflows write to these through the [`AuditSink`] and
//! [`NotificationSink`] traits. [`AuditLog`] and [`Outbox`] are the
//! in-memory implementations used by embedders and tests.

use tracing::debug;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{AuditEntry, Notification, OperationType};

/// Append-only audit log.
pub trait AuditSink {
    /// Appends one entry and returns its id.
    fn record(&mut self, entry: AuditEntry) -> EngineResult<Uuid>;
}

/// Fire-and-forget user notifications.
pub trait NotificationSink {
    /// Queues one notification and returns its id.
    fn notify(&mut self, notification: Notification) -> EngineResult<Uuid>;
}

/// In-memory [`AuditSink`].
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Vec<(Uuid, AuditEntry)>,
}

impl AuditLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry in recording order.
    pub fn entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    /// Entries of one operation type.
    pub fn by_operation(&self, operation_type: OperationType) -> impl Iterator<Item = &AuditEntry> {
        self.entries()
            .filter(move |entry| entry.operation_type == operation_type)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AuditSink for AuditLog {
    fn record(&mut self, entry: AuditEntry) -> EngineResult<Uuid> {
        let id = Uuid::new_v4();
        debug!(
            log_id = %id,
            module = %entry.module,
            action = %entry.action,
            "audit entry recorded"
        );
        self.entries.push((id, entry));
        Ok(id)
    }
}

/// In-memory [`NotificationSink`].
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    messages: Vec<(Uuid, Notification)>,
}

impl Outbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every queued notification in order.
    pub fn messages(&self) -> impl Iterator<Item = &Notification> {
        self.messages.iter().map(|(_, message)| message)
    }

    /// Notifications addressed to one user.
    pub fn for_user(&self, user_id: u64) -> impl Iterator<Item = &Notification> {
        self.messages().filter(move |m| m.user_id == user_id)
    }

    /// Number of queued notifications.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing has been queued.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl NotificationSink for Outbox {
    fn notify(&mut self, notification: Notification) -> EngineResult<Uuid> {
        let id = Uuid::new_v4();
        debug!(
            notification_id = %id,
            user_id = notification.user_id,
            title = %notification.title,
            "notification queued"
        );
        self.messages.push((id, notification));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Actor, NotificationType, Role};

    #[test]
    fn test_audit_log_appends_in_order() {
        let actor = Actor::new(1, "admin", Role::Admin);
        let mut log = AuditLog::new();
        let first = log
            .record(AuditEntry::new(OperationType::Promotion, "晋级管理", "批准", &actor))
            .unwrap();
        let second = log
            .record(AuditEntry::new(OperationType::Payroll, "工资管理", "确认", &actor))
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(log.len(), 2);
        assert_eq!(log.by_operation(OperationType::Payroll).count(), 1);
        assert_eq!(log.entries().next().unwrap().action, "批准");
    }

    #[test]
    fn test_outbox_filters_by_user() {
        let mut outbox = Outbox::new();
        outbox
            .notify(Notification::new(3, "晋级通过", "恭喜", NotificationType::Promotion))
            .unwrap();
        outbox
            .notify(Notification::new(4, "晋级待审批", "请审批", NotificationType::Promotion))
            .unwrap();

        let titles: Vec<_> = outbox.for_user(4).map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["晋级待审批"]);
        assert!(!outbox.is_empty());
    }
}
