//! Stateful engines over the datastore.
//!
//! Every operation takes an [`EngineContext`] holding the store, the rules,
//! the audit and notification sinks and the evaluation date. Mutating
//! operations also take the [`Actor`](crate::models::Actor) performing them.
//!
//! Writes of one operation land in a single [`Datastore::atomically`] scope
//! together with their audit entry. Notifications go out after the scope
//! commits and a failing notification sink is only logged.

pub mod challenge;
pub mod payroll;
pub mod performance;
pub mod promotion;
pub mod status;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RulesConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{ActionOutcome, Grade, Notification, StatusHistoryEntry};
use crate::store::{AuditSink, Datastore, NotificationSink};

/// Collaborators and the evaluation date for one engine call.
///
/// # Example
///
/// ```
/// use callcenter_engine::config::RulesConfig;
/// use callcenter_engine::store::{AuditLog, Datastore, Outbox};
/// use callcenter_engine::workflow::EngineContext;
/// use chrono::NaiveDate;
///
/// let rules = RulesConfig::default();
/// let mut store = Datastore::new(&rules);
/// let mut audit = AuditLog::new();
/// let mut outbox = Outbox::new();
/// let today = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
///
/// let ctx = EngineContext::new(&mut store, &rules, &mut audit, &mut outbox, today);
/// assert_eq!(ctx.today, today);
/// ```
pub struct EngineContext<'a> {
    /// The datastore read and written by the call.
    pub store: &'a mut Datastore,
    /// Thresholds and rates.
    pub rules: &'a RulesConfig,
    /// Where audit entries go.
    pub audit: &'a mut dyn AuditSink,
    /// Where notifications go.
    pub notifier: &'a mut dyn NotificationSink,
    /// The date the rules are evaluated on.
    pub today: NaiveDate,
}

impl<'a> EngineContext<'a> {
    /// Bundles the collaborators for one call.
    pub fn new(
        store: &'a mut Datastore,
        rules: &'a RulesConfig,
        audit: &'a mut dyn AuditSink,
        notifier: &'a mut dyn NotificationSink,
        today: NaiveDate,
    ) -> Self {
        Self {
            store,
            rules,
            audit,
            notifier,
            today,
        }
    }

    /// Runs `f` as one unit of work with access to the audit sink.
    ///
    /// A failing audit write fails the unit and rolls the store back.
    pub(crate) fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut Datastore, &mut dyn AuditSink) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let audit: &mut dyn AuditSink = &mut *self.audit;
        self.store.atomically(|tx| f(tx, audit))
    }

    /// Sends a notification, logging instead of failing when the sink errors.
    pub(crate) fn notify(&mut self, notification: Notification) {
        let user_id = notification.user_id;
        if let Err(err) = self.notifier.notify(notification) {
            warn!(user_id, error = %err, "notification delivery failed");
        }
    }

    /// Notifies the login belonging to an employee, if there is one.
    pub(crate) fn notify_employee(&mut self, employee_id: u64, build: impl FnOnce(u64) -> Notification) {
        let user_id = self.store.user_for_employee(employee_id).map(|u| u.id);
        match user_id {
            Some(user_id) => self.notify(build(user_id)),
            None => warn!(employee_id, "employee has no login, notification skipped"),
        }
    }

    /// Notifies every manager of `team`.
    pub(crate) fn notify_team_managers(&mut self, team: &str, build: impl Fn(u64) -> Notification) {
        let managers: Vec<u64> = self.store.team_managers(team).map(|u| u.id).collect();
        for user_id in managers {
            self.notify(build(user_id));
        }
    }
}

/// What a successful mutating call hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// The record created or changed, when there is exactly one.
    pub record_id: Option<u64>,
    /// Text for the user.
    pub message: String,
}

impl Receipt {
    pub(crate) fn new(record_id: u64, message: impl Into<String>) -> Self {
        Self {
            record_id: Some(record_id),
            message: message.into(),
        }
    }

    pub(crate) fn message(message: impl Into<String>) -> Self {
        Self {
            record_id: None,
            message: message.into(),
        }
    }
}

/// Converts a workflow result into the boundary shape.
///
/// # Example
///
/// ```
/// use callcenter_engine::error::EngineError;
/// use callcenter_engine::workflow::outcome;
///
/// let outcome = outcome(Err(EngineError::policy("已有待审批的晋级申请")));
/// assert!(!outcome.success);
/// ```
pub fn outcome(result: EngineResult<Receipt>) -> ActionOutcome {
    ActionOutcome::from_result(result, |receipt| receipt.message.clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    /// Must follow an edge of the grade ladder.
    Rule,
    /// Compensating write; any edge.
    Rollback,
}

/// Moves an employee to `to` and appends the one history entry for it.
///
/// Returns the grade the employee left.
pub(crate) fn write_grade_change(
    store: &mut Datastore,
    employee_id: u64,
    to: Grade,
    change_date: NaiveDate,
    reason: String,
    days_in_previous_grade: Option<i64>,
    kind: ChangeKind,
) -> EngineResult<Grade> {
    let employee = store.employee_mut(employee_id)?;
    let from = employee.grade;
    if from == to {
        return Ok(from);
    }
    if kind == ChangeKind::Rule && !from.can_transition_to(to) {
        return Err(EngineError::invalid_state(format!(
            "不允许的状态变更：{} → {}",
            from, to
        )));
    }
    employee.grade = to;

    store.append_history(StatusHistoryEntry {
        id: 0,
        employee_id,
        from_grade: from,
        to_grade: to,
        change_date,
        reason,
        days_in_previous_grade,
    });
    info!(employee_id, from = %from, to = %to, %change_date, "grade changed");
    Ok(from)
}

/// Calendar days in the current grade: since the latest change, else since joining.
pub(crate) fn days_in_status(store: &Datastore, employee_id: u64, today: NaiveDate) -> EngineResult<i64> {
    let employee = store.employee(employee_id)?;
    let start = store
        .latest_history(employee_id)
        .map(|h| h.change_date)
        .unwrap_or(employee.join_date);
    Ok((today - start).num_days())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the workflow tests.

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::calculation::daily_commission;
    use crate::config::RulesConfig;
    use crate::models::{Actor, Employee, Grade, Role, User};
    use crate::store::{AuditLog, Datastore, Outbox, PerformanceLedger};

    use super::EngineContext;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn admin() -> Actor {
        Actor::new(900, "系统管理员", Role::Admin)
    }

    pub fn finance() -> Actor {
        Actor::new(901, "财务小李", Role::Finance)
    }

    pub fn manager() -> Actor {
        Actor::manager(902, "王经理", "一组")
    }

    /// Store, rules and sinks for one test.
    pub struct Harness {
        pub store: Datastore,
        pub rules: RulesConfig,
        pub audit: AuditLog,
        pub outbox: Outbox,
    }

    impl Harness {
        pub fn new() -> Self {
            let rules = RulesConfig::default();
            Self {
                store: Datastore::new(&rules),
                rules,
                audit: AuditLog::new(),
                outbox: Outbox::new(),
            }
        }

        pub fn ctx(&mut self, today: NaiveDate) -> EngineContext<'_> {
            EngineContext::new(
                &mut self.store,
                &self.rules,
                &mut self.audit,
                &mut self.outbox,
                today,
            )
        }

        /// Adds an employee with a login and a team manager login.
        pub fn hire(&mut self, no: &str, grade: Grade, join: NaiveDate) -> u64 {
            let id = self
                .store
                .add_employee(Employee::new(0, no, format!("员工{}", no), "一组", grade, join));
            self.store.add_user(User {
                id: 0,
                username: no.to_lowercase(),
                role: Role::Employee,
                employee_id: Some(id),
                team: Some("一组".to_string()),
            });
            if self.store.team_managers("一组").next().is_none() {
                self.store.add_user(User {
                    id: 0,
                    username: "manager".to_string(),
                    role: Role::Manager,
                    employee_id: None,
                    team: Some("一组".to_string()),
                });
                self.store.add_user(User {
                    id: 0,
                    username: "admin".to_string(),
                    role: Role::Admin,
                    employee_id: None,
                    team: None,
                });
            }
            id
        }

        pub fn orders(&mut self, employee_id: u64, day: NaiveDate, orders: u32) {
            self.store
                .upsert_daily_record(
                    employee_id,
                    day,
                    orders,
                    daily_commission(i64::from(orders)),
                    true,
                )
                .unwrap();
        }

        pub fn commission_of(orders: u32) -> Decimal {
            daily_commission(i64::from(orders))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{AuditEntry, NotificationType, OperationType};
    use uuid::Uuid;

    struct BrokenAudit;

    impl AuditSink for BrokenAudit {
        fn record(&mut self, _entry: AuditEntry) -> EngineResult<Uuid> {
            Err(EngineError::Collaborator {
                name: "audit",
                message: "log unavailable".to_string(),
            })
        }
    }

    struct BrokenNotifier;

    impl NotificationSink for BrokenNotifier {
        fn notify(&mut self, _notification: Notification) -> EngineResult<Uuid> {
            Err(EngineError::Collaborator {
                name: "notifier",
                message: "queue full".to_string(),
            })
        }
    }

    #[test]
    fn test_write_grade_change_rejects_invalid_edge() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        let result = write_grade_change(
            &mut h.store,
            id,
            Grade::A,
            date(2025, 1, 5),
            "skip".to_string(),
            None,
            ChangeKind::Rule,
        );
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(h.store.history_of(id).count(), 0);
    }

    #[test]
    fn test_rollback_may_use_any_edge() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::A, date(2025, 1, 1));
        let from = write_grade_change(
            &mut h.store,
            id,
            Grade::B,
            date(2025, 1, 5),
            "rollback".to_string(),
            None,
            ChangeKind::Rollback,
        )
        .unwrap();
        assert_eq!(from, Grade::A);
        assert_eq!(h.store.employee(id).unwrap().grade, Grade::B);
        assert_eq!(h.store.history_of(id).count(), 1);
    }

    #[test]
    fn test_audit_failure_rolls_back_unit() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        let mut audit = BrokenAudit;
        let mut ctx = EngineContext::new(
            &mut h.store,
            &h.rules,
            &mut audit,
            &mut h.outbox,
            date(2025, 1, 5),
        );

        let actor = admin();
        let result = ctx.transact(|tx, audit| {
            write_grade_change(
                tx,
                id,
                Grade::C,
                date(2025, 1, 5),
                "培训期满3天".to_string(),
                Some(4),
                ChangeKind::Rule,
            )?;
            audit.record(AuditEntry::new(OperationType::StatusChange, "状态流转", "变更", &actor))?;
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(h.store.employee(id).unwrap().grade, Grade::Trainee);
        assert_eq!(h.store.history_of(id).count(), 0);
    }

    #[test]
    fn test_notification_failure_is_swallowed() {
        let mut h = Harness::new();
        let mut notifier = BrokenNotifier;
        let mut ctx = EngineContext::new(
            &mut h.store,
            &h.rules,
            &mut h.audit,
            &mut notifier,
            date(2025, 1, 5),
        );
        ctx.notify(Notification::new(1, "标题", "内容", NotificationType::System));
    }

    #[test]
    fn test_days_in_status_uses_latest_change() {
        let mut h = Harness::new();
        let id = h.hire("E001", Grade::Trainee, date(2025, 1, 1));
        assert_eq!(days_in_status(&h.store, id, date(2025, 1, 4)).unwrap(), 3);

        write_grade_change(
            &mut h.store,
            id,
            Grade::C,
            date(2025, 1, 4),
            String::new(),
            None,
            ChangeKind::Rule,
        )
        .unwrap();
        assert_eq!(days_in_status(&h.store, id, date(2025, 1, 6)).unwrap(), 2);
    }

    #[test]
    fn test_outcome_uses_receipt_message() {
        let ok = outcome(Ok(Receipt::new(3, "晋级已驳回")));
        assert!(ok.success);
        assert_eq!(ok.message, "晋级已驳回");
    }
}
