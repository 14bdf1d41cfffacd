//! In-process datastore and collaborator interfaces.
//!
//! [`Datastore`] holds every table the engine reads and writes. Writes that
//! must land together go through [`Datastore::atomically`], which restores
//! the previous state when the closure fails. Exclusive `&mut` access
//! serialises writers.

mod ledger;
mod sinks;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::calculation::WorkCalendar;
use crate::config::RulesConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ConfirmationStatus, ConfirmedSalary, DailyPerformance, DemotionChallenge, Employee, Grade,
    PayrollAdjustment, PayrollArchive, PayrollRecord, PromotionConfirmation, Role,
    StatusHistoryEntry, TrainingAssessment, User, YearMonth,
};

pub use ledger::PerformanceLedger;
pub use sinks::{AuditLog, AuditSink, NotificationSink, Outbox};

#[derive(Debug, Clone, Default)]
struct Sequences {
    employee: u64,
    user: u64,
    assessment: u64,
    history: u64,
    promotion: u64,
    challenge: u64,
    payroll: u64,
    adjustment: u64,
    archive: u64,
}

fn next(seq: &mut u64) -> u64 {
    *seq += 1;
    *seq
}

/// All persisted engine state.
///
/// # Example
///
/// ```
/// use callcenter_engine::models::{Employee, Grade};
/// use callcenter_engine::store::Datastore;
/// use chrono::NaiveDate;
///
/// let mut store = Datastore::default();
/// let join = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
/// let id = store.add_employee(Employee::new(0, "E001", "张三", "一组", Grade::Trainee, join));
/// assert_eq!(store.employee(id).unwrap().name, "张三");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Datastore {
    employees: BTreeMap<u64, Employee>,
    users: BTreeMap<u64, User>,
    performance: BTreeMap<(u64, NaiveDate), DailyPerformance>,
    assessments: BTreeMap<u64, TrainingAssessment>,
    history: BTreeMap<u64, StatusHistoryEntry>,
    promotions: BTreeMap<u64, PromotionConfirmation>,
    challenges: BTreeMap<u64, DemotionChallenge>,
    confirmed_salaries: BTreeMap<(u64, YearMonth), ConfirmedSalary>,
    payrolls: BTreeMap<u64, PayrollRecord>,
    adjustments: BTreeMap<u64, PayrollAdjustment>,
    archives: BTreeMap<i32, PayrollArchive>,
    calendar: WorkCalendar,
    sequences: Sequences,
}

impl Datastore {
    /// Creates an empty store whose calendar is seeded from `rules`.
    pub fn new(rules: &RulesConfig) -> Self {
        Self {
            calendar: WorkCalendar::from_rules(&rules.calendar),
            ..Self::default()
        }
    }

    /// Runs `f` as one unit of work.
    ///
    /// When `f` returns `Err` every table is restored to its state before the
    /// call.
    ///
    /// # Example
    ///
    /// ```
    /// use callcenter_engine::error::EngineError;
    /// use callcenter_engine::models::{Employee, Grade};
    /// use callcenter_engine::store::Datastore;
    /// use chrono::NaiveDate;
    ///
    /// let mut store = Datastore::default();
    /// let join = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    /// let result: Result<(), EngineError> = store.atomically(|tx| {
    ///     tx.add_employee(Employee::new(0, "E001", "张三", "一组", Grade::Trainee, join));
    ///     Err(EngineError::Storage { message: "disk full".to_string() })
    /// });
    /// assert!(result.is_err());
    /// assert_eq!(store.employees().count(), 0);
    /// ```
    pub fn atomically<T>(
        &mut self,
        f: impl FnOnce(&mut Datastore) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let snapshot = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(error = %err, "unit of work failed, restoring previous state");
                *self = snapshot;
                Err(err)
            }
        }
    }

    // ----- calendar -----

    /// The work calendar.
    pub fn calendar(&self) -> &WorkCalendar {
        &self.calendar
    }

    /// Mutable access to the work calendar.
    pub fn calendar_mut(&mut self) -> &mut WorkCalendar {
        &mut self.calendar
    }

    // ----- employees and users -----

    /// Inserts an employee under a fresh id and returns the id.
    pub fn add_employee(&mut self, mut employee: Employee) -> u64 {
        let id = next(&mut self.sequences.employee);
        employee.id = id;
        self.employees.insert(id, employee);
        id
    }

    /// Looks up an employee.
    pub fn employee(&self, id: u64) -> EngineResult<&Employee> {
        self.employees.get(&id).ok_or(EngineError::NotFound {
            entity: "employee",
            id,
        })
    }

    /// Looks up an employee for modification.
    pub fn employee_mut(&mut self, id: u64) -> EngineResult<&mut Employee> {
        self.employees.get_mut(&id).ok_or(EngineError::NotFound {
            entity: "employee",
            id,
        })
    }

    /// All employees by id.
    pub fn employees(&self) -> impl Iterator<Item = &Employee> {
        self.employees.values()
    }

    /// Employees still employed.
    pub fn active_employees(&self) -> impl Iterator<Item = &Employee> {
        self.employees.values().filter(|e| e.is_active)
    }

    /// Inserts a user under a fresh id and returns the id.
    pub fn add_user(&mut self, mut user: User) -> u64 {
        let id = next(&mut self.sequences.user);
        user.id = id;
        self.users.insert(id, user);
        id
    }

    /// All users.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Users holding `role`.
    pub fn users_with_role(&self, role: Role) -> impl Iterator<Item = &User> {
        self.users.values().filter(move |u| u.role == role)
    }

    /// The login belonging to an employee.
    pub fn user_for_employee(&self, employee_id: u64) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.employee_id == Some(employee_id))
    }

    /// Managers of `team`.
    ///
    /// A manager's team is the one on the user record, else the team of the
    /// employee record the login belongs to.
    pub fn team_managers<'a>(&'a self, team: &'a str) -> impl Iterator<Item = &'a User> + 'a {
        self.users_with_role(Role::Manager).filter(move |u| {
            let own_team = u.team.as_deref().or_else(|| {
                u.employee_id
                    .and_then(|id| self.employees.get(&id))
                    .map(|e| e.team.as_str())
            });
            own_team == Some(team)
        })
    }

    // ----- performance -----

    /// All performance records of one employee, oldest first.
    pub fn performance_of(&self, employee_id: u64) -> impl Iterator<Item = &DailyPerformance> {
        self.performance
            .range((employee_id, NaiveDate::MIN)..=(employee_id, NaiveDate::MAX))
            .map(|(_, record)| record)
    }

    /// Every employee's records dated within `month`.
    pub fn performance_in_month(&self, month: YearMonth) -> impl Iterator<Item = &DailyPerformance> {
        self.performance
            .values()
            .filter(move |r| month.contains(r.work_date))
    }

    /// Sets the valid-workday flag of one record; returns whether it changed.
    pub fn set_record_validity(
        &mut self,
        employee_id: u64,
        work_date: NaiveDate,
        is_valid: bool,
    ) -> bool {
        match self.performance.get_mut(&(employee_id, work_date)) {
            Some(record) if record.is_valid_workday != is_valid => {
                record.is_valid_workday = is_valid;
                true
            }
            _ => false,
        }
    }

    // ----- training assessments -----

    /// Stores an assessment under a fresh id.
    pub fn add_assessment(&mut self, mut assessment: TrainingAssessment) -> u64 {
        let id = next(&mut self.sequences.assessment);
        assessment.id = id;
        self.assessments.insert(id, assessment);
        id
    }

    /// The most recent assessment of an employee where both parts passed.
    pub fn latest_passed_assessment(&self, employee_id: u64) -> Option<&TrainingAssessment> {
        self.assessments
            .values()
            .filter(|a| a.employee_id == employee_id && a.both_passed())
            .max_by_key(|a| (a.assessment_date, a.id))
    }

    // ----- status history -----

    /// Appends a history entry under a fresh id. Entries are never edited.
    pub fn append_history(&mut self, mut entry: StatusHistoryEntry) -> u64 {
        let id = next(&mut self.sequences.history);
        entry.id = id;
        self.history.insert(id, entry);
        id
    }

    /// An employee's history, in insertion order.
    pub fn history_of(&self, employee_id: u64) -> impl Iterator<Item = &StatusHistoryEntry> {
        self.history
            .values()
            .filter(move |h| h.employee_id == employee_id)
    }

    /// The last change written for an employee.
    ///
    /// Write order, not `change_date`: an approval may be dated ahead of a
    /// rollback written after it.
    pub fn latest_history(&self, employee_id: u64) -> Option<&StatusHistoryEntry> {
        self.history_of(employee_id).max_by_key(|h| h.id)
    }

    /// The last change written for an employee into `grade`.
    pub fn latest_history_into(&self, employee_id: u64, grade: Grade) -> Option<&StatusHistoryEntry> {
        self.history_of(employee_id)
            .filter(|h| h.to_grade == grade)
            .max_by_key(|h| h.id)
    }

    // ----- promotions -----

    /// Stores a promotion confirmation under a fresh id.
    pub fn insert_promotion(&mut self, mut promotion: PromotionConfirmation) -> u64 {
        let id = next(&mut self.sequences.promotion);
        promotion.id = id;
        self.promotions.insert(id, promotion);
        id
    }

    /// Looks up a promotion confirmation.
    pub fn promotion(&self, id: u64) -> EngineResult<&PromotionConfirmation> {
        self.promotions.get(&id).ok_or(EngineError::NotFound {
            entity: "promotion",
            id,
        })
    }

    /// Looks up a promotion confirmation for modification.
    pub fn promotion_mut(&mut self, id: u64) -> EngineResult<&mut PromotionConfirmation> {
        self.promotions.get_mut(&id).ok_or(EngineError::NotFound {
            entity: "promotion",
            id,
        })
    }

    /// All promotion confirmations.
    pub fn promotions(&self) -> impl Iterator<Item = &PromotionConfirmation> {
        self.promotions.values()
    }

    /// The pending confirmation of an employee, if any.
    pub fn pending_promotion_of(&self, employee_id: u64) -> Option<&PromotionConfirmation> {
        self.promotions.values().find(|p| {
            p.employee_id == employee_id && p.status == ConfirmationStatus::Pending
        })
    }

    // ----- challenges -----

    /// Stores a demotion challenge under a fresh id.
    pub fn insert_challenge(&mut self, mut challenge: DemotionChallenge) -> u64 {
        let id = next(&mut self.sequences.challenge);
        challenge.id = id;
        self.challenges.insert(id, challenge);
        id
    }

    /// Looks up a demotion challenge.
    pub fn challenge(&self, id: u64) -> EngineResult<&DemotionChallenge> {
        self.challenges.get(&id).ok_or(EngineError::NotFound {
            entity: "challenge",
            id,
        })
    }

    /// Looks up a demotion challenge for modification.
    pub fn challenge_mut(&mut self, id: u64) -> EngineResult<&mut DemotionChallenge> {
        self.challenges.get_mut(&id).ok_or(EngineError::NotFound {
            entity: "challenge",
            id,
        })
    }

    /// All demotion challenges.
    pub fn challenges(&self) -> impl Iterator<Item = &DemotionChallenge> {
        self.challenges.values()
    }

    /// Challenges of one employee.
    pub fn challenges_of(&self, employee_id: u64) -> impl Iterator<Item = &DemotionChallenge> {
        self.challenges
            .values()
            .filter(move |c| c.employee_id == employee_id)
    }

    // ----- salaries -----

    /// The confirmed salary for an employee and month.
    pub fn confirmed_salary(&self, employee_id: u64, month: YearMonth) -> Option<&ConfirmedSalary> {
        self.confirmed_salaries.get(&(employee_id, month))
    }

    /// Stores a confirmed salary, replacing any earlier one.
    pub fn put_confirmed_salary(&mut self, salary: ConfirmedSalary) {
        let key = (salary.breakdown.employee_id, salary.breakdown.year_month);
        self.confirmed_salaries.insert(key, salary);
    }

    // ----- payroll -----

    /// Stores a payroll record under a fresh id.
    pub fn insert_payroll(&mut self, mut record: PayrollRecord) -> u64 {
        let id = next(&mut self.sequences.payroll);
        record.id = id;
        self.payrolls.insert(id, record);
        id
    }

    /// Looks up a payroll record.
    pub fn payroll(&self, id: u64) -> EngineResult<&PayrollRecord> {
        self.payrolls.get(&id).ok_or(EngineError::NotFound {
            entity: "payroll",
            id,
        })
    }

    /// Looks up a payroll record for modification.
    pub fn payroll_mut(&mut self, id: u64) -> EngineResult<&mut PayrollRecord> {
        self.payrolls.get_mut(&id).ok_or(EngineError::NotFound {
            entity: "payroll",
            id,
        })
    }

    /// All payroll records.
    pub fn payrolls(&self) -> impl Iterator<Item = &PayrollRecord> {
        self.payrolls.values()
    }

    /// Mutable access to every payroll record.
    pub fn payrolls_mut(&mut self) -> impl Iterator<Item = &mut PayrollRecord> {
        self.payrolls.values_mut()
    }

    /// Deletes payroll records matching `predicate` together with their
    /// adjustments; returns how many records were removed.
    pub fn remove_payrolls(&mut self, predicate: impl Fn(&PayrollRecord) -> bool) -> usize {
        let doomed: Vec<u64> = self
            .payrolls
            .values()
            .filter(|p| predicate(p))
            .map(|p| p.id)
            .collect();
        self.adjustments
            .retain(|_, adjustment| !doomed.contains(&adjustment.payroll_id));
        for id in &doomed {
            self.payrolls.remove(id);
        }
        doomed.len()
    }

    /// Stores an adjustment under a fresh id.
    pub fn insert_adjustment(&mut self, mut adjustment: PayrollAdjustment) -> u64 {
        let id = next(&mut self.sequences.adjustment);
        adjustment.id = id;
        self.adjustments.insert(id, adjustment);
        id
    }

    /// Adjustments of one payroll record, oldest first.
    pub fn adjustments_of(&self, payroll_id: u64) -> impl Iterator<Item = &PayrollAdjustment> {
        self.adjustments
            .values()
            .filter(move |a| a.payroll_id == payroll_id)
    }

    /// Stores a year archive under a fresh id.
    pub fn insert_archive(&mut self, mut archive: PayrollArchive) -> u64 {
        let id = next(&mut self.sequences.archive);
        archive.id = id;
        self.archives.insert(archive.archive_year, archive);
        id
    }

    /// The archive of `year`.
    pub fn archive(&self, year: i32) -> Option<&PayrollArchive> {
        self.archives.get(&year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn employee(team: &str) -> Employee {
        Employee::new(0, "E001", "张三", team, Grade::C, date(2025, 1, 1))
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut store = Datastore::default();
        assert_eq!(store.add_employee(employee("一组")), 1);
        assert_eq!(store.add_employee(employee("一组")), 2);
    }

    #[test]
    fn test_missing_employee_is_not_found() {
        let store = Datastore::default();
        match store.employee(9) {
            Err(EngineError::NotFound { entity, id }) => {
                assert_eq!(entity, "employee");
                assert_eq!(id, 9);
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_atomically_keeps_successful_writes() {
        let mut store = Datastore::default();
        let id = store
            .atomically(|tx| Ok(tx.add_employee(employee("一组"))))
            .unwrap();
        assert!(store.employee(id).is_ok());
    }

    #[test]
    fn test_atomically_restores_on_error() {
        let mut store = Datastore::default();
        let id = store.add_employee(employee("一组"));

        let result: EngineResult<()> = store.atomically(|tx| {
            tx.employee_mut(id)?.grade = Grade::B;
            tx.append_history(StatusHistoryEntry {
                id: 0,
                employee_id: id,
                from_grade: Grade::C,
                to_grade: Grade::B,
                change_date: date(2025, 1, 5),
                reason: "test".to_string(),
                days_in_previous_grade: None,
            });
            Err(EngineError::invalid_state("boom"))
        });

        assert!(result.is_err());
        assert_eq!(store.employee(id).unwrap().grade, Grade::C);
        assert_eq!(store.history_of(id).count(), 0);
    }

    #[test]
    fn test_team_managers_resolved_from_user_or_employee() {
        let mut store = Datastore::default();
        let manager_employee = store.add_employee(employee("二组"));
        store.add_user(User {
            id: 0,
            username: "mgr1".to_string(),
            role: Role::Manager,
            employee_id: None,
            team: Some("一组".to_string()),
        });
        store.add_user(User {
            id: 0,
            username: "mgr2".to_string(),
            role: Role::Manager,
            employee_id: Some(manager_employee),
            team: None,
        });

        let first: Vec<_> = store.team_managers("一组").map(|u| u.username.clone()).collect();
        let second: Vec<_> = store.team_managers("二组").map(|u| u.username.clone()).collect();
        assert_eq!(first, vec!["mgr1"]);
        assert_eq!(second, vec!["mgr2"]);
    }

    #[test]
    fn test_latest_history_is_last_written() {
        let mut store = Datastore::default();
        let entry = |to: Grade, day: u32| StatusHistoryEntry {
            id: 0,
            employee_id: 1,
            from_grade: Grade::Trainee,
            to_grade: to,
            change_date: date(2025, 1, day),
            reason: String::new(),
            days_in_previous_grade: None,
        };
        store.append_history(entry(Grade::C, 5));
        store.append_history(entry(Grade::B, 6));
        store.append_history(entry(Grade::Trainee, 4));

        let latest = store.latest_history(1).unwrap();
        assert_eq!(latest.id, 3);
        assert_eq!(latest.to_grade, Grade::Trainee);
        assert_eq!(store.latest_history_into(1, Grade::C).unwrap().id, 1);
        assert_eq!(store.latest_history_into(1, Grade::B).unwrap().id, 2);
    }
}
