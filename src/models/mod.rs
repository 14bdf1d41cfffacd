//! Core data models for the call-center rules engine.
//!
//! This module contains the records and closed state enums shared by the
//! calculation functions, the datastore and the workflows.

mod actor;
mod audit;
mod challenge;
mod employee;
mod history;
mod outcome;
mod payroll;
mod performance;
mod period;
mod promotion;

pub use actor::{Actor, Role, User};
pub use audit::{AuditEntry, Notification, NotificationType, OperationType};
pub use challenge::{ChallengeDecision, ChallengeResult, DemotionChallenge};
pub use employee::{Employee, Grade};
pub use history::StatusHistoryEntry;
pub use outcome::ActionOutcome;
pub use payroll::{
    AdjustmentType, ConfirmedSalary, MonthlySummary, PaymentMethod, PayrollAction,
    PayrollAdjustment, PayrollArchive, PayrollRecord, PayrollStatus, SalaryBreakdown,
    SalarySource,
};
pub use performance::{DailyPerformance, TrainingAssessment};
pub use period::YearMonth;
pub use promotion::{ConfirmationAction, ConfirmationStatus, PromotionConfirmation};
