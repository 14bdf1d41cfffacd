//! Salary and payroll records.
//!
//! A [`SalaryBreakdown`] is the per-employee monthly formula output. A
//! [`ConfirmedSalary`] is a breakdown that has been frozen and is never
//! recomputed. A [`PayrollRecord`] is the payable line generated from either,
//! carrying adjustments and the payment state machine.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Grade, Role, YearMonth};

/// Per-grade monthly salary components.
///
/// # Example
///
/// ```
/// use callcenter_engine::models::{Grade, SalaryBreakdown, YearMonth};
/// use rust_decimal::Decimal;
///
/// let breakdown = SalaryBreakdown {
///     employee_id: 1,
///     year_month: YearMonth::new(2025, 1).unwrap(),
///     grade: Grade::C,
///     work_days: 3,
///     valid_work_days: 3,
///     total_orders: 3,
///     base_salary: Decimal::from(90),
///     attendance_bonus: Decimal::ZERO,
///     performance_bonus: Decimal::ZERO,
///     commission: Decimal::from(30),
///     calculation_detail: String::new(),
/// };
/// assert_eq!(breakdown.total_salary(), Decimal::from(120));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryBreakdown {
    /// The employee the salary belongs to.
    pub employee_id: u64,
    /// The month computed.
    pub year_month: YearMonth,
    /// Grade the formula was chosen by.
    pub grade: Grade,
    /// Performance records in the month.
    pub work_days: u32,
    /// Records in the month flagged as valid workdays.
    pub valid_work_days: u32,
    /// Orders over the month.
    pub total_orders: u32,
    /// Fixed component.
    pub base_salary: Decimal,
    /// A-grade full attendance bonus.
    pub attendance_bonus: Decimal,
    /// A-grade monthly volume bonus.
    pub performance_bonus: Decimal,
    /// Sum of daily commissions.
    pub commission: Decimal,
    /// Human-readable explanation of the computation.
    pub calculation_detail: String,
}

impl SalaryBreakdown {
    /// Sum of all components.
    pub fn total_salary(&self) -> Decimal {
        self.base_salary + self.attendance_bonus + self.performance_bonus + self.commission
    }
}

/// A salary that has been confirmed and must not be recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedSalary {
    /// The frozen breakdown.
    pub breakdown: SalaryBreakdown,
    /// Who confirmed it.
    pub confirmed_by: u64,
    /// When it was confirmed.
    pub confirmed_at: DateTime<Utc>,
}

/// Where a resolved salary came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SalarySource {
    /// A previously confirmed salary, returned unchanged.
    Confirmed(ConfirmedSalary),
    /// Freshly computed from the performance ledger.
    Computed(SalaryBreakdown),
}

impl SalarySource {
    /// The breakdown regardless of source.
    pub fn breakdown(&self) -> &SalaryBreakdown {
        match self {
            SalarySource::Confirmed(confirmed) => &confirmed.breakdown,
            SalarySource::Computed(breakdown) => breakdown,
        }
    }

    /// Whether the salary came from a confirmed record.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SalarySource::Confirmed(_))
    }
}

/// Payment status of a payroll record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayrollStatus {
    /// Generated, awaiting finance confirmation.
    Pending,
    /// Confirmed by finance, ready to pay.
    Confirmed,
    /// Paid out.
    Paid,
    /// A payment attempt failed.
    Failed,
    /// Flagged for another payment attempt.
    Retry,
    /// Withdrawn; never paid.
    Cancelled,
}

/// An action on a payroll record's payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayrollAction {
    /// Finance confirmation.
    Confirm,
    /// Payment made.
    Pay,
    /// Payment attempt failed.
    Fail,
    /// Flag for re-attempt.
    Retry,
    /// Withdraw the record.
    Cancel,
}

impl PayrollStatus {
    /// The persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            PayrollStatus::Pending => "pending",
            PayrollStatus::Confirmed => "confirmed",
            PayrollStatus::Paid => "paid",
            PayrollStatus::Failed => "failed",
            PayrollStatus::Retry => "retry",
            PayrollStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the record is settled for year-end archiving.
    pub fn is_settled(&self) -> bool {
        matches!(self, PayrollStatus::Paid | PayrollStatus::Cancelled)
    }

    /// The status after `action`, or `None` when not allowed.
    ///
    /// # Example
    ///
    /// ```
    /// use callcenter_engine::models::{PayrollAction, PayrollStatus};
    ///
    /// assert_eq!(
    ///     PayrollStatus::Failed.apply(PayrollAction::Retry),
    ///     Some(PayrollStatus::Retry)
    /// );
    /// assert_eq!(PayrollStatus::Pending.apply(PayrollAction::Pay), None);
    /// ```
    pub fn apply(self, action: PayrollAction) -> Option<PayrollStatus> {
        use PayrollAction as A;
        use PayrollStatus as S;
        match (self, action) {
            (S::Pending, A::Confirm) => Some(S::Confirmed),
            (S::Confirmed | S::Retry, A::Pay) => Some(S::Paid),
            (S::Confirmed | S::Retry, A::Fail) => Some(S::Failed),
            (S::Failed | S::Retry, A::Retry) => Some(S::Retry),
            (S::Pending | S::Confirmed | S::Failed | S::Retry, A::Cancel) => Some(S::Cancelled),
            (S::Confirmed | S::Paid | S::Failed | S::Retry | S::Cancelled, A::Confirm)
            | (S::Pending | S::Paid | S::Failed | S::Cancelled, A::Pay)
            | (S::Pending | S::Paid | S::Failed | S::Cancelled, A::Fail)
            | (S::Pending | S::Confirmed | S::Paid | S::Cancelled, A::Retry)
            | (S::Paid | S::Cancelled, A::Cancel) => None,
        }
    }
}

/// How a payroll record was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Bank transfer; requires verified bank details.
    BankTransfer,
    /// Cash.
    Cash,
    /// Anything else.
    Other,
}

impl PaymentMethod {
    /// The persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Other => "other",
        }
    }
}

/// Kind of manual payroll adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    /// Reduces the total.
    Deduction,
    /// Increases the total.
    Allowance,
}

impl AdjustmentType {
    /// Display label used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            AdjustmentType::Deduction => "扣款",
            AdjustmentType::Allowance => "补贴",
        }
    }
}

/// One payable line per employee and month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRecord {
    /// Record id.
    pub id: u64,
    /// The employee paid.
    pub employee_id: u64,
    /// Employee number at generation time.
    pub employee_no: String,
    /// Employee name at generation time.
    pub employee_name: String,
    /// Team at generation time; used for manager scoping.
    pub team: String,
    /// Grade at generation time.
    pub grade_at_time: Grade,
    /// The month paid.
    pub year_month: YearMonth,
    /// Fixed component.
    pub base_salary: Decimal,
    /// Attendance bonus.
    pub attendance_bonus: Decimal,
    /// Performance bonus.
    pub performance_bonus: Decimal,
    /// Commission.
    pub commission: Decimal,
    /// Sum of the four components above.
    pub subtotal: Decimal,
    /// Accumulated deductions.
    pub deductions: Decimal,
    /// Accumulated allowances.
    pub allowances: Decimal,
    /// `subtotal + allowances - deductions`.
    pub total_salary: Decimal,
    /// Payment status.
    pub status: PayrollStatus,
    /// Finance user who confirmed the record.
    pub confirmed_by: Option<u64>,
    /// Name of the confirming finance user.
    pub confirmed_by_name: Option<String>,
    /// When the record was confirmed.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// How the record was paid.
    pub payment_method: Option<PaymentMethod>,
    /// When the record was paid.
    pub payment_date: Option<NaiveDate>,
    /// Transfer reference.
    pub payment_reference: Option<String>,
    /// Free-form finance note.
    pub finance_notes: Option<String>,
    /// Why the last payment attempt failed.
    pub failure_reason: Option<String>,
    /// Frozen by year-end archiving.
    pub is_archived: bool,
    /// The archive year, once archived.
    pub archive_year: Option<i32>,
}

impl PayrollRecord {
    /// Recomputes `total_salary` from its parts.
    pub fn recompute_total(&mut self) {
        self.total_salary = self.subtotal + self.allowances - self.deductions;
    }
}

/// One manual adjustment applied to a payroll record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollAdjustment {
    /// Record id.
    pub id: u64,
    /// The adjusted payroll record.
    pub payroll_id: u64,
    /// Deduction or allowance.
    pub adjustment_type: AdjustmentType,
    /// Positive amount.
    pub amount: Decimal,
    /// Mandatory reason.
    pub reason: String,
    /// Who adjusted.
    pub adjusted_by: u64,
    /// Name of the adjuster.
    pub adjusted_by_name: String,
    /// Role the adjuster acted under.
    pub adjusted_by_role: Role,
    /// When the adjustment was made.
    pub adjusted_at: DateTime<Utc>,
}

/// Per-month line of an archive summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// The month summarised.
    pub year_month: YearMonth,
    /// Distinct employees paid that month.
    pub total_employees: u32,
    /// Payroll records that month.
    pub total_records: u32,
    /// Sum of `total_salary` that month.
    pub total_amount: Decimal,
}

/// Year-end aggregate written when a year is archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollArchive {
    /// Record id.
    pub id: u64,
    /// The archived year.
    pub archive_year: i32,
    /// Distinct employees over the year.
    pub total_employees: u32,
    /// Records archived.
    pub total_records: u32,
    /// Sum of `total_salary` over the year.
    pub total_amount: Decimal,
    /// JSON array of [`MonthlySummary`].
    pub summary_json: String,
    /// Who archived.
    pub archived_by: u64,
    /// Name of the archiver.
    pub archived_by_name: String,
    /// When the archive was written.
    pub archived_at: DateTime<Utc>,
}
