//! Daily performance and training records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One employee's output for one date.
///
/// `(employee_id, work_date)` is unique. The record is the sole input to
/// rolling-window checks and to payroll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPerformance {
    /// The employee the record belongs to.
    pub employee_id: u64,
    /// The date worked.
    pub work_date: NaiveDate,
    /// Orders closed that day.
    pub orders_count: u32,
    /// Commission for that day's orders.
    pub commission: Decimal,
    /// Whether the day counts toward rolling windows and payroll.
    pub is_valid_workday: bool,
}

/// A recorded training assessment for a trainee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingAssessment {
    /// Record id.
    pub id: u64,
    /// The assessed employee.
    pub employee_id: u64,
    /// When the assessment took place.
    pub assessment_date: NaiveDate,
    /// Basic call-script check.
    pub script_passed: bool,
    /// Mock order check.
    pub mock_order_passed: bool,
    /// Who recorded the result.
    pub assessor_name: String,
}

impl TrainingAssessment {
    /// Both parts must pass for the trainee→C promotion.
    pub fn both_passed(&self) -> bool {
        self.script_passed && self.mock_order_passed
    }
}
