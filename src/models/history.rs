//! Append-only grade change log.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Grade;

/// One grade change. Written exactly once per change and never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    /// Record id; later entries have larger ids.
    pub id: u64,
    /// The employee whose grade changed.
    pub employee_id: u64,
    /// Grade before the change.
    pub from_grade: Grade,
    /// Grade after the change.
    pub to_grade: Grade,
    /// The date the change takes effect.
    pub change_date: NaiveDate,
    /// Why the change happened.
    pub reason: String,
    /// Days spent in `from_grade`, when known.
    pub days_in_previous_grade: Option<i64>,
}
