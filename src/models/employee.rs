//! Employee model and grade ladder.
//!
//! This module defines the [`Employee`] record and the closed [`Grade`] enum
//! that drives both eligibility rules and the payroll formula.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// An employee's tier.
///
/// The persisted vocabulary (`trainee`, `C`, `B`, `A`, `eliminated`) is what
/// downstream reporting keys off, so it is fixed by the serde names below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    /// Newly joined, in training.
    #[serde(rename = "trainee")]
    Trainee,
    /// Entry grade after training.
    #[serde(rename = "C")]
    C,
    /// Intermediate grade.
    #[serde(rename = "B")]
    B,
    /// Top grade.
    #[serde(rename = "A")]
    A,
    /// Removed from the ladder; terminal.
    #[serde(rename = "eliminated")]
    Eliminated,
}

impl Grade {
    /// The persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Trainee => "trainee",
            Grade::C => "C",
            Grade::B => "B",
            Grade::A => "A",
            Grade::Eliminated => "eliminated",
        }
    }

    /// The grade a successful promotion leads to, if any.
    pub fn promotion_target(&self) -> Option<Grade> {
        match self {
            Grade::Trainee => Some(Grade::C),
            Grade::C => Some(Grade::B),
            Grade::B => Some(Grade::A),
            Grade::A | Grade::Eliminated => None,
        }
    }

    /// Whether the status engine may move an employee from `self` to `to`.
    ///
    /// # Example
    ///
    /// ```
    /// use callcenter_engine::models::Grade;
    ///
    /// assert!(Grade::Trainee.can_transition_to(Grade::C));
    /// assert!(Grade::A.can_transition_to(Grade::C));
    /// assert!(!Grade::A.can_transition_to(Grade::B));
    /// assert!(!Grade::Eliminated.can_transition_to(Grade::C));
    /// ```
    pub fn can_transition_to(&self, to: Grade) -> bool {
        matches!(
            (self, to),
            (Grade::Trainee, Grade::C)
                | (Grade::C, Grade::B)
                | (Grade::B, Grade::A)
                | (Grade::A, Grade::C)
                | (Grade::B, Grade::C)
                | (Grade::C, Grade::Eliminated)
        )
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trainee" => Ok(Grade::Trainee),
            "C" => Ok(Grade::C),
            "B" => Ok(Grade::B),
            "A" => Ok(Grade::A),
            "eliminated" => Ok(Grade::Eliminated),
            other => Err(EngineError::invalid_input(format!("未知的员工状态：{}", other))),
        }
    }
}

/// Represents an employee on the call-center floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier for the employee.
    pub id: u64,
    /// Human-readable employee number.
    pub employee_no: String,
    /// Display name; bank-transfer payments check the account holder against it.
    pub name: String,
    /// The team the employee belongs to.
    pub team: String,
    /// The current grade.
    pub grade: Grade,
    /// The date the employee joined.
    pub join_date: NaiveDate,
    /// Whether the employee is still employed.
    pub is_active: bool,
    /// The demotion challenge currently in progress, if any.
    #[serde(default)]
    pub current_challenge_id: Option<u64>,
    /// Challenges started in the month of `last_challenge_date`.
    #[serde(default)]
    pub challenge_count_this_month: u32,
    /// Start date of the most recent challenge.
    #[serde(default)]
    pub last_challenge_date: Option<NaiveDate>,
    /// Display override such as "A（保级挑战中）".
    #[serde(default)]
    pub status_display: Option<String>,
    /// Bank account number on file.
    #[serde(default)]
    pub bank_account_number: Option<String>,
    /// Name of the bank account holder.
    #[serde(default)]
    pub account_holder_name: Option<String>,
}

impl Employee {
    /// Creates an active employee with no challenge or bank details.
    pub fn new(
        id: u64,
        employee_no: impl Into<String>,
        name: impl Into<String>,
        team: impl Into<String>,
        grade: Grade,
        join_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            employee_no: employee_no.into(),
            name: name.into(),
            team: team.into(),
            grade,
            join_date,
            is_active: true,
            current_challenge_id: None,
            challenge_count_this_month: 0,
            last_challenge_date: None,
            status_display: None,
            bank_account_number: None,
            account_holder_name: None,
        }
    }

    /// Returns true when bank details exist and the holder matches the employee name.
    pub fn has_verified_bank_account(&self) -> bool {
        let has_account = self
            .bank_account_number
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty());
        has_account && self.account_holder_name.as_deref() == Some(self.name.as_str())
    }

    /// Returns true while a demotion challenge is running.
    pub fn is_in_challenge(&self) -> bool {
        self.current_challenge_id.is_some()
    }
}
