//! Configuration types for the rules engine.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from the YAML files of a rules directory. Every struct
//! also implements [`Default`] with the production thresholds, so pure
//! callers can build a [`RulesConfig`] without touching the filesystem.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One configured calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarOverride {
    /// The calendar date.
    pub date: NaiveDate,
    /// Whether the date counts as a workday.
    pub is_workday: bool,
    /// Why the date was configured (holiday name, make-up day).
    #[serde(default)]
    pub reason: Option<String>,
}

/// Calendar configuration from calendar.yaml.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRules {
    /// Upper bound on days examined by any forward or backward scan.
    pub max_scan_days: u32,
    /// Overrides seeded into the work calendar at startup.
    #[serde(default)]
    pub overrides: Vec<CalendarOverride>,
}

impl Default for CalendarRules {
    fn default() -> Self {
        Self {
            max_scan_days: 365,
            overrides: Vec::new(),
        }
    }
}

/// Trainee rule of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraineeRule {
    /// Days in training before the automatic move to C.
    pub min_days: i64,
}

/// A windowed promote-or-demote rule (C and B rows of the table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRule {
    /// No change is considered before this many days in grade.
    pub window_opens_days: i64,
    /// Promotion is possible up to and including this many days in grade.
    pub max_days: i64,
    /// Size of the rolling workday window.
    pub recent_workdays: u32,
    /// Orders needed over the window.
    pub min_orders: u32,
}

/// A-grade retention rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionRule {
    /// Size of the rolling workday window.
    pub recent_workdays: u32,
    /// Orders at or below this over the window demote.
    pub demotion_max_orders: u32,
    /// From this day of the month the attendance check applies.
    pub month_end_day: u32,
    /// Valid workdays needed in the month once the check applies.
    pub min_monthly_valid_days: u32,
}

/// Grade transition table from transitions.yaml.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRules {
    /// trainee → C.
    pub trainee: TraineeRule,
    /// C → B or C → eliminated.
    pub c_grade: WindowRule,
    /// B → A or B → C.
    pub b_grade: WindowRule,
    /// A → C.
    pub a_grade: RetentionRule,
}

impl Default for TransitionRules {
    fn default() -> Self {
        Self {
            trainee: TraineeRule { min_days: 3 },
            c_grade: WindowRule {
                window_opens_days: 3,
                max_days: 6,
                recent_workdays: 3,
                min_orders: 3,
            },
            b_grade: WindowRule {
                window_opens_days: 6,
                max_days: 9,
                recent_workdays: 6,
                min_orders: 12,
            },
            a_grade: RetentionRule {
                recent_workdays: 6,
                demotion_max_orders: 12,
                month_end_day: 25,
                min_monthly_valid_days: 20,
            },
        }
    }
}

/// trainee → C eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraineePromotionRule {
    /// Workdays in training, both ends counted.
    pub workdays_required: u32,
    /// Whether a passed training assessment is required.
    pub requires_assessment: bool,
}

/// C → B and B → A eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPromotionRule {
    /// Workdays in grade may not exceed this.
    pub max_workdays: u32,
    /// Size of the rolling workday window.
    pub recent_workdays: u32,
    /// Orders needed over the window.
    pub min_orders: u32,
}

/// Promotion eligibility from promotion.yaml.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRules {
    /// trainee → C.
    pub trainee_to_c: TraineePromotionRule,
    /// C → B.
    pub c_to_b: WindowPromotionRule,
    /// B → A.
    pub b_to_a: WindowPromotionRule,
}

impl Default for PromotionRules {
    fn default() -> Self {
        Self {
            trainee_to_c: TraineePromotionRule {
                workdays_required: 3,
                requires_assessment: true,
            },
            c_to_b: WindowPromotionRule {
                max_workdays: 6,
                recent_workdays: 3,
                min_orders: 3,
            },
            b_to_a: WindowPromotionRule {
                max_workdays: 9,
                recent_workdays: 6,
                min_orders: 12,
            },
        }
    }
}

/// Demotion alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeTrigger {
    /// Size of the rolling workday window.
    pub recent_workdays: u32,
    /// Orders at or below this raise an alert.
    pub max_orders: u32,
}

/// The challenge window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengePeriod {
    /// Workdays in the window.
    pub workdays: u32,
    /// Orders needed over the whole window.
    pub target_orders: u32,
}

/// Demotion challenge rules from challenge.yaml.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRules {
    /// Alert threshold.
    pub trigger: ChallengeTrigger,
    /// Challenge window.
    pub period: ChallengePeriod,
    /// Downgrade or challenge decisions allowed per employee per month.
    pub monthly_limit: u32,
    /// Display flag shown while a challenge runs.
    pub display_label: String,
}

impl Default for ChallengeRules {
    fn default() -> Self {
        Self {
            trigger: ChallengeTrigger {
                recent_workdays: 6,
                max_orders: 12,
            },
            period: ChallengePeriod {
                workdays: 3,
                target_orders: 9,
            },
            monthly_limit: 1,
            display_label: "A（保级挑战中）".to_string(),
        }
    }
}

/// C-grade fixed pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CGradePay {
    /// Pay per qualified day.
    pub daily_rate: Decimal,
    /// Work days needed to qualify; also the number of paid days.
    pub qualifying_days: u32,
    /// Upper bound on the fixed component.
    pub cap: Decimal,
}

/// B-grade fixed pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BGradePay {
    /// Pay per work day.
    pub daily_rate: Decimal,
    /// Paid work days are capped at this.
    pub max_days: u32,
}

/// One A-grade performance bonus tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceTier {
    /// Monthly orders needed for this tier.
    pub min_orders: u32,
    /// Bonus paid at this tier.
    pub bonus: Decimal,
}

/// A-grade pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AGradePay {
    /// Monthly base salary.
    pub base_salary: Decimal,
    /// Full attendance bonus.
    pub attendance_bonus: Decimal,
    /// Valid workdays needed for the attendance bonus.
    pub attendance_min_valid_days: u32,
    /// How many of the month's latest records the recent-orders check reads.
    pub attendance_recent_records: usize,
    /// Orders needed over those records.
    pub attendance_min_recent_orders: u32,
    /// Volume bonus tiers, any order.
    pub performance_tiers: Vec<PerformanceTier>,
}

impl AGradePay {
    /// The volume bonus for `total_orders`: the highest tier reached.
    pub fn performance_bonus(&self, total_orders: u32) -> Decimal {
        self.performance_tiers
            .iter()
            .filter(|tier| total_orders >= tier.min_orders)
            .max_by_key(|tier| tier.min_orders)
            .map(|tier| tier.bonus)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Salary formula parameters from payroll.yaml.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRules {
    /// C grade.
    pub c_grade: CGradePay,
    /// B grade.
    pub b_grade: BGradePay,
    /// A grade.
    pub a_grade: AGradePay,
}

impl Default for PayrollRules {
    fn default() -> Self {
        Self {
            c_grade: CGradePay {
                daily_rate: Decimal::from(30),
                qualifying_days: 3,
                cap: Decimal::from(90),
            },
            b_grade: BGradePay {
                daily_rate: Decimal::from(88),
                max_days: 6,
            },
            a_grade: AGradePay {
                base_salary: Decimal::from(2200),
                attendance_bonus: Decimal::from(400),
                attendance_min_valid_days: 25,
                attendance_recent_records: 6,
                attendance_min_recent_orders: 12,
                performance_tiers: vec![
                    PerformanceTier {
                        min_orders: 75,
                        bonus: Decimal::from(300),
                    },
                    PerformanceTier {
                        min_orders: 100,
                        bonus: Decimal::from(600),
                    },
                    PerformanceTier {
                        min_orders: 125,
                        bonus: Decimal::from(1000),
                    },
                ],
            },
        }
    }
}

/// The complete rules configuration.
///
/// Aggregates every file of a rules directory.
///
/// # Example
///
/// ```
/// use callcenter_engine::config::RulesConfig;
///
/// let rules = RulesConfig::default();
/// assert_eq!(rules.calendar.max_scan_days, 365);
/// assert_eq!(rules.challenge.period.target_orders, 9);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Work calendar.
    pub calendar: CalendarRules,
    /// Status engine table.
    pub transitions: TransitionRules,
    /// Promotion eligibility.
    pub promotion: PromotionRules,
    /// Demotion challenge.
    pub challenge: ChallengeRules,
    /// Salary formula.
    pub payroll: PayrollRules,
}
