//! Configuration loading and management for the rules engine.
//!
//! This module loads the grade-transition, promotion, challenge and payroll
//! thresholds from YAML files, and carries the same numbers as defaults.
//!
//! # Example
//!
//! ```no_run
//! use callcenter_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/callcenter").unwrap();
//! println!("Scan bound: {} days", config.rules().calendar.max_scan_days);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    AGradePay, BGradePay, CGradePay, CalendarOverride, CalendarRules, ChallengePeriod,
    ChallengeRules, ChallengeTrigger, PayrollRules, PerformanceTier, PromotionRules,
    RetentionRule, RulesConfig, TraineePromotionRule, TraineeRule, TransitionRules,
    WindowPromotionRule, WindowRule,
};
