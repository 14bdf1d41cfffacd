//! Pure calculation logic for the rules engine.
//!
//! This module contains the functions that read no store: the workday
//! calendar, tiered daily commission, the per-grade salary formula and the
//! grade transition table.

mod commission;
mod salary;
mod transition_rules;
mod workday;

pub use commission::{
    TIER_1_MAX_ORDERS, TIER_2_MAX_ORDERS, commission_breakdown, daily_commission,
    total_commission,
};
pub use salary::calculate_salary;
pub use transition_rules::{TransitionDecision, TransitionFacts, evaluate_transition, window_size};
pub use workday::{WorkCalendar, WorkdayScan};

pub(crate) use workday::add_days;
