//! Rules engine for call-center workforce management
//!
//! This crate decides grade transitions (trainee → C → B → A, demotion and
//! elimination) from rolling workday windows, drives the promotion and
//! demotion-challenge approval workflows, computes tiered daily commission
//! and per-grade monthly salary, and runs the payroll record lifecycle.
//!
//! Pure rules live in [`calculation`]; the stateful workflows in [`workflow`]
//! read and write an in-process [`store::Datastore`] and report to audit and
//! notification sinks.

#![warn(missing_docs)]

pub mod calculation;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod workflow;
