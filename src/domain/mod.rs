//! Core domain types and logic.

pub mod bar;
pub mod session;
pub mod indicator;
pub mod signal;
pub mod sizing;
pub mod position;
pub mod ledger;
pub mod engine;
pub mod metrics;
pub mod imbalance;
pub mod universe;
pub mod config;
pub mod config_validation;
pub mod error;
