//! Threshold-breach detection.
//!
//! - `policy`: which bound(s) apply to a metric type
//! - `evaluator`: all-or-nothing check over the newest N values
//! - `engine`: fetch history, evaluate, persist the alert
//! - `locks`: per sensor+metric critical section used by the engine

mod engine;
mod evaluator;
mod locks;
mod policy;

pub use engine::AlertingEngine;
