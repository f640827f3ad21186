//! Data Models Module
//!
//! Serializable summaries produced by the demo harness.

pub mod report;

pub use report::{CacheScenario, PoolRun, RetrySummary, RunReport};
