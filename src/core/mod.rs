//! Core scheduling logic, framework-agnostic.

/// Single-flight submission coordinator and batch reports
pub mod coordinator;
/// Cycle rule data model (monthly/weekly recurrence)
pub mod cycle;
/// Transaction limits and execution validation
pub mod limits;
/// Standing order aggregate
pub mod order;
/// Due execution date calculation
pub mod schedule;
/// Account selection for batch scoping
pub mod selection;
