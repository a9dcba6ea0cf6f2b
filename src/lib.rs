//! `standing-orders` - the recurring-payment scheduling core of a banking
//! client.
//!
//! This crate turns a cycle description ("every 2 months, on the 15th",
//! "every week, on Monday") plus a validity window into concrete execution
//! dates, validates dates and amounts against per-order transaction
//! limits, and coordinates a strictly single-flight asynchronous
//! submission of due orders to a banking backend. Presentation, account
//! picking, and the wire protocol live outside; they talk to this crate
//! through [`session::OrderSession`] and the [`gateway::BankingGateway`] /
//! [`persistence::PersistenceContext`] contracts.

// Deny the most critical lints that could lead to bugs or security issues
#![deny(
    unsafe_code,
    unsafe_op_in_unsafe_fn,
    unreachable_code,
    unreachable_patterns,
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
)]
// Warn on things that should be fixed but aren't necessarily bugs
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::inefficient_to_string,
    clippy::large_types_passed_by_value,
    clippy::needless_pass_by_value,
    clippy::unnecessary_wraps,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::exit,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::cognitive_complexity,
    clippy::large_enum_variant,
    clippy::match_same_arms,
    clippy::too_many_lines,
    clippy::enum_glob_use,
    clippy::inconsistent_struct_constructor,
    clippy::must_use_candidate,
    clippy::redundant_closure_for_method_calls,
    clippy::semicolon_if_nothing_returned,
    clippy::wildcard_imports,
    future_incompatible,
    rust_2018_idioms,
)]
// Allow some pedantic lints that are too noisy or not applicable
#![allow(
    clippy::module_name_repetitions,  // Common pattern in Rust
    clippy::missing_errors_doc,        // Documented per function where useful
    clippy::missing_panics_doc,
)]

/// Scheduler configuration (timeouts, preview depth)
pub mod config;
/// Core scheduling logic - cycles, due dates, limits, coordination
pub mod core;
/// Unified error types and result handling
pub mod errors;
/// Banking gateway contract for batch submission
pub mod gateway;
/// Persistence contract and in-memory reference store
pub mod persistence;
/// Presentation-facing session facade (intents and observable state)
pub mod session;

#[cfg(test)]
pub mod test_utils;
