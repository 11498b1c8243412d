//! Scenario-based tests for the startup sequence

mod fail_fast;
mod history;
mod marker_order;
mod preflight;
mod variable_substitution;
