//! Deterministic, pure logic shared by the agent core.
//!
//! Core modules must be free of host side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod frame;
pub mod invariants;
pub mod manifest;
pub mod planner;
pub mod schema;
pub mod types;
