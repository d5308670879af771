//! Control core for a grid-world construction agent.
//!
//! The agent builds (or excavates) a voxel schema relative to where it starts,
//! driving a host through single-cell motions, turns, inspections and
//! inventory transfers. The crate keeps the usual split:
//!
//! - **[`core`]**: Pure, deterministic logic (schema model, planner, frame
//!   math, failure classification). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting adapters (host capability trait, simulated
//!   world, operator prompts, config and schema files, run reports).
//!
//! Subsystem modules ([`tracker`], [`movement`], [`inventory`],
//! [`placement`], [`fuel`], [`manifest_check`]) operate on a shared
//! [`context::RunContext`], and [`orchestrator`] ties them into a run.

pub mod context;
pub mod core;
pub mod exit_codes;
pub mod fuel;
pub mod inventory;
pub mod io;
pub mod logging;
pub mod manifest_check;
pub mod movement;
pub mod orchestrator;
pub mod placement;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tracker;
