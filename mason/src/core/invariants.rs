//! Plan invariants not expressible in the planner's types.

use std::collections::HashSet;

use crate::core::planner::BuildStep;
use crate::core::types::{Side, Vec3};

/// Local cell the agent occupies when it acts on `step`.
///
/// Front placements act from one unit behind the target along the frame's
/// forward axis, so the target itself is never entered.
pub fn acting_cell(step: &BuildStep) -> Vec3 {
    match step.side {
        Side::Front => step.approach - Vec3::new(0, 0, 1),
        Side::Up | Side::Down => step.approach,
    }
}

/// Check structural invariants of a build order:
/// - No two steps target the same cell
/// - The agent never has to stand in a cell an earlier step filled
/// - The home cell (local origin) is never a target
/// - Step indices are sequential from zero
pub fn validate_plan(steps: &[BuildStep]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut filled = HashSet::new();

    for (i, step) in steps.iter().enumerate() {
        if step.index != i {
            errors.push(format!("step {}: index {} out of sequence", i, step.index));
        }
        if step.target == Vec3::ZERO {
            errors.push(format!(
                "step {}: target {} is the home cell",
                i, step.target
            ));
        }
        let stand = acting_cell(step);
        if filled.contains(&stand) {
            errors.push(format!(
                "step {}: agent must stand in {} which an earlier step filled",
                i, stand
            ));
        }
        if !filled.insert(step.target) {
            errors.push(format!("step {}: duplicate target {}", i, step.target));
        }
    }

    errors
}
