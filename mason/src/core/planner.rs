//! Serpentine build order.
//!
//! Layers are visited bottom-up (`y` ascending); within a layer rows are
//! visited by ascending `z`; the `x` direction alternates per row, starting
//! low-to-high on the first row of every layer. The output depends only on
//! the schema, bounds and [`PlanOptions`], so a dry-run preview and the real
//! run always agree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::frame::Orientation;
use crate::core::schema::{Bounds, Schema, SchemaCell};
use crate::core::types::{Material, Side, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    /// Local offset of the schema's minimum corner from the frame origin.
    pub offset: Vec3,
    pub orientation: Orientation,
    /// Side used for cells without per-cell side metadata.
    pub default_side: Side,
    /// Overwrite policy for cells without per-cell metadata.
    pub default_overwrite: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            offset: Vec3::new(0, 0, 1),
            orientation: Orientation::Right,
            default_side: Side::Down,
            default_overwrite: false,
        }
    }
}

/// One planned action. Produced once; never mutated during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    pub index: usize,
    /// Schema coordinate.
    pub cell: Vec3,
    /// Local coordinate of the target cell.
    pub target: Vec3,
    /// Local coordinate the agent acts from.
    pub approach: Vec3,
    pub material: Material,
    pub side: Side,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub steps: Vec<BuildStep>,
    /// Explicit air cells inside the bounds that produced no step.
    pub skipped: usize,
}

/// Plan a schema over its own bounds.
pub fn plan(schema: &Schema, options: &PlanOptions) -> Plan {
    let bounds = schema.bounds();
    let steps = build_order(schema, bounds, options);
    let skipped = schema
        .cells()
        .filter(|(p, cell)| bounds.contains(*p) && cell.material.is_air())
        .count();
    Plan { steps, skipped }
}

/// Ordered build steps for every non-air cell of `schema` inside `bounds`.
#[instrument(skip_all, fields(min = %bounds.min, max = %bounds.max))]
pub fn build_order(schema: &Schema, bounds: Bounds, options: &PlanOptions) -> Vec<BuildStep> {
    // (y, z) -> x -> cell, so rows come out layer-major and can be walked either way.
    let mut rows: BTreeMap<(i32, i32), BTreeMap<i32, &SchemaCell>> = BTreeMap::new();
    for (p, cell) in schema.cells() {
        if !bounds.contains(p) || cell.material.is_air() {
            continue;
        }
        rows.entry((p.y, p.z)).or_default().insert(p.x, cell);
    }

    let mut steps = Vec::with_capacity(schema.solid_count());
    for ((y, z), row) in &rows {
        let forward = (z - bounds.min.z) % 2 == 0;
        let mut ordered: Vec<(&i32, &&SchemaCell)> = row.iter().collect();
        if !forward {
            ordered.reverse();
        }
        for (x, cell) in ordered {
            let index = steps.len();
            let schema_pos = Vec3::new(*x, *y, *z);
            steps.push(make_step(index, schema_pos, cell, bounds, options));
        }
    }
    debug!(steps = steps.len(), rows = rows.len(), "build order computed");
    steps
}

fn make_step(
    index: usize,
    cell: Vec3,
    schema_cell: &SchemaCell,
    bounds: Bounds,
    options: &PlanOptions,
) -> BuildStep {
    let rel = cell - bounds.min;
    let target = options.offset
        + Vec3::new(rel.x * options.orientation.x_sign(), rel.y, rel.z);
    let side = schema_cell.meta.side.unwrap_or(options.default_side);
    BuildStep {
        index,
        cell,
        target,
        approach: approach_for(target, side),
        material: schema_cell.material.clone(),
        side,
        overwrite: schema_cell.meta.overwrite.unwrap_or(options.default_overwrite),
    }
}

/// Cell the agent stands in to act on `target` through `side`.
///
/// Placing upward means standing below the target, placing downward means
/// standing above it. Front placements keep the target itself, a horizontal
/// approach; the agent acts from the cell behind it
/// ([`crate::core::invariants::acting_cell`]).
pub fn approach_for(target: Vec3, side: Side) -> Vec3 {
    match side {
        Side::Up => target + Vec3::DOWN,
        Side::Down => target + Vec3::UP,
        Side::Front => target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::CellMeta;

    fn slab(width: i32, depth: i32, layers: i32) -> Schema {
        let mut cells = Vec::new();
        for y in 0..layers {
            for z in 0..depth {
                for x in 0..width {
                    cells.push((Vec3::new(x, y, z), SchemaCell::new("stone")));
                }
            }
        }
        Schema::from_cells(cells).expect("schema")
    }

    #[test]
    fn rows_alternate_direction() {
        let schema = slab(3, 2, 1);
        let steps = build_order(&schema, schema.bounds(), &PlanOptions::default());
        let xs: Vec<i32> = steps.iter().map(|s| s.cell.x).collect();
        assert_eq!(xs, vec![0, 1, 2, 2, 1, 0]);
        let zs: Vec<i32> = steps.iter().map(|s| s.cell.z).collect();
        assert_eq!(zs, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn layers_go_bottom_up_and_restart_row_parity() {
        let schema = slab(2, 1, 2);
        let steps = build_order(&schema, schema.bounds(), &PlanOptions::default());
        let cells: Vec<Vec3> = steps.iter().map(|s| s.cell).collect();
        assert_eq!(
            cells,
            vec![
                Vec3::new(0, 0, 0),
                Vec3::new(1, 0, 0),
                Vec3::new(0, 1, 0),
                Vec3::new(1, 1, 0),
            ]
        );
    }

    #[test]
    fn indices_are_sequential() {
        let schema = slab(2, 2, 2);
        let steps = build_order(&schema, schema.bounds(), &PlanOptions::default());
        assert!(steps.iter().enumerate().all(|(i, s)| s.index == i));
    }

    #[test]
    fn approach_depends_on_side() {
        let target = Vec3::new(4, 2, 1);
        assert_eq!(approach_for(target, Side::Down), Vec3::new(4, 3, 1));
        assert_eq!(approach_for(target, Side::Up), Vec3::new(4, 1, 1));
        assert_eq!(approach_for(target, Side::Front), target);
    }

    #[test]
    fn offset_and_left_orientation_are_applied() {
        let schema = Schema::from_cells([
            (Vec3::new(10, 5, 3), SchemaCell::new("stone")),
            (Vec3::new(12, 5, 3), SchemaCell::new("stone")),
        ])
        .expect("schema");
        let options = PlanOptions {
            offset: Vec3::new(1, 0, 2),
            orientation: Orientation::Left,
            ..PlanOptions::default()
        };
        let steps = build_order(&schema, schema.bounds(), &options);
        assert_eq!(steps[0].target, Vec3::new(1, 0, 2));
        assert_eq!(steps[1].target, Vec3::new(-1, 0, 2));
        assert_eq!(steps[1].approach, Vec3::new(-1, 1, 2));
    }

    #[test]
    fn cell_meta_overrides_defaults() {
        let meta = CellMeta {
            side: Some(Side::Up),
            overwrite: Some(true),
        };
        let schema = Schema::from_cells([(Vec3::ZERO, SchemaCell::with_meta("lamp", meta))])
            .expect("schema");
        let steps = build_order(&schema, schema.bounds(), &PlanOptions::default());
        assert_eq!(steps[0].side, Side::Up);
        assert!(steps[0].overwrite);
        assert_eq!(steps[0].approach, steps[0].target + Vec3::DOWN);
    }

    #[test]
    fn sparse_schema_in_large_bounds_yields_only_solid_cells() {
        let schema = Schema::with_bounds(
            [
                (Vec3::new(0, 0, 0), SchemaCell::new("stone")),
                (Vec3::new(1, 0, 1), SchemaCell::new("stone")),
                (Vec3::new(1, 0, 0), SchemaCell::new("air")),
            ],
            Bounds::new(Vec3::new(0, 0, 0), Vec3::new(9, 9, 9)),
        )
        .expect("schema");
        let plan = plan(&schema, &PlanOptions::default());
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.skipped, 1);
    }
}
