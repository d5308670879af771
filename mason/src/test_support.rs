//! Test-only helpers: scripted operators, schema builders and stocked worlds.

use std::collections::VecDeque;
use std::path::PathBuf;

use crate::core::frame::Orientation;
use crate::core::schema::{Schema, SchemaCell};
use crate::core::types::{Facing, ItemStack, Vec3};
use crate::io::operator::{Decision, Operator};
use crate::io::sim::SimWorld;

/// Operator that answers from a queue and records every prompt.
///
/// Once the queue is empty it aborts; unanswered confirmations are `false`.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    decisions: VecDeque<Decision>,
    confirms: VecDeque<bool>,
    prompts: Vec<String>,
    acknowledged: Vec<String>,
}

impl ScriptedOperator {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_confirms(mut self, confirms: impl IntoIterator<Item = bool>) -> Self {
        self.confirms = confirms.into_iter().collect();
        self
    }

    /// Prompts passed to `decide` and `confirm`, in order.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn acknowledged(&self) -> &[String] {
        &self.acknowledged
    }
}

impl Operator for ScriptedOperator {
    fn decide(&mut self, prompt: &str) -> Decision {
        self.prompts.push(prompt.to_string());
        self.decisions.pop_front().unwrap_or(Decision::Abort)
    }

    fn choose_facing(&mut self, default: Facing) -> Facing {
        default
    }

    fn choose_orientation(&mut self, default: Orientation) -> Orientation {
        default
    }

    fn choose_schema(&mut self, candidates: &[PathBuf]) -> Option<PathBuf> {
        candidates.first().cloned()
    }

    fn confirm(&mut self, prompt: &str) -> bool {
        self.prompts.push(prompt.to_string());
        self.confirms.pop_front().unwrap_or(false)
    }

    fn acknowledge(&mut self, message: &str) {
        self.acknowledged.push(message.to_string());
    }
}

/// A `width` x `height` x `depth` box of one material, minimum corner at the origin.
pub fn solid_box(material: &str, width: i32, height: i32, depth: i32) -> Schema {
    let mut cells = Vec::new();
    for y in 0..height {
        for z in 0..depth {
            for x in 0..width {
                cells.push((Vec3::new(x, y, z), SchemaCell::new(material)));
            }
        }
    }
    Schema::from_cells(cells).expect("solid box schema")
}

/// Schema from text rows, one slice per layer (bottom first), rows along `+z`.
///
/// Each character is looked up in `legend`; `.` and space are air.
pub fn layered(legend: &[(char, &str)], layers: &[&[&str]]) -> Schema {
    let mut cells = Vec::new();
    for (y, rows) in layers.iter().enumerate() {
        for (z, row) in rows.iter().enumerate() {
            for (x, symbol) in row.chars().enumerate() {
                if symbol == '.' || symbol == ' ' {
                    continue;
                }
                let material = legend
                    .iter()
                    .find(|(s, _)| *s == symbol)
                    .map(|(_, m)| *m)
                    .unwrap_or_else(|| panic!("symbol '{symbol}' not in legend"));
                let at = Vec3::new(x as i32, y as i32, z as i32);
                cells.push((at, SchemaCell::new(material)));
            }
        }
    }
    Schema::from_cells(cells).expect("layered schema")
}

/// Default world with `items` onboard (one slot each) and an empty chest
/// under the home cell.
pub fn stocked_world(items: &[(&str, u32)]) -> SimWorld {
    let mut world = SimWorld::new();
    for (slot, (material, count)) in items.iter().enumerate() {
        world.give(slot, ItemStack::new(*material, *count));
    }
    world.add_container(Vec3::DOWN, "minecraft:chest", Vec::new());
    world
}
