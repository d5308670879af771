//! Manifest / initialization checker.
//!
//! Compares a material requirement list with what the agent carries plus
//! what the containers around it hold.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{info, warn};

use crate::context::RunContext;
use crate::core::manifest::{Manifest, Shortfall};
use crate::core::types::{Material, RelativeDir};
use crate::inventory::{self, InventoryError, facing_for};
use crate::io::host::Host;
use crate::io::operator::{Decision, Operator};
use crate::tracker::{self, TurnError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("materials short: {}", describe(.0))]
    Shortfall(Vec<Shortfall>),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    Turn(#[from] TurnError),
}

fn describe(shortfalls: &[Shortfall]) -> String {
    shortfalls
        .iter()
        .map(|s| format!("{} needs {} more", s.material, s.missing()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestReport {
    pub onboard: BTreeMap<Material, u32>,
    pub nearby: BTreeMap<Material, u32>,
    pub shortfalls: Vec<Shortfall>,
}

impl ManifestReport {
    pub fn available(&self, material: &Material) -> u32 {
        self.onboard.get(material).copied().unwrap_or(0)
            + self.nearby.get(material).copied().unwrap_or(0)
    }

    pub fn is_satisfied(&self) -> bool {
        self.shortfalls.is_empty()
    }
}

/// Count onboard and nearby materials against `required`.
pub fn survey<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    required: &Manifest,
) -> Result<ManifestReport, ManifestError> {
    inventory::scan(ctx, host, true)?;
    let onboard = ctx.inventory.totals.clone();
    let nearby = nearby_totals(ctx, host)?;
    let mut report = ManifestReport {
        onboard,
        nearby,
        shortfalls: Vec::new(),
    };
    report.shortfalls = required.shortfalls(|m| report.available(m));
    Ok(report)
}

/// Sum the contents of every container in the supply directions.
fn nearby_totals<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
) -> Result<BTreeMap<Material, u32>, ManifestError> {
    let original = ctx.facing;
    let mut dirs = ctx.settings.supply_dirs.clone();
    if ctx.settings.search_around {
        for dir in [RelativeDir::Left, RelativeDir::Back, RelativeDir::Right] {
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
    }
    let mut totals = BTreeMap::new();
    for dir in dirs {
        let (side, _) = dir.approach();
        tracker::face(ctx, host, facing_for(original, dir))?;
        if host.container(side).is_none() {
            continue;
        }
        match host.container_items(side) {
            Ok(items) => {
                for stack in items {
                    *totals.entry(stack.material).or_insert(0) += stack.count;
                }
            }
            Err(reason) => warn!(?dir, %reason, "could not read container"),
        }
    }
    tracker::face(ctx, host, original)?;
    Ok(totals)
}

/// Survey and, when configured to block, keep asking the operator until the
/// shortfall is resolved. `Cancel` starts anyway; `Abort` fails.
pub fn require<H, O>(
    ctx: &mut RunContext,
    host: &mut H,
    operator: &mut O,
    required: &Manifest,
) -> Result<ManifestReport, ManifestError>
where
    H: Host + ?Sized,
    O: Operator + ?Sized,
{
    loop {
        let report = survey(ctx, host, required)?;
        if report.is_satisfied() {
            info!(materials = required.len(), total = required.total(), "manifest satisfied");
            return Ok(report);
        }
        let message = describe(&report.shortfalls);
        warn!(shortfalls = %message, "manifest short");
        if !ctx.settings.block_on_shortfall {
            return Ok(report);
        }
        match operator.decide(&format!("Missing materials: {message}. Load them and retry?")) {
            Decision::Retry => ctx.stats.manual_pauses += 1,
            Decision::Cancel => return Ok(report),
            Decision::Abort => return Err(ManifestError::Shortfall(report.shortfalls)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Facing, ItemStack, Vec3};
    use crate::io::config::MasonConfig;
    use crate::io::operator::Headless;
    use crate::io::sim::SimWorld;
    use crate::test_support::ScriptedOperator;

    fn ctx(block: bool) -> RunContext {
        let mut cfg = MasonConfig::default();
        cfg.manifest.block_on_shortfall = block;
        RunContext::new(&cfg, Vec3::ZERO, Facing::North)
    }

    fn required() -> Manifest {
        Manifest::from_entries([
            (Material::from("stone"), 30),
            (Material::from("glass"), 4),
        ])
    }

    #[test]
    fn survey_counts_onboard_and_nearby() {
        let mut ctx = ctx(false);
        let mut world = SimWorld::new();
        world.give(0, ItemStack::new("stone", 10));
        world.add_container(Vec3::new(0, 0, 1), "minecraft:chest", vec![ItemStack::new("stone", 25)]);
        world.add_container(Vec3::DOWN, "minecraft:barrel", vec![ItemStack::new("glass", 1)]);
        let report = survey(&mut ctx, &mut world, &required()).expect("survey");
        assert_eq!(report.available(&"stone".into()), 35);
        assert_eq!(
            report.shortfalls,
            vec![Shortfall {
                material: "glass".into(),
                required: 4,
                available: 1
            }]
        );
        assert_eq!(world.facing(), Facing::North);
    }

    #[test]
    fn non_blocking_require_returns_report() {
        let mut ctx = ctx(false);
        let mut world = SimWorld::new();
        let report = require(&mut ctx, &mut world, &mut Headless, &required()).expect("require");
        assert!(!report.is_satisfied());
    }

    #[test]
    fn blocking_require_aborts_headless() {
        let mut ctx = ctx(true);
        let mut world = SimWorld::new();
        let err = require(&mut ctx, &mut world, &mut Headless, &required()).unwrap_err();
        assert!(err.to_string().contains("stone needs 30 more"));
    }

    #[test]
    fn blocking_require_retries_after_operator_loads_materials() {
        let mut ctx = ctx(true);
        let mut world = SimWorld::new();
        world.give(0, ItemStack::new("stone", 30));
        world.give(1, ItemStack::new("glass", 3));
        let mut operator = ScriptedOperator::new([Decision::Retry, Decision::Cancel]);
        let report = require(&mut ctx, &mut world, &mut operator, &required()).expect("require");
        assert_eq!(report.shortfalls.len(), 1);
        assert_eq!(ctx.stats.manual_pauses, 1);
        assert_eq!(operator.prompts().len(), 2);
    }
}
