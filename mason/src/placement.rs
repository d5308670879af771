//! Placement engine.
//!
//! Places (or, in excavation mode, clears) the cell on one side of the agent.
//! Failures are reduced to a closed set of kinds so the orchestrator can pick
//! between restocking, waiting for manual clearing and giving up.

use thiserror::Error;
use tracing::{debug, warn};

use crate::context::RunContext;
use crate::core::classifier::{PlaceFailureKind, classify_place_failure, mentions_entity};
use crate::core::schema::CellMeta;
use crate::core::types::{Material, Side};
use crate::inventory::{self, InventoryError};
use crate::io::config::PlacementConfig;
use crate::io::host::Host;

/// Dig/attack rounds spent on a cell that keeps refilling (sand, gravel).
const CLEAR_ROUNDS: u32 = 8;

/// Run-wide placement defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacePolicy {
    pub default_side: Side,
    pub overwrite: bool,
    pub dig: bool,
    pub attack: bool,
}

impl PlacePolicy {
    pub fn from_config(cfg: &PlacementConfig) -> Self {
        Self {
            default_side: cfg.default_side,
            overwrite: cfg.overwrite,
            dig: cfg.dig,
            attack: cfg.attack,
        }
    }
}

impl Default for PlacePolicy {
    fn default() -> Self {
        Self::from_config(&PlacementConfig::default())
    }
}

/// Per-call overrides. Unset fields fall back to cell metadata, then policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaceOptions {
    pub side: Option<Side>,
    pub overwrite: Option<bool>,
    pub dig: Option<bool>,
    pub attack: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    Placed { slot: usize },
    /// The cell already held the material; nothing was done.
    Reused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    AlreadyEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceError {
    #[error("invalid material '{0}'")]
    InvalidMaterial(Material),
    #[error("no {material} left to place")]
    MissingMaterial { material: Material },
    #[error("{side} cell holds {found}, not {material}")]
    Occupied {
        side: Side,
        found: Material,
        material: Material,
    },
    #[error("{side} cell is blocked: {reason}")]
    Blocked { side: Side, reason: String },
    #[error("placing {material} failed: {reason}")]
    PlacementFailed { material: Material, reason: String },
}

struct Resolved {
    side: Side,
    overwrite: bool,
    dig: bool,
    attack: bool,
}

fn resolve(policy: &PlacePolicy, meta: CellMeta, opts: &PlaceOptions) -> Resolved {
    Resolved {
        side: opts.side.or(meta.side).unwrap_or(policy.default_side),
        overwrite: opts.overwrite.or(meta.overwrite).unwrap_or(policy.overwrite),
        dig: opts.dig.unwrap_or(policy.dig),
        attack: opts.attack.unwrap_or(policy.attack),
    }
}

/// Place `material` into the cell on the resolved side.
///
/// A slot holding `material` is selected before the target is inspected, so
/// an empty inventory is always [`PlaceError::MissingMaterial`], even over a
/// cell that is already built. A cell that already holds `material` is
/// [`PlaceOutcome::Reused`] and no placement is issued.
pub fn place_material<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    material: &Material,
    meta: CellMeta,
    opts: &PlaceOptions,
) -> Result<PlaceOutcome, PlaceError> {
    if material.is_air() {
        return Err(PlaceError::InvalidMaterial(material.clone()));
    }
    let r = resolve(&ctx.settings.placement, meta, opts);

    let slot = inventory::select_material(ctx, host, material).map_err(|err| match err {
        InventoryError::MissingMaterial(material) => PlaceError::MissingMaterial { material },
        InventoryError::InvalidMaterial(material) => PlaceError::InvalidMaterial(material),
        other => PlaceError::PlacementFailed {
            material: material.clone(),
            reason: other.to_string(),
        },
    })?;

    if let Some(found) = host.inspect(r.side).filter(|m| !m.is_air()) {
        if &found == material {
            debug!(%material, side = %r.side, "already present");
            return Ok(PlaceOutcome::Reused);
        }
        if !r.overwrite {
            return Err(PlaceError::Occupied {
                side: r.side,
                found,
                material: material.clone(),
            });
        }
        clear_target(ctx, host, r.side, r.dig, r.attack)
            .map_err(|reason| PlaceError::Blocked { side: r.side, reason })?;
        debug!(%found, side = %r.side, "cleared conflicting block");
    }

    let result = match host.place(r.side) {
        Ok(()) => Ok(()),
        Err(reason) if r.attack && mentions_entity(&reason) => {
            debug!(side = %r.side, %reason, "entity in the way, attacking");
            match host.attack(r.side) {
                Ok(()) => host.place(r.side),
                Err(_) => Err(reason),
            }
        }
        Err(reason) => Err(reason),
    };

    match result {
        Ok(()) => {
            inventory::record_removed(ctx, slot, 1);
            Ok(PlaceOutcome::Placed { slot })
        }
        Err(reason) => Err(classify_failure(ctx, material, r.side, reason)),
    }
}

fn classify_failure(
    ctx: &mut RunContext,
    material: &Material,
    side: Side,
    reason: String,
) -> PlaceError {
    match classify_place_failure(&reason) {
        PlaceFailureKind::MissingMaterial => {
            ctx.inventory.dirty = true;
            ctx.inventory.last_good.remove(material);
            PlaceError::MissingMaterial {
                material: material.clone(),
            }
        }
        PlaceFailureKind::Blocked => PlaceError::Blocked { side, reason },
        PlaceFailureKind::Other => {
            warn!(%material, %side, %reason, "placement failed");
            PlaceError::PlacementFailed {
                material: material.clone(),
                reason,
            }
        }
    }
}

/// Empty the cell on `side`: dig (then attack) until nothing is detected.
pub fn clear_cell<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    side: Side,
    opts: &PlaceOptions,
) -> Result<ClearOutcome, PlaceError> {
    let dig = opts.dig.unwrap_or(true);
    let attack = opts.attack.unwrap_or(ctx.settings.placement.attack);
    if host.inspect(side).filter(|m| !m.is_air()).is_none() {
        return Ok(ClearOutcome::AlreadyEmpty);
    }
    clear_target(ctx, host, side, dig, attack)
        .map_err(|reason| PlaceError::Blocked { side, reason })?;
    Ok(ClearOutcome::Cleared)
}

/// Dig then attack until the cell reads empty. `Err` carries the last host reason.
fn clear_target<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    side: Side,
    dig: bool,
    attack: bool,
) -> Result<(), String> {
    let mut last = String::from("clearing not permitted");
    for _ in 0..CLEAR_ROUNDS {
        if host.inspect(side).filter(|m| !m.is_air()).is_none() {
            return Ok(());
        }
        let mut cleared = false;
        if dig {
            match host.dig(side) {
                Ok(()) => {
                    ctx.inventory.dirty = true;
                    cleared = true;
                }
                Err(reason) => last = reason,
            }
        }
        if !cleared && attack {
            match host.attack(side) {
                Ok(()) => cleared = true,
                Err(reason) => last = reason,
            }
        }
        if !cleared {
            return Err(last);
        }
    }
    if host.inspect(side).filter(|m| !m.is_air()).is_none() {
        Ok(())
    } else {
        Err(format!("cell keeps refilling after {CLEAR_ROUNDS} rounds"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Facing, ItemStack, Vec3};
    use crate::io::config::MasonConfig;
    use crate::io::sim::SimWorld;

    fn ctx() -> RunContext {
        RunContext::new(&MasonConfig::default(), Vec3::ZERO, Facing::North)
    }

    fn stone() -> Material {
        Material::from("minecraft:stone")
    }

    fn down() -> PlaceOptions {
        PlaceOptions {
            side: Some(Side::Down),
            ..PlaceOptions::default()
        }
    }

    #[test]
    fn places_from_selected_slot() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.give(6, ItemStack::new("minecraft:stone", 3));
        let outcome =
            place_material(&mut ctx, &mut world, &stone(), CellMeta::default(), &down()).expect("place");
        assert_eq!(outcome, PlaceOutcome::Placed { slot: 6 });
        assert_eq!(world.block_at(Vec3::DOWN), Some(&stone()));
        assert_eq!(ctx.inventory.total(&stone()), 2);
        assert_eq!(world.inventory_total(&stone()), 2);
    }

    #[test]
    fn existing_material_is_reused_without_commands() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.give(3, ItemStack::new("minecraft:stone", 2));
        world.set_block(Vec3::DOWN, "minecraft:stone");
        for _ in 0..2 {
            let outcome = place_material(&mut ctx, &mut world, &stone(), CellMeta::default(), &down())
                .expect("place");
            assert_eq!(outcome, PlaceOutcome::Reused);
        }
        assert_eq!(world.counters().places, 0);
        assert_eq!(world.inventory_total(&stone()), 2);
    }

    #[test]
    fn empty_inventory_is_missing_material_even_over_a_built_cell() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.set_block(Vec3::DOWN, "minecraft:stone");
        let err = place_material(&mut ctx, &mut world, &stone(), CellMeta::default(), &down())
            .unwrap_err();
        assert_eq!(err, PlaceError::MissingMaterial { material: stone() });
        assert_eq!(world.block_at(Vec3::DOWN), Some(&stone()));
    }

    #[test]
    fn reuse_does_not_touch_inventory() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.give(2, ItemStack::new("minecraft:stone", 4));
        place_material(&mut ctx, &mut world, &stone(), CellMeta::default(), &down()).expect("first");
        let before = world.inventory_total(&stone());
        let outcome =
            place_material(&mut ctx, &mut world, &stone(), CellMeta::default(), &down()).expect("second");
        assert_eq!(outcome, PlaceOutcome::Reused);
        assert_eq!(world.inventory_total(&stone()), before);
        assert_eq!(world.counters().places, 1);
    }

    #[test]
    fn conflicting_block_without_overwrite_is_occupied() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.give(0, ItemStack::new("minecraft:stone", 1));
        world.set_block(Vec3::DOWN, "minecraft:dirt");
        let err = place_material(&mut ctx, &mut world, &stone(), CellMeta::default(), &down())
            .unwrap_err();
        assert!(matches!(err, PlaceError::Occupied { .. }));
        assert_eq!(world.counters().digs, 0);
    }

    #[test]
    fn overwrite_from_cell_meta_clears_then_places() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.give(0, ItemStack::new("minecraft:stone", 1));
        world.set_block(Vec3::DOWN, "minecraft:dirt");
        let meta = CellMeta {
            side: Some(Side::Down),
            overwrite: Some(true),
        };
        let outcome =
            place_material(&mut ctx, &mut world, &stone(), meta, &PlaceOptions::default()).expect("place");
        assert!(matches!(outcome, PlaceOutcome::Placed { .. }));
        assert_eq!(world.block_at(Vec3::DOWN), Some(&stone()));
        assert_eq!(world.inventory_total(&"minecraft:dirt".into()), 1);
    }

    #[test]
    fn undiggable_conflict_is_blocked() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.give(0, ItemStack::new("minecraft:stone", 1));
        world.set_protected_block(Vec3::DOWN, "minecraft:bedrock");
        let opts = PlaceOptions {
            overwrite: Some(true),
            ..down()
        };
        let err = place_material(&mut ctx, &mut world, &stone(), CellMeta::default(), &opts)
            .unwrap_err();
        assert!(matches!(err, PlaceError::Blocked { side: Side::Down, .. }));
    }

    #[test]
    fn missing_material_is_reported() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        let err = place_material(&mut ctx, &mut world, &stone(), CellMeta::default(), &down())
            .unwrap_err();
        assert_eq!(err, PlaceError::MissingMaterial { material: stone() });
    }

    #[test]
    fn host_failures_are_classified() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.give(0, ItemStack::new("minecraft:stone", 5));

        world.fail_next_place("No items to place");
        let err = place_material(&mut ctx, &mut world, &stone(), CellMeta::default(), &down())
            .unwrap_err();
        assert!(matches!(err, PlaceError::MissingMaterial { .. }));
        assert!(ctx.inventory.dirty);

        world.fail_next_place("Cannot place block here");
        let err = place_material(&mut ctx, &mut world, &stone(), CellMeta::default(), &down())
            .unwrap_err();
        assert!(matches!(err, PlaceError::Blocked { .. }));

        world.fail_next_place("Server rejected the request");
        let err = place_material(&mut ctx, &mut world, &stone(), CellMeta::default(), &down())
            .unwrap_err();
        assert!(matches!(err, PlaceError::PlacementFailed { .. }));
    }

    #[test]
    fn entity_in_target_is_attacked_once() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.give(0, ItemStack::new("minecraft:stone", 1));
        world.add_entity(Vec3::DOWN);
        let outcome =
            place_material(&mut ctx, &mut world, &stone(), CellMeta::default(), &down()).expect("place");
        assert!(matches!(outcome, PlaceOutcome::Placed { .. }));
        assert_eq!(world.counters().attacks, 1);
    }

    #[test]
    fn clear_cell_digs_until_empty() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.set_block(Vec3::new(0, 0, -1), "minecraft:gravel");
        let outcome = clear_cell(&mut ctx, &mut world, Side::Front, &PlaceOptions::default())
            .expect("clear");
        assert_eq!(outcome, ClearOutcome::Cleared);
        assert_eq!(world.block_at(Vec3::new(0, 0, -1)), None);
        assert_eq!(
            clear_cell(&mut ctx, &mut world, Side::Front, &PlaceOptions::default()),
            Ok(ClearOutcome::AlreadyEmpty)
        );

        world.set_protected_block(Vec3::UP, "minecraft:bedrock");
        assert!(clear_cell(&mut ctx, &mut world, Side::Up, &PlaceOptions::default()).is_err());
    }
}
