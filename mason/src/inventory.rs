//! Inventory manager.
//!
//! Keeps a slot cache in [`RunContext::inventory`] and moves items between
//! the agent and adjacent storage containers. Queries rescan transparently
//! when the cache is dirty. Transfers mark it dirty; callers batching several
//! transfers may defer the rescan.

use thiserror::Error;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::core::types::{Facing, Material, RelativeDir, Side};
use crate::io::host::Host;
use crate::tracker::{self, TurnError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("invalid material '{0}'")]
    InvalidMaterial(Material),
    #[error("no {0} in inventory")]
    MissingMaterial(Material),
    #[error("no empty inventory slot")]
    NoEmptySlot,
    #[error("no storage container found")]
    ContainerNotFound,
    #[error("host reports no inventory")]
    Unavailable,
    #[error("{action} failed: {reason}")]
    Host {
        action: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Turn(#[from] TurnError),
}

/// Where and how a transfer happens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Container direction; `None` searches the configured supply directions.
    pub dir: Option<RelativeDir>,
    /// Leave the cache dirty instead of rescanning straight away.
    pub defer_rescan: bool,
}

impl TransferOptions {
    pub fn toward(dir: RelativeDir) -> Self {
        Self {
            dir: Some(dir),
            defer_rescan: false,
        }
    }

    pub fn deferred(mut self) -> Self {
        self.defer_rescan = true;
        self
    }
}

/// A container the agent is currently turned toward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpot {
    pub side: Side,
    pub name: String,
    /// Facing to restore once the transfer is over.
    restore: Facing,
}

/// Re-read every slot when `force` is set or the cache is stale.
pub fn scan<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    force: bool,
) -> Result<(), InventoryError> {
    if !force && !ctx.inventory.dirty {
        return Ok(());
    }
    let count = host.slot_count();
    if count == 0 {
        return Err(InventoryError::Unavailable);
    }
    ctx.inventory.slots = (0..count).map(|index| host.slot(index)).collect();
    ctx.inventory.reindex();
    ctx.inventory.dirty = false;
    debug!(
        materials = ctx.inventory.totals.len(),
        empty = ctx.inventory.empty.len(),
        "inventory scanned"
    );
    Ok(())
}

fn valid(material: &Material) -> Result<(), InventoryError> {
    if material.is_air() {
        return Err(InventoryError::InvalidMaterial(material.clone()));
    }
    Ok(())
}

pub fn material_slots<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    material: &Material,
) -> Result<Vec<usize>, InventoryError> {
    valid(material)?;
    scan(ctx, host, false)?;
    Ok(ctx
        .inventory
        .by_material
        .get(material)
        .cloned()
        .unwrap_or_default())
}

pub fn slot_for_material<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    material: &Material,
) -> Result<Option<usize>, InventoryError> {
    Ok(material_slots(ctx, host, material)?.first().copied())
}

pub fn count_material<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    material: &Material,
) -> Result<u32, InventoryError> {
    valid(material)?;
    scan(ctx, host, false)?;
    Ok(ctx.inventory.total(material))
}

pub fn has_material<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    material: &Material,
    amount: u32,
) -> Result<bool, InventoryError> {
    Ok(count_material(ctx, host, material)? >= amount.max(1))
}

pub fn find_empty_slot<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
) -> Result<Option<usize>, InventoryError> {
    scan(ctx, host, false)?;
    Ok(ctx.inventory.empty.first().copied())
}

/// Select a slot holding `material`, trying the last known good slot first.
pub fn select_material<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    material: &Material,
) -> Result<usize, InventoryError> {
    valid(material)?;
    let cached = ctx.inventory.last_good.get(material).copied();
    let slot = match cached.filter(|slot| holds(host, *slot, material)) {
        Some(slot) => slot,
        None => {
            scan(ctx, host, true)?;
            ctx.inventory
                .by_material
                .get(material)
                .and_then(|slots| slots.first().copied())
                .ok_or_else(|| InventoryError::MissingMaterial(material.clone()))?
        }
    };
    select_slot(host, slot)?;
    ctx.inventory.last_good.insert(material.clone(), slot);
    Ok(slot)
}

fn holds<H: Host + ?Sized>(host: &mut H, slot: usize, material: &Material) -> bool {
    host.slot(slot)
        .is_some_and(|stack| &stack.material == material && stack.count > 0)
}

fn select_slot<H: Host + ?Sized>(host: &mut H, slot: usize) -> Result<(), InventoryError> {
    host.select(slot).map_err(|reason| InventoryError::Host {
        action: "select",
        reason,
    })
}

/// Book `count` items as gone from `slot` without a rescan.
pub fn record_removed(ctx: &mut RunContext, slot: usize, count: u32) {
    let cache = &mut ctx.inventory;
    if cache.dirty {
        return;
    }
    let remaining = match cache.slots.get_mut(slot) {
        Some(Some(stack)) if stack.count >= count => {
            stack.count -= count;
            stack.count
        }
        _ => {
            cache.dirty = true;
            return;
        }
    };
    if remaining == 0 {
        cache.slots[slot] = None;
    }
    cache.reindex();
}

/// Find a container around the agent and turn toward it.
///
/// Directions needing no turn are probed first. With `search_around` the
/// agent then looks left, behind and right. The returned spot must be handed
/// to [`release`] to restore the original facing.
pub fn locate_container<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    dirs: &[RelativeDir],
    search_around: bool,
) -> Result<ContainerSpot, InventoryError> {
    let original = ctx.facing;
    for dir in dirs {
        let (side, turns) = dir.approach();
        if !turns.is_empty() {
            continue;
        }
        if let Some(info) = host.container(side) {
            return Ok(ContainerSpot {
                side,
                name: info.name,
                restore: original,
            });
        }
    }

    let mut around: Vec<RelativeDir> = dirs
        .iter()
        .copied()
        .filter(|dir| !dir.approach().1.is_empty())
        .collect();
    if search_around {
        for dir in [RelativeDir::Left, RelativeDir::Back, RelativeDir::Right] {
            if !around.contains(&dir) {
                around.push(dir);
            }
        }
    }
    for dir in around {
        let side = dir.approach().0;
        tracker::face(ctx, host, facing_for(original, dir))?;
        if let Some(info) = host.container(side) {
            return Ok(ContainerSpot {
                side,
                name: info.name,
                restore: original,
            });
        }
    }
    tracker::face(ctx, host, original)?;
    Err(InventoryError::ContainerNotFound)
}

/// Turn back to the facing held before [`locate_container`].
pub fn release<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    spot: &ContainerSpot,
) -> Result<(), InventoryError> {
    tracker::face(ctx, host, spot.restore)?;
    Ok(())
}

fn locate_for<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    opts: &TransferOptions,
) -> Result<ContainerSpot, InventoryError> {
    match opts.dir {
        Some(dir) => locate_container(ctx, host, &[dir], false),
        None => {
            let dirs = ctx.settings.supply_dirs.clone();
            let around = ctx.settings.search_around;
            locate_container(ctx, host, &dirs, around)
        }
    }
}

fn finish_transfer<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    opts: &TransferOptions,
) -> Result<(), InventoryError> {
    ctx.inventory.dirty = true;
    if !opts.defer_rescan {
        scan(ctx, host, true)?;
    }
    Ok(())
}

/// Push up to `amount` items from `slot` into a container. Returns the count moved.
pub fn push_slot<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    slot: usize,
    amount: u32,
    opts: &TransferOptions,
) -> Result<u32, InventoryError> {
    select_slot(host, slot)?;
    let spot = locate_for(ctx, host, opts)?;
    let pushed = host.push(spot.side, amount);
    ctx.inventory.dirty = true;
    release(ctx, host, &spot)?;
    let moved = pushed.map_err(|reason| InventoryError::Host {
        action: "push",
        reason,
    })?;
    debug!(slot, moved, container = %spot.name, "pushed items");
    finish_transfer(ctx, host, opts)?;
    Ok(moved)
}

/// Push up to `amount` of `material`, draining slots in order.
pub fn push_material<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    material: &Material,
    amount: u32,
    opts: &TransferOptions,
) -> Result<u32, InventoryError> {
    let slots = material_slots(ctx, host, material)?;
    if slots.is_empty() {
        return Err(InventoryError::MissingMaterial(material.clone()));
    }
    let batch = opts.clone().deferred();
    let mut moved = 0;
    for slot in slots {
        if moved >= amount {
            break;
        }
        moved += push_slot(ctx, host, slot, amount - moved, &batch)?;
    }
    finish_transfer(ctx, host, opts)?;
    info!(%material, moved, "pushed material");
    Ok(moved)
}

/// Pull up to `amount` items (of `material`, when given) into the agent.
///
/// The target slot is a partial stack of the material if one exists,
/// otherwise the first empty slot.
pub fn pull_material<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    material: Option<&Material>,
    amount: u32,
    opts: &TransferOptions,
) -> Result<u32, InventoryError> {
    if let Some(material) = material {
        valid(material)?;
    }
    scan(ctx, host, false)?;
    let limit = host.stack_limit();
    let partial = material.and_then(|material| {
        ctx.inventory
            .by_material
            .get(material)?
            .iter()
            .copied()
            .find(|slot| {
                ctx.inventory.slots[*slot]
                    .as_ref()
                    .is_some_and(|stack| stack.count < limit)
            })
    });
    let slot = partial
        .or_else(|| ctx.inventory.empty.first().copied())
        .ok_or(InventoryError::NoEmptySlot)?;
    select_slot(host, slot)?;
    let spot = locate_for(ctx, host, opts)?;
    let pulled = host.pull(spot.side, material, amount);
    ctx.inventory.dirty = true;
    release(ctx, host, &spot)?;
    let moved = pulled.map_err(|reason| InventoryError::Host {
        action: "pull",
        reason,
    })?;
    debug!(slot, moved, container = %spot.name, "pulled items");
    finish_transfer(ctx, host, opts)?;
    Ok(moved)
}

/// Facing reached by turning from `facing` toward `dir`.
pub fn facing_for(facing: Facing, dir: RelativeDir) -> Facing {
    dir.approach().1.iter().fold(facing, |f, t| t.apply(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ItemStack, Vec3};
    use crate::io::config::MasonConfig;
    use crate::io::sim::SimWorld;

    fn ctx() -> RunContext {
        RunContext::new(&MasonConfig::default(), Vec3::ZERO, Facing::North)
    }

    fn stone() -> Material {
        Material::from("minecraft:stone")
    }

    #[test]
    fn queries_rescan_dirty_cache() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.give(3, ItemStack::new("minecraft:stone", 12));
        assert_eq!(count_material(&mut ctx, &mut world, &stone()).expect("count"), 12);
        assert_eq!(slot_for_material(&mut ctx, &mut world, &stone()).expect("slot"), Some(3));
        assert_eq!(find_empty_slot(&mut ctx, &mut world).expect("empty"), Some(0));

        world.give(0, ItemStack::new("minecraft:stone", 1));
        // stale until marked dirty
        assert_eq!(count_material(&mut ctx, &mut world, &stone()).expect("count"), 12);
        ctx.inventory.dirty = true;
        assert_eq!(count_material(&mut ctx, &mut world, &stone()).expect("count"), 13);
        assert!(has_material(&mut ctx, &mut world, &stone(), 13).expect("has"));
    }

    #[test]
    fn air_is_an_invalid_material() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        let err = select_material(&mut ctx, &mut world, &"minecraft:air".into()).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidMaterial(_)));
    }

    #[test]
    fn select_prefers_last_good_slot_then_rescans() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.give(2, ItemStack::new("minecraft:stone", 1));
        world.give(5, ItemStack::new("minecraft:stone", 1));
        assert_eq!(select_material(&mut ctx, &mut world, &stone()).expect("select"), 2);
        assert_eq!(world.selected(), 2);

        world.give(2, ItemStack::new("minecraft:stone", 0));
        assert_eq!(select_material(&mut ctx, &mut world, &stone()).expect("select"), 5);

        world.give(5, ItemStack::new("minecraft:stone", 0));
        let err = select_material(&mut ctx, &mut world, &stone()).unwrap_err();
        assert_eq!(err, InventoryError::MissingMaterial(stone()));
    }

    #[test]
    fn push_five_empties_slot_and_fills_container() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        let chest = Vec3::new(0, 0, -1);
        world.add_container(chest, "minecraft:chest", Vec::new());
        world.give(0, ItemStack::new("A", 5));
        let moved = push_slot(&mut ctx, &mut world, 0, 5, &TransferOptions::default())
            .expect("push");
        assert_eq!(moved, 5);
        assert_eq!(world.slot(0), None);
        assert_eq!(world.container_total(chest, &"A".into()), 5);
        assert_eq!(ctx.inventory.total(&"A".into()), 0);
        assert!(!ctx.inventory.dirty);
    }

    #[test]
    fn container_behind_is_found_and_facing_restored() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        let chest = Vec3::new(0, 0, 1);
        world.add_container(chest, "minecraft:chest", vec![ItemStack::new("glass", 20)]);
        let moved = pull_material(
            &mut ctx,
            &mut world,
            Some(&"glass".into()),
            8,
            &TransferOptions::default(),
        )
        .expect("pull");
        assert_eq!(moved, 8);
        assert_eq!(ctx.facing, Facing::North);
        assert_eq!(world.facing(), Facing::North);
        assert_eq!(ctx.inventory.total(&"glass".into()), 8);
        assert_eq!(world.container_total(chest, &"glass".into()), 12);
    }

    #[test]
    fn pull_tops_up_partial_stack_first() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.add_container(Vec3::UP, "minecraft:barrel", vec![ItemStack::new("glass", 20)]);
        world.give(4, ItemStack::new("glass", 60));
        let moved = pull_material(
            &mut ctx,
            &mut world,
            Some(&"glass".into()),
            64,
            &TransferOptions::toward(RelativeDir::Up),
        )
        .expect("pull");
        assert_eq!(moved, 4);
        assert_eq!(world.slot(4), Some(ItemStack::new("glass", 64)));
    }

    #[test]
    fn missing_container_is_reported() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.give(0, ItemStack::new("A", 5));
        let err = push_slot(&mut ctx, &mut world, 0, 5, &TransferOptions::default()).unwrap_err();
        assert_eq!(err, InventoryError::ContainerNotFound);
        assert_eq!(world.facing(), Facing::North);
        assert_eq!(world.inventory_total(&"A".into()), 5);
    }

    #[test]
    fn pull_without_room_fails() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        for slot in 0..16 {
            world.give(slot, ItemStack::new("dirt", 64));
        }
        let err = pull_material(
            &mut ctx,
            &mut world,
            Some(&"glass".into()),
            1,
            &TransferOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, InventoryError::NoEmptySlot);
    }

    #[test]
    fn record_removed_keeps_cache_consistent() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.give(1, ItemStack::new("minecraft:stone", 2));
        scan(&mut ctx, &mut world, true).expect("scan");
        record_removed(&mut ctx, 1, 1);
        assert_eq!(ctx.inventory.total(&stone()), 1);
        record_removed(&mut ctx, 1, 1);
        assert_eq!(ctx.inventory.total(&stone()), 0);
        assert!(ctx.inventory.empty.contains(&1));
        assert!(!ctx.inventory.dirty);
    }

    #[test]
    fn failed_facing_restore_still_invalidates_the_cache() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        let chest = Vec3::new(-1, 0, 0);
        world.give(0, ItemStack::new("minecraft:stone", 10));
        world.add_container(chest, "minecraft:chest", Vec::new());
        scan(&mut ctx, &mut world, true).expect("scan");
        let left = TransferOptions::toward(RelativeDir::Left);

        // turning toward the chest succeeds, turning back does not
        world.block_turns_after(1, 1);
        let err = push_slot(&mut ctx, &mut world, 0, 4, &left).unwrap_err();
        assert!(matches!(err, InventoryError::Turn(_)));
        assert!(ctx.inventory.dirty);
        assert_eq!(ctx.facing, Facing::West);
        assert_eq!(world.container_total(chest, &stone()), 4);
        assert_eq!(count_material(&mut ctx, &mut world, &stone()).expect("count"), 6);

        tracker::face(&mut ctx, &mut world, Facing::North).expect("face");
        world.block_turns_after(1, 1);
        let err = pull_material(&mut ctx, &mut world, Some(&stone()), 2, &left).unwrap_err();
        assert!(matches!(err, InventoryError::Turn(_)));
        assert!(ctx.inventory.dirty);
        assert_eq!(count_material(&mut ctx, &mut world, &stone()).expect("count"), 8);
    }

    #[test]
    fn facing_for_rotates_relative_dirs() {
        assert_eq!(facing_for(Facing::North, RelativeDir::Left), Facing::West);
        assert_eq!(facing_for(Facing::North, RelativeDir::Back), Facing::South);
        assert_eq!(facing_for(Facing::North, RelativeDir::Up), Facing::North);
    }
}
