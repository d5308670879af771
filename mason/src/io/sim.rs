//! In-process simulated world implementing [`Host`].
//!
//! Deterministic: no clock, no randomness. Failure injection hooks let tests
//! script transient obstructions, and counters record every actuator call.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use tracing::trace;

use crate::core::types::{Facing, FuelLevel, ItemStack, Material, Motion, Side, Turn, Vec3};
use crate::io::host::{ContainerInfo, Host, HostResult};

pub const DEFAULT_SLOTS: usize = 16;
pub const DEFAULT_STACK_LIMIT: u32 = 64;
pub const CONTAINER_SLOTS: usize = 27;
pub const FUEL_LIMIT: u32 = 20_000;

#[derive(Debug, Clone, PartialEq, Eq)]
struct SimBlock {
    material: Material,
    protected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SimContainer {
    name: String,
    items: Vec<ItemStack>,
}

/// Tally of actuator calls issued against the world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimCounters {
    pub moves: u32,
    pub failed_moves: u32,
    pub turns: u32,
    pub places: u32,
    pub digs: u32,
    pub attacks: u32,
    pub pushes: u32,
    pub pulls: u32,
    pub refuels: u32,
    pub slept: Duration,
}

#[derive(Debug, Clone)]
pub struct SimWorld {
    blocks: HashMap<Vec3, SimBlock>,
    entities: HashSet<Vec3>,
    containers: HashMap<Vec3, SimContainer>,
    position: Vec3,
    facing: Facing,
    slots: Vec<Option<ItemStack>>,
    selected: usize,
    stack_limit: u32,
    fuel: FuelLevel,
    fuel_values: BTreeMap<Material, u32>,
    min_y: i32,
    max_y: i32,
    blocked_moves: u32,
    blocked_turns: u32,
    turns_before_block: u32,
    place_failures: VecDeque<String>,
    counters: SimCounters,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    /// Empty world; agent at the origin facing north with 1000 fuel.
    pub fn new() -> Self {
        Self {
            blocks: HashMap::new(),
            entities: HashSet::new(),
            containers: HashMap::new(),
            position: Vec3::ZERO,
            facing: Facing::North,
            slots: vec![None; DEFAULT_SLOTS],
            selected: 0,
            stack_limit: DEFAULT_STACK_LIMIT,
            fuel: FuelLevel::Level(1000),
            fuel_values: default_fuel_values(),
            min_y: -64,
            max_y: 319,
            blocked_moves: 0,
            blocked_turns: 0,
            turns_before_block: 0,
            place_failures: VecDeque::new(),
            counters: SimCounters::default(),
        }
    }

    pub fn with_agent(mut self, position: Vec3, facing: Facing) -> Self {
        self.position = position;
        self.facing = facing;
        self
    }

    pub fn with_fuel(mut self, fuel: FuelLevel) -> Self {
        self.fuel = fuel;
        self
    }

    pub fn with_height_limits(mut self, min_y: i32, max_y: i32) -> Self {
        self.min_y = min_y;
        self.max_y = max_y;
        self
    }

    pub fn set_block(&mut self, at: Vec3, material: impl Into<Material>) {
        self.blocks.insert(
            at,
            SimBlock {
                material: material.into(),
                protected: false,
            },
        );
    }

    /// Block that cannot be dug.
    pub fn set_protected_block(&mut self, at: Vec3, material: impl Into<Material>) {
        self.blocks.insert(
            at,
            SimBlock {
                material: material.into(),
                protected: true,
            },
        );
    }

    pub fn clear_block(&mut self, at: Vec3) {
        self.blocks.remove(&at);
    }

    pub fn add_entity(&mut self, at: Vec3) {
        self.entities.insert(at);
    }

    pub fn add_container(&mut self, at: Vec3, name: &str, items: Vec<ItemStack>) {
        self.containers.insert(
            at,
            SimContainer {
                name: name.to_string(),
                items,
            },
        );
    }

    /// Put items into the agent's inventory at `slot`, replacing its contents.
    pub fn give(&mut self, slot: usize, stack: ItemStack) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = (stack.count > 0).then_some(stack);
        }
    }

    /// Make the next `count` motion attempts fail as obstructed.
    pub fn block_next_moves(&mut self, count: u32) {
        self.blocked_moves = count;
    }

    /// Make the next `count` turn attempts fail.
    pub fn block_next_turns(&mut self, count: u32) {
        self.block_turns_after(0, count);
    }

    /// Let `allowed` turns through, then fail the following `count`.
    pub fn block_turns_after(&mut self, allowed: u32, count: u32) {
        self.turns_before_block = allowed;
        self.blocked_turns = count;
    }

    /// Make the next placement fail with `reason`.
    pub fn fail_next_place(&mut self, reason: &str) {
        self.place_failures.push_back(reason.to_string());
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn block_at(&self, at: Vec3) -> Option<&Material> {
        self.blocks.get(&at).map(|block| &block.material)
    }

    pub fn has_entity(&self, at: Vec3) -> bool {
        self.entities.contains(&at)
    }

    pub fn counters(&self) -> &SimCounters {
        &self.counters
    }

    /// Total of `material` held by the container at `at`.
    pub fn container_total(&self, at: Vec3, material: &Material) -> u32 {
        self.containers
            .get(&at)
            .map(|c| {
                c.items
                    .iter()
                    .filter(|s| &s.material == material)
                    .map(|s| s.count)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Total of `material` in the agent's inventory.
    pub fn inventory_total(&self, material: &Material) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| &s.material == material)
            .map(|s| s.count)
            .sum()
    }

    fn target(&self, side: Side) -> Vec3 {
        self.position + side.offset(self.facing)
    }

    fn solid(&self, at: Vec3) -> bool {
        self.blocks.contains_key(&at) || self.containers.contains_key(&at)
    }

    fn burn_fuel(&mut self) {
        if let FuelLevel::Level(level) = self.fuel {
            self.fuel = FuelLevel::Level(level.saturating_sub(1));
        }
    }

    /// Store a dug item the way a real agent would: merge, else first empty slot, else lose it.
    fn collect(&mut self, material: Material) {
        let limit = self.stack_limit;
        if let Some(stack) = self
            .slots
            .iter_mut()
            .flatten()
            .find(|s| s.material == material && s.count < limit)
        {
            stack.count += 1;
            return;
        }
        if let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) {
            *slot = Some(ItemStack::new(material, 1));
        }
    }
}

impl Host for SimWorld {
    fn step(&mut self, motion: Motion) -> HostResult<()> {
        if self.fuel.is_empty() {
            self.counters.failed_moves += 1;
            return Err("Out of fuel".to_string());
        }
        if self.blocked_moves > 0 {
            self.blocked_moves -= 1;
            self.counters.failed_moves += 1;
            return Err("Movement obstructed".to_string());
        }
        let next = self.position + motion.delta(self.facing);
        if next.y > self.max_y {
            self.counters.failed_moves += 1;
            return Err("Too high to move".to_string());
        }
        if next.y < self.min_y {
            self.counters.failed_moves += 1;
            return Err("Too low to move".to_string());
        }
        if self.solid(next) || self.entities.contains(&next) {
            self.counters.failed_moves += 1;
            return Err("Movement obstructed".to_string());
        }
        self.position = next;
        self.burn_fuel();
        self.counters.moves += 1;
        trace!(motion = %motion, pos = %self.position, "sim move");
        Ok(())
    }

    fn turn(&mut self, turn: Turn) -> HostResult<()> {
        if self.blocked_turns > 0 {
            if self.turns_before_block > 0 {
                self.turns_before_block -= 1;
            } else {
                self.blocked_turns -= 1;
                return Err("Turn failed".to_string());
            }
        }
        self.facing = turn.apply(self.facing);
        self.counters.turns += 1;
        Ok(())
    }

    fn inspect(&mut self, side: Side) -> Option<Material> {
        let at = self.target(side);
        if let Some(container) = self.containers.get(&at) {
            return Some(Material::new(container.name.clone()));
        }
        self.blocks.get(&at).map(|block| block.material.clone())
    }

    fn dig(&mut self, side: Side) -> HostResult<()> {
        let at = self.target(side);
        if self.containers.contains_key(&at) {
            return Err("Cannot break protected block".to_string());
        }
        match self.blocks.get(&at) {
            None => Err("Nothing to dig here".to_string()),
            Some(block) if block.protected => Err("Cannot break unbreakable block".to_string()),
            Some(_) => {
                let block = self
                    .blocks
                    .remove(&at)
                    .ok_or_else(|| "Nothing to dig here".to_string())?;
                self.counters.digs += 1;
                self.collect(block.material);
                Ok(())
            }
        }
    }

    fn attack(&mut self, side: Side) -> HostResult<()> {
        let at = self.target(side);
        self.counters.attacks += 1;
        if self.entities.remove(&at) {
            Ok(())
        } else {
            Err("Nothing to attack here".to_string())
        }
    }

    fn place(&mut self, side: Side) -> HostResult<()> {
        if let Some(reason) = self.place_failures.pop_front() {
            return Err(reason);
        }
        let at = self.target(side);
        let material = match self.slots.get(self.selected).and_then(|s| s.as_ref()) {
            Some(stack) => stack.material.clone(),
            None => return Err("No items to place".to_string()),
        };
        if self.solid(at) {
            return Err("Cannot place block here".to_string());
        }
        if self.entities.contains(&at) {
            return Err("Cannot place item here: entity in the way".to_string());
        }
        if let Some(slot) = self.slots.get_mut(self.selected) {
            if let Some(stack) = slot {
                stack.count -= 1;
            }
            if slot.as_ref().is_some_and(|s| s.count == 0) {
                *slot = None;
            }
        }
        self.blocks.insert(
            at,
            SimBlock {
                material,
                protected: false,
            },
        );
        self.counters.places += 1;
        Ok(())
    }

    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn stack_limit(&self) -> u32 {
        self.stack_limit
    }

    fn slot(&mut self, index: usize) -> Option<ItemStack> {
        self.slots.get(index).cloned().flatten()
    }

    fn select(&mut self, index: usize) -> HostResult<()> {
        if index >= self.slots.len() {
            return Err(format!("Slot {index} out of range"));
        }
        self.selected = index;
        Ok(())
    }

    fn selected(&self) -> usize {
        self.selected
    }

    fn push(&mut self, side: Side, amount: u32) -> HostResult<u32> {
        let at = self.target(side);
        let limit = self.stack_limit;
        let selected = self.selected;
        let Some(container) = self.containers.get_mut(&at) else {
            return Err("No inventory to drop into".to_string());
        };
        let Some(stack) = self.slots.get_mut(selected).and_then(|s| s.as_mut()) else {
            return Err("No items to drop".to_string());
        };
        let mut remaining = amount.min(stack.count);
        let mut moved = 0;
        for existing in container
            .items
            .iter_mut()
            .filter(|s| s.material == stack.material && s.count < limit)
        {
            let n = remaining.min(limit - existing.count);
            existing.count += n;
            remaining -= n;
            moved += n;
        }
        while remaining > 0 && container.items.len() < CONTAINER_SLOTS {
            let n = remaining.min(limit);
            container.items.push(ItemStack::new(stack.material.clone(), n));
            remaining -= n;
            moved += n;
        }
        if moved == 0 {
            return Err("No space for items".to_string());
        }
        stack.count -= moved;
        if stack.count == 0 {
            self.slots[selected] = None;
        }
        self.counters.pushes += 1;
        Ok(moved)
    }

    fn pull(&mut self, side: Side, material: Option<&Material>, amount: u32) -> HostResult<u32> {
        let at = self.target(side);
        let limit = self.stack_limit;
        let selected = self.selected;
        let Some(container) = self.containers.get_mut(&at) else {
            return Err("No inventory to take from".to_string());
        };
        let held = self.slots.get(selected).cloned().flatten();
        let wanted = match (material, &held) {
            (_, Some(stack)) => {
                if material.is_some_and(|m| m != &stack.material) {
                    return Err("Selected slot holds a different item".to_string());
                }
                stack.material.clone()
            }
            (Some(m), None) => m.clone(),
            (None, None) => match container.items.first() {
                Some(first) => first.material.clone(),
                None => return Err("No items to take".to_string()),
            },
        };
        let room = limit - held.as_ref().map_or(0, |s| s.count);
        let mut remaining = amount.min(room);
        let mut moved = 0;
        for stack in container.items.iter_mut().filter(|s| s.material == wanted) {
            let n = remaining.min(stack.count);
            stack.count -= n;
            remaining -= n;
            moved += n;
        }
        container.items.retain(|s| s.count > 0);
        if moved == 0 {
            return Err("No items to take".to_string());
        }
        if let Some(stack) = self.slots[selected].as_mut() {
            stack.count += moved;
        } else {
            self.slots[selected] = Some(ItemStack::new(wanted, moved));
        }
        self.counters.pulls += 1;
        Ok(moved)
    }

    fn container(&mut self, side: Side) -> Option<ContainerInfo> {
        self.containers.get(&self.target(side)).map(|c| ContainerInfo {
            name: c.name.clone(),
        })
    }

    fn container_items(&mut self, side: Side) -> HostResult<Vec<ItemStack>> {
        self.containers
            .get(&self.target(side))
            .map(|c| c.items.clone())
            .ok_or_else(|| "No inventory here".to_string())
    }

    fn fuel_level(&self) -> FuelLevel {
        self.fuel
    }

    fn refuel(&mut self, count: u32) -> HostResult<()> {
        let selected = self.selected;
        let Some(stack) = self.slots.get_mut(selected).and_then(|s| s.as_mut()) else {
            return Err("No items to combust".to_string());
        };
        let Some(value) = self.fuel_values.get(&stack.material).copied() else {
            return Err("Items not combustible".to_string());
        };
        let n = count.min(stack.count);
        stack.count -= n;
        if stack.count == 0 {
            self.slots[selected] = None;
        }
        if let FuelLevel::Level(level) = self.fuel {
            self.fuel = FuelLevel::Level(level.saturating_add(n * value).min(FUEL_LIMIT));
        }
        self.counters.refuels += 1;
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) {
        self.counters.slept += duration;
    }
}

fn default_fuel_values() -> BTreeMap<Material, u32> {
    [
        ("minecraft:coal", 80),
        ("minecraft:charcoal", 80),
        ("minecraft:coal_block", 800),
        ("minecraft:lava_bucket", 1000),
        ("minecraft:blaze_rod", 120),
        ("minecraft:oak_planks", 15),
        ("minecraft:oak_log", 15),
        ("minecraft:stick", 5),
    ]
    .into_iter()
    .map(|(name, value)| (Material::from(name), value))
    .collect()
}
