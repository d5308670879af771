//! Shared mutable run state.
//!
//! [`RunContext`] is the single source of truth for one run. Every subsystem
//! takes it by `&mut` and commits its effects directly into it: the tracker
//! owns `position`/`facing`, the inventory manager owns `inventory`, the fuel
//! manager owns `fuel`, and the orchestrator owns the cursor, counters and
//! pending requests.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::core::frame::ReferenceFrame;
use crate::core::planner::{BuildStep, PlanOptions};
use crate::core::types::{Facing, FuelLevel, ItemStack, Material, RelativeDir, RunMode, Vec3};
use crate::io::config::{FuelConfig, MasonConfig, RecoveryConfig};
use crate::movement::MoveOptions;
use crate::placement::PlacePolicy;

/// Run-wide knobs derived once from [`MasonConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mode: RunMode,
    pub plan: PlanOptions,
    pub movement: MoveOptions,
    pub placement: PlacePolicy,
    pub supply_dirs: Vec<RelativeDir>,
    pub search_around: bool,
    pub recovery: RecoverySettings,
    pub block_on_shortfall: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverySettings {
    pub blocked_retries: u32,
    pub blocked_delay: Duration,
    pub restock_attempts: u32,
}

impl From<&RecoveryConfig> for RecoverySettings {
    fn from(cfg: &RecoveryConfig) -> Self {
        Self {
            blocked_retries: cfg.blocked_retries,
            blocked_delay: Duration::from_millis(cfg.blocked_delay_ms),
            restock_attempts: cfg.restock_attempts,
        }
    }
}

impl Settings {
    pub fn from_config(cfg: &MasonConfig) -> Self {
        let placement = PlacePolicy::from_config(&cfg.placement);
        Self {
            mode: cfg.build.mode,
            plan: PlanOptions {
                offset: cfg.build.offset,
                orientation: cfg.build.orientation,
                default_side: placement.default_side,
                default_overwrite: placement.overwrite,
            },
            movement: MoveOptions::from_config(&cfg.movement),
            placement,
            supply_dirs: cfg.inventory.supply_dirs.clone(),
            search_around: cfg.inventory.search_around,
            recovery: RecoverySettings::from(&cfg.recovery),
            block_on_shortfall: cfg.manifest.block_on_shortfall,
        }
    }

    /// Movement options used to travel between steps. Excavation digs its way through.
    pub fn travel(&self) -> MoveOptions {
        match self.mode {
            RunMode::Build => self.movement.clone(),
            RunMode::Mine => self.movement.clone().with_dig(true),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&MasonConfig::default())
    }
}

/// Slot cache plus derived indexes. Stale whenever `dirty` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryCache {
    pub slots: Vec<Option<ItemStack>>,
    pub dirty: bool,
    pub by_material: BTreeMap<Material, Vec<usize>>,
    pub totals: BTreeMap<Material, u32>,
    pub empty: Vec<usize>,
    /// Slot that last held each material, tried before a full rescan.
    pub last_good: BTreeMap<Material, usize>,
}

impl Default for InventoryCache {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            dirty: true,
            by_material: BTreeMap::new(),
            totals: BTreeMap::new(),
            empty: Vec::new(),
            last_good: BTreeMap::new(),
        }
    }
}

impl InventoryCache {
    /// Rebuild indexes from `slots`.
    pub fn reindex(&mut self) {
        self.by_material.clear();
        self.totals.clear();
        self.empty.clear();
        for (index, slot) in self.slots.iter().enumerate() {
            match slot {
                Some(stack) if stack.count > 0 => {
                    self.by_material
                        .entry(stack.material.clone())
                        .or_default()
                        .push(index);
                    *self.totals.entry(stack.material.clone()).or_insert(0) += stack.count;
                }
                _ => self.empty.push(index),
            }
        }
    }

    pub fn total(&self, material: &Material) -> u32 {
        self.totals.get(material).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuelState {
    pub level: FuelLevel,
    pub threshold: u32,
    pub reserve: u32,
    pub rounds: u32,
    pub items: Vec<Material>,
    pub source_dirs: Vec<RelativeDir>,
    /// Set while a service run is in progress.
    pub servicing: bool,
}

impl FuelState {
    pub fn from_config(cfg: &FuelConfig) -> Self {
        Self {
            level: FuelLevel::Level(0),
            threshold: cfg.threshold,
            reserve: cfg.reserve,
            rounds: cfg.rounds,
            items: cfg.items.clone(),
            source_dirs: cfg.source_dirs.clone(),
            servicing: false,
        }
    }

    pub fn is_fuel(&self, material: &Material) -> bool {
        self.items.contains(material)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryCounters {
    pub blocked: u32,
    pub restock: u32,
}

/// Requests raised by one state for another to serve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pending {
    pub restock: Option<Material>,
    /// Fuel level the next leg needs.
    pub refuel: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub placed: u32,
    pub reused: u32,
    pub cleared: u32,
    pub failed: u32,
    pub manual_pauses: u32,
    pub refuels: u32,
    pub restocks: u32,
    pub unloads: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub settings: Settings,
    pub frame: ReferenceFrame,
    pub home_facing: Facing,
    pub position: Vec3,
    pub facing: Facing,
    pub inventory: InventoryCache,
    pub fuel: FuelState,
    pub steps: Vec<BuildStep>,
    pub cursor: usize,
    /// Air cells the planner skipped.
    pub skipped: usize,
    pub last_error: Option<String>,
    pub retries: RetryCounters,
    pub pending: Pending,
    pub stats: RunStats,
}

impl RunContext {
    /// Fresh context with the agent at `position` facing `facing`; the
    /// reference frame starts there too.
    pub fn new(cfg: &MasonConfig, position: Vec3, facing: Facing) -> Self {
        Self {
            settings: Settings::from_config(cfg),
            frame: ReferenceFrame::new(position, facing),
            home_facing: facing,
            position,
            facing,
            inventory: InventoryCache::default(),
            fuel: FuelState::from_config(&cfg.fuel),
            steps: Vec::new(),
            cursor: 0,
            skipped: 0,
            last_error: None,
            retries: RetryCounters::default(),
            pending: Pending::default(),
            stats: RunStats::default(),
        }
    }

    pub fn home(&self) -> Vec3 {
        self.frame.origin
    }

    pub fn current_step(&self) -> Option<&BuildStep> {
        self.steps.get(self.cursor)
    }

    /// Move past the current step and clear per-step recovery state.
    pub fn advance(&mut self) {
        self.cursor += 1;
        self.retries = RetryCounters::default();
        self.pending = Pending::default();
        self.last_error = None;
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }
}
