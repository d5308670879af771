//! Agent configuration stored in `mason.toml`.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::frame::Orientation;
use crate::core::types::{Axis, Material, RelativeDir, RunMode, Side, Vec3};
use crate::io::write_atomic;

pub const DEFAULT_CONFIG_FILE: &str = "mason.toml";

/// Agent configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to
/// values that work for a small build next to a supply chest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MasonConfig {
    pub movement: MovementConfig,
    pub placement: PlacementConfig,
    pub fuel: FuelConfig,
    pub inventory: InventoryConfig,
    pub build: BuildConfig,
    pub recovery: RecoveryConfig,
    pub manifest: ManifestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MovementConfig {
    /// Attempts per elementary motion before giving up (first try included).
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds.
    pub retry_delay_ms: u64,
    /// Dig through solid obstructions.
    pub dig: bool,
    /// Attack entities blocking the way.
    pub attack: bool,
    /// Order in which `go_to` resolves axes.
    pub axis_order: Vec<Axis>,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay_ms: 500,
            dig: false,
            attack: true,
            axis_order: vec![Axis::X, Axis::Z, Axis::Y],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlacementConfig {
    /// Side used when neither the call nor the cell names one.
    pub default_side: Side,
    /// Replace conflicting blocks when the cell does not say otherwise.
    pub overwrite: bool,
    pub dig: bool,
    pub attack: bool,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            default_side: Side::Down,
            overwrite: false,
            dig: true,
            attack: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FuelConfig {
    /// Minimum spare fuel kept on top of the distance home.
    pub threshold: u32,
    /// Level a service run refuels to.
    pub reserve: u32,
    /// Bounded refuel rounds per service run.
    pub rounds: u32,
    /// Items the agent may burn.
    pub items: Vec<Material>,
    /// Where fuel containers may sit, relative to the agent.
    pub source_dirs: Vec<RelativeDir>,
}

impl Default for FuelConfig {
    fn default() -> Self {
        Self {
            threshold: 80,
            reserve: 800,
            rounds: 4,
            items: [
                "minecraft:coal",
                "minecraft:charcoal",
                "minecraft:coal_block",
                "minecraft:lava_bucket",
                "minecraft:blaze_rod",
                "minecraft:oak_planks",
                "minecraft:oak_log",
            ]
            .into_iter()
            .map(Material::from)
            .collect(),
            source_dirs: vec![RelativeDir::Front, RelativeDir::Up, RelativeDir::Down],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InventoryConfig {
    /// Directions checked for a supply container without turning.
    pub supply_dirs: Vec<RelativeDir>,
    /// Also rotate through left, behind and right when no container is found.
    pub search_around: bool,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            supply_dirs: vec![RelativeDir::Front, RelativeDir::Up, RelativeDir::Down],
            search_around: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BuildConfig {
    pub mode: RunMode,
    pub orientation: Orientation,
    /// Local offset of the schema's minimum corner from the home cell.
    pub offset: Vec3,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Build,
            orientation: Orientation::Right,
            offset: Vec3::new(0, 0, 1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Automatic re-checks of a blocked cell before asking the operator.
    pub blocked_retries: u32,
    pub blocked_delay_ms: u64,
    /// Automatic restock attempts per missing material before asking the operator.
    pub restock_attempts: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            blocked_retries: 3,
            blocked_delay_ms: 2_000,
            restock_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ManifestConfig {
    /// Refuse to start until every required material is available.
    pub block_on_shortfall: bool,
}

impl MasonConfig {
    pub fn validate(&self) -> Result<()> {
        if self.movement.max_attempts == 0 {
            return Err(anyhow!("movement.max_attempts must be > 0"));
        }
        let axes: HashSet<Axis> = self.movement.axis_order.iter().copied().collect();
        if self.movement.axis_order.len() != 3 || axes.len() != 3 {
            return Err(anyhow!(
                "movement.axis_order must name each of x, y, z exactly once"
            ));
        }
        if self.fuel.rounds == 0 {
            return Err(anyhow!("fuel.rounds must be > 0"));
        }
        if self.fuel.reserve < self.fuel.threshold {
            return Err(anyhow!(
                "fuel.reserve ({}) must be >= fuel.threshold ({})",
                self.fuel.reserve,
                self.fuel.threshold
            ));
        }
        if self.fuel.items.is_empty() {
            return Err(anyhow!("fuel.items must be a non-empty array"));
        }
        if self.inventory.supply_dirs.is_empty() {
            return Err(anyhow!("inventory.supply_dirs must be a non-empty array"));
        }
        if self.build.offset == Vec3::ZERO {
            return Err(anyhow!(
                "build.offset must move the structure off the home cell"
            ));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `MasonConfig::default()`.
pub fn load_config(path: &Path) -> Result<MasonConfig> {
    if !path.exists() {
        let cfg = MasonConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: MasonConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &MasonConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf, "config")
}
