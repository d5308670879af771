//! Host capability abstraction.
//!
//! The [`Host`] trait decouples the agent core from the actuator/sensor
//! backend. Every call blocks until the host answers. Failures come back as
//! the host's own reason string; the core classifies them. Tests and
//! `mason simulate` use [`crate::io::sim::SimWorld`].

use std::time::Duration;

use crate::core::types::{FuelLevel, ItemStack, Material, Motion, Side, Turn};

/// Result of a host action; `Err` carries the host-reported reason.
pub type HostResult<T> = Result<T, String>;

/// Container probe answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub name: String,
}

/// Actuator and sensor surface of the agent.
pub trait Host {
    /// Attempt one elementary motion.
    fn step(&mut self, motion: Motion) -> HostResult<()>;

    /// Issue one quarter turn.
    fn turn(&mut self, turn: Turn) -> HostResult<()>;

    /// Material of the block on `side`, or `None` when the cell is empty.
    fn inspect(&mut self, side: Side) -> Option<Material>;

    /// Break the block on `side`.
    fn dig(&mut self, side: Side) -> HostResult<()>;

    /// Attack whatever occupies `side`.
    fn attack(&mut self, side: Side) -> HostResult<()>;

    /// Place one item from the selected slot into the cell on `side`.
    fn place(&mut self, side: Side) -> HostResult<()>;

    /// Number of inventory slots.
    fn slot_count(&self) -> usize;

    /// Maximum items per slot.
    fn stack_limit(&self) -> u32;

    fn slot(&mut self, index: usize) -> Option<ItemStack>;

    fn select(&mut self, index: usize) -> HostResult<()>;

    fn selected(&self) -> usize;

    /// Move up to `amount` items from the selected slot into the container on
    /// `side`. Returns the number actually transferred.
    fn push(&mut self, side: Side, amount: u32) -> HostResult<u32>;

    /// Move up to `amount` items from the container on `side` into the
    /// selected slot, optionally restricted to `material`.
    fn pull(&mut self, side: Side, material: Option<&Material>, amount: u32) -> HostResult<u32>;

    /// Container presence probe.
    fn container(&mut self, side: Side) -> Option<ContainerInfo>;

    /// Contents of the container on `side`.
    fn container_items(&mut self, side: Side) -> HostResult<Vec<ItemStack>>;

    fn fuel_level(&self) -> FuelLevel;

    /// Consume up to `count` items of the selected slot as fuel.
    fn refuel(&mut self, count: u32) -> HostResult<()>;

    /// Bounded delay between retry attempts.
    fn sleep(&mut self, duration: Duration);
}
