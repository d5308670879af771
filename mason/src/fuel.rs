//! Fuel manager.
//!
//! Reads the host fuel level into [`RunContext::fuel`], burns onboard fuel
//! items, pulls more from nearby containers, and runs the service routine
//! that brings the agent home to refuel.

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::context::RunContext;
use crate::core::types::{FuelLevel, Material};
use crate::inventory::{self, InventoryError, TransferOptions};
use crate::io::host::Host;
use crate::movement::{self, MoveError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuelCheck {
    /// Level meets the threshold (always true when unlimited).
    pub ok: bool,
    pub depleted: bool,
    pub level: FuelLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FuelError {
    #[error("fuel service already in progress")]
    AlreadyServicing,
    #[error("out of fuel with nothing onboard or nearby to burn")]
    BootstrapFailed,
    #[error("could not reach home to refuel: {0}")]
    Travel(#[source] MoveError),
    #[error("fuel level {level} still below {required} after refuelling")]
    Insufficient { level: FuelLevel, required: u32 },
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

/// Read the fuel level and compare it with `threshold`.
pub fn check<H: Host + ?Sized>(ctx: &mut RunContext, host: &mut H, threshold: u32) -> FuelCheck {
    let level = host.fuel_level();
    ctx.fuel.level = level;
    FuelCheck {
        ok: level.meets(threshold),
        depleted: level.is_empty(),
        level,
    }
}

/// Burn onboard fuel, then pull from sources, until `target` is met.
///
/// Stops after `rounds` rounds, or earlier once a round makes no progress.
pub fn refuel<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    target: u32,
    rounds: u32,
) -> Result<FuelLevel, FuelError> {
    for round in 1..=rounds.max(1) {
        let before = check(ctx, host, target);
        if before.ok {
            break;
        }
        burn_onboard(ctx, host, target)?;
        let mut pulled = 0;
        if !check(ctx, host, target).ok {
            pulled = pull_fuel(ctx, host)?;
            burn_onboard(ctx, host, target)?;
        }
        let after = check(ctx, host, target);
        debug!(round, before = %before.level, after = %after.level, pulled, "refuel round");
        if after.level == before.level && pulled == 0 {
            break;
        }
    }
    Ok(ctx.fuel.level)
}

/// Burn fuel items one at a time until `target` is reached or none are left.
fn burn_onboard<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    target: u32,
) -> Result<(), FuelError> {
    let items = ctx.fuel.items.clone();
    for item in &items {
        while !check(ctx, host, target).ok {
            let Some(slot) = inventory::slot_for_material(ctx, host, item)? else {
                break;
            };
            host.select(slot).map_err(|reason| InventoryError::Host {
                action: "select",
                reason,
            })?;
            if let Err(reason) = host.refuel(1) {
                warn!(%item, %reason, "refuel rejected");
                ctx.inventory.dirty = true;
                break;
            }
            inventory::record_removed(ctx, slot, 1);
        }
    }
    Ok(())
}

/// Pull one stack of any allowed fuel item from each configured source.
fn pull_fuel<H: Host + ?Sized>(ctx: &mut RunContext, host: &mut H) -> Result<u32, FuelError> {
    let limit = host.stack_limit();
    let dirs = ctx.fuel.source_dirs.clone();
    let items: Vec<Material> = ctx.fuel.items.clone();
    let mut total = 0;
    for dir in dirs {
        for item in &items {
            match inventory::pull_material(ctx, host, Some(item), limit, &TransferOptions::toward(dir))
            {
                Ok(moved) => {
                    total += moved;
                    if moved > 0 {
                        break;
                    }
                }
                Err(InventoryError::ContainerNotFound | InventoryError::NoEmptySlot) => break,
                Err(InventoryError::Host { reason, .. }) => {
                    debug!(?dir, %item, %reason, "no fuel pulled");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(total)
}

/// Full recovery: bootstrap if depleted, go home, refuel to `target`.
///
/// Succeeds when the final level meets the run threshold. Only one service
/// may run at a time.
#[instrument(skip_all, fields(fuel_target = target))]
pub fn service<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    target: u32,
) -> Result<FuelLevel, FuelError> {
    if ctx.fuel.servicing {
        return Err(FuelError::AlreadyServicing);
    }
    ctx.fuel.servicing = true;
    let result = run_service(ctx, host, target);
    ctx.fuel.servicing = false;
    result
}

fn run_service<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    target: u32,
) -> Result<FuelLevel, FuelError> {
    let threshold = ctx.fuel.threshold;
    let start = check(ctx, host, threshold);
    if start.level == FuelLevel::Unlimited {
        return Ok(start.level);
    }
    if start.depleted {
        burn_onboard(ctx, host, 1)?;
        if check(ctx, host, 1).depleted {
            pull_fuel(ctx, host)?;
            burn_onboard(ctx, host, 1)?;
        }
        if check(ctx, host, 1).depleted {
            warn!(pos = %ctx.position, "fuel bootstrap failed");
            return Err(FuelError::BootstrapFailed);
        }
        info!(level = %ctx.fuel.level, "fuel bootstrapped");
    }

    let opts = ctx.settings.movement.clone();
    movement::return_to_origin(ctx, host, &opts, true).map_err(FuelError::Travel)?;
    let rounds = ctx.fuel.rounds;
    let level = refuel(ctx, host, target, rounds)?;
    ctx.stats.refuels += 1;
    if !level.meets(threshold) {
        return Err(FuelError::Insufficient {
            level,
            required: threshold,
        });
    }
    if !level.meets(target) {
        warn!(%level, target, "refuelled below target");
    }
    info!(%level, "fuel service complete");
    Ok(level)
}

/// `check`, `service` when short, then `check` again.
pub fn ensure<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    threshold: u32,
) -> Result<FuelCheck, FuelError> {
    let first = check(ctx, host, threshold);
    if first.ok {
        return Ok(first);
    }
    let target = ctx.fuel.reserve.max(threshold);
    service(ctx, host, target)?;
    let second = check(ctx, host, threshold);
    if second.ok {
        Ok(second)
    } else {
        Err(FuelError::Insufficient {
            level: second.level,
            required: threshold,
        })
    }
}
