//! Movement engine.
//!
//! Elementary motions retry in place: on failure the obstruction is
//! inspected, cleared when permitted, and the motion is tried again after a
//! bounded delay. Composite moves (`go_to`, `step_path`, `return_to_origin`)
//! abort on the first motion that exhausts its retries, leaving the agent
//! wherever it got to.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::context::RunContext;
use crate::core::classifier::{MoveFailureKind, classify_move_failure};
use crate::core::types::{Axis, Facing, Motion, Vec3};
use crate::io::config::MovementConfig;
use crate::io::host::Host;
use crate::tracker::{self, TurnError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOptions {
    /// Attempts per elementary motion, first try included.
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub dig: bool,
    pub attack: bool,
    pub axis_order: Vec<Axis>,
}

impl MoveOptions {
    pub fn from_config(cfg: &MovementConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
            dig: cfg.dig,
            attack: cfg.attack,
            axis_order: cfg.axis_order.clone(),
        }
    }

    pub fn with_dig(mut self, dig: bool) -> Self {
        self.dig = dig;
        self
    }

    pub fn with_axis_order(mut self, order: Vec<Axis>) -> Self {
        self.axis_order = order;
        self
    }
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self::from_config(&MovementConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("move {motion} by {delta} failed after {attempts} attempts: {reason}")]
    Exhausted {
        motion: Motion,
        delta: Vec3,
        attempts: u32,
        reason: String,
    },
    #[error("move {motion} by {delta} hit a world limit: {reason}")]
    Limit {
        motion: Motion,
        delta: Vec3,
        reason: String,
    },
    #[error("out of fuel moving {motion} by {delta}")]
    OutOfFuel { motion: Motion, delta: Vec3 },
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error("waypoint {index} ({target}) unreachable: {source}")]
    Waypoint {
        index: usize,
        target: Vec3,
        #[source]
        source: Box<MoveError>,
    },
}

impl MoveError {
    pub fn is_out_of_fuel(&self) -> bool {
        match self {
            MoveError::OutOfFuel { .. } => true,
            MoveError::Waypoint { source, .. } => source.is_out_of_fuel(),
            _ => false,
        }
    }
}

pub fn forward<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    opts: &MoveOptions,
) -> Result<(), MoveError> {
    attempt(ctx, host, Motion::Forward, opts)
}

/// Step backwards. The host cannot sense behind the agent, so this only retries.
pub fn back<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    opts: &MoveOptions,
) -> Result<(), MoveError> {
    attempt(ctx, host, Motion::Back, opts)
}

pub fn up<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    opts: &MoveOptions,
) -> Result<(), MoveError> {
    attempt(ctx, host, Motion::Up, opts)
}

pub fn down<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    opts: &MoveOptions,
) -> Result<(), MoveError> {
    attempt(ctx, host, Motion::Down, opts)
}

fn attempt<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    motion: Motion,
    opts: &MoveOptions,
) -> Result<(), MoveError> {
    let delta = motion.delta(ctx.facing);
    let attempts = opts.max_attempts.max(1);
    let mut reason = String::new();
    for n in 1..=attempts {
        match tracker::step(ctx, host, motion) {
            Ok(()) => {
                if n > 1 {
                    debug!(%motion, attempts = n, "move succeeded after retry");
                }
                return Ok(());
            }
            Err(err) => {
                match classify_move_failure(&err) {
                    MoveFailureKind::OutOfFuel => {
                        ctx.fuel.level = host.fuel_level();
                        return Err(MoveError::OutOfFuel { motion, delta });
                    }
                    MoveFailureKind::Limit => {
                        return Err(MoveError::Limit {
                            motion,
                            delta,
                            reason: err,
                        });
                    }
                    MoveFailureKind::Obstructed | MoveFailureKind::Other => {}
                }
                reason = err;
                if n < attempts && !clear_obstruction(ctx, host, motion, opts) {
                    host.sleep(opts.retry_delay);
                }
            }
        }
    }
    warn!(%motion, pos = %ctx.position, %reason, "move retries exhausted");
    Err(MoveError::Exhausted {
        motion,
        delta,
        attempts,
        reason,
    })
}

/// Try to clear whatever blocks `motion`. Returns true when something was removed.
///
/// A detected block is dug first and attacked only if digging fails. When
/// nothing is detected the obstruction is taken to be an entity.
fn clear_obstruction<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    motion: Motion,
    opts: &MoveOptions,
) -> bool {
    let Some(side) = motion.side() else {
        return false;
    };
    let detected = host.inspect(side).filter(|m| !m.is_air());
    if let Some(material) = &detected {
        if opts.dig {
            match host.dig(side) {
                Ok(()) => {
                    debug!(%side, %material, "dug obstruction");
                    ctx.inventory.dirty = true;
                    return true;
                }
                Err(reason) => debug!(%side, %material, %reason, "dig failed"),
            }
        }
    }
    if opts.attack {
        match host.attack(side) {
            Ok(()) => {
                debug!(%side, "attacked obstruction");
                return true;
            }
            Err(reason) => debug!(%side, %reason, "attack failed"),
        }
    }
    false
}

/// Move to `target` one axis at a time in `opts.axis_order`.
///
/// Horizontal axes turn to face the direction of travel first.
pub fn go_to<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    target: Vec3,
    opts: &MoveOptions,
) -> Result<(), MoveError> {
    if ctx.position == target {
        return Ok(());
    }
    debug!(from = %ctx.position, to = %target, "go_to");
    for axis in &opts.axis_order {
        move_along(ctx, host, *axis, target.get(*axis), opts)?;
    }
    Ok(())
}

fn move_along<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    axis: Axis,
    goal: i32,
    opts: &MoveOptions,
) -> Result<(), MoveError> {
    let delta = goal - ctx.position.get(axis);
    if delta == 0 {
        return Ok(());
    }
    let motion = match axis {
        Axis::Y if delta > 0 => Motion::Up,
        Axis::Y => Motion::Down,
        Axis::X | Axis::Z => {
            if let Some(facing) = Facing::toward(axis, delta) {
                tracker::face(ctx, host, facing)?;
            }
            Motion::Forward
        }
    };
    for _ in 0..delta.unsigned_abs() {
        attempt(ctx, host, motion, opts)?;
    }
    Ok(())
}

/// Visit `nodes` in order; the error names the first waypoint not reached.
pub fn step_path<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    nodes: &[Vec3],
    opts: &MoveOptions,
) -> Result<(), MoveError> {
    for (index, target) in nodes.iter().enumerate() {
        go_to(ctx, host, *target, opts).map_err(|source| MoveError::Waypoint {
            index,
            target: *target,
            source: Box::new(source),
        })?;
    }
    Ok(())
}

/// Go back to the home cell, optionally turning to the home facing.
pub fn return_to_origin<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    opts: &MoveOptions,
    face_home: bool,
) -> Result<(), MoveError> {
    let home = ctx.home();
    go_to(ctx, host, home, opts)?;
    if face_home {
        let facing = ctx.home_facing;
        tracker::face(ctx, host, facing)?;
    }
    Ok(())
}

/// Axis order for travelling from `from` to `to`: climb first when the
/// destination is higher, otherwise the configured order.
pub fn travel_order(from: Vec3, to: Vec3, configured: &[Axis]) -> Vec<Axis> {
    if to.y > from.y {
        let mut order = vec![Axis::Y];
        order.extend(configured.iter().copied().filter(|a| *a != Axis::Y));
        order
    } else {
        configured.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FuelLevel;
    use crate::io::config::MasonConfig;
    use crate::io::sim::SimWorld;

    fn ctx() -> RunContext {
        RunContext::new(&MasonConfig::default(), Vec3::ZERO, Facing::North)
    }

    #[test]
    fn forward_retries_through_transient_obstruction() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.block_next_moves(2);
        let opts = MoveOptions::default();
        forward(&mut ctx, &mut world, &opts).expect("forward");
        assert_eq!(ctx.position, Vec3::new(0, 0, -1));
        assert_eq!(world.counters().failed_moves, 2);
        assert_eq!(world.counters().slept, opts.retry_delay * 2);
    }

    #[test]
    fn exhausted_retries_leave_position_and_report_delta() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.set_protected_block(Vec3::new(0, 0, -1), "minecraft:bedrock");
        let opts = MoveOptions::default().with_dig(true);
        let err = forward(&mut ctx, &mut world, &opts).unwrap_err();
        match err {
            MoveError::Exhausted {
                delta, attempts, ..
            } => {
                assert_eq!(delta, Vec3::new(0, 0, -1));
                assert_eq!(attempts, opts.max_attempts);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(ctx.position, Vec3::ZERO);
    }

    #[test]
    fn dig_permission_clears_blocks() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.set_block(Vec3::UP, "minecraft:dirt");
        assert!(up(&mut ctx, &mut world, &MoveOptions::default()).is_err());
        assert_eq!(world.counters().digs, 0);

        let slept = world.counters().slept;
        up(&mut ctx, &mut world, &MoveOptions::default().with_dig(true)).expect("up");
        assert_eq!(ctx.position, Vec3::UP);
        // the dig removed the obstruction, so the retry went straight ahead
        assert_eq!(world.counters().slept, slept);
        assert_eq!(world.inventory_total(&"minecraft:dirt".into()), 1);
        assert!(ctx.inventory.dirty);
    }

    #[test]
    fn back_only_retries() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.set_block(Vec3::new(0, 0, 1), "minecraft:dirt");
        let opts = MoveOptions::default().with_dig(true);
        let err = back(&mut ctx, &mut world, &opts).unwrap_err();
        assert!(matches!(err, MoveError::Exhausted { delta, .. } if delta == Vec3::new(0, 0, 1)));
        assert_eq!(world.counters().digs, 0);
        assert_eq!(world.counters().slept, opts.retry_delay * (opts.max_attempts - 1));

        world.clear_block(Vec3::new(0, 0, 1));
        back(&mut ctx, &mut world, &opts).expect("back");
        assert_eq!(ctx.position, Vec3::new(0, 0, 1));
        assert_eq!(ctx.facing, Facing::North);
    }

    #[test]
    fn entities_are_attacked_out_of_the_way() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.add_entity(Vec3::new(0, 0, -1));
        forward(&mut ctx, &mut world, &MoveOptions::default()).expect("forward");
        assert_eq!(world.counters().attacks, 1);
        assert!(!world.has_entity(Vec3::new(0, 0, -1)));
    }

    #[test]
    fn out_of_fuel_fails_without_retry() {
        let mut ctx = ctx();
        let mut world = SimWorld::new().with_fuel(FuelLevel::Level(0));
        let err = forward(&mut ctx, &mut world, &MoveOptions::default()).unwrap_err();
        assert!(err.is_out_of_fuel());
        assert_eq!(world.counters().failed_moves, 1);
    }

    #[test]
    fn height_limit_is_not_retried() {
        let mut ctx = ctx();
        let mut world = SimWorld::new().with_height_limits(-1, 0);
        let err = up(&mut ctx, &mut world, &MoveOptions::default()).unwrap_err();
        assert!(matches!(err, MoveError::Limit { .. }));
        assert_eq!(world.counters().failed_moves, 1);
    }

    #[test]
    fn go_to_follows_axis_order_and_faces_travel_direction() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        let target = Vec3::new(2, 1, 3);
        go_to(&mut ctx, &mut world, target, &MoveOptions::default()).expect("go_to");
        assert_eq!(ctx.position, target);
        assert_eq!(world.position(), target);
        // x first (east), then z (south), then y
        assert_eq!(ctx.facing, Facing::South);
        assert_eq!(world.counters().moves, 6);
    }

    #[test]
    fn step_path_reports_failed_waypoint() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.set_protected_block(Vec3::new(2, 0, 0), "minecraft:bedrock");
        let nodes = [Vec3::new(1, 0, 0), Vec3::new(3, 0, 0)];
        let err = step_path(&mut ctx, &mut world, &nodes, &MoveOptions::default()).unwrap_err();
        match err {
            MoveError::Waypoint { index, target, .. } => {
                assert_eq!(index, 1);
                assert_eq!(target, Vec3::new(3, 0, 0));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(ctx.position, Vec3::new(1, 0, 0));
    }

    #[test]
    fn return_to_origin_restores_home_facing() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        let opts = MoveOptions::default();
        go_to(&mut ctx, &mut world, Vec3::new(-2, 2, 1), &opts).expect("go_to");
        return_to_origin(&mut ctx, &mut world, &opts, true).expect("home");
        assert_eq!(ctx.position, Vec3::ZERO);
        assert_eq!(ctx.facing, Facing::North);
        assert_eq!(world.facing(), Facing::North);
    }

    #[test]
    fn travel_order_climbs_first_when_rising() {
        let configured = [Axis::X, Axis::Z, Axis::Y];
        assert_eq!(
            travel_order(Vec3::ZERO, Vec3::new(1, 2, 1), &configured),
            vec![Axis::Y, Axis::X, Axis::Z]
        );
        assert_eq!(
            travel_order(Vec3::new(0, 3, 0), Vec3::new(1, 2, 1), &configured),
            configured.to_vec()
        );
    }
}
