//! Position tracker.
//!
//! Belief about where the agent stands and which way it faces. Both are
//! updated only after the host confirms the physical action; a failed motion
//! or turn leaves them untouched.

use thiserror::Error;
use tracing::{info, trace};

use crate::context::RunContext;
use crate::core::types::{Facing, Motion, Turn, Vec3};
use crate::io::host::{Host, HostResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("turn {turn:?} from {from} failed: {reason}")]
pub struct TurnError {
    pub turn: Turn,
    pub from: Facing,
    pub reason: String,
}

pub fn position(ctx: &RunContext) -> Vec3 {
    ctx.position
}

/// Overwrite the believed position. Only for initialisation and re-homing.
pub fn set_position(ctx: &mut RunContext, position: Vec3) {
    ctx.position = position;
}

pub fn facing(ctx: &RunContext) -> Facing {
    ctx.facing
}

/// Reset belief to the home cell after the agent was carried back by hand.
pub fn rehome(ctx: &mut RunContext, position: Vec3, facing: Facing) {
    info!(from = %ctx.position, to = %position, %facing, "re-homing");
    ctx.position = position;
    ctx.facing = facing;
    ctx.inventory.dirty = true;
}

/// Issue one elementary motion and commit its delta on success.
pub fn step<H: Host + ?Sized>(ctx: &mut RunContext, host: &mut H, motion: Motion) -> HostResult<()> {
    host.step(motion)?;
    ctx.position = ctx.position + motion.delta(ctx.facing);
    ctx.fuel.level = host.fuel_level();
    trace!(%motion, pos = %ctx.position, "moved");
    Ok(())
}

pub fn turn<H: Host + ?Sized>(ctx: &mut RunContext, host: &mut H, turn: Turn) -> Result<(), TurnError> {
    host.turn(turn).map_err(|reason| TurnError {
        turn,
        from: ctx.facing,
        reason,
    })?;
    ctx.facing = turn.apply(ctx.facing);
    Ok(())
}

pub fn turn_left<H: Host + ?Sized>(ctx: &mut RunContext, host: &mut H) -> Result<(), TurnError> {
    turn(ctx, host, Turn::Left)
}

pub fn turn_right<H: Host + ?Sized>(ctx: &mut RunContext, host: &mut H) -> Result<(), TurnError> {
    turn(ctx, host, Turn::Right)
}

pub fn turn_around<H: Host + ?Sized>(ctx: &mut RunContext, host: &mut H) -> Result<(), TurnError> {
    turn(ctx, host, Turn::Right)?;
    turn(ctx, host, Turn::Right)
}

/// Turn to `target` with the fewest quarter turns.
pub fn face<H: Host + ?Sized>(
    ctx: &mut RunContext,
    host: &mut H,
    target: Facing,
) -> Result<(), TurnError> {
    for t in ctx.facing.turns_to(target) {
        turn(ctx, host, *t)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::io::config::MasonConfig;
    use crate::io::sim::SimWorld;

    fn ctx() -> RunContext {
        RunContext::new(&MasonConfig::default(), Vec3::ZERO, Facing::North)
    }

    #[test]
    fn failed_turn_leaves_facing_unchanged() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        world.block_next_turns(1);
        let err = turn_right(&mut ctx, &mut world).unwrap_err();
        assert_eq!(err.from, Facing::North);
        assert_eq!(facing(&ctx), Facing::North);
        turn_right(&mut ctx, &mut world).expect("second turn");
        assert_eq!(facing(&ctx), Facing::East);
    }

    #[test]
    fn face_uses_shortest_sequence() {
        let mut ctx = ctx();
        let mut world = SimWorld::new();
        face(&mut ctx, &mut world, Facing::West).expect("face");
        assert_eq!(world.counters().turns, 1);
        face(&mut ctx, &mut world, Facing::East).expect("face");
        assert_eq!(world.counters().turns, 3);
        assert_eq!(world.facing(), Facing::East);
        assert_eq!(facing(&ctx), Facing::East);
    }

    #[test]
    fn rehome_overwrites_belief() {
        let mut ctx = ctx();
        ctx.inventory.dirty = false;
        rehome(&mut ctx, Vec3::new(4, 1, 2), Facing::South);
        assert_eq!(position(&ctx), Vec3::new(4, 1, 2));
        assert_eq!(facing(&ctx), Facing::South);
        assert!(ctx.inventory.dirty);
    }

    #[test]
    fn position_is_sum_of_successful_motions() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut ctx = ctx();
            let mut world = SimWorld::new();
            let mut expected = Vec3::ZERO;
            for _ in 0..40 {
                if rng.gen_bool(0.2) {
                    world.block_next_moves(1);
                }
                if rng.gen_bool(0.3) {
                    turn_right(&mut ctx, &mut world).expect("turn");
                }
                let motion = match rng.gen_range(0..4) {
                    0 => Motion::Forward,
                    1 => Motion::Back,
                    2 => Motion::Up,
                    _ => Motion::Down,
                };
                let facing_before = facing(&ctx);
                let before = position(&ctx);
                match step(&mut ctx, &mut world, motion) {
                    Ok(()) => expected = expected + motion.delta(facing_before),
                    Err(_) => assert_eq!(position(&ctx), before),
                }
                assert_eq!(position(&ctx), expected);
                assert_eq!(position(&ctx), world.position());
            }
        }
    }
}
