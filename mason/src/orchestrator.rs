//! Run orchestrator.
//!
//! A plain state machine: each handler does one unit of work and returns the
//! next [`State`]. Recovery paths (restock, blocked, refuel, unload, error)
//! always hand control back to `Build`, which resumes at the current cursor.

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::context::RunContext;
use crate::core::frame::ReferenceFrame;
use crate::core::invariants::{acting_cell, validate_plan};
use crate::core::planner::{self, BuildStep};
use crate::core::schema::{CellMeta, Schema};
use crate::core::types::{Material, RunMode, Side, Vec3};
use crate::fuel;
use crate::inventory::{self, InventoryError, TransferOptions};
use crate::io::host::Host;
use crate::io::operator::{Decision, Operator};
use crate::io::report::{RunOutcome, RunReport};
use crate::manifest_check::{self, ManifestError};
use crate::movement::{self, MoveError};
use crate::placement::{self, ClearOutcome, PlaceError, PlaceOptions, PlaceOutcome};
use crate::tracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Initialize,
    Build,
    Restock,
    Blocked,
    Refuel,
    Unload,
    Error,
    Done,
    Halt(RunOutcome),
}

/// What happened to one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResult {
    Placed,
    Reused,
    Cleared,
    AlreadyEmpty,
    Failed,
}

/// Progress notification emitted once per finished step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepEvent {
    pub index: usize,
    pub total: usize,
    pub material: Material,
    /// World coordinate of the target cell.
    pub target: Vec3,
    pub result: StepResult,
}

/// Drive a full run of `schema` and report how it ended.
///
/// The agent's position and facing in `ctx` at call time become the home
/// cell and the reference frame.
#[instrument(skip_all, fields(mode = ?ctx.settings.mode))]
pub fn run<H, O, F>(
    ctx: &mut RunContext,
    host: &mut H,
    operator: &mut O,
    schema: &Schema,
    on_step: F,
) -> RunReport
where
    H: Host + ?Sized,
    O: Operator + ?Sized,
    F: FnMut(&StepEvent),
{
    let mut machine = Machine {
        ctx,
        host,
        operator,
        schema,
        on_step,
    };
    let mut state = State::Initialize;
    let outcome = loop {
        debug!(?state, cursor = machine.ctx.cursor, "state");
        state = match state {
            State::Halt(outcome) => break outcome,
            State::Initialize => machine.initialize(),
            State::Build => machine.build(),
            State::Restock => machine.restock(),
            State::Blocked => machine.blocked(),
            State::Refuel => machine.refuel(),
            State::Unload => machine.unload(),
            State::Error => machine.error(),
            State::Done => machine.done(),
        };
    };
    let report = report(machine.ctx, outcome);
    info!(summary = %report.summary(), "run finished");
    report
}

fn report(ctx: &RunContext, outcome: RunOutcome) -> RunReport {
    RunReport {
        mode: ctx.settings.mode,
        outcome,
        steps: ctx.steps.len(),
        placed: ctx.stats.placed,
        reused: ctx.stats.reused,
        cleared: ctx.stats.cleared,
        skipped: u32::try_from(ctx.skipped).unwrap_or(u32::MAX),
        failed: ctx.stats.failed,
        manual_pauses: ctx.stats.manual_pauses,
        final_position: ctx.position,
        final_facing: ctx.facing,
        final_fuel: ctx.fuel.level,
        last_error: ctx.last_error.clone(),
    }
}

struct Machine<'a, H: ?Sized, O: ?Sized, F> {
    ctx: &'a mut RunContext,
    host: &'a mut H,
    operator: &'a mut O,
    schema: &'a Schema,
    on_step: F,
}

impl<H, O, F> Machine<'_, H, O, F>
where
    H: Host + ?Sized,
    O: Operator + ?Sized,
    F: FnMut(&StepEvent),
{
    fn initialize(&mut self) -> State {
        let ctx = &mut *self.ctx;
        ctx.frame = ReferenceFrame::new(ctx.position, ctx.facing);
        ctx.home_facing = ctx.facing;

        let plan = planner::plan(self.schema, &ctx.settings.plan);
        if ctx.settings.mode == RunMode::Build {
            let violations = validate_plan(&plan.steps);
            if !violations.is_empty() {
                ctx.record_error(format!("invalid plan: {}", violations.join("; ")));
                return State::Halt(RunOutcome::Failed);
            }
        }
        ctx.steps = plan.steps;
        ctx.skipped = plan.skipped;
        ctx.cursor = 0;

        let threshold = ctx.fuel.threshold;
        let fuel = fuel::check(ctx, self.host, threshold);
        info!(
            steps = ctx.steps.len(),
            skipped = ctx.skipped,
            fuel = %fuel.level,
            home = %ctx.home(),
            "run initialised"
        );

        match ctx.settings.mode {
            RunMode::Build => {
                match manifest_check::require(ctx, self.host, self.operator, self.schema.manifest()) {
                    Ok(_) => State::Build,
                    Err(err @ ManifestError::Shortfall(_)) => {
                        ctx.record_error(err.to_string());
                        State::Halt(RunOutcome::Aborted)
                    }
                    Err(err) => {
                        ctx.record_error(err.to_string());
                        State::Halt(RunOutcome::Failed)
                    }
                }
            }
            RunMode::Mine => match inventory::scan(ctx, self.host, true) {
                Ok(()) => State::Build,
                Err(err) => {
                    ctx.record_error(err.to_string());
                    State::Halt(RunOutcome::Failed)
                }
            },
        }
    }

    fn build(&mut self) -> State {
        let Some(step) = self.ctx.current_step().cloned() else {
            return State::Done;
        };
        let mode = self.ctx.settings.mode;
        if mode == RunMode::Mine {
            match inventory::find_empty_slot(self.ctx, self.host) {
                Ok(Some(_)) => {}
                Ok(None) => return State::Unload,
                Err(err) => {
                    self.ctx.record_error(err.to_string());
                    return State::Error;
                }
            }
        }

        let stand = self.ctx.frame.to_world(acting_cell(&step));
        let home = self.ctx.home();
        let threshold = self.ctx.fuel.threshold;
        let required = threshold + self.ctx.position.manhattan(stand) + stand.manhattan(home);
        if !fuel::check(self.ctx, self.host, required).ok {
            self.ctx.pending.refuel = Some(threshold + 2 * home.manhattan(stand));
            return State::Refuel;
        }

        if let Err(err) = self.travel(stand) {
            return self.travel_failed(&step, err);
        }
        match mode {
            RunMode::Build => self.place_step(&step),
            RunMode::Mine => self.clear_step(&step),
        }
    }

    fn travel(&mut self, target: Vec3) -> Result<(), MoveError> {
        let opts = self.ctx.settings.travel();
        let order = movement::travel_order(self.ctx.position, target, &opts.axis_order);
        movement::go_to(self.ctx, self.host, target, &opts.with_axis_order(order))
    }

    fn travel_failed(&mut self, step: &BuildStep, err: MoveError) -> State {
        if err.is_out_of_fuel() {
            let home = self.ctx.home();
            let stand = self.ctx.frame.to_world(acting_cell(step));
            self.ctx.pending.refuel = Some(self.ctx.fuel.threshold + 2 * home.manhattan(stand));
            self.ctx.record_error(format!("step {}: {err}", step.index));
            return State::Refuel;
        }
        self.ctx.record_error(format!("step {}: {err}", step.index));
        match err {
            MoveError::Turn(_) => State::Error,
            _ => State::Blocked,
        }
    }

    fn place_step(&mut self, step: &BuildStep) -> State {
        if let Some(next) = self.face_front(step) {
            return next;
        }

        let meta = CellMeta {
            side: Some(step.side),
            overwrite: Some(step.overwrite),
        };
        match placement::place_material(
            self.ctx,
            self.host,
            &step.material,
            meta,
            &PlaceOptions::default(),
        ) {
            Ok(PlaceOutcome::Placed { .. }) => {
                self.ctx.stats.placed += 1;
                self.finish(step, StepResult::Placed)
            }
            Ok(PlaceOutcome::Reused) => {
                self.ctx.stats.reused += 1;
                self.finish(step, StepResult::Reused)
            }
            Err(PlaceError::MissingMaterial { material }) => {
                self.ctx
                    .record_error(format!("step {}: out of {material}", step.index));
                self.ctx.pending.restock = Some(material);
                State::Restock
            }
            Err(err @ (PlaceError::Occupied { .. } | PlaceError::Blocked { .. })) => {
                self.ctx.record_error(format!("step {}: {err}", step.index));
                State::Blocked
            }
            Err(err) => {
                self.ctx.record_error(format!("step {}: {err}", step.index));
                State::Error
            }
        }
    }

    fn clear_step(&mut self, step: &BuildStep) -> State {
        if let Some(next) = self.face_front(step) {
            return next;
        }
        match placement::clear_cell(self.ctx, self.host, step.side, &PlaceOptions::default()) {
            Ok(ClearOutcome::Cleared) => {
                self.ctx.stats.cleared += 1;
                self.finish(step, StepResult::Cleared)
            }
            Ok(ClearOutcome::AlreadyEmpty) => {
                self.ctx.stats.reused += 1;
                self.finish(step, StepResult::AlreadyEmpty)
            }
            Err(err @ PlaceError::Blocked { .. }) => {
                self.ctx.record_error(format!("step {}: {err}", step.index));
                State::Blocked
            }
            Err(err) => {
                self.ctx.record_error(format!("step {}: {err}", step.index));
                State::Error
            }
        }
    }

    /// Front steps act from the cell behind the target, facing the build direction.
    fn face_front(&mut self, step: &BuildStep) -> Option<State> {
        if step.side != Side::Front {
            return None;
        }
        let forward = self.ctx.frame.facing;
        match tracker::face(self.ctx, self.host, forward) {
            Ok(()) => None,
            Err(err) => {
                self.ctx.record_error(format!("step {}: {err}", step.index));
                Some(State::Error)
            }
        }
    }

    fn finish(&mut self, step: &BuildStep, result: StepResult) -> State {
        let event = StepEvent {
            index: step.index,
            total: self.ctx.steps.len(),
            material: step.material.clone(),
            target: self.ctx.frame.to_world(step.target),
            result,
        };
        debug!(index = event.index, target = %event.target, ?result, "step finished");
        (self.on_step)(&event);
        self.ctx.advance();
        State::Build
    }

    /// Give up on the current step and move on.
    fn fail_step(&mut self) -> State {
        let Some(step) = self.ctx.current_step().cloned() else {
            return State::Done;
        };
        warn!(index = step.index, error = ?self.ctx.last_error, "step skipped as failed");
        self.ctx.stats.failed += 1;
        self.finish(&step, StepResult::Failed)
    }

    fn go_home(&mut self) -> Result<(), MoveError> {
        let opts = self.ctx.settings.travel();
        movement::return_to_origin(self.ctx, self.host, &opts, true)
    }

    fn restock(&mut self) -> State {
        let Some(material) = self.ctx.pending.restock.clone() else {
            return State::Build;
        };
        self.ctx.inventory.dirty = true;
        match inventory::has_material(self.ctx, self.host, &material, 1) {
            Ok(true) => {
                self.ctx.pending.restock = None;
                self.ctx.retries.restock = 0;
                return State::Build;
            }
            Ok(false) => {}
            Err(err) => {
                self.ctx.record_error(err.to_string());
                return State::Error;
            }
        }

        if let Err(err) = self.go_home() {
            self.ctx.record_error(format!("restocking {material}: {err}"));
            return if err.is_out_of_fuel() {
                State::Refuel
            } else {
                State::Error
            };
        }
        self.ctx.retries.restock += 1;
        let needed = self.remaining_need(&material);
        let pulled = self.pull_supply(&material, needed);
        if pulled > 0 {
            info!(%material, pulled, needed, "restocked");
            self.ctx.stats.restocks += 1;
            self.ctx.pending.restock = None;
            self.ctx.retries.restock = 0;
            return State::Build;
        }

        let recovery = self.ctx.settings.recovery;
        if self.ctx.retries.restock < recovery.restock_attempts {
            debug!(%material, attempt = self.ctx.retries.restock, "supplies empty, waiting");
            self.host.sleep(recovery.blocked_delay);
            return State::Restock;
        }
        let prompt = format!("Out of {material} and the supply is empty. Refill it and retry?");
        match self.operator.decide(&prompt) {
            Decision::Retry => {
                self.ctx.stats.manual_pauses += 1;
                self.ctx.retries.restock = 0;
                State::Restock
            }
            Decision::Abort => State::Halt(RunOutcome::Aborted),
            Decision::Cancel => self.fail_step(),
        }
    }

    /// Items of `material` the remaining steps need beyond what is onboard.
    fn remaining_need(&mut self, material: &Material) -> u32 {
        let remaining = self.ctx.steps[self.ctx.cursor..]
            .iter()
            .filter(|step| &step.material == material)
            .count();
        let remaining = u32::try_from(remaining).unwrap_or(u32::MAX);
        let onboard = inventory::count_material(self.ctx, self.host, material).unwrap_or(0);
        remaining.saturating_sub(onboard).max(1)
    }

    fn pull_supply(&mut self, material: &Material, needed: u32) -> u32 {
        let limit = self.host.stack_limit();
        let dirs = self.ctx.settings.supply_dirs.clone();
        let mut total = 0;
        for dir in dirs {
            while total < needed {
                let amount = (needed - total).min(limit);
                match inventory::pull_material(
                    self.ctx,
                    self.host,
                    Some(material),
                    amount,
                    &TransferOptions::toward(dir),
                ) {
                    Ok(0) => break,
                    Ok(moved) => total += moved,
                    Err(InventoryError::NoEmptySlot) => return total,
                    Err(err) => {
                        debug!(?dir, %material, %err, "nothing pulled");
                        break;
                    }
                }
            }
        }
        total
    }

    fn blocked(&mut self) -> State {
        self.ctx.retries.blocked += 1;
        let recovery = self.ctx.settings.recovery;
        if self.ctx.retries.blocked <= recovery.blocked_retries {
            debug!(attempt = self.ctx.retries.blocked, error = ?self.ctx.last_error, "blocked, retrying");
            self.host.sleep(recovery.blocked_delay);
            return State::Build;
        }
        if let Err(err) = self.go_home() {
            warn!(%err, "could not return home while blocked");
        }
        let diagnostic = self.ctx.last_error.clone().unwrap_or_default();
        let prompt = format!("Blocked: {diagnostic}. Clear the way and retry?");
        match self.operator.decide(&prompt) {
            Decision::Retry => {
                self.ctx.stats.manual_pauses += 1;
                self.ctx.retries.blocked = 0;
                State::Build
            }
            Decision::Abort => State::Halt(RunOutcome::Aborted),
            Decision::Cancel => self.fail_step(),
        }
    }

    fn refuel(&mut self) -> State {
        let need = self.ctx.pending.refuel.unwrap_or(self.ctx.fuel.threshold);
        let target = self.ctx.fuel.reserve.max(need);
        match fuel::service(self.ctx, self.host, target) {
            Ok(level) if level.meets(need) => {
                self.ctx.pending.refuel = None;
                State::Build
            }
            Ok(level) => {
                self.ctx
                    .record_error(format!("fuel {level} is below the {need} the next step needs"));
                State::Error
            }
            Err(err) => {
                self.ctx.record_error(err.to_string());
                State::Error
            }
        }
    }

    fn unload(&mut self) -> State {
        if let Err(err) = self.go_home() {
            self.ctx.record_error(format!("unloading: {err}"));
            return State::Error;
        }
        match self.unload_cargo() {
            Ok(true) => {
                self.ctx.stats.unloads += 1;
                return State::Build;
            }
            Ok(false) => {}
            Err(err) => self.ctx.record_error(format!("unloading: {err}")),
        }
        match self
            .operator
            .decide("Inventory is full and storage takes no more. Empty it and retry?")
        {
            Decision::Retry => {
                self.ctx.stats.manual_pauses += 1;
                State::Unload
            }
            Decision::Abort => State::Halt(RunOutcome::Aborted),
            Decision::Cancel => self.fail_step(),
        }
    }

    /// Push every non-fuel stack home. `Ok(true)` once a slot is free.
    fn unload_cargo(&mut self) -> Result<bool, InventoryError> {
        inventory::scan(self.ctx, self.host, true)?;
        let cargo: Vec<(usize, u32)> = self
            .ctx
            .inventory
            .slots
            .iter()
            .enumerate()
            .filter_map(|(slot, stack)| {
                let stack = stack.as_ref()?;
                (!self.ctx.fuel.is_fuel(&stack.material)).then_some((slot, stack.count))
            })
            .collect();
        let dirs = self.ctx.settings.supply_dirs.clone();
        for (slot, count) in cargo {
            for dir in &dirs {
                let opts = TransferOptions::toward(*dir).deferred();
                match inventory::push_slot(self.ctx, self.host, slot, count, &opts) {
                    Ok(moved) if moved > 0 => break,
                    Ok(_) => {}
                    Err(err) => debug!(slot, ?dir, %err, "push refused"),
                }
            }
        }
        inventory::scan(self.ctx, self.host, true)?;
        Ok(inventory::find_empty_slot(self.ctx, self.host)?.is_some())
    }

    fn error(&mut self) -> State {
        let diagnostic = self
            .ctx
            .last_error
            .clone()
            .unwrap_or_else(|| "unknown error".to_string());
        error!(%diagnostic, position = %self.ctx.position, "run stopped on error");
        self.operator.acknowledge(&format!("Error: {diagnostic}"));
        match self.operator.decide("Resume the run?") {
            Decision::Retry => {
                self.ctx.stats.manual_pauses += 1;
                if self
                    .operator
                    .confirm("Has the agent been put back on its home cell facing the start direction?")
                {
                    let home = self.ctx.home();
                    let facing = self.ctx.home_facing;
                    tracker::rehome(self.ctx, home, facing);
                }
                self.ctx.inventory.dirty = true;
                self.ctx.retries = Default::default();
                self.ctx.pending.refuel = None;
                State::Build
            }
            Decision::Abort => State::Halt(RunOutcome::Aborted),
            Decision::Cancel => self.fail_step(),
        }
    }

    /// Every step processed. The run only counts as completed when the agent
    /// also made it back home.
    fn done(&mut self) -> State {
        let home = match self.go_home() {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "could not return home at the end of the run");
                self.ctx.record_error(format!("returning home: {err}"));
                false
            }
        };
        let finished = self.ctx.cursor >= self.ctx.steps.len();
        let outcome = if finished && home && self.ctx.stats.failed == 0 {
            RunOutcome::Completed
        } else {
            RunOutcome::Incomplete
        };
        info!(
            %outcome,
            placed = self.ctx.stats.placed,
            reused = self.ctx.stats.reused,
            cleared = self.ctx.stats.cleared,
            failed = self.ctx.stats.failed,
            "all steps processed"
        );
        State::Halt(outcome)
    }
}
