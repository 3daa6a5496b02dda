#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Rabbit Escape.
//!
//! A [`World`] is built from a [`Level`], fed instructions from a solution,
//! and advanced one tick at a time. Every step is a pure computation over
//! state the world owns exclusively, so two worlds built from the same level
//! and instructions produce identical event streams.

mod abilities;
mod actor;
mod terrain;

use std::collections::{BTreeSet, VecDeque};

use rabbit_escape_core::{
    AbilityKind, ActorId, ActorMode, ActorRecord, AssignError, CellCoord, Command, Event, Facing,
    Instruction, ScheduledInstruction, Solution, Status, TerrainCell,
};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::{
    abilities::{assign, check_accepts},
    actor::{Actor, Advance, Surroundings},
};

pub use abilities::AbilityStock;
pub use terrain::{TerrainError, TerrainGrid, TerrainOverlay, TerrainView};

/// Scheduled appearance of one actor at an entrance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnPoint {
    cell: CellCoord,
    tick: u64,
    facing: Facing,
}

impl SpawnPoint {
    /// Creates a spawn of an actor facing `facing` at `cell` during `tick`.
    #[must_use]
    pub const fn new(cell: CellCoord, tick: u64, facing: Facing) -> Self {
        Self { cell, tick, facing }
    }

    /// Entrance cell the actor appears at.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Tick during which the actor appears.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Initial walking direction.
    #[must_use]
    pub const fn facing(&self) -> Facing {
        self.facing
    }
}

/// Fully populated level description consumed when constructing a world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Level {
    terrain: TerrainGrid,
    spawns: Vec<SpawnPoint>,
    required_rescues: u32,
    abilities: AbilityStock,
    must_survive: Option<ActorId>,
}

impl Level {
    /// Creates a level with no spawns and no abilities.
    #[must_use]
    pub fn new(terrain: TerrainGrid, required_rescues: u32) -> Self {
        Self {
            terrain,
            spawns: Vec::new(),
            required_rescues,
            abilities: AbilityStock::new(),
            must_survive: None,
        }
    }

    /// Schedules an actor spawn. Actor identities follow spawn tick order,
    /// ties keeping the order in which spawns were added.
    #[must_use]
    pub fn with_spawn(mut self, spawn: SpawnPoint) -> Self {
        self.spawns.push(spawn);
        self
    }

    /// Sets the number of available uses of an ability.
    #[must_use]
    pub fn with_ability(mut self, kind: AbilityKind, count: u32) -> Self {
        self.abilities.set(kind, count);
        self
    }

    /// Marks an actor whose death loses the level.
    #[must_use]
    pub fn with_must_survive(mut self, actor: ActorId) -> Self {
        self.must_survive = Some(actor);
        self
    }

    /// Static terrain of the level.
    #[must_use]
    pub const fn terrain(&self) -> &TerrainGrid {
        &self.terrain
    }

    /// Number of actors that must exit to win.
    #[must_use]
    pub const fn required_rescues(&self) -> u32 {
        self.required_rescues
    }

    /// Scheduled spawns in the order they were added.
    #[must_use]
    pub fn spawns(&self) -> &[SpawnPoint] {
        &self.spawns
    }
}

/// Problems detected while constructing terrain or a world.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LevelError {
    /// The terrain has no cells.
    #[error("terrain must have at least one row and one column")]
    EmptyTerrain,
    /// The cell vector does not match the declared dimensions.
    #[error("expected {expected} terrain cells, found {actual}")]
    CellCountMismatch {
        /// Cells implied by the dimensions.
        expected: u64,
        /// Cells provided.
        actual: usize,
    },
    /// A textual row differs in length from the first row.
    #[error("terrain row {row} has {actual} cells, expected {expected}")]
    RaggedRow {
        /// Zero-based row index.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        actual: usize,
    },
    /// A textual row contains a character outside the legend.
    #[error("unknown terrain symbol '{symbol}' at ({x}, {y})")]
    UnknownSymbol {
        /// Offending character.
        symbol: char,
        /// Column of the character.
        x: usize,
        /// Row of the character.
        y: usize,
    },
    /// A spawn lies outside the level.
    #[error("spawn at {0} lies outside the level")]
    SpawnOutOfBounds(CellCoord),
    /// A spawn is not placed on an entrance.
    #[error("spawn at {0} is not on an entrance")]
    SpawnNotAtEntrance(CellCoord),
    /// The must-survive actor is never spawned.
    #[error("must-survive actor {0} is never spawned")]
    UnknownActor(ActorId),
}

/// Fatal invariant violations raised while stepping.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WorldError {
    /// Terrain was accessed outside the level during internal processing.
    #[error(transparent)]
    Terrain(#[from] TerrainError),
    /// Two live actors share an identity.
    #[error("actor identity {0} is already in use")]
    DuplicateActor(ActorId),
}

/// Failures reported by [`World::run`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RunError {
    /// The world was still running after the tick budget was spent.
    #[error("no terminal status after {max_ticks} ticks")]
    Timeout {
        /// Tick budget that was exhausted.
        max_ticks: u64,
    },
    /// Stepping hit a fatal invariant violation.
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Represents the authoritative Rabbit Escape world state.
#[derive(Debug)]
pub struct World {
    terrain: TerrainGrid,
    overlay: TerrainOverlay,
    actors: Vec<Actor>,
    retired: Vec<ActorRecord>,
    spawns: VecDeque<(ActorId, SpawnPoint)>,
    pending: PendingInstructions,
    stock: AbilityStock,
    required_rescues: u32,
    must_survive: Option<ActorId>,
    tick: u64,
    status: Status,
}

impl World {
    /// Creates a world ready to simulate the provided level.
    pub fn new(level: Level) -> Result<Self, LevelError> {
        let Level {
            terrain,
            mut spawns,
            required_rescues,
            abilities,
            must_survive,
        } = level;

        for spawn in &spawns {
            match terrain.cell_at(spawn.cell) {
                Ok(TerrainCell::Entrance) => {}
                Ok(_) => return Err(LevelError::SpawnNotAtEntrance(spawn.cell)),
                Err(_) => return Err(LevelError::SpawnOutOfBounds(spawn.cell)),
            }
        }

        spawns.sort_by_key(SpawnPoint::tick);
        let spawns: VecDeque<(ActorId, SpawnPoint)> = spawns
            .into_iter()
            .zip(0_u32..)
            .map(|(spawn, index)| (ActorId::new(index), spawn))
            .collect();

        if let Some(actor) = must_survive {
            if !spawns.iter().any(|(id, _)| *id == actor) {
                return Err(LevelError::UnknownActor(actor));
            }
        }

        Ok(Self {
            terrain,
            overlay: TerrainOverlay::default(),
            actors: Vec::new(),
            retired: Vec::new(),
            spawns,
            pending: PendingInstructions::default(),
            stock: abilities,
            required_rescues,
            must_survive,
            tick: 0,
            status: Status::Running,
        })
    }

    /// Queues every instruction of `solution`.
    pub fn load_solution(&mut self, solution: &Solution) {
        self.pending.merge(solution.schedule());
    }

    /// Queues raw instructions; ties at one tick keep the provided order.
    pub fn load_instructions<I>(&mut self, instructions: I)
    where
        I: IntoIterator<Item = Instruction>,
    {
        let scheduled = instructions
            .into_iter()
            .enumerate()
            .map(|(sequence, instruction)| ScheduledInstruction {
                sequence,
                instruction,
            })
            .collect();
        self.pending.merge(scheduled);
    }

    /// Advances the simulation by one tick and returns the resulting status.
    ///
    /// Once the status is terminal the call changes nothing. A fatal invariant
    /// violation aborts the world and is returned as an error.
    pub fn step(&mut self, out_events: &mut Vec<Event>) -> Result<Status, WorldError> {
        if self.status.is_terminal() {
            return Ok(self.status);
        }

        match self.advance_tick(out_events) {
            Ok(()) => Ok(self.status),
            Err(fault) => {
                error!(tick = self.tick, %fault, "aborting simulation");
                self.status = Status::Aborted;
                out_events.push(Event::StatusChanged {
                    status: Status::Aborted,
                });
                Err(fault)
            }
        }
    }

    /// Steps until the status is terminal, at most `max_ticks` times.
    pub fn run(&mut self, max_ticks: u64, out_events: &mut Vec<Event>) -> Result<Status, RunError> {
        if self.status.is_terminal() {
            return Ok(self.status);
        }

        for _ in 0..max_ticks {
            let status = self.step(out_events)?;
            if status.is_terminal() {
                return Ok(status);
            }
        }

        warn!(max_ticks, tick = self.tick, "simulation timed out");
        Err(RunError::Timeout { max_ticks })
    }

    fn advance_tick(&mut self, out_events: &mut Vec<Event>) -> Result<(), WorldError> {
        let tick = self.tick;
        trace!(tick, live = self.actors.len(), "step");

        self.spawn_due(tick, out_events)?;
        for instruction in self.pending.drain_due(tick) {
            self.assign_at(instruction.cell(), instruction.ability(), out_events);
        }
        self.advance_actors(out_events)?;
        self.retire_finished(tick);
        self.refresh_status(out_events);

        out_events.push(Event::TimeAdvanced { tick });
        self.tick = tick.saturating_add(1);
        Ok(())
    }

    fn spawn_due(&mut self, tick: u64, out_events: &mut Vec<Event>) -> Result<(), WorldError> {
        while let Some((id, spawn)) = self.spawns.front().copied() {
            if spawn.tick > tick {
                break;
            }
            let _ = self.spawns.pop_front();

            if self.actors.iter().any(|actor| actor.id == id)
                || self.retired.iter().any(|record| record.id == id)
            {
                return Err(WorldError::DuplicateActor(id));
            }

            debug!(actor = %id, cell = %spawn.cell, "actor spawned");
            self.actors.push(Actor::spawn(id, spawn.cell, spawn.facing));
            out_events.push(Event::ActorSpawned {
                actor: id,
                cell: spawn.cell,
                facing: spawn.facing,
            });
        }
        Ok(())
    }

    fn assign_at(&mut self, target: CellCoord, ability: AbilityKind, out_events: &mut Vec<Event>) {
        match self.try_assign(target, ability) {
            Ok(actor) => out_events.push(Event::AbilityAssigned { actor, ability }),
            Err(reason) => {
                debug!(tick = self.tick, %target, %ability, %reason, "assignment dropped");
                out_events.push(Event::AssignmentRejected {
                    target,
                    ability,
                    reason,
                });
            }
        }
    }

    fn try_assign(
        &mut self,
        target: CellCoord,
        ability: AbilityKind,
    ) -> Result<ActorId, AssignError> {
        if self.status.is_terminal() {
            return Err(AssignError::SimulationOver);
        }
        if !self.terrain.contains(target) {
            return Err(AssignError::TargetOutOfBounds);
        }

        let mut first_rejection = None;
        for actor in self.actors.iter_mut().filter(|actor| actor.cell == target) {
            match check_accepts(actor) {
                Ok(()) => return assign(ability, actor, &mut self.stock),
                Err(reason) => first_rejection = first_rejection.or(Some(reason)),
            }
        }
        Err(first_rejection.unwrap_or(AssignError::NoActorAtTarget))
    }

    fn advance_actors(&mut self, out_events: &mut Vec<Event>) -> Result<(), WorldError> {
        for index in 0..self.actors.len() {
            let current = self.actors[index];
            let blockers: BTreeSet<CellCoord> = self
                .actors
                .iter()
                .filter(|other| other.id != current.id && other.mode == ActorMode::Blocking)
                .map(|other| other.cell)
                .collect();

            let surroundings =
                Surroundings::new(TerrainView::new(&self.terrain, &self.overlay), &blockers);
            let advance = actor::advance(&current, &surroundings)?;

            for (cell, edit) in &advance.edits {
                self.overlay.apply(*cell, *edit);
                out_events.push(Event::TerrainChanged {
                    cell: *cell,
                    edit: *edit,
                });
            }
            report_transition(&current, &advance, out_events);
            self.actors[index] = advance.actor;
        }
        Ok(())
    }

    fn retire_finished(&mut self, tick: u64) {
        let (finished, live): (Vec<Actor>, Vec<Actor>) = self
            .actors
            .drain(..)
            .partition(|actor| actor.mode.is_terminal());
        self.actors = live;
        self.retired.extend(finished.into_iter().map(|actor| ActorRecord {
            id: actor.id,
            cell: actor.cell,
            mode: actor.mode,
            tick,
        }));
    }

    fn refresh_status(&mut self, out_events: &mut Vec<Event>) {
        let next = self.evaluate_status();
        if next != self.status {
            info!(
                tick = self.tick,
                status = next.name(),
                rescued = self.rescued(),
                lost = self.lost(),
                "status changed"
            );
            self.status = next;
            out_events.push(Event::StatusChanged { status: next });
        }
    }

    fn evaluate_status(&self) -> Status {
        let must_survive_died = self.must_survive.map_or(false, |id| {
            self.retired
                .iter()
                .any(|record| record.id == id && record.mode == ActorMode::Dead)
        });

        if must_survive_died {
            Status::Lost
        } else if self.rescued() >= self.required_rescues {
            Status::Won
        } else if self.actors.is_empty() && self.spawns.is_empty() {
            Status::Lost
        } else {
            Status::Running
        }
    }

    fn rescued(&self) -> u32 {
        self.count_retired(ActorMode::Exited)
    }

    fn lost(&self) -> u32 {
        self.count_retired(ActorMode::Dead)
    }

    fn count_retired(&self, mode: ActorMode) -> u32 {
        let count = self
            .retired
            .iter()
            .filter(|record| record.mode == mode)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), WorldError> {
    match command {
        Command::Tick => world.step(out_events).map(|_| ()),
        Command::AssignAbility { target, ability } => {
            world.assign_at(target, ability, out_events);
            Ok(())
        }
    }
}

fn report_transition(before: &Actor, advance: &Advance, out_events: &mut Vec<Event>) {
    let after = &advance.actor;
    if before.facing != after.facing {
        out_events.push(Event::ActorTurned {
            actor: after.id,
            facing: after.facing,
        });
    }
    if before.cell != after.cell {
        out_events.push(Event::ActorMoved {
            actor: after.id,
            from: before.cell,
            to: after.cell,
        });
    }
    if before.mode != after.mode {
        out_events.push(Event::ModeChanged {
            actor: after.id,
            from: before.mode,
            to: after.mode,
        });
    }
    if let Some(ability) = advance.engaged {
        trace!(actor = %after.id, %ability, "ability engaged");
    }
    if after.mode == ActorMode::Exited {
        debug!(actor = %after.id, cell = %after.cell, "actor exited");
        out_events.push(Event::ActorExited {
            actor: after.id,
            cell: after.cell,
        });
    }
    if let Some(cause) = advance.death {
        debug!(actor = %after.id, cell = %after.cell, ?cause, "actor died");
        out_events.push(Event::ActorDied {
            actor: after.id,
            cell: after.cell,
            cause,
        });
    }
}

#[derive(Debug, Default)]
struct PendingInstructions {
    queue: VecDeque<ScheduledInstruction>,
    next_sequence: usize,
}

impl PendingInstructions {
    fn merge(&mut self, scheduled: Vec<ScheduledInstruction>) {
        let offset = self.next_sequence;
        let count = scheduled.len();
        let mut merged: Vec<ScheduledInstruction> = self.queue.drain(..).collect();
        merged.extend(scheduled.into_iter().map(|mut entry| {
            entry.sequence += offset;
            entry
        }));
        merged.sort_by_key(ScheduledInstruction::key);
        self.queue = merged.into();
        self.next_sequence = offset + count;
    }

    fn drain_due(&mut self, tick: u64) -> Vec<Instruction> {
        let mut due = Vec::new();
        while let Some(entry) = self.queue.front() {
            if entry.instruction.tick() > tick {
                break;
            }
            due.push(entry.instruction);
            let _ = self.queue.pop_front();
        }
        due
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use rabbit_escape_core::{AbilityKind, ActorRecord, ActorView, Status};

    use super::{TerrainGrid, TerrainOverlay, TerrainView, World};

    /// Number of ticks processed so far.
    #[must_use]
    pub fn tick(world: &World) -> u64 {
        world.tick
    }

    /// Current simulation status.
    #[must_use]
    pub fn status(world: &World) -> Status {
        world.status
    }

    /// Captures a read-only view of the live actors.
    #[must_use]
    pub fn actor_view(world: &World) -> ActorView {
        ActorView::from_snapshots(world.actors.iter().map(|actor| actor.snapshot()).collect())
    }

    /// Actors that exited or died, in retirement order.
    #[must_use]
    pub fn result_log(world: &World) -> &[ActorRecord] {
        &world.retired
    }

    /// Number of rescued actors.
    #[must_use]
    pub fn rescued(world: &World) -> u32 {
        world.rescued()
    }

    /// Number of dead actors.
    #[must_use]
    pub fn lost(world: &World) -> u32 {
        world.lost()
    }

    /// Remaining uses of an ability.
    #[must_use]
    pub fn remaining(world: &World, kind: AbilityKind) -> u32 {
        world.stock.remaining(kind)
    }

    /// Instructions still waiting for their tick.
    #[must_use]
    pub fn pending_instructions(world: &World) -> usize {
        world.pending.len()
    }

    /// Static terrain of the level.
    #[must_use]
    pub fn terrain(world: &World) -> &TerrainGrid {
        &world.terrain
    }

    /// Dug and built cells recorded so far.
    #[must_use]
    pub fn overlay(world: &World) -> &TerrainOverlay {
        &world.overlay
    }

    /// Effective terrain with the overlay applied.
    #[must_use]
    pub fn terrain_view(world: &World) -> TerrainView<'_> {
        TerrainView::new(&world.terrain, &world.overlay)
    }
}
