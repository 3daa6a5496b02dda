//! Per-actor behaviour rules.
//!
//! [`advance`] is a pure function: it reads the actor, an immutable terrain
//! view and the blocker positions, and returns the actor's next state together
//! with the terrain edits its work produced. The world applies the edits and
//! reports the differences as events.

use std::collections::BTreeSet;

use rabbit_escape_core::{
    AbilityKind, ActorId, ActorMode, ActorSnapshot, CellCoord, DeathCause, Facing, TerrainCell,
    TerrainEdit,
};

use crate::{
    abilities::{engagement, Engagement},
    terrain::{TerrainError, TerrainView},
};

/// Longest fall an actor survives without levitation.
pub(crate) const LETHAL_FALL_DISTANCE: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Actor {
    pub(crate) id: ActorId,
    pub(crate) cell: CellCoord,
    pub(crate) facing: Facing,
    pub(crate) mode: ActorMode,
    pub(crate) progress: u32,
    pub(crate) fall_distance: u32,
    pub(crate) pending: Option<AbilityKind>,
    pub(crate) climber: bool,
    pub(crate) levitating: bool,
}

impl Actor {
    pub(crate) const fn spawn(id: ActorId, cell: CellCoord, facing: Facing) -> Self {
        Self {
            id,
            cell,
            facing,
            mode: ActorMode::Walking,
            progress: 0,
            fall_distance: 0,
            pending: None,
            climber: false,
            levitating: false,
        }
    }

    pub(crate) const fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            id: self.id,
            cell: self.cell,
            facing: self.facing,
            mode: self.mode,
        }
    }
}

/// What an actor can sense while it updates.
pub(crate) struct Surroundings<'a> {
    terrain: TerrainView<'a>,
    blockers: &'a BTreeSet<CellCoord>,
}

impl<'a> Surroundings<'a> {
    pub(crate) fn new(terrain: TerrainView<'a>, blockers: &'a BTreeSet<CellCoord>) -> Self {
        Self { terrain, blockers }
    }

    fn supported(&self, cell: CellCoord) -> bool {
        self.terrain.probe(cell) == Some(TerrainCell::Ladder)
            || self
                .terrain
                .probe(cell.offset(0, 1))
                .map_or(false, TerrainCell::supports)
    }
}

/// Next state of an actor after one update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Advance {
    pub(crate) actor: Actor,
    pub(crate) edits: Vec<(CellCoord, TerrainEdit)>,
    pub(crate) death: Option<DeathCause>,
    pub(crate) engaged: Option<AbilityKind>,
}

impl Advance {
    fn die(&mut self, cause: DeathCause) {
        self.actor.mode = ActorMode::Dead;
        self.death = Some(cause);
    }

    fn turn(&mut self) {
        self.actor.facing = self.actor.facing.flipped();
    }

    fn remove_if_destructible(&mut self, terrain: &TerrainView<'_>, cell: CellCoord) {
        if terrain
            .probe(cell)
            .map_or(false, TerrainCell::is_destructible)
        {
            self.edits.push((cell, TerrainEdit::Removed));
        }
    }
}

/// Advances a live actor by one tick.
///
/// Fails only when the actor stands outside the level, which no rule can
/// produce.
pub(crate) fn advance(
    actor: &Actor,
    surroundings: &Surroundings<'_>,
) -> Result<Advance, TerrainError> {
    let _ = surroundings.terrain.cell_at(actor.cell)?;

    let mut next = Advance {
        actor: *actor,
        edits: Vec::new(),
        death: None,
        engaged: None,
    };
    engage_pending(&mut next);

    match next.actor.mode {
        ActorMode::Walking => walk(&mut next, surroundings),
        ActorMode::Falling => fall(&mut next, surroundings),
        ActorMode::Blocking => block(&mut next, surroundings),
        ActorMode::Digging | ActorMode::Bashing | ActorMode::Bridging | ActorMode::Exploding => {
            work(&mut next, surroundings);
        }
        ActorMode::Climbing => climb(&mut next, surroundings),
        ActorMode::Exited | ActorMode::Dead => {}
    }

    Ok(next)
}

fn engage_pending(next: &mut Advance) {
    let Some(ability) = next.actor.pending else {
        return;
    };

    let actor = &mut next.actor;
    match engagement(ability) {
        Engagement::Climber => actor.climber = true,
        Engagement::Levitation => actor.levitating = true,
        Engagement::Mode { mode, ticks } => {
            if !matches!(actor.mode, ActorMode::Walking | ActorMode::Blocking) {
                return;
            }
            actor.mode = mode;
            actor.progress = ticks;
        }
    }
    actor.pending = None;
    next.engaged = Some(ability);
}

fn walk(next: &mut Advance, surroundings: &Surroundings<'_>) {
    let here = next.actor.cell;
    if !surroundings.supported(here) {
        start_falling(next, surroundings);
        return;
    }

    let ahead = here.offset(next.actor.facing.dx(), 0);
    if surroundings.blockers.contains(&ahead) {
        next.turn();
        return;
    }

    match surroundings.terrain.probe(ahead) {
        None => next.turn(),
        Some(cell) if cell.is_passable() => enter(next, ahead, cell),
        Some(TerrainCell::Ramp(rise)) if rise == next.actor.facing => {
            let top = ahead.offset(0, -1);
            match surroundings.terrain.probe(top) {
                Some(cell) if cell.is_passable() && !surroundings.blockers.contains(&top) => {
                    enter(next, top, cell);
                }
                _ => next.turn(),
            }
        }
        Some(_) if next.actor.climber => next.actor.mode = ActorMode::Climbing,
        Some(_) => next.turn(),
    }
}

fn fall(next: &mut Advance, surroundings: &Surroundings<'_>) {
    let here = next.actor.cell;
    if surroundings.supported(here) {
        if next.actor.fall_distance > LETHAL_FALL_DISTANCE && !next.actor.levitating {
            next.die(DeathCause::Fall);
        } else {
            next.actor.mode = ActorMode::Walking;
            next.actor.fall_distance = 0;
        }
        return;
    }

    let below = here.offset(0, 1);
    match surroundings.terrain.probe(below) {
        None => next.die(DeathCause::OutOfLevel),
        Some(cell) => {
            next.actor.fall_distance += 1;
            enter(next, below, cell);
        }
    }
}

fn start_falling(next: &mut Advance, surroundings: &Surroundings<'_>) {
    next.actor.mode = ActorMode::Falling;
    next.actor.fall_distance = 0;
    fall(next, surroundings);
}

fn block(next: &mut Advance, surroundings: &Surroundings<'_>) {
    if !surroundings.supported(next.actor.cell) {
        start_falling(next, surroundings);
    }
}

fn work(next: &mut Advance, surroundings: &Surroundings<'_>) {
    if !surroundings.supported(next.actor.cell) {
        if next.actor.mode != ActorMode::Exploding {
            start_falling(next, surroundings);
            return;
        }
        // The fuse keeps burning while the actor drops.
        let below = next.actor.cell.offset(0, 1);
        match surroundings.terrain.probe(below) {
            None => {
                next.die(DeathCause::OutOfLevel);
                return;
            }
            Some(cell) => enter(next, below, cell),
        }
        if next.actor.mode.is_terminal() {
            return;
        }
    }

    next.actor.progress = next.actor.progress.saturating_sub(1);
    if next.actor.progress > 0 {
        return;
    }

    let here = next.actor.cell;
    let dx = next.actor.facing.dx();
    let terrain = &surroundings.terrain;
    match next.actor.mode {
        ActorMode::Digging => next.remove_if_destructible(terrain, here.offset(0, 1)),
        ActorMode::Bashing => next.remove_if_destructible(terrain, here.offset(dx, 0)),
        ActorMode::Bridging => {
            let target = here.offset(dx, 1);
            if terrain.probe(target) == Some(TerrainCell::Empty) {
                next.edits.push((target, TerrainEdit::Built));
            }
        }
        ActorMode::Exploding => {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    next.remove_if_destructible(terrain, here.offset(dx, dy));
                }
            }
            next.die(DeathCause::Explosion);
            return;
        }
        _ => return,
    }
    next.actor.mode = ActorMode::Walking;
}

fn climb(next: &mut Advance, surroundings: &Surroundings<'_>) {
    let here = next.actor.cell;
    let ahead = here.offset(next.actor.facing.dx(), 0);
    if let Some(cell) = surroundings.terrain.probe(ahead).filter(|cell| cell.is_passable()) {
        if surroundings.blockers.contains(&ahead) {
            next.turn();
            next.actor.mode = ActorMode::Falling;
            next.actor.fall_distance = 0;
            return;
        }
        next.actor.mode = ActorMode::Walking;
        enter(next, ahead, cell);
        return;
    }

    let above = here.offset(0, -1);
    if let Some(cell) = surroundings.terrain.probe(above).filter(|cell| cell.is_passable()) {
        enter(next, above, cell);
        return;
    }

    next.turn();
    next.actor.mode = ActorMode::Falling;
    next.actor.fall_distance = 0;
}

fn enter(next: &mut Advance, cell: CellCoord, kind: TerrainCell) {
    next.actor.cell = cell;
    match kind {
        TerrainCell::Exit => next.actor.mode = ActorMode::Exited,
        TerrainCell::Hazard => next.die(DeathCause::Hazard),
        _ => {}
    }
}
