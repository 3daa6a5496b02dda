#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Rabbit Escape engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values describing what
//! changed during the tick. Solutions, the compact timed instruction lists
//! that drive a level, live in this crate as well so every layer shares one
//! canonical encoding.

mod solution;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use solution::{
    distinct, FieldError, Instruction, ScheduledInstruction, Solution, SolutionId,
    SolutionParseError, FIELD_DELIMITER, ID_DELIMITER, INSTRUCTION_DELIMITER,
};

/// Commands that express all permissible world mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Advances the simulation by exactly one tick.
    Tick,
    /// Assigns an ability to the actor standing on the target cell right away.
    AssignAbility {
        /// Cell whose occupant should receive the ability.
        target: CellCoord,
        /// Ability handed to the occupant.
        ability: AbilityKind,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// Indicates that the simulation finished processing a tick.
    TimeAdvanced {
        /// Index of the tick that was processed.
        tick: u64,
    },
    /// Confirms that an actor appeared at an entrance.
    ActorSpawned {
        /// Identifier assigned to the new actor.
        actor: ActorId,
        /// Entrance cell the actor occupies.
        cell: CellCoord,
        /// Initial walking direction.
        facing: Facing,
    },
    /// Confirms that an ability was stored in an actor's pending slot.
    AbilityAssigned {
        /// Actor receiving the ability.
        actor: ActorId,
        /// Ability that was assigned.
        ability: AbilityKind,
    },
    /// Reports that an assignment was dropped without touching any state.
    AssignmentRejected {
        /// Cell targeted by the assignment.
        target: CellCoord,
        /// Ability requested by the assignment.
        ability: AbilityKind,
        /// Specific reason the assignment failed.
        reason: AssignError,
    },
    /// Confirms that an actor moved between two cells.
    ActorMoved {
        /// Actor that moved.
        actor: ActorId,
        /// Cell occupied before the move.
        from: CellCoord,
        /// Cell occupied after the move.
        to: CellCoord,
    },
    /// Confirms that an actor reversed its walking direction.
    ActorTurned {
        /// Actor that turned around.
        actor: ActorId,
        /// Direction the actor now faces.
        facing: Facing,
    },
    /// Announces that an actor switched behaviour mode.
    ModeChanged {
        /// Actor whose mode changed.
        actor: ActorId,
        /// Mode active before the update.
        from: ActorMode,
        /// Mode active after the update.
        to: ActorMode,
    },
    /// Announces that the terrain overlay changed at a cell.
    TerrainChanged {
        /// Cell that was modified.
        cell: CellCoord,
        /// Modification recorded in the overlay.
        edit: TerrainEdit,
    },
    /// Announces that an actor reached an exit and was rescued.
    ActorExited {
        /// Actor that escaped.
        actor: ActorId,
        /// Exit cell the actor entered.
        cell: CellCoord,
    },
    /// Announces that an actor died.
    ActorDied {
        /// Actor that died.
        actor: ActorId,
        /// Cell where the actor died.
        cell: CellCoord,
        /// What killed the actor.
        cause: DeathCause,
    },
    /// Announces that the overall simulation status changed.
    StatusChanged {
        /// Status that became active.
        status: Status,
    },
}

/// Location of a single grid cell. `y` grows downward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    x: i32,
    y: i32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Zero-based column of the cell.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Zero-based row of the cell.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Returns the coordinate displaced by the provided deltas.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Horizontal direction an actor walks in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Facing {
    /// Walking toward decreasing `x`.
    Left,
    /// Walking toward increasing `x`.
    Right,
}

impl Facing {
    /// Column delta of a single step in this direction.
    #[must_use]
    pub const fn dx(self) -> i32 {
        match self {
            Self::Left => -1,
            Self::Right => 1,
        }
    }

    /// Opposite direction.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Static cell kinds composing a level's terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainCell {
    /// Open air.
    Empty,
    /// Solid, destructible ground.
    Solid,
    /// Slope rising toward the given side; walkable from its low side.
    Ramp(Facing),
    /// Ladder that keeps actors standing inside it from falling.
    Ladder,
    /// Cell where actors appear.
    Entrance,
    /// Cell that rescues any actor entering it.
    Exit,
    /// Cell that kills any actor entering it.
    Hazard,
}

impl TerrainCell {
    /// Parses the single-character legend used by textual terrain rows.
    #[must_use]
    pub const fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '.' | ' ' => Some(Self::Empty),
            '#' => Some(Self::Solid),
            '/' => Some(Self::Ramp(Facing::Right)),
            '\\' => Some(Self::Ramp(Facing::Left)),
            'H' => Some(Self::Ladder),
            'Q' => Some(Self::Entrance),
            'O' => Some(Self::Exit),
            '~' => Some(Self::Hazard),
            _ => None,
        }
    }

    /// Character representing the cell in textual terrain rows.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Empty => '.',
            Self::Solid => '#',
            Self::Ramp(Facing::Right) => '/',
            Self::Ramp(Facing::Left) => '\\',
            Self::Ladder => 'H',
            Self::Entrance => 'Q',
            Self::Exit => 'O',
            Self::Hazard => '~',
        }
    }

    /// Reports whether an actor standing directly above the cell is held up.
    #[must_use]
    pub const fn supports(self) -> bool {
        matches!(self, Self::Solid | Self::Ramp(_) | Self::Ladder)
    }

    /// Reports whether an actor may occupy the cell.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        matches!(
            self,
            Self::Empty | Self::Ladder | Self::Entrance | Self::Exit | Self::Hazard
        )
    }

    /// Reports whether digging, bashing or explosions can clear the cell.
    #[must_use]
    pub const fn is_destructible(self) -> bool {
        matches!(self, Self::Solid | Self::Ramp(_))
    }
}

/// Modification layered over the static terrain grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainEdit {
    /// The cell was cleared and now reads as [`TerrainCell::Empty`].
    Removed,
    /// A bridge segment was built and the cell reads as [`TerrainCell::Solid`].
    Built,
}

/// Limited-use capabilities a player can hand to actors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Clears the ground directly below the actor.
    Dig,
    /// Clears the obstacle directly ahead of the actor.
    Bash,
    /// Stops the actor and turns other walkers around.
    Block,
    /// Builds a ground segment ahead of and below the actor.
    Bridge,
    /// Lets the actor scale walls instead of turning around.
    Climb,
    /// Destroys nearby ground and kills the actor.
    Explode,
    /// Makes every later fall survivable.
    Levitate,
}

impl AbilityKind {
    /// Every ability in canonical order.
    pub const ALL: [Self; 7] = [
        Self::Dig,
        Self::Bash,
        Self::Block,
        Self::Bridge,
        Self::Climb,
        Self::Explode,
        Self::Levitate,
    ];

    /// Canonical, case-sensitive identifier used by the solution text format.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dig => "dig",
            Self::Bash => "bash",
            Self::Block => "block",
            Self::Bridge => "bridge",
            Self::Climb => "climb",
            Self::Explode => "explode",
            Self::Levitate => "levitate",
        }
    }

    /// Resolves a canonical identifier back into an ability.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for AbilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unique identifier assigned to an actor at spawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(u32);

impl ActorId {
    /// Creates a new actor identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mutually exclusive behaviour modes of an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorMode {
    /// Walking along the ground.
    Walking,
    /// Dropping one cell per tick.
    Falling,
    /// Clearing the ground below.
    Digging,
    /// Clearing the obstacle ahead.
    Bashing,
    /// Standing still and turning walkers around.
    Blocking,
    /// Building ground ahead.
    Bridging,
    /// Scaling a wall.
    Climbing,
    /// Counting down to an explosion.
    Exploding,
    /// Rescued through an exit.
    Exited,
    /// Killed.
    Dead,
}

impl ActorMode {
    /// Reports whether the mode ends the actor's participation in the level.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exited | Self::Dead)
    }

    /// Reports whether abilities may still be assigned in this mode.
    #[must_use]
    pub const fn accepts_assignment(self) -> bool {
        !matches!(self, Self::Exploding | Self::Exited | Self::Dead)
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Walking => "walking",
            Self::Falling => "falling",
            Self::Digging => "digging",
            Self::Bashing => "bashing",
            Self::Blocking => "blocking",
            Self::Bridging => "bridging",
            Self::Climbing => "climbing",
            Self::Exploding => "exploding",
            Self::Exited => "exited",
            Self::Dead => "dead",
        }
    }
}

/// Reasons an actor died.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeathCause {
    /// Landed after falling further than the lethal distance.
    Fall,
    /// Entered a hazard cell.
    Hazard,
    /// Fell out of the bottom of the level.
    OutOfLevel,
    /// Exploded.
    Explosion,
}

/// Aggregate state of a simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// The level is still being played.
    Running,
    /// Enough actors were rescued.
    Won,
    /// The level can no longer be won.
    Lost,
    /// An internal invariant was violated and stepping stopped.
    Aborted,
}

impl Status {
    /// Reports whether stepping has stopped for good.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Aborted => "aborted",
        }
    }
}

/// Reasons an ability assignment may be rejected by the world.
///
/// Rejections model imperfect player input: they never mutate state and never
/// stop the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum AssignError {
    /// The level has no uses of the ability left.
    #[error("no {0} uses remaining")]
    NoAbilityRemaining(AbilityKind),
    /// The target cell lies outside the level.
    #[error("target lies outside the level")]
    TargetOutOfBounds,
    /// No live actor stands on the target cell.
    #[error("no live actor at target")]
    NoActorAtTarget,
    /// The targeted actor is exploding or already finished.
    #[error("actor {0} can no longer receive abilities")]
    ActorTerminal(ActorId),
    /// The targeted actor already holds a pending ability.
    #[error("actor {0} already holds a pending ability")]
    AbilitySlotOccupied(ActorId),
    /// The simulation already reached a terminal status.
    #[error("simulation is over")]
    SimulationOver,
}

/// Immutable representation of a single actor's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorSnapshot {
    /// Unique identifier assigned to the actor.
    pub id: ActorId,
    /// Grid cell currently occupied by the actor.
    pub cell: CellCoord,
    /// Walking direction of the actor.
    pub facing: Facing,
    /// Active behaviour mode.
    pub mode: ActorMode,
}

/// Read-only snapshot describing all live actors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActorView {
    snapshots: Vec<ActorSnapshot>,
}

impl ActorView {
    /// Creates a new actor view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<ActorSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in ascending identity order.
    pub fn iter(&self) -> impl Iterator<Item = &ActorSnapshot> {
        self.snapshots.iter()
    }

    /// Number of captured actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether no actor is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<ActorSnapshot> {
        self.snapshots
    }
}

/// Result log entry retained after an actor leaves the live set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRecord {
    /// Identifier of the retired actor.
    pub id: ActorId,
    /// Cell the actor occupied when it finished.
    pub cell: CellCoord,
    /// Terminal mode, either [`ActorMode::Exited`] or [`ActorMode::Dead`].
    pub mode: ActorMode,
    /// Tick during which the actor finished.
    pub tick: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn ability_names_resolve_back_to_kinds() {
        for kind in AbilityKind::ALL {
            assert_eq!(AbilityKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn ability_names_are_case_sensitive() {
        assert_eq!(AbilityKind::from_name("Bash"), None);
        assert_eq!(AbilityKind::from_name("BASH"), None);
        assert_eq!(AbilityKind::from_name(""), None);
    }

    #[test]
    fn terrain_symbols_resolve_back_to_cells() {
        for symbol in ['.', '#', '/', '\\', 'H', 'Q', 'O', '~'] {
            let cell = TerrainCell::from_symbol(symbol).expect("known symbol");
            assert_eq!(cell.symbol(), symbol);
        }
        assert_eq!(TerrainCell::from_symbol('x'), None);
    }

    #[test]
    fn solid_cells_support_but_block() {
        assert!(TerrainCell::Solid.supports());
        assert!(!TerrainCell::Solid.is_passable());
        assert!(TerrainCell::Ladder.supports());
        assert!(TerrainCell::Ladder.is_passable());
        assert!(!TerrainCell::Exit.supports());
        assert!(!TerrainCell::Ladder.is_destructible());
    }

    #[test]
    fn facing_flips_and_steps() {
        assert_eq!(Facing::Left.flipped(), Facing::Right);
        assert_eq!(Facing::Right.dx(), 1);
        assert_eq!(CellCoord::new(2, 3).offset(Facing::Left.dx(), 1), CellCoord::new(1, 4));
    }

    #[test]
    fn terminal_modes_reject_assignment() {
        assert!(!ActorMode::Exploding.accepts_assignment());
        assert!(!ActorMode::Dead.accepts_assignment());
        assert!(ActorMode::Blocking.accepts_assignment());
        assert!(ActorMode::Falling.accepts_assignment());
    }

    #[test]
    fn actor_view_orders_by_identity() {
        let snapshot = |id| ActorSnapshot {
            id: ActorId::new(id),
            cell: CellCoord::new(0, 0),
            facing: Facing::Right,
            mode: ActorMode::Walking,
        };
        let view = ActorView::from_snapshots(vec![snapshot(3), snapshot(1), snapshot(2)]);
        let ids: Vec<u32> = view.iter().map(|snapshot| snapshot.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn actor_record_round_trips_through_bincode() {
        assert_round_trip(&ActorRecord {
            id: ActorId::new(4),
            cell: CellCoord::new(-1, 7),
            mode: ActorMode::Exited,
            tick: 19,
        });
    }

    #[test]
    fn assign_error_round_trips_through_bincode() {
        assert_round_trip(&AssignError::NoAbilityRemaining(AbilityKind::Bridge));
    }
}
