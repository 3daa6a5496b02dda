#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic verifier that replays solutions against fresh worlds.

use rabbit_escape_core::{distinct, ActorSnapshot, Solution, SolutionId, Status};
use rabbit_escape_world::{query, Level, LevelError, World, WorldError};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration parameters required to construct the verifier.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    max_ticks: u64,
}

impl Config {
    /// Creates a configuration that stops every replay after `max_ticks` steps.
    #[must_use]
    pub const fn new(max_ticks: u64) -> Self {
        Self { max_ticks }
    }
}

/// Pure system that checks solutions against a level.
#[derive(Debug)]
pub struct Verifier {
    max_ticks: u64,
}

impl Verifier {
    /// Creates a verifier using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            max_ticks: config.max_ticks,
        }
    }

    /// Replays `solution` on a fresh world built from `level`.
    pub fn verify(&self, level: &Level, solution: &Solution) -> Result<Verdict, VerifyError> {
        let mut world = World::new(level.clone())?;
        world.load_solution(solution);

        let mut log = ReplayLog::default();
        let mut events = Vec::new();
        let mut status = query::status(&world);
        while !status.is_terminal() && query::tick(&world) < self.max_ticks {
            events.clear();
            status = world.step(&mut events)?;
            log.record(&world);
        }

        let outcome = Outcome::from_status(status).ok_or(VerifyError::Aborted(solution.id()))?;
        if outcome == Outcome::TimedOut {
            warn!(
                solution = solution.id().get(),
                max_ticks = self.max_ticks,
                "replay timed out"
            );
        }

        let verdict = Verdict {
            solution: solution.id(),
            outcome,
            ticks: query::tick(&world),
            rescued: query::rescued(&world),
            lost: query::lost(&world),
            log,
        };
        info!(
            solution = verdict.solution.get(),
            outcome = verdict.outcome.name(),
            ticks = verdict.ticks,
            rescued = verdict.rescued,
            "solution verified"
        );
        Ok(verdict)
    }

    /// Verifies every distinct solution in input order.
    pub fn verify_all<I>(&self, level: &Level, solutions: I) -> Result<Vec<Verdict>, VerifyError>
    where
        I: IntoIterator<Item = Solution>,
    {
        let unique = distinct(solutions);
        debug!(count = unique.len(), "verifying solution batch");
        unique
            .iter()
            .map(|solution| self.verify(level, solution))
            .collect()
    }
}

/// How a replay ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The required number of actors exited.
    Won,
    /// The level can no longer be won.
    Lost,
    /// The tick budget ran out first.
    TimedOut,
}

impl Outcome {
    /// Maps the status a replay stopped at. An aborted world has no outcome.
    #[must_use]
    pub const fn from_status(status: Status) -> Option<Self> {
        match status {
            Status::Won => Some(Self::Won),
            Status::Lost => Some(Self::Lost),
            Status::Running => Some(Self::TimedOut),
            Status::Aborted => None,
        }
    }

    /// Lowercase name used in reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Won => "won",
            Self::Lost => "lost",
            Self::TimedOut => "timed-out",
        }
    }
}

/// Result of replaying one solution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    solution: SolutionId,
    outcome: Outcome,
    ticks: u64,
    rescued: u32,
    lost: u32,
    log: ReplayLog,
}

impl Verdict {
    /// Identity of the replayed solution.
    #[must_use]
    pub const fn solution(&self) -> SolutionId {
        self.solution
    }

    /// How the replay ended.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Ticks processed.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Actors that exited.
    #[must_use]
    pub const fn rescued(&self) -> u32 {
        self.rescued
    }

    /// Actors that died.
    #[must_use]
    pub const fn lost(&self) -> u32 {
        self.lost
    }

    /// Per-tick frames of the replay.
    #[must_use]
    pub const fn log(&self) -> &ReplayLog {
        &self.log
    }
}

/// World state observed after one tick.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Frame {
    /// Tick that produced the frame.
    pub tick: u64,
    /// Status after the tick.
    pub status: Status,
    /// Live actors in identity order.
    pub actors: Vec<ActorSnapshot>,
    /// Number of edited terrain cells.
    pub edits: usize,
}

/// Ordered frames of a replay.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ReplayLog {
    frames: Vec<Frame>,
}

impl ReplayLog {
    fn record(&mut self, world: &World) {
        self.frames.push(Frame {
            tick: query::tick(world).saturating_sub(1),
            status: query::status(world),
            actors: query::actor_view(world).into_vec(),
            edits: query::overlay(world).len(),
        });
    }

    /// Recorded frames, oldest first.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// SHA-256 over a stable encoding of every frame, as lowercase hex.
    ///
    /// The encoding uses little-endian integers and variant names, so the
    /// fingerprint is identical across processes and platforms.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for frame in &self.frames {
            hasher.update(frame.tick.to_le_bytes());
            hasher.update(frame.status.name().as_bytes());
            hasher.update((frame.actors.len() as u64).to_le_bytes());
            for actor in &frame.actors {
                hasher.update(actor.id.get().to_le_bytes());
                hasher.update(actor.cell.x().to_le_bytes());
                hasher.update(actor.cell.y().to_le_bytes());
                hasher.update(actor.facing.name().as_bytes());
                hasher.update(actor.mode.name().as_bytes());
            }
            hasher.update((frame.edits as u64).to_le_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}

/// Errors that prevent a replay from producing a verdict.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The level could not be turned into a world.
    #[error("invalid level: {0}")]
    Level(#[from] LevelError),
    /// The world aborted on an invariant violation.
    #[error("simulation aborted: {0}")]
    World(#[from] WorldError),
    /// The replay stopped in the aborted state.
    #[error("replay of solution {} ended aborted", .0.get())]
    Aborted(SolutionId),
}
