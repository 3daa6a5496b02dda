//! Timed instructions, solutions, and their compact text encoding.
//!
//! A solution encodes as `<id>:<instruction>;<instruction>;...` where every
//! instruction is rendered as `tick,x,y,ability`. None of the delimiters can
//! appear inside a number or a canonical ability name, so the format needs no
//! escaping.

use std::{collections::HashSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AbilityKind, CellCoord};

/// Separates the solution identifier from its instruction list.
pub const ID_DELIMITER: char = ':';
/// Separates consecutive instructions.
pub const INSTRUCTION_DELIMITER: char = ';';
/// Separates the fields of a single instruction.
pub const FIELD_DELIMITER: char = ',';

const FIELD_COUNT: usize = 4;

/// Opaque identifier attached to a solution for bookkeeping and deduplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SolutionId(u32);

impl SolutionId {
    /// Creates a new solution identifier with the provided numeric value.
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

/// A single scheduled ability assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    tick: u64,
    cell: CellCoord,
    ability: AbilityKind,
}

impl Instruction {
    /// Creates an instruction assigning `ability` at `cell` during `tick`.
    #[must_use]
    pub const fn new(tick: u64, cell: CellCoord, ability: AbilityKind) -> Self {
        Self {
            tick,
            cell,
            ability,
        }
    }

    /// Tick during which the instruction takes effect.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Cell whose occupant receives the ability.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Ability handed out by the instruction.
    #[must_use]
    pub const fn ability(&self) -> AbilityKind {
        self.ability
    }

    /// Parses a single `tick,x,y,ability` token.
    pub fn decode(token: &str) -> Result<Self, FieldError> {
        let fields: Vec<&str> = token.split(FIELD_DELIMITER).map(str::trim).collect();
        if fields.len() != FIELD_COUNT {
            return Err(FieldError::FieldCount(fields.len()));
        }

        let tick = fields[0]
            .parse::<u64>()
            .map_err(|_| FieldError::InvalidTick(fields[0].to_owned()))?;
        let x = parse_coordinate(fields[1])?;
        let y = parse_coordinate(fields[2])?;
        let ability = AbilityKind::from_name(fields[3])
            .ok_or_else(|| FieldError::UnknownAbility(fields[3].to_owned()))?;

        Ok(Self::new(tick, CellCoord::new(x, y), ability))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{tick}{FIELD_DELIMITER}{x}{FIELD_DELIMITER}{y}{FIELD_DELIMITER}{ability}",
            tick = self.tick,
            x = self.cell.x(),
            y = self.cell.y(),
            ability = self.ability.name(),
        )
    }
}

/// Instruction paired with its position in the authored sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScheduledInstruction {
    /// Zero-based index of the instruction in its authored sequence.
    pub sequence: usize,
    /// The scheduled instruction.
    pub instruction: Instruction,
}

impl ScheduledInstruction {
    /// Ordering key: tick first, authoring order among ties.
    #[must_use]
    pub const fn key(&self) -> (u64, usize) {
        (self.instruction.tick(), self.sequence)
    }
}

/// Identified, ordered list of instructions.
///
/// Equality is order-sensitive: replaying the same instructions in a different
/// order can change the outcome, so a permutation is a different solution.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Solution {
    id: SolutionId,
    instructions: Vec<Instruction>,
}

impl Solution {
    /// Creates a solution from authored instructions, preserving their order.
    #[must_use]
    pub fn new(id: SolutionId, instructions: Vec<Instruction>) -> Self {
        Self { id, instructions }
    }

    /// Identifier attached to the solution.
    #[must_use]
    pub const fn id(&self) -> SolutionId {
        self.id
    }

    /// Instructions in authored order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Reports whether the solution contains no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Instructions stably sorted by tick; ties keep their authored order.
    #[must_use]
    pub fn schedule(&self) -> Vec<ScheduledInstruction> {
        let mut scheduled: Vec<ScheduledInstruction> = self
            .instructions
            .iter()
            .enumerate()
            .map(|(sequence, instruction)| ScheduledInstruction {
                sequence,
                instruction: *instruction,
            })
            .collect();
        scheduled.sort_by_key(ScheduledInstruction::key);
        scheduled
    }

    /// Encodes the solution into its canonical single-line form.
    #[must_use]
    pub fn encode(&self) -> String {
        let body: Vec<String> = self
            .instructions
            .iter()
            .map(Instruction::to_string)
            .collect();
        format!(
            "{}{ID_DELIMITER}{}",
            self.id.get(),
            body.join(INSTRUCTION_DELIMITER.to_string().as_str())
        )
    }

    /// Decodes a solution from its text form. No partial solution is returned
    /// on failure.
    pub fn decode(text: &str) -> Result<Self, SolutionParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SolutionParseError::Empty);
        }

        let (id, body) = trimmed
            .split_once(ID_DELIMITER)
            .ok_or(SolutionParseError::MissingId)?;
        let id = id.trim();
        let id = id
            .parse::<u32>()
            .map_err(|_| SolutionParseError::InvalidId(id.to_owned()))?;

        let body = body.trim();
        if body.is_empty() {
            return Ok(Self::new(SolutionId::new(id), Vec::new()));
        }

        let instructions = body
            .split(INSTRUCTION_DELIMITER)
            .enumerate()
            .map(|(position, token)| {
                Instruction::decode(token).map_err(|reason| {
                    SolutionParseError::MalformedInstruction {
                        position,
                        token: token.trim().to_owned(),
                        reason,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(SolutionId::new(id), instructions))
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Solution {
    type Err = SolutionParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::decode(value)
    }
}

/// Removes duplicate solutions, keeping the first occurrence of each.
#[must_use]
pub fn distinct<I>(solutions: I) -> Vec<Solution>
where
    I: IntoIterator<Item = Solution>,
{
    let mut seen: HashSet<Solution> = HashSet::new();
    let mut unique = Vec::new();
    for solution in solutions {
        if seen.insert(solution.clone()) {
            unique.push(solution);
        }
    }
    unique
}

/// Errors that can occur while decoding solution strings.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SolutionParseError {
    /// The provided string was empty or contained only whitespace.
    #[error("solution text was empty")]
    Empty,
    /// The identifier delimiter was missing.
    #[error("solution text is missing the identifier prefix")]
    MissingId,
    /// The identifier was not a non-negative integer.
    #[error("invalid solution identifier '{0}'")]
    InvalidId(String),
    /// An instruction token could not be parsed.
    #[error("malformed instruction {position} '{token}': {reason}")]
    MalformedInstruction {
        /// Zero-based position of the offending token.
        position: usize,
        /// The offending token.
        token: String,
        /// What was wrong with it.
        reason: FieldError,
    },
}

/// Field-level problems found in an instruction token.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The token did not contain exactly four fields.
    #[error("expected 4 fields, found {0}")]
    FieldCount(usize),
    /// The tick was not a non-negative integer.
    #[error("invalid tick '{0}'")]
    InvalidTick(String),
    /// A coordinate was not an integer.
    #[error("invalid coordinate '{0}'")]
    InvalidCoordinate(String),
    /// The ability name is not a canonical identifier.
    #[error("unknown ability '{0}'")]
    UnknownAbility(String),
}

fn parse_coordinate(field: &str) -> Result<i32, FieldError> {
    field
        .parse::<i32>()
        .map_err(|_| FieldError::InvalidCoordinate(field.to_owned()))
}
