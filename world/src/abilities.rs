//! Ability stock owned by the world and the assignment contract.

use std::collections::BTreeMap;

use rabbit_escape_core::{AbilityKind, ActorId, ActorMode, AssignError};

use crate::actor::Actor;

/// Ticks a dig takes, counted from the update that engages it.
pub(crate) const DIG_TICKS: u32 = 2;
/// Ticks a bash takes.
pub(crate) const BASH_TICKS: u32 = 3;
/// Ticks a bridge segment takes.
pub(crate) const BRIDGE_TICKS: u32 = 3;
/// Ticks between lighting the fuse and the explosion.
pub(crate) const EXPLODE_TICKS: u32 = 3;

/// Remaining uses of every ability in a level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AbilityStock {
    counts: BTreeMap<AbilityKind, u32>,
}

impl AbilityStock {
    /// Creates an empty stock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the remaining uses of `kind`.
    pub fn set(&mut self, kind: AbilityKind, count: u32) {
        let _ = self.counts.insert(kind, count);
    }

    /// Remaining uses of `kind`.
    #[must_use]
    pub fn remaining(&self, kind: AbilityKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    fn consume(&mut self, kind: AbilityKind) -> Result<(), AssignError> {
        match self.counts.get_mut(&kind) {
            Some(count) if *count > 0 => {
                *count -= 1;
                Ok(())
            }
            _ => Err(AssignError::NoAbilityRemaining(kind)),
        }
    }
}

/// How an ability changes an actor once it takes effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Engagement {
    /// Switches the actor into a mode, with a countdown for timed work.
    Mode {
        mode: ActorMode,
        ticks: u32,
    },
    /// Grants the climber trait.
    Climber,
    /// Grants the levitation trait.
    Levitation,
}

pub(crate) const fn engagement(kind: AbilityKind) -> Engagement {
    match kind {
        AbilityKind::Dig => Engagement::Mode {
            mode: ActorMode::Digging,
            ticks: DIG_TICKS,
        },
        AbilityKind::Bash => Engagement::Mode {
            mode: ActorMode::Bashing,
            ticks: BASH_TICKS,
        },
        AbilityKind::Block => Engagement::Mode {
            mode: ActorMode::Blocking,
            ticks: 0,
        },
        AbilityKind::Bridge => Engagement::Mode {
            mode: ActorMode::Bridging,
            ticks: BRIDGE_TICKS,
        },
        AbilityKind::Explode => Engagement::Mode {
            mode: ActorMode::Exploding,
            ticks: EXPLODE_TICKS,
        },
        AbilityKind::Climb => Engagement::Climber,
        AbilityKind::Levitate => Engagement::Levitation,
    }
}

/// Reports why `actor` cannot take a new ability, ignoring stock.
pub(crate) fn check_accepts(actor: &Actor) -> Result<(), AssignError> {
    if !actor.mode.accepts_assignment() {
        return Err(AssignError::ActorTerminal(actor.id));
    }
    if actor.pending.is_some() {
        return Err(AssignError::AbilitySlotOccupied(actor.id));
    }
    Ok(())
}

/// Stores `kind` in the actor's pending slot, consuming one use.
///
/// Nothing is mutated unless every precondition holds.
pub(crate) fn assign(
    kind: AbilityKind,
    actor: &mut Actor,
    stock: &mut AbilityStock,
) -> Result<ActorId, AssignError> {
    check_accepts(actor)?;
    stock.consume(kind)?;
    actor.pending = Some(kind);
    Ok(actor.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rabbit_escape_core::{CellCoord, Facing};

    fn walker() -> Actor {
        Actor::spawn(ActorId::new(0), CellCoord::new(1, 1), Facing::Right)
    }

    #[test]
    fn assignment_consumes_one_use() {
        let mut stock = AbilityStock::new();
        stock.set(AbilityKind::Dig, 2);
        let mut actor = walker();

        assert_eq!(
            assign(AbilityKind::Dig, &mut actor, &mut stock),
            Ok(ActorId::new(0))
        );
        assert_eq!(actor.pending, Some(AbilityKind::Dig));
        assert_eq!(stock.remaining(AbilityKind::Dig), 1);
    }

    #[test]
    fn exhausted_stock_leaves_actor_untouched() {
        let mut stock = AbilityStock::new();
        stock.set(AbilityKind::Bash, 0);
        let mut actor = walker();
        let before = actor;

        assert_eq!(
            assign(AbilityKind::Bash, &mut actor, &mut stock),
            Err(AssignError::NoAbilityRemaining(AbilityKind::Bash))
        );
        assert_eq!(actor, before);
        assert_eq!(stock.remaining(AbilityKind::Bash), 0);
        assert_eq!(stock.remaining(AbilityKind::Climb), 0);
    }

    #[test]
    fn occupied_slot_rejects_without_consuming() {
        let mut stock = AbilityStock::new();
        stock.set(AbilityKind::Dig, 1);
        stock.set(AbilityKind::Bash, 1);
        let mut actor = walker();
        actor.pending = Some(AbilityKind::Bash);

        assert_eq!(
            assign(AbilityKind::Dig, &mut actor, &mut stock),
            Err(AssignError::AbilitySlotOccupied(ActorId::new(0)))
        );
        assert_eq!(stock.remaining(AbilityKind::Dig), 1);
    }

    #[test]
    fn exploding_actor_rejects_assignment() {
        let mut stock = AbilityStock::new();
        stock.set(AbilityKind::Levitate, 1);
        let mut actor = walker();
        actor.mode = ActorMode::Exploding;

        assert_eq!(
            assign(AbilityKind::Levitate, &mut actor, &mut stock),
            Err(AssignError::ActorTerminal(ActorId::new(0)))
        );
        assert_eq!(stock.remaining(AbilityKind::Levitate), 1);
    }

    #[test]
    fn busy_actor_queues_assignment() {
        let mut stock = AbilityStock::new();
        stock.set(AbilityKind::Bridge, 1);
        let mut actor = walker();
        actor.mode = ActorMode::Bashing;

        assert!(assign(AbilityKind::Bridge, &mut actor, &mut stock).is_ok());
        assert_eq!(actor.mode, ActorMode::Bashing);
        assert_eq!(actor.pending, Some(AbilityKind::Bridge));
    }
}
