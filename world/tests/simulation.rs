use rabbit_escape_core::{
    AbilityKind, ActorId, ActorMode, AssignError, CellCoord, Command, DeathCause, Event, Facing,
    Instruction, Solution, SolutionId, Status, TerrainCell,
};
use rabbit_escape_world::{
    self as world, query, Level, RunError, SpawnPoint, TerrainGrid, World,
};

fn grid(rows: &[&str]) -> TerrainGrid {
    TerrainGrid::from_rows(rows).expect("terrain parses")
}

fn spawn(x: i32, y: i32, tick: u64, facing: Facing) -> SpawnPoint {
    SpawnPoint::new(CellCoord::new(x, y), tick, facing)
}

fn step_n(world: &mut World, ticks: usize) -> Vec<Event> {
    let mut events = Vec::new();
    for _ in 0..ticks {
        let _ = world.step(&mut events).expect("step succeeds");
    }
    events
}

fn blocking_corridor() -> Level {
    Level::new(grid(&["#......#", "#Q....Q#", "########"]), 1)
        .with_spawn(spawn(1, 1, 0, Facing::Right))
        .with_spawn(spawn(6, 1, 0, Facing::Left))
        .with_ability(AbilityKind::Block, 1)
}

#[test]
fn walker_reaches_exit_and_wins() {
    let level =
        Level::new(grid(&["Q....O", "######"]), 1).with_spawn(spawn(0, 0, 0, Facing::Right));
    let mut world = World::new(level).expect("world builds");

    let _ = step_n(&mut world, 4);
    assert_eq!(query::status(&world), Status::Running);

    let mut events = Vec::new();
    assert_eq!(world.step(&mut events), Ok(Status::Won));
    assert!(events.contains(&Event::ActorExited {
        actor: ActorId::new(0),
        cell: CellCoord::new(5, 0),
    }));
    assert!(events.contains(&Event::StatusChanged { status: Status::Won }));
    assert_eq!(events.last(), Some(&Event::TimeAdvanced { tick: 4 }));

    let log = query::result_log(&world);
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].mode, ActorMode::Exited);
    assert_eq!(log[0].tick, 4);
    assert_eq!(query::rescued(&world), 1);
    assert!(query::actor_view(&world).is_empty());
}

#[test]
fn blocker_turns_oncoming_walker() {
    let mut world = World::new(blocking_corridor()).expect("world builds");
    world.load_instructions(vec![Instruction::new(
        0,
        CellCoord::new(6, 1),
        AbilityKind::Block,
    )]);

    let early = step_n(&mut world, 4);
    assert!(early.contains(&Event::AbilityAssigned {
        actor: ActorId::new(1),
        ability: AbilityKind::Block,
    }));
    assert!(!early.iter().any(|event| matches!(
        event,
        Event::ActorTurned { actor, .. } if *actor == ActorId::new(0)
    )));

    let mut events = Vec::new();
    assert_eq!(world.step(&mut events), Ok(Status::Running));
    assert!(events.contains(&Event::ActorTurned {
        actor: ActorId::new(0),
        facing: Facing::Left,
    }));

    let view = query::actor_view(&world).into_vec();
    assert_eq!(view.len(), 2);
    assert_eq!(view[0].cell, CellCoord::new(5, 1));
    assert_eq!(view[0].facing, Facing::Left);
    assert_eq!(view[1].mode, ActorMode::Blocking);
    assert_eq!(view[1].cell, CellCoord::new(6, 1));

    let later = step_n(&mut world, 10);
    assert!(!later
        .iter()
        .any(|event| matches!(event, Event::ActorDied { .. })));
    assert_eq!(query::lost(&world), 0);
    assert_eq!(query::remaining(&world, AbilityKind::Block), 0);
}

#[test]
fn exhausted_ability_changes_nothing() {
    let level = Level::new(grid(&["Q....", "#####"]), 1)
        .with_spawn(spawn(0, 0, 0, Facing::Right))
        .with_ability(AbilityKind::Dig, 0);
    let mut world = World::new(level).expect("world builds");
    world.load_instructions(vec![Instruction::new(0, CellCoord::new(0, 0), AbilityKind::Dig)]);

    let events = step_n(&mut world, 3);
    assert!(events.contains(&Event::AssignmentRejected {
        target: CellCoord::new(0, 0),
        ability: AbilityKind::Dig,
        reason: AssignError::NoAbilityRemaining(AbilityKind::Dig),
    }));
    assert_eq!(query::remaining(&world, AbilityKind::Dig), 0);
    assert!(query::overlay(&world).is_empty());

    let view = query::actor_view(&world).into_vec();
    assert_eq!(view[0].mode, ActorMode::Walking);
    assert_eq!(view[0].cell, CellCoord::new(3, 0));
}

#[test]
fn second_assignment_at_same_tick_hits_occupied_slot() {
    let level = Level::new(grid(&["Q.....", "######"]), 1)
        .with_spawn(spawn(0, 0, 0, Facing::Right))
        .with_ability(AbilityKind::Bash, 1)
        .with_ability(AbilityKind::Dig, 1);
    let mut world = World::new(level).expect("world builds");
    let cell = CellCoord::new(0, 0);
    world.load_instructions(vec![
        Instruction::new(0, cell, AbilityKind::Bash),
        Instruction::new(0, cell, AbilityKind::Dig),
    ]);

    let events = step_n(&mut world, 1);
    let assignments: Vec<&Event> = events
        .iter()
        .filter(|event| {
            matches!(
                event,
                Event::AbilityAssigned { .. } | Event::AssignmentRejected { .. }
            )
        })
        .collect();
    assert_eq!(
        assignments,
        vec![
            &Event::AbilityAssigned {
                actor: ActorId::new(0),
                ability: AbilityKind::Bash,
            },
            &Event::AssignmentRejected {
                target: cell,
                ability: AbilityKind::Dig,
                reason: AssignError::AbilitySlotOccupied(ActorId::new(0)),
            },
        ]
    );
    assert_eq!(query::remaining(&world, AbilityKind::Bash), 0);
    assert_eq!(query::remaining(&world, AbilityKind::Dig), 1);
}

#[test]
fn solutions_with_same_content_replay_identically() {
    let level = Level::new(
        grid(&[
            "Q........",
            "####.####",
            "#.......O",
            "#########",
        ]),
        1,
    )
    .with_spawn(spawn(0, 0, 0, Facing::Right))
    .with_spawn(spawn(0, 0, 3, Facing::Right))
    .with_ability(AbilityKind::Bridge, 1)
    .with_ability(AbilityKind::Climb, 1);
    let solution = Solution::decode("4:1,2,0,bridge;6,0,0,climb").expect("solution parses");

    let replay = || {
        let mut world = World::new(level.clone()).expect("world builds");
        world.load_solution(&solution);
        let mut events = Vec::new();
        let status = world.run(100, &mut events);
        (status, events, query::actor_view(&world), query::result_log(&world).to_vec())
    };

    assert_eq!(replay(), replay());
}

#[test]
fn run_times_out_when_no_terminal_status_is_reached() {
    let level = Level::new(grid(&["Q...", "####"]), 1).with_spawn(spawn(0, 0, 0, Facing::Right));
    let mut world = World::new(level).expect("world builds");
    let mut events = Vec::new();

    assert_eq!(
        world.run(5, &mut events),
        Err(RunError::Timeout { max_ticks: 5 })
    );
    assert_eq!(query::tick(&world), 5);
    assert_eq!(query::status(&world), Status::Running);
}

#[test]
fn losing_the_must_survive_actor_loses_immediately() {
    let terrain = grid(&["~Q.Q..O", "#######"]);
    let level = Level::new(terrain, 1)
        .with_spawn(spawn(1, 0, 0, Facing::Left))
        .with_spawn(spawn(3, 0, 0, Facing::Right));

    let mut plain = World::new(level.clone()).expect("world builds");
    let mut events = Vec::new();
    assert_eq!(plain.run(10, &mut events), Ok(Status::Won));
    assert!(events.contains(&Event::ActorDied {
        actor: ActorId::new(0),
        cell: CellCoord::new(0, 0),
        cause: DeathCause::Hazard,
    }));

    let mut strict = World::new(level.with_must_survive(ActorId::new(0))).expect("world builds");
    let mut events = Vec::new();
    assert_eq!(strict.step(&mut events), Ok(Status::Lost));
    assert_eq!(query::tick(&strict), 1);
}

#[test]
fn world_is_lost_once_every_actor_is_gone() {
    let level = Level::new(grid(&["Q~", "##"]), 1).with_spawn(spawn(0, 0, 0, Facing::Right));
    let mut world = World::new(level).expect("world builds");
    let mut events = Vec::new();
    assert_eq!(world.run(10, &mut events), Ok(Status::Lost));
    assert_eq!(query::lost(&world), 1);
}

#[test]
fn world_keeps_running_while_spawns_are_pending() {
    let level = Level::new(grid(&["Q~", "##"]), 2)
        .with_spawn(spawn(0, 0, 0, Facing::Right))
        .with_spawn(spawn(0, 0, 5, Facing::Right));
    let mut world = World::new(level).expect("world builds");

    let _ = step_n(&mut world, 3);
    assert_eq!(query::status(&world), Status::Running);
    assert!(query::actor_view(&world).is_empty());

    let mut events = Vec::new();
    assert_eq!(world.run(10, &mut events), Ok(Status::Lost));
    assert_eq!(query::tick(&world), 6);
}

#[test]
fn late_instructions_apply_on_next_step() {
    let level = Level::new(grid(&["Q......", "#######"]), 1)
        .with_spawn(spawn(0, 0, 0, Facing::Right))
        .with_ability(AbilityKind::Block, 1);
    let mut world = World::new(level).expect("world builds");
    let _ = step_n(&mut world, 3);

    world.load_instructions(vec![Instruction::new(1, CellCoord::new(3, 0), AbilityKind::Block)]);
    assert_eq!(query::pending_instructions(&world), 1);

    let events = step_n(&mut world, 1);
    assert!(events.contains(&Event::AbilityAssigned {
        actor: ActorId::new(0),
        ability: AbilityKind::Block,
    }));
    assert_eq!(query::pending_instructions(&world), 0);
    assert_eq!(query::actor_view(&world).into_vec()[0].mode, ActorMode::Blocking);
}

#[test]
fn actor_spawned_later_is_not_assignable_earlier() {
    let level = Level::new(grid(&["Q...O", "#####"]), 1)
        .with_spawn(spawn(0, 0, 2, Facing::Right))
        .with_ability(AbilityKind::Levitate, 1);
    let mut world = World::new(level).expect("world builds");
    world.load_instructions(vec![
        Instruction::new(0, CellCoord::new(0, 0), AbilityKind::Levitate),
        Instruction::new(7, CellCoord::new(9, 9), AbilityKind::Levitate),
    ]);

    let events = step_n(&mut world, 1);
    assert!(events.contains(&Event::AssignmentRejected {
        target: CellCoord::new(0, 0),
        ability: AbilityKind::Levitate,
        reason: AssignError::NoActorAtTarget,
    }));
    assert_eq!(query::remaining(&world, AbilityKind::Levitate), 1);

    let mut events = Vec::new();
    assert_eq!(world.run(20, &mut events), Ok(Status::Won));
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::AssignmentRejected { .. })));
}

#[test]
fn dig_edits_are_visible_through_terrain_view() {
    let level = Level::new(grid(&["Q...", "####", "#..O", "####"]), 1)
        .with_spawn(spawn(0, 0, 0, Facing::Right))
        .with_ability(AbilityKind::Dig, 1);
    let mut world = World::new(level).expect("world builds");
    world.load_solution(&Solution::new(
        SolutionId::new(1),
        vec![Instruction::new(1, CellCoord::new(1, 0), AbilityKind::Dig)],
    ));

    let mut events = Vec::new();
    assert_eq!(world.run(20, &mut events), Ok(Status::Won));
    assert!(events.contains(&Event::TerrainChanged {
        cell: CellCoord::new(1, 1),
        edit: rabbit_escape_core::TerrainEdit::Removed,
    }));
    let view = query::terrain_view(&world);
    assert_eq!(view.cell_at(CellCoord::new(1, 1)), Ok(TerrainCell::Empty));
    assert_eq!(
        query::terrain(&world).cell_at(CellCoord::new(1, 1)),
        Ok(TerrainCell::Solid)
    );
}

#[test]
fn commands_drive_the_world_like_direct_calls() {
    let level =
        Level::new(grid(&["Q....O", "######"]), 1).with_spawn(spawn(0, 0, 0, Facing::Right));
    let mut world = World::new(level).expect("world builds");
    let mut events = Vec::new();

    for _ in 0..5 {
        world::apply(&mut world, Command::Tick, &mut events).expect("tick succeeds");
    }
    assert_eq!(query::status(&world), Status::Won);

    events.clear();
    world::apply(
        &mut world,
        Command::AssignAbility {
            target: CellCoord::new(5, 0),
            ability: AbilityKind::Dig,
        },
        &mut events,
    )
    .expect("assignment is never fatal");
    assert_eq!(
        events,
        vec![Event::AssignmentRejected {
            target: CellCoord::new(5, 0),
            ability: AbilityKind::Dig,
            reason: AssignError::SimulationOver,
        }]
    );
}

#[test]
fn climber_does_not_crest_onto_a_blocker() {
    let level = Level::new(grid(&["..Q..", "..#..", "Q.#..", "#####"]), 1)
        .with_spawn(spawn(0, 2, 0, Facing::Right))
        .with_spawn(spawn(2, 0, 0, Facing::Left))
        .with_ability(AbilityKind::Climb, 1)
        .with_ability(AbilityKind::Block, 1);
    let mut world = World::new(level).expect("world builds");
    world.load_instructions(vec![
        Instruction::new(0, CellCoord::new(0, 2), AbilityKind::Climb),
        Instruction::new(0, CellCoord::new(2, 0), AbilityKind::Block),
    ]);

    let _ = step_n(&mut world, 5);
    let view = query::actor_view(&world).into_vec();
    assert_eq!(view[0].cell, CellCoord::new(1, 0));
    assert_eq!(view[0].facing, Facing::Left);
    assert_eq!(view[0].mode, ActorMode::Falling);
    assert_eq!(view[1].mode, ActorMode::Blocking);

    let events = step_n(&mut world, 6);
    assert!(!events.iter().any(|event| matches!(
        event,
        Event::ActorMoved { to, .. } if *to == CellCoord::new(2, 0)
    )));
    assert_eq!(query::lost(&world), 0);
}

#[test]
fn shared_cell_assigns_lowest_id_actor_that_accepts() {
    let level = Level::new(grid(&["Q.....", "######"]), 1)
        .with_spawn(spawn(0, 0, 0, Facing::Right))
        .with_spawn(spawn(0, 0, 0, Facing::Right))
        .with_ability(AbilityKind::Bash, 2)
        .with_ability(AbilityKind::Dig, 1);
    let mut world = World::new(level).expect("world builds");
    let cell = CellCoord::new(0, 0);
    world.load_instructions(vec![
        Instruction::new(0, cell, AbilityKind::Bash),
        Instruction::new(0, cell, AbilityKind::Bash),
        Instruction::new(0, cell, AbilityKind::Dig),
    ]);

    let events = step_n(&mut world, 1);
    let assignments: Vec<Event> = events
        .into_iter()
        .filter(|event| {
            matches!(
                event,
                Event::AbilityAssigned { .. } | Event::AssignmentRejected { .. }
            )
        })
        .collect();
    assert_eq!(
        assignments,
        vec![
            Event::AbilityAssigned {
                actor: ActorId::new(0),
                ability: AbilityKind::Bash,
            },
            Event::AbilityAssigned {
                actor: ActorId::new(1),
                ability: AbilityKind::Bash,
            },
            Event::AssignmentRejected {
                target: cell,
                ability: AbilityKind::Dig,
                reason: AssignError::AbilitySlotOccupied(ActorId::new(0)),
            },
        ]
    );
    assert_eq!(query::remaining(&world, AbilityKind::Bash), 0);
    assert_eq!(query::remaining(&world, AbilityKind::Dig), 1);
}

#[test]
fn exploding_occupant_passes_assignment_to_next_actor() {
    let level = Level::new(grid(&["Q...", "####"]), 1)
        .with_spawn(spawn(0, 0, 0, Facing::Right))
        .with_spawn(spawn(0, 0, 1, Facing::Right))
        .with_ability(AbilityKind::Explode, 1)
        .with_ability(AbilityKind::Levitate, 1)
        .with_ability(AbilityKind::Dig, 1);
    let mut world = World::new(level).expect("world builds");
    let cell = CellCoord::new(0, 0);
    world.load_instructions(vec![
        Instruction::new(0, cell, AbilityKind::Explode),
        Instruction::new(1, cell, AbilityKind::Levitate),
        Instruction::new(1, cell, AbilityKind::Dig),
    ]);

    let _ = step_n(&mut world, 1);
    assert_eq!(
        query::actor_view(&world).into_vec()[0].mode,
        ActorMode::Exploding
    );

    let events = step_n(&mut world, 1);
    assert!(events.contains(&Event::AbilityAssigned {
        actor: ActorId::new(1),
        ability: AbilityKind::Levitate,
    }));
    assert!(events.contains(&Event::AssignmentRejected {
        target: cell,
        ability: AbilityKind::Dig,
        reason: AssignError::ActorTerminal(ActorId::new(0)),
    }));
    assert_eq!(query::remaining(&world, AbilityKind::Dig), 1);
}
