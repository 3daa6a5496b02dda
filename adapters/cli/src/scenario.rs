use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use rabbit_escape_core::{AbilityKind, ActorId, CellCoord, Facing};
use rabbit_escape_world::{Level, SpawnPoint, TerrainGrid};
use serde::Deserialize;

/// Level description read from a TOML scenario file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    required_rescues: u32,
    terrain: Vec<String>,
    #[serde(default)]
    spawns: Vec<ScenarioSpawn>,
    #[serde(default)]
    abilities: BTreeMap<String, u32>,
    must_survive: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioSpawn {
    x: i32,
    y: i32,
    #[serde(default)]
    tick: u64,
    facing: ScenarioFacing,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ScenarioFacing {
    Left,
    Right,
}

impl From<ScenarioFacing> for Facing {
    fn from(value: ScenarioFacing) -> Self {
        match value {
            ScenarioFacing::Left => Facing::Left,
            ScenarioFacing::Right => Facing::Right,
        }
    }
}

impl Scenario {
    pub(crate) fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse scenario toml contents")
    }

    pub(crate) fn into_level(self) -> Result<Level> {
        let terrain = TerrainGrid::from_rows(self.terrain.as_slice())
            .context("invalid scenario terrain")?;
        let mut level = Level::new(terrain, self.required_rescues);

        for spawn in self.spawns {
            level = level.with_spawn(SpawnPoint::new(
                CellCoord::new(spawn.x, spawn.y),
                spawn.tick,
                spawn.facing.into(),
            ));
        }

        for (name, count) in self.abilities {
            let Some(kind) = AbilityKind::from_name(&name) else {
                bail!("unknown ability `{name}` in scenario");
            };
            level = level.with_ability(kind, count);
        }

        if let Some(actor) = self.must_survive {
            level = level.with_must_survive(ActorId::new(actor));
        }

        Ok(level)
    }
}
