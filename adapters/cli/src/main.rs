#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for inspecting and verifying Rabbit Escape solutions.

mod scenario;

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rabbit_escape_core::Solution;
use rabbit_escape_system_verifier::{Config, Outcome, Verifier};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::scenario::Scenario;

const DEFAULT_MAX_TICKS: u64 = 10_000;

#[derive(Parser, Debug)]
#[command(
    name = "rabbit-escape",
    version,
    about = "Decode, normalise and verify Rabbit Escape solutions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tick-ordered schedule of a solution.
    Decode {
        /// Solution text, e.g. `3:5,2,1,dig;9,4,1,bridge`.
        solution: String,
    },
    /// Print the canonical encoding of a solution.
    Normalize {
        /// Solution text.
        solution: String,
    },
    /// Replay a solution against a scenario file.
    Verify {
        /// TOML scenario describing the level.
        #[arg(long)]
        scenario: PathBuf,
        /// Solution text.
        #[arg(long)]
        solution: String,
        /// Tick budget before the replay counts as timed out.
        #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
        max_ticks: u64,
    },
}

/// Entry point for the Rabbit Escape command-line interface.
fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Decode { solution } => decode_command(&solution),
        Command::Normalize { solution } => normalize_command(&solution),
        Command::Verify {
            scenario,
            solution,
            max_ticks,
        } => verify_command(&scenario, &solution, max_ticks),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn parse_solution(text: &str) -> Result<Solution> {
    text.parse()
        .with_context(|| format!("failed to decode solution `{text}`"))
}

fn decode_command(text: &str) -> Result<ExitCode> {
    let solution = parse_solution(text)?;
    println!(
        "solution {} ({} instructions)",
        solution.id().get(),
        solution.len()
    );
    for scheduled in solution.schedule() {
        let instruction = scheduled.instruction;
        println!(
            "{:>6}  {:<10} {}",
            instruction.tick(),
            instruction.ability().name(),
            instruction.cell()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn normalize_command(text: &str) -> Result<ExitCode> {
    let solution = parse_solution(text)?;
    println!("{solution}");
    Ok(ExitCode::SUCCESS)
}

fn verify_command(path: &Path, text: &str, max_ticks: u64) -> Result<ExitCode> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario at {}", path.display()))?;
    let level = Scenario::parse(&contents)
        .and_then(Scenario::into_level)
        .with_context(|| format!("invalid scenario {}", path.display()))?;
    let solution = parse_solution(text)?;

    info!(solution = solution.id().get(), max_ticks, "verifying solution");
    let verdict = Verifier::new(Config::new(max_ticks))
        .verify(&level, &solution)
        .context("replay failed")?;

    println!("outcome:     {}", verdict.outcome().name());
    println!("ticks:       {}", verdict.ticks());
    println!("rescued:     {}", verdict.rescued());
    println!("lost:        {}", verdict.lost());
    println!("fingerprint: {}", verdict.log().fingerprint());

    Ok(if verdict.outcome() == Outcome::Won {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
