#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that generates a Mineshaft unit and plays a script against it.

mod render;
mod script;

use std::{collections::BTreeMap, fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use mineshaft_core::{
    Currency, Event, SessionRules, TechNode, UnitConfig, UnitKey, UnitKind, UnitTemplate,
    WalletLedger,
};
use mineshaft_world::{self as world, query, GridUnit, Session};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mineshaft", about = "Generate a mine grid and play actions against it")]
struct CliArgs {
    /// Seed for the deterministic generator.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// TOML file carrying `[unit]`, `[rules]`, `[wallet]` and `[[tech]]` tables.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Identity used to match technology entries.
    #[arg(long, default_value = "mine")]
    key: String,
    /// Build a two-column converter instead of a mine.
    #[arg(long)]
    converter: bool,
    /// Overrides the number of rows.
    #[arg(long)]
    rows: Option<u32>,
    /// Overrides the number of columns.
    #[arg(long)]
    columns: Option<u32>,
    /// Overrides the number of rows unlocked for free.
    #[arg(long)]
    initial_unlocks: Option<u32>,
    /// Action to apply, in order. Repeatable, e.g. `--action unlock --action rotate:1,2`.
    #[arg(long = "action", value_name = "ACTION")]
    actions: Vec<String>,
    /// Print the unit snapshot as JSON after the script runs.
    #[arg(long)]
    json: bool,
}

/// Session description loaded from the optional TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionFile {
    unit: UnitConfig,
    rules: SessionRules,
    wallet: BTreeMap<Currency, f32>,
    tech: Vec<TechNode>,
}

impl SessionFile {
    fn load(path: Option<&PathBuf>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read session file at {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse session file at {}", path.display()))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    run(&args)
}

fn run(args: &CliArgs) -> Result<()> {
    let session_file = SessionFile::load(args.config.as_ref())?;

    let mut config = session_file.unit;
    if let Some(rows) = args.rows {
        config.max_unlock_rows = rows;
    }
    if let Some(columns) = args.columns {
        config.columns = columns;
    }
    if let Some(initial) = args.initial_unlocks {
        config.initial_row_unlocks = initial;
    }
    let template = UnitTemplate {
        key: UnitKey::new(args.key.as_str()),
        kind: if args.converter {
            UnitKind::Converter
        } else {
            UnitKind::Mine
        },
        config,
    };

    let commands = args
        .actions
        .iter()
        .map(|action| script::parse_action(action))
        .collect::<Result<Vec<_>>>()?;

    let mut wallet = session_file
        .wallet
        .into_iter()
        .fold(WalletLedger::new(), |wallet, (currency, amount)| {
            wallet.with(currency, amount)
        });
    let tech = session_file.tech;

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut events = Vec::new();
    let mut unit = GridUnit::setup(
        &template,
        &session_file.rules,
        &tech,
        &mut rng,
        &mut events,
    )
    .with_context(|| format!("failed to set up unit `{}`", args.key))?;
    report(&events);

    for command in commands.into_iter().flatten() {
        events.clear();
        let mut session = Session {
            wallet: &mut wallet,
            tech: &tech,
        };
        world::apply(&mut unit, command.clone(), &mut session, &mut events)
            .with_context(|| format!("failed to apply {command:?}"))?;
        report(&events);
    }

    let totals = query::total_yield(&unit, &wallet, &tech);
    print!("{}", render::grid(&unit));
    print!("{}", render::summary(&unit, &totals, &wallet));

    if args.json {
        let snapshot = query::snapshot(&unit);
        let json =
            serde_json::to_string_pretty(&snapshot).context("failed to serialise snapshot")?;
        println!("{json}");
    }

    Ok(())
}

fn report(events: &[Event]) {
    for event in events {
        match event {
            Event::YieldUpdated { .. } => tracing::trace!(?event, "event"),
            Event::UnlockRejected { reason } => tracing::warn!(?reason, "unlock rejected"),
            _ => tracing::info!(?event, "event"),
        }
    }
}
