//! Terminal command surface for trophy journey guides and progress.
//!
//! Host tooling can embed this through:
//! - [`run_cli`] for full parsed CLI execution.
//! - [`open_store`] to build a [`ProgressStore`] over the SQLite medium.
//! - [`run_games`] / [`run_progress`] for direct command execution.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use trophy_journey_core::{
    checklist_completion, overall_completion, ChecklistCompletion, Game, GameProgress,
    OverallCompletion, ProgressStore,
};
use trophy_journey_store_sqlite::SqliteMedium;

pub mod catalog;

pub use catalog::GuideCatalog;

#[derive(Debug, Parser)]
#[command(name = "tj")]
#[command(about = "Trophy Journey CLI")]
pub struct Cli {
    #[arg(long, default_value = "./trophy_journey.sqlite3")]
    db: PathBuf,

    #[arg(long, default_value = "./data/games")]
    games_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Games {
        #[command(subcommand)]
        command: GamesCommand,
    },
    Progress {
        #[command(subcommand)]
        command: ProgressCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum GamesCommand {
    List(GamesListArgs),
    Show(GamesShowArgs),
}

#[derive(Debug, Args)]
pub struct GamesListArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct GamesShowArgs {
    #[arg(long)]
    slug: String,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
pub enum ProgressCommand {
    Init(ProgressSlugArgs),
    Show(ProgressSlugArgs),
    Toggle(ProgressToggleArgs),
    Complete(ProgressCompleteArgs),
    Summary(ProgressSummaryArgs),
}

#[derive(Debug, Args)]
pub struct ProgressSlugArgs {
    #[arg(long)]
    slug: String,
}

#[derive(Debug, Args)]
pub struct ProgressToggleArgs {
    #[arg(long)]
    slug: String,
    #[arg(long)]
    trophy_id: String,
    #[arg(long)]
    item_id: String,
}

#[derive(Debug, Args)]
pub struct ProgressCompleteArgs {
    #[arg(long)]
    slug: String,
    #[arg(long)]
    trophy_id: String,
    /// Clear the completion flag instead of setting it.
    #[arg(long)]
    undo: bool,
}

#[derive(Debug, Args)]
pub struct ProgressSummaryArgs {
    #[arg(long)]
    slug: String,
    #[arg(long)]
    json: bool,
}

/// Executes the parsed top-level CLI command graph.
///
/// # Errors
/// Returns an error when store construction, guide lookup, or command
/// execution fails.
pub fn run_cli(cli: Cli) -> Result<()> {
    let catalog = GuideCatalog::new(cli.games_dir);
    match cli.command {
        Command::Games { command } => run_games(command, &catalog),
        Command::Progress { command } => {
            let store = open_store(&cli.db)?;
            run_progress(command, &store, &catalog)
        }
    }
}

/// Opens and migrates the SQLite medium and wraps it in a [`ProgressStore`].
///
/// # Errors
/// Returns an error when the database cannot be opened or migrated.
pub fn open_store(db_path: &Path) -> Result<ProgressStore> {
    let medium = SqliteMedium::open(db_path)?;
    medium.migrate()?;
    Ok(ProgressStore::new(Box::new(medium)))
}

/// Executes a parsed `games` command against the catalog.
///
/// # Errors
/// Returns an error when the requested guide does not exist or output
/// serialization fails.
pub fn run_games(command: GamesCommand, catalog: &GuideCatalog) -> Result<()> {
    match command {
        GamesCommand::List(args) => {
            let games = catalog.all_games();
            if args.json {
                let payload = build_games_list_payload(&games);
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_games_table(&games);
            }
            Ok(())
        }
        GamesCommand::Show(args) => {
            let game = require_guide(catalog, &args.slug)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&game)?);
            } else {
                print_game_guide(&game);
            }
            Ok(())
        }
    }
}

/// Executes a parsed `progress` command against the store.
///
/// # Errors
/// Returns an error when the slug has no guide, no progress is recorded, a
/// trophy id is unknown, or output serialization fails.
pub fn run_progress(
    command: ProgressCommand,
    store: &ProgressStore,
    catalog: &GuideCatalog,
) -> Result<()> {
    match command {
        ProgressCommand::Init(args) => {
            let game = require_guide(catalog, &args.slug)?;
            let record = store.initialize_game(&args.slug, &game);
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        ProgressCommand::Show(args) => {
            let record = require_progress(store, &args.slug)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        ProgressCommand::Toggle(args) => {
            let record = require_progress(store, &args.slug)?;
            require_trophy(&record, &args.slug, &args.trophy_id)?;

            let checked =
                store.toggle_checklist_item(&args.slug, &args.trophy_id, &args.item_id);
            let payload =
                build_toggle_result_payload(&args.slug, &args.trophy_id, &args.item_id, checked);
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        ProgressCommand::Complete(args) => {
            let record = require_progress(store, &args.slug)?;
            require_trophy(&record, &args.slug, &args.trophy_id)?;

            let completed = !args.undo;
            store.set_trophy_completed(&args.slug, &args.trophy_id, completed);
            let payload = build_trophy_completed_payload(&args.slug, &args.trophy_id, completed);
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        ProgressCommand::Summary(args) => {
            let record = require_progress(store, &args.slug)?;
            let payload = build_progress_summary_payload(&args.slug, &record);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_progress_summary(&payload);
            }
            Ok(())
        }
    }
}

fn require_guide(catalog: &GuideCatalog, slug: &str) -> Result<Game> {
    catalog.game(slug).ok_or_else(|| {
        let known = catalog.game_slugs();
        if known.is_empty() {
            anyhow!("no guide found for {slug}")
        } else {
            anyhow!("no guide found for {slug} (known: {})", known.join(", "))
        }
    })
}

fn require_progress(store: &ProgressStore, slug: &str) -> Result<GameProgress> {
    store
        .load_game(slug)
        .ok_or_else(|| anyhow!("no progress recorded for {slug}"))
}

fn require_trophy(record: &GameProgress, slug: &str, trophy_id: &str) -> Result<()> {
    if record.trophies.contains_key(trophy_id) {
        Ok(())
    } else {
        Err(anyhow!("unknown trophy id {trophy_id} for {slug}"))
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct GamesListPayload {
    contract_version: String,
    games: Vec<GameSummary>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct GameSummary {
    slug: String,
    title: String,
    platform: String,
    trophy_count: usize,
}

fn build_games_list_payload(games: &[Game]) -> GamesListPayload {
    GamesListPayload {
        contract_version: "games_list.v1".to_string(),
        games: games
            .iter()
            .map(|game| GameSummary {
                slug: game.slug.clone(),
                title: game.title.clone(),
                platform: game.platform.clone(),
                trophy_count: game.trophies.len(),
            })
            .collect(),
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ToggleResultPayload {
    contract_version: String,
    slug: String,
    trophy_id: String,
    item_id: String,
    checked: bool,
}

fn build_toggle_result_payload(
    slug: &str,
    trophy_id: &str,
    item_id: &str,
    checked: bool,
) -> ToggleResultPayload {
    ToggleResultPayload {
        contract_version: "toggle_result.v1".to_string(),
        slug: slug.to_string(),
        trophy_id: trophy_id.to_string(),
        item_id: item_id.to_string(),
        checked,
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct TrophyCompletedPayload {
    contract_version: String,
    slug: String,
    trophy_id: String,
    completed: bool,
}

fn build_trophy_completed_payload(
    slug: &str,
    trophy_id: &str,
    completed: bool,
) -> TrophyCompletedPayload {
    TrophyCompletedPayload {
        contract_version: "trophy_completed.v1".to_string(),
        slug: slug.to_string(),
        trophy_id: trophy_id.to_string(),
        completed,
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ProgressSummaryPayload {
    contract_version: String,
    slug: String,
    overall: OverallCompletion,
    trophies: Vec<TrophySummary>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct TrophySummary {
    trophy_id: String,
    completed: bool,
    checklist: ChecklistCompletion,
}

fn build_progress_summary_payload(slug: &str, record: &GameProgress) -> ProgressSummaryPayload {
    let trophies = record
        .trophies
        .iter()
        .map(|(trophy_id, trophy)| TrophySummary {
            trophy_id: trophy_id.clone(),
            completed: trophy.completed,
            checklist: checklist_completion(record, trophy_id),
        })
        .collect();

    ProgressSummaryPayload {
        contract_version: "progress_summary.v1".to_string(),
        slug: slug.to_string(),
        overall: overall_completion(record),
        trophies,
    }
}

fn print_games_table(games: &[Game]) {
    println!(
        "{:<28} {:<32} {:<10} trophies",
        "slug", "title", "platform"
    );
    println!("{}", "-".repeat(84));
    for game in games {
        println!(
            "{:<28} {:<32} {:<10} {}",
            game.slug,
            game.title,
            game.platform,
            game.trophies.len()
        );
    }
}

fn print_game_guide(game: &Game) {
    println!("{} [{}] ({})", game.title, game.platform, game.slug);
    println!(
        "time={} difficulty={} playthroughs={} missable={} online={}",
        game.metadata.estimated_time,
        game.metadata.difficulty,
        game.metadata.playthroughs_required,
        game.metadata.missable_trophies,
        if game.metadata.online_required {
            "yes"
        } else {
            "no"
        }
    );
    println!();
    println!("{}", game.journey_intro.overview);
    println!("approach: {}", game.journey_intro.recommended_approach);
    for warning in &game.journey_intro.warnings {
        println!("warning: {warning}");
    }

    println!();
    for trophy in &game.trophies {
        let missable = if trophy.is_missable { " [missable]" } else { "" };
        println!(
            "[{}] {} ({}){missable}",
            trophy.trophy_type.as_str(),
            trophy.name,
            trophy.id
        );
        println!("  {}", trophy.guide);
        for item in trophy.checklist.iter().flatten() {
            println!("  - ({}) {}", item.id, item.label);
        }
    }

    if !game.suggested_order.is_empty() {
        println!();
        println!("suggested order:");
        for phase in &game.suggested_order {
            println!("  {}: {}", phase.phase, phase.trophy_ids.join(", "));
        }
    }
}

fn print_progress_summary(payload: &ProgressSummaryPayload) {
    println!(
        "slug={} trophies={}/{} checklist={}/{}",
        payload.slug,
        payload.overall.trophies_completed,
        payload.overall.total_trophies,
        payload.overall.checklist_completed,
        payload.overall.total_checklist
    );
    println!("{:<28} {:<7} checklist", "trophy", "earned");
    println!("{}", "-".repeat(50));
    for trophy in &payload.trophies {
        println!(
            "{:<28} {:<7} {}/{}",
            trophy.trophy_id,
            if trophy.completed { "yes" } else { "no" },
            trophy.checklist.completed,
            trophy.checklist.total
        );
    }
}
