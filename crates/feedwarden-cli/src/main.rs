//! Feedwarden - goal-driven gating for video feeds
//!
//! The `feedwarden` command drives the engine from recorded host signals and
//! manages the state it reads.
//!
//! ## Commands
//!
//! - `replay`: feed a host-signal script through the engine, print effects
//! - `goals`: show or set inclusion/exclusion criteria
//! - `settings`: show or toggle policy flags
//! - `session`: show or reset accumulated session time
//! - `notes`: add or list saved notes

mod script;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feedwarden_classifier::fakes::PermissiveClassifier;
use feedwarden_classifier::{BackendConfig, Classifier, ErrorStatusBoard, LlmClassifier};
use feedwarden_core::{Effect, Engine, EngineConfig, EngineDeps, HostSignal};
use feedwarden_store::{
    CounterStore, Criteria, GoalStore, JsonFileStore, Note, NoteStore, SettingsStore,
};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "feedwarden")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Goal-driven gating for continuously mutating video feeds", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// State file holding goals, settings, counters and notes
    #[arg(
        long,
        global = true,
        env = "FEEDWARDEN_STATE",
        default_value = ".feedwarden/state.json"
    )]
    state: PathBuf,

    /// Engine configuration file (TOML)
    #[arg(long, global = true, env = "FEEDWARDEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a host-signal script through the engine and print its effects
    Replay {
        /// Script with one JSON signal per line
        script: PathBuf,

        /// Show every recommendation and rate every title `not_sure`
        /// instead of calling a classification backend
        #[arg(long)]
        offline: bool,
    },

    /// Show or set goal criteria
    Goals {
        #[command(subcommand)]
        action: GoalsAction,
    },

    /// Show or change policy flags
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Show or reset accumulated session time
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Add or list saved notes
    Notes {
        #[command(subcommand)]
        action: NotesAction,
    },
}

#[derive(Subcommand)]
enum GoalsAction {
    Show,
    Set {
        /// What you want to watch
        #[arg(long, default_value = "")]
        include: String,
        /// What you want to avoid
        #[arg(long, default_value = "")]
        exclude: String,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set {
        #[arg(long)]
        blocker: Option<bool>,
        #[arg(long)]
        eval: Option<bool>,
        #[arg(long)]
        filter: Option<bool>,
        #[arg(long)]
        hide_shorts: Option<bool>,
        #[arg(long)]
        comments_disabled: Option<bool>,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    Show,
    Reset,
}

#[derive(Subcommand)]
enum NotesAction {
    Add {
        /// Page the note belongs to
        url: String,
        note: String,
    },
    List,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    feedwarden_core::init_tracing(cli.json, level);

    let config =
        EngineConfig::load(cli.config.as_deref()).context("Failed to load engine configuration")?;
    let store = Arc::new(
        JsonFileStore::open(&cli.state)
            .await
            .with_context(|| format!("Failed to open state file {}", cli.state.display()))?,
    );

    match cli.command {
        Commands::Replay { script, offline } => cmd_replay(store, config, &script, offline).await,
        Commands::Goals { action } => match action {
            GoalsAction::Show => cmd_goals_show(&store).await,
            GoalsAction::Set { include, exclude } => {
                cmd_goals_set(&store, Criteria::new(include, exclude)).await
            }
        },
        Commands::Settings { action } => match action {
            SettingsAction::Show => cmd_settings_show(&store).await,
            SettingsAction::Set {
                blocker,
                eval,
                filter,
                hide_shorts,
                comments_disabled,
            } => {
                cmd_settings_set(
                    &store,
                    [blocker, eval, filter, hide_shorts, comments_disabled],
                )
                .await
            }
        },
        Commands::Session { action } => match action {
            SessionAction::Show => cmd_session_show(&store, &config).await,
            SessionAction::Reset => cmd_session_reset(&store, &config).await,
        },
        Commands::Notes { action } => match action {
            NotesAction::Add { url, note } => cmd_notes_add(&store, Note::new(url, note)).await,
            NotesAction::List => cmd_notes_list(&store).await,
        },
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a script through the engine
async fn cmd_replay(
    store: Arc<JsonFileStore>,
    config: EngineConfig,
    script: &Path,
    offline: bool,
) -> Result<()> {
    let text = tokio::fs::read_to_string(script)
        .await
        .with_context(|| format!("Failed to read script {}", script.display()))?;
    let signals = script::parse_script(&text)?;

    let classifier: Arc<dyn Classifier> = if offline {
        Arc::new(PermissiveClassifier)
    } else {
        let backend = BackendConfig::from_env().context("Invalid backend configuration")?;
        backend.validate().context("Invalid backend configuration")?;
        Arc::new(LlmClassifier::from_config(backend).context("Failed to build classifier")?)
    };
    let board = Arc::new(ErrorStatusBoard::with_settings(store.clone()).await);

    let deps = EngineDeps {
        goals: store.clone(),
        settings: store.clone(),
        counters: store.clone(),
        classifier,
        board,
    };
    let surface = |effect: Effect| match serde_json::to_string(&effect) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "failed to encode effect"),
    };
    let (engine, handle) = Engine::new(config, deps, surface)?;
    let engine = tokio::spawn(engine.run());

    let mut unloaded = false;
    for signal in signals {
        unloaded = signal == HostSignal::Unload;
        handle.send(signal).await?;
        if unloaded {
            break;
        }
        handle.settled().await?;
    }
    if !unloaded {
        handle.send(HostSignal::Unload).await?;
    }

    let snapshot = engine.await.context("Engine task failed")??;
    info!(
        total_seconds = snapshot.accumulated_seconds,
        "replay finished"
    );
    Ok(())
}

async fn cmd_goals_show(store: &JsonFileStore) -> Result<()> {
    let goals = GoalStore::get(store).await?;
    if goals.is_empty() {
        println!("No goals set. Run 'feedwarden goals set --include ...' first.");
        return Ok(());
    }
    print_json(&goals)
}

async fn cmd_goals_set(store: &JsonFileStore, criteria: Criteria) -> Result<()> {
    GoalStore::set(store, criteria.clone())
        .await
        .context("Failed to save goals")?;
    println!("Goals saved ({})", criteria.digest().short());
    Ok(())
}

async fn cmd_settings_show(store: &JsonFileStore) -> Result<()> {
    let settings = SettingsStore::get(store).await?;
    print_json(&settings)
}

/// Flags in order: blocker, eval, filter, hide_shorts, comments_disabled
async fn cmd_settings_set(store: &JsonFileStore, flags: [Option<bool>; 5]) -> Result<()> {
    let mut settings = SettingsStore::get(store).await?;
    let [blocker, eval, filter, hide_shorts, comments_disabled] = flags;
    let targets = [
        (blocker, &mut settings.blocker_enabled),
        (eval, &mut settings.video_eval_enabled),
        (filter, &mut settings.filter_enabled),
        (hide_shorts, &mut settings.hide_shorts_enabled),
        (comments_disabled, &mut settings.comments_disabled),
    ];
    for (value, target) in targets {
        if let Some(value) = value {
            *target = value;
        }
    }
    SettingsStore::set(store, settings.clone())
        .await
        .context("Failed to save settings")?;
    print_json(&settings)
}

async fn cmd_session_show(store: &JsonFileStore, config: &EngineConfig) -> Result<()> {
    let total = CounterStore::get(store, &config.counter_key)
        .await?
        .unwrap_or(0.0);
    let secs = total as u64;
    println!(
        "{:.1}s ({}h {:02}m {:02}s)",
        total,
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    );
    Ok(())
}

async fn cmd_session_reset(store: &JsonFileStore, config: &EngineConfig) -> Result<()> {
    CounterStore::set(store, &config.counter_key, 0.0)
        .await
        .context("Failed to reset session total")?;
    println!("Session total reset");
    Ok(())
}

async fn cmd_notes_add(store: &JsonFileStore, note: Note) -> Result<()> {
    NoteStore::add(store, note.clone())
        .await
        .context("Failed to save note")?;
    println!("Saved note for {}", note.url);
    Ok(())
}

async fn cmd_notes_list(store: &JsonFileStore) -> Result<()> {
    let notes = store.list().await?;
    if notes.is_empty() {
        println!("No notes saved.");
        return Ok(());
    }
    for note in notes {
        println!("{}\n    {}", note.url, note.note);
    }
    Ok(())
}
