//! Duewatch CLI: due-date notifications for a markdown vault.
//!
//! Usage:
//!   duewatch watch --vault <dir> [--command prog | --log-only] [--settings path]
//!   duewatch scan --vault <dir> [--at timestamp] [--fire] [--settings path]
//!   duewatch config <subcommand> [--settings path]

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use duewatch::{
    parse_timestamp, AlertSink, CancellationToken, CommandAlertSink, ConfigResult, FsDocumentStore,
    JsonSettingsStore, LogAlertSink, PendingNotification, Scheduler, SettingsService,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "duewatch",
    version,
    about = "Due-date notifications for a vault of markdown notes"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to the settings file
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a vault and raise alerts as due dates pass
    Watch {
        /// Vault root directory
        #[arg(long)]
        vault: PathBuf,
        #[command(flatten)]
        alerts: AlertArgs,
    },
    /// Register a vault once and list its due dates
    Scan {
        /// Vault root directory
        #[arg(long)]
        vault: PathBuf,
        /// Evaluate against this instant instead of now
        #[arg(long)]
        at: Option<String>,
        /// Deliver everything due at that instant
        #[arg(long)]
        fire: bool,
        #[command(flatten)]
        alerts: AlertArgs,
    },
    /// Show or edit settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct AlertArgs {
    /// Notifier program, called as `<prog> <title> <body>`
    #[arg(long = "command", value_name = "PROG", default_value = "notify-send")]
    notifier: String,
    /// Write alerts to the log instead of running a notifier
    #[arg(long, conflicts_with = "notifier")]
    log_only: bool,
}

impl AlertArgs {
    fn sink(&self) -> Arc<dyn AlertSink> {
        if self.log_only {
            Arc::new(LogAlertSink)
        } else {
            Arc::new(CommandAlertSink::new(&self.notifier))
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Set the front-matter key read as the due date
    SetDueKey {
        /// New key, e.g. `deadline`
        key: String,
    },
    /// Set the minutes between periodic sweeps
    SetInterval {
        /// Minutes, at least 1
        minutes: u64,
    },
}

fn settings_store(path: Option<PathBuf>) -> Result<JsonSettingsStore, String> {
    match path {
        Some(path) => Ok(JsonSettingsStore::new(path)),
        None => JsonSettingsStore::default_path()
            .map(JsonSettingsStore::new)
            .map_err(|e| format!("cannot locate settings: {}", e)),
    }
}

fn open_vault(vault: &PathBuf) -> Result<Arc<FsDocumentStore>, String> {
    FsDocumentStore::open(vault)
        .map(Arc::new)
        .map_err(|e| format!("cannot open vault '{}': {}", vault.display(), e))
}

fn status(entry: &PendingNotification, now: DateTime<Utc>) -> &'static str {
    if entry.record.fired {
        "fired"
    } else if !entry.record.due_at.is_valid() {
        "invalid"
    } else if entry.record.due_at.is_before(now) {
        "due"
    } else {
        "upcoming"
    }
}

async fn cmd_watch(settings: &SettingsService, vault: &PathBuf, alerts: &AlertArgs) -> i32 {
    let store = match open_vault(vault) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let (guard, events) = match store.watch() {
        Ok(watching) => watching,
        Err(e) => {
            eprintln!("Error: cannot watch vault: {}", e);
            return 1;
        }
    };

    let scheduler = Scheduler::new(store.clone(), alerts.sink(), settings.subscribe());
    let handle = scheduler.run(events, CancellationToken::new());
    tracing::info!(vault = %store.root().display(), "watching for due dates");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
    }
    handle.shutdown().await;
    drop(guard);
    0
}

async fn cmd_scan(
    settings: &SettingsService,
    vault: &PathBuf,
    at: Option<&str>,
    fire: bool,
    alerts: &AlertArgs,
) -> i32 {
    let now = match at {
        Some(raw) => match parse_timestamp(raw) {
            Some(instant) => instant,
            None => {
                eprintln!("Error: cannot parse timestamp '{}'", raw);
                return 1;
            }
        },
        None => Utc::now(),
    };
    let store = match open_vault(vault) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let scheduler = Scheduler::new(store, alerts.sink(), settings.subscribe());
    let report = match scheduler.register_all().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let entries = scheduler.registry().snapshot();
    if entries.is_empty() {
        println!("No due dates found ({} notes scanned).", report.scanned);
    } else {
        println!("{:<9} {:<25} {:<30} TITLE", "STATUS", "DUE", "PATH");
        for entry in &entries {
            println!(
                "{:<9} {:<25} {:<30} {}",
                status(entry, now),
                entry.record.due_at.to_string(),
                entry.path,
                entry.record.title
            );
        }
    }
    if report.failed > 0 {
        eprintln!("Warning: {} notes could not be read or parsed", report.failed);
    }

    if fire {
        let sweep = scheduler.sweep(now).await;
        println!("Fired {} notification(s).", sweep.fired_count());
    }
    0
}

async fn cmd_config(settings: &SettingsService, action: ConfigAction) -> i32 {
    let result: ConfigResult<()> = match action {
        ConfigAction::Show => match serde_json::to_string_pretty(&settings.current()) {
            Ok(json) => {
                println!("{}", json);
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        ConfigAction::SetDueKey { key } => settings.set_due_key(key).await,
        ConfigAction::SetInterval { minutes } => settings.set_sweep_interval(minutes).await,
    };
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = match settings_store(cli.settings) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = rt.block_on(async {
        let settings = SettingsService::load(Arc::new(store)).await;
        match cli.command {
            Commands::Watch { vault, alerts } => cmd_watch(&settings, &vault, &alerts).await,
            Commands::Scan {
                vault,
                at,
                fire,
                alerts,
            } => cmd_scan(&settings, &vault, at.as_deref(), fire, &alerts).await,
            Commands::Config { action } => cmd_config(&settings, action).await,
        }
    });
    std::process::exit(code);
}
