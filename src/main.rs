use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediasync::pairing::{PairingMachine, PairingMode, PairingState, PermissionStatus, Scanner};
use mediasync::state::AppState;
use mediasync::transfer::{DirectorySink, DownloadOutcome};
use mediasync::types::{Credential, FileRef, Route};
use mediasync::{config, db};

#[derive(Parser)]
#[command(name = "mediasync")]
#[command(about = "Pair with a media host and download its files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pair using the text of a scanned pairing code
    Pair {
        #[arg(help = "Payload such as http://host:port?token=...")]
        payload: String,
    },
    /// Pair by entering url and token
    PairManual {
        #[arg(long)]
        url: String,
        #[arg(long)]
        token: String,
    },
    /// Show the current session and transfer counters
    Status,
    /// Forget the current session
    Logout,
    /// Show previous pairings, newest first
    History {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// List files of one kind (audio, image, video)
    List { kind: String },
    /// Download one file. Ctrl-C cancels.
    Get {
        kind: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        path: String,
        #[arg(long, help = "Target directory (defaults to downloads.dir)")]
        out: Option<String>,
    },
    /// Show host settings, or update them with a JSON object
    Settings {
        #[arg(long)]
        set: Option<String>,
    },
}

/// Scanner that "reads" a payload already captured elsewhere (clipboard,
/// external QR reader, command line).
struct PayloadScanner {
    payload: String,
}

#[async_trait]
impl Scanner for PayloadScanner {
    async fn check_permissions(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request_permissions(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn scan(&self) -> Option<String> {
        Some(self.payload.clone())
    }

    async fn cancel(&self) {}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_cfg = config::load()?;

    // Logging (stderr + tägliche Datei-Rotation unter logging.dir)
    std::fs::create_dir_all(&app_cfg.logging.dir).ok();
    let (stderr_nb, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let file_appender = tracing_appender::rolling::daily(&app_cfg.logging.dir, "mediasync.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sqlx=warn".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stderr_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Guards am Leben halten, damit Non-Blocking Writer korrekt flushen
    let _log_guards = (stderr_guard, file_guard);

    config::ensure_sqlite_parent_dir(&app_cfg.database.url)?;
    let pool = db::connect(&app_cfg.database.url).await?;
    let state = AppState::new(pool, app_cfg)?;

    if let Err(e) = state.session.initialize().await {
        eprintln!("failed to load the saved session: {}", e);
    }

    let result = run(&state, cli.command).await;
    state.shutdown().await;
    result
}

async fn run(state: &AppState, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Pair { payload } => {
            let machine = PairingMachine::new(Arc::new(PayloadScanner { payload }), state.session.clone());
            report_pairing(machine.start_scan().await?)?;
        }
        Commands::PairManual { url, token } => {
            let machine = PairingMachine::new(Arc::new(PayloadScanner { payload: String::new() }), state.session.clone());
            if machine.mode() != PairingMode::Manual {
                machine.toggle_mode()?;
            }
            report_pairing(machine.submit_manual(&url, &token).await?)?;
        }
        Commands::Status => {
            match state.session.credential() {
                Some(c) => println!("paired with {}", c.url),
                None => println!("not paired"),
            }
            println!("{}", serde_json::to_string_pretty(&state.metrics.get_snapshot())?);
        }
        Commands::Logout => {
            state.session.clear_session().await?;
            println!("session cleared");
        }
        Commands::History { limit } => {
            for record in state.session.store().history(limit).await? {
                println!("{}  {}", record.created_at, record.credential.url);
            }
        }
        Commands::List { kind } => {
            let credential = require_session(state)?;
            let folders = state.catalog.list_files(&kind, &credential).await.map_err(anyhow::Error::msg)?;
            for folder in folders {
                println!("{} ({})", folder.display_name(), folder.key);
                for entry in folder.entries {
                    let extra = entry
                        .metadata
                        .audio_meta_data
                        .as_ref()
                        .map(|a| format!("  {}", a.duration_label()))
                        .unwrap_or_default();
                    println!("  {}  {}{}", entry.file_name(), entry.size_label(), extra);
                }
            }
        }
        Commands::Get { kind, name, path, out } => {
            let credential = require_session(state)?;
            let sink = DirectorySink::new(out.unwrap_or_else(|| state.config.downloads.dir.clone()));

            // Ctrl-C is the cancel button of the blocking overlay
            let coordinator = state.coordinator.clone();
            let cancel_hook = tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if !coordinator.cancel() {
                        // Nothing cancellable right now (e.g. while saving)
                        eprintln!("interrupted");
                        std::process::exit(130);
                    }
                }
            });

            let outcome = state
                .downloader()
                .download(&kind, &FileRef { name, path }, &credential, &sink)
                .await;
            cancel_hook.abort();

            match outcome? {
                DownloadOutcome::Saved { location, size, .. } => println!("{} ({} bytes)", location, size),
                DownloadOutcome::Cancelled => info!("download cancelled"),
            }
        }
        Commands::Settings { set } => {
            let credential = require_session(state)?;
            match set {
                Some(raw) => {
                    let update: serde_json::Value = serde_json::from_str(&raw)?;
                    if let Some(updated) = state.catalog.update_settings(&credential, &update, true).await? {
                        println!("{}", serde_json::to_string_pretty(&updated)?);
                    }
                }
                None => {
                    let settings = state.catalog.get_settings(&credential).await?;
                    println!("{}", serde_json::to_string_pretty(&settings)?);
                }
            }
        }
    }

    Ok(())
}

fn require_session(state: &AppState) -> anyhow::Result<Credential> {
    match state.session.route() {
        Route::Home => state.session.credential().ok_or_else(|| anyhow::anyhow!("not paired")),
        Route::Pair => Err(anyhow::anyhow!("not paired, run `mediasync pair` first")),
        Route::Pending => Err(anyhow::anyhow!("session is still loading")),
    }
}

fn report_pairing(state: PairingState) -> anyhow::Result<()> {
    match state {
        PairingState::Succeeded(c) => {
            println!("paired with {}", c.url);
            Ok(())
        }
        PairingState::Failed(reason) => Err(anyhow::anyhow!("pairing failed: {:?}", reason)),
        other => Err(anyhow::anyhow!("pairing did not complete ({})", other)),
    }
}
