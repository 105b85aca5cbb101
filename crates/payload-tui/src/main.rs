//! payloader: browse a payload catalog and inject payloads into a console's
//! HTTP payload receiver.
//!
//! ```bash
//! payloader                      # interactive terminal UI
//! payloader list ftp             # filtered catalog with badges
//! payloader send goldhen.bin     # inject once, non-zero exit on failure
//! payloader fav ftp.bin          # toggle a favorite
//! ```

mod action;
mod app;
mod app_state;
mod component;
mod components;
mod theme;
mod widgets;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use payload_proto::catalog::{load_catalog_from_toml, Catalog};
use payload_proto::config::Config;
use payload_proto::dispatch::{source_for_location, HttpReceiver};
use payload_proto::view::{project, PayloadView};
use payload_proto::{
    Controller, DispatchEngine, DispatchOutcome, FileBackend, Notifier, StateStore,
};

use crate::components::payload_list::format_size;

#[derive(Parser)]
#[command(name = "payloader")]
#[command(about = "Inject payloads into a console's HTTP payload receiver")]
#[command(version)]
struct Cli {
    /// Receiver URL the payload is POSTed to
    #[arg(long, global = true)]
    receiver: Option<String>,

    /// Payload directory or base URL
    #[arg(long, global = true)]
    source: Option<String>,

    /// Directory holding favorites and recents
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the catalog, optionally filtered
    List {
        /// Case-insensitive match on name or description
        query: Option<String>,
        /// Emit JSON instead of text rows
        #[arg(long)]
        json: bool,
    },
    /// Inject one payload and wait for the result
    Send {
        /// Payload file name, e.g. goldhen.bin
        name: String,
    },
    /// Toggle a payload's favorite flag
    Fav {
        /// Payload file name
        name: String,
    },
}

/// Everything the front ends need, wired once.
struct Core {
    controller: Arc<Controller>,
    notifier: Notifier,
    receiver_url: String,
    source: String,
    toast_duration: Duration,
}

#[derive(Serialize)]
struct ListRow<'a> {
    name: &'a str,
    description: &'a str,
    size_kb: f64,
    favorite: bool,
    recent: bool,
    image: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_path = init_logging()?;
    tracing::info!("payloader starting… (log: {})", log_path.display());

    // ── Load config ──────────────────────────────────────────────────────────
    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("config unreadable, using defaults: {:#}", e);
            Config::default()
        }
    };
    if let Some(url) = cli.receiver {
        config.receiver.url = url;
    }
    if let Some(source) = cli.source {
        config.payloads.source = source;
    }
    if let Some(dir) = cli.state_dir {
        config.state.dir = dir;
    }

    let core = build_core(&config).await?;

    match cli.command {
        None => {
            // Print log path to stderr so the operator can tail it immediately.
            eprintln!("payloader log: {}", log_path.display());
            let core_rx = core.notifier.subscribe();
            let app = app::App::new(
                core.controller,
                core.receiver_url,
                core.source,
                core.toast_duration,
            );
            app.run(core_rx).await
        }
        Some(Commands::List { query, json }) => cmd_list(&core, query.as_deref(), json).await,
        Some(Commands::Send { name }) => cmd_send(&core, &name).await,
        Some(Commands::Fav { name }) => cmd_fav(&core, &name).await,
    }
}

fn init_logging() -> anyhow::Result<PathBuf> {
    let mut data_dir = payload_proto::platform::data_dir();
    if std::fs::create_dir_all(&data_dir).is_err() {
        data_dir = payload_proto::platform::temp_dir();
    }
    let log_path = data_dir.join("payloader.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    // Allow RUST_LOG override; keep HTTP client internals quiet by default.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    Ok(log_path)
}

fn load_catalog(config: &Config) -> Catalog {
    let path = &config.payloads.catalog_toml;
    let catalog = if path.exists() {
        match load_catalog_from_toml(path) {
            Ok(c) => {
                tracing::info!("loaded {} payloads from {}", c.len(), path.display());
                c
            }
            Err(e) => {
                tracing::warn!("{}: {}; using built-in catalog", path.display(), e);
                Catalog::builtin()
            }
        }
    } else {
        Catalog::builtin()
    };
    catalog.with_images_dir(config.payloads.images_dir.clone())
}

async fn build_core(config: &Config) -> anyhow::Result<Core> {
    let catalog = Arc::new(load_catalog(config));

    let notifier = Notifier::default();
    let store = Arc::new(StateStore::open(Arc::new(FileBackend::new(&config.state.dir))).await);

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("building HTTP client")?;
    let source = source_for_location(&config.payloads.source, client.clone());
    let transport = Arc::new(HttpReceiver::new(client, config.receiver.url.clone()));

    let engine = Arc::new(DispatchEngine::new(
        source,
        transport,
        store.clone(),
        notifier.clone(),
    ));
    let controller = Arc::new(Controller::new(catalog, engine, store, notifier.clone()));

    tracing::info!(
        "receiver={} source={} state={}",
        config.receiver.url,
        config.payloads.source,
        config.state.dir.display()
    );

    Ok(Core {
        controller,
        notifier,
        receiver_url: config.receiver.url.clone(),
        source: config.payloads.source.clone(),
        toast_duration: Duration::from_secs(config.ui.toast_secs),
    })
}

// ── Headless commands ────────────────────────────────────────────────────────

async fn cmd_list(core: &Core, query: Option<&str>, json: bool) -> anyhow::Result<()> {
    let snapshot = core.controller.snapshot().await;
    let views = project(
        core.controller.catalog(),
        query.unwrap_or(""),
        &snapshot.state,
        snapshot.selected.as_deref(),
    );

    if json {
        println!("{}", render_json(&views)?);
        return Ok(());
    }
    for line in render_rows(&views) {
        println!("{}", line);
    }
    if views.is_empty() {
        eprintln!("no payloads match");
    }
    Ok(())
}

fn render_json(views: &[PayloadView<'_>]) -> anyhow::Result<String> {
    let rows: Vec<ListRow> = views
        .iter()
        .map(|v| ListRow {
            name: &v.payload.name,
            description: &v.payload.description,
            size_kb: v.payload.size_kb,
            favorite: v.is_favorite,
            recent: v.is_recent,
            image: v.image.clone(),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

fn render_rows(views: &[PayloadView<'_>]) -> Vec<String> {
    let width = views
        .iter()
        .map(|v| v.payload.name.len())
        .max()
        .unwrap_or(0);
    views
        .iter()
        .map(|v| {
            format!(
                "{} {:<width$}  {:>6} KB  {:<6}  {}",
                if v.is_favorite { "★" } else { " " },
                v.payload.name,
                format_size(v.payload.size_kb),
                if v.is_recent { "recent" } else { "" },
                v.payload.description,
                width = width
            )
        })
        .collect()
}

async fn cmd_send(core: &Core, name: &str) -> anyhow::Result<()> {
    if core.controller.catalog().get(name).is_none() {
        anyhow::bail!("{} is not in the catalog", name);
    }
    println!("Injecting {}...", name);
    let handle = core.controller.select_and_send(name).await;
    match handle.await.context("dispatch task panicked")? {
        DispatchOutcome::Sent { persisted, .. } => {
            println!("{} sent successfully!", name);
            if !persisted {
                eprintln!("warning: recents could not be saved");
            }
            Ok(())
        }
        DispatchOutcome::Failed { error, .. } => {
            eprintln!("{}", payload_proto::event::GENERIC_FAILURE);
            Err(anyhow::Error::new(error).context(format!("sending {}", name)))
        }
    }
}

async fn cmd_fav(core: &Core, name: &str) -> anyhow::Result<()> {
    if core.controller.catalog().get(name).is_none() {
        anyhow::bail!("{} is not in the catalog", name);
    }
    let written = core.controller.toggle_favorite(name).await;
    let verb = if written.value.is_favorite {
        "added to"
    } else {
        "removed from"
    };
    println!("{} {} favorites", name, verb);
    written
        .persisted
        .with_context(|| format!("saving favorites for {}", name))
}
