use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use smartdev::config::Config;
use smartdev::config::LogLevel;
use smartdev::detect::DeviceAggregator;
use smartdev::objects::enums_of;
use smartdev::objects::load_objects;
use smartdev::objects::Objects;
use smartdev::pretty_print::PrettyPrint;
use smartdev::tree::TreeView;
use smartdev::ui_state::FileStorage;
use smartdev::ui_state::MemoryStorage;
use smartdev::ui_state::Storage;
use smartdev::ui_state::UiState;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Device tree and smart device detection over object store snapshots
#[derive(Debug, Parser)]
#[command(name = "smartdev", version)]
struct Cli {
    /// Config file; may be given several times
    #[arg(short, long = "config", global = true)]
    config: Vec<PathBuf>,

    /// Overrides the configured log level
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the folder tree of a snapshot
    Tree {
        /// JSON object map `{ id: object }`
        #[arg(long)]
        objects: PathBuf,

        /// Only rows visible with the persisted expand state
        #[arg(long)]
        visible: bool,

        #[arg(long)]
        json: bool,
    },

    /// Detect devices in a snapshot
    Devices {
        #[arg(long)]
        objects: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// List the active device patterns
    Patterns {
        #[arg(long)]
        json: bool,
    },

    /// Serve the read-only HTTP API until Ctrl+C
    #[cfg(feature = "api")]
    Serve {
        #[arg(long)]
        objects: PathBuf,
    },
}

fn init_tracing(config: &Config, level_override: Option<LogLevel>) {
    let level = level_override.unwrap_or(config.logging.level);
    let targets = Targets::new()
        .with_default(LevelFilter::from(level))
        .with_targets(
            config
                .logging
                .overrides
                .iter()
                .map(|(target, level)| (target.clone(), LevelFilter::from(*level))),
        );

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(targets)
        .init();
}

fn load_config(paths: &[PathBuf]) -> anyhow::Result<Config> {
    if paths.is_empty() {
        return Ok(Config::default());
    }

    let (config, warnings) = Config::from_files(paths)?;
    if !warnings.is_empty() {
        eprint!("{}", smartdev::format_diagnostics(&warnings));
    }
    Ok(config)
}

fn load_snapshot(path: &Path) -> anyhow::Result<Objects> {
    let objects = load_objects(path)?;
    tracing::info!(objects = objects.len(), "Loaded snapshot from {}", path.display());
    Ok(objects)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", json);
    Ok(())
}

fn print_tree<S: Storage>(
    config: &Config,
    objects: &Objects,
    ui: UiState<S>,
    visible: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut view = TreeView::with_state(config.tree.clone(), ui.tree_state());
    view.update(objects).context("Failed to build tree")?;

    let nodes: Vec<_> = if visible {
        view.rows().into_iter().cloned().collect()
    } else {
        view.nodes().to_vec()
    };

    if json {
        print_json(&nodes)
    } else {
        print!("{}", nodes.to_pretty_string());
        Ok(())
    }
}

#[cfg(feature = "api")]
async fn serve(config: &Config, objects: Objects) -> anyhow::Result<()> {
    use std::sync::Arc;

    use smartdev::api::AppState;

    let state = Arc::new(AppState::new(config, objects));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let listen = config.api.listen.clone();
    let port = config.api.port;
    let server = tokio::spawn(async move {
        smartdev::api::serve(&listen, port, state, shutdown_rx)
            .await
            .map_err(|e| e.to_string())
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Received shutdown signal");
    shutdown_tx.send(()).ok();

    server
        .await
        .context("API server task panicked")?
        .map_err(|e| anyhow::anyhow!("API server failed: {}", e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).context("Failed to load configuration")?;
    init_tracing(&config, cli.log_level);

    match cli.command {
        Command::Tree {
            objects,
            visible,
            json,
        } => {
            let objects = load_snapshot(&objects)?;
            match &config.ui.state_path {
                Some(path) => {
                    let ui = UiState::new(FileStorage::open(path));
                    print_tree(&config, &objects, ui, visible, json)
                }
                None => {
                    let ui = UiState::new(MemoryStorage::default());
                    print_tree(&config, &objects, ui, visible, json)
                }
            }
        }
        Command::Devices { objects, json } => {
            let objects = load_snapshot(&objects)?;
            let enums = enums_of(&objects);

            let mut aggregator = DeviceAggregator::new(config.matcher());
            let reports = aggregator.scan(&objects, &enums, &config.detect.namespaces, false);
            tracing::info!(devices = reports.len(), "Scan finished");

            if json {
                print_json(&reports)
            } else {
                print!("{}", reports.to_pretty_string());
                Ok(())
            }
        }
        Command::Patterns { json } => {
            let patterns = config.patterns();
            if json {
                return print_json(&patterns);
            }
            for (name, pattern) in &patterns {
                println!("{} (priority {})", name, pattern.priority);
                for state in &pattern.states {
                    let marker = if state.required { "*" } else { " " };
                    println!("  {}{} {}", marker, state.name, state.role);
                }
            }
            Ok(())
        }
        #[cfg(feature = "api")]
        Command::Serve { objects } => {
            let objects = load_snapshot(&objects)?;
            serve(&config, objects).await
        }
    }
}
