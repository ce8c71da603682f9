mod bot_commands;
mod broadcast_commands;
mod registry_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    herald_config::{HeraldConfig, RegistryBackend},
    herald_registry::{FileRegistry, RegistryStore, SqliteRegistry},
    secrecy::Secret,
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "herald", about = "Herald, a Telegram subscription and broadcast bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching the standard locations.
    #[arg(long, global = true, env = "HERALD_CONFIG")]
    config: Option<PathBuf>,

    /// Custom data directory for the default registry file.
    #[arg(long, global = true, env = "HERALD_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll Telegram and answer subscription commands.
    Serve,
    /// Deliver every message in the queue file, then empty it.
    Broadcast(broadcast_commands::BroadcastArgs),
    /// Queue one message for every subscriber matching a filter.
    Enqueue(broadcast_commands::EnqueueArgs),
    /// Write the registry table verbatim.
    Export {
        /// Destination file (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the registry rows.
    List {
        /// Print JSON instead of a tab-separated table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Log the id and title of every chat that messages the bot.
    ChatId,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so `export` and `list` output stays clean on stdout.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Open the configured registry backend.
pub(crate) async fn open_registry(
    config: &HeraldConfig,
    data_dir: Option<&PathBuf>,
) -> anyhow::Result<Arc<dyn RegistryStore>> {
    let data_dir = data_dir.cloned().unwrap_or_else(herald_config::data_dir);
    let path = config.registry.resolved_path(&data_dir);
    let mode = config.registry.uniqueness;
    debug!(path = %path.display(), backend = ?config.registry.backend, "opening registry");

    let store: Arc<dyn RegistryStore> = match config.registry.backend {
        RegistryBackend::File => Arc::new(FileRegistry::new(path, mode)),
        RegistryBackend::Sqlite => Arc::new(
            SqliteRegistry::open(&path, mode)
                .await
                .with_context(|| format!("failed to open registry {}", path.display()))?,
        ),
    };
    Ok(store)
}

pub(crate) fn require_token(config: &HeraldConfig) -> anyhow::Result<&Secret<String>> {
    config
        .telegram
        .token
        .as_ref()
        .context("telegram token missing: set TELEGRAM_BOT_TOKEN or [telegram] token")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "herald starting");

    let config = herald_config::load(cli.config.as_deref())?;
    let data_dir = cli.data_dir.as_ref();

    match cli.command {
        Commands::Serve => bot_commands::serve(&config, data_dir).await,
        Commands::ChatId => bot_commands::chat_id(&config).await,
        Commands::Broadcast(args) => broadcast_commands::broadcast(&config, data_dir, args).await,
        Commands::Enqueue(args) => broadcast_commands::enqueue(&config, data_dir, args).await,
        Commands::Export { output } => {
            registry_commands::export(&config, data_dir, output.as_deref()).await
        },
        Commands::List { json } => registry_commands::list(&config, data_dir, json).await,
    }
}
