mod admin;
mod serve;

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use mnemo_cache::{CacheManager, SystemClock, TokioFileIo};
use mnemo_config::{AppConfig, TelemetryConfig};
use mnemo_tools::{ToolRegistry, register_cache_tools};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(
    name = "mnemo",
    version,
    about = "Persistent, topic-scoped context caches for coding agents"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve tool calls as JSON lines on stdin/stdout (default).
    Serve,
    /// Create or re-create a cache.
    Init {
        topic: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        session_only: bool,
        /// Consent to creating the directory and to its growth.
        #[arg(long)]
        yes: bool,
    },
    /// Print a cache, or the topics available to load.
    Load {
        topic: Option<String>,
        #[arg(long)]
        legacy: bool,
    },
    Status {
        topic: Option<String>,
    },
    /// List active topics, most recently used first.
    Topics {
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    Archive {
        topic: String,
        #[arg(long)]
        yes: bool,
    },
    /// Preview (or with --yes, apply) manifest cleanup.  Never deletes files.
    Cleanup {
        #[arg(long)]
        after_days: Option<u64>,
        #[arg(long)]
        max_sessions: Option<usize>,
        #[arg(long)]
        yes: bool,
    },
    /// Show the tool surface exposed by `serve`.
    Tools {
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration.
    Config {
        /// Write it back to the config path.
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;
    let _log_guard = init_tracing(&config.telemetry)?;

    let manager = Arc::new(CacheManager::new(
        &config.cache,
        Arc::new(TokioFileIo),
        Arc::new(SystemClock),
    ));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run_serve(manager).await?,
        Commands::Init {
            topic,
            project,
            session_only,
            yes,
        } => admin::run_init(&manager, topic, project, session_only, yes).await?,
        Commands::Load { topic, legacy } => admin::run_load(&manager, topic, legacy).await?,
        Commands::Status { topic } => admin::run_status(&manager, topic).await?,
        Commands::Topics { cache_dir } => admin::run_topics(&manager, cache_dir).await?,
        Commands::Archive { topic, yes } => admin::run_archive(&manager, topic, yes).await?,
        Commands::Cleanup {
            after_days,
            max_sessions,
            yes,
        } => admin::run_cleanup(&manager, after_days, max_sessions, yes).await?,
        Commands::Tools { json } => {
            let mut registry = ToolRegistry::default();
            register_cache_tools(&mut registry, manager);
            admin::run_tools(&registry.list_specs(), json)?;
        }
        Commands::Config { write } => {
            print!("{}", config.to_toml()?);
            if write {
                config.save_to(&cli.config)?;
                println!("# written to {}", cli.config.display());
            }
        }
    }

    Ok(())
}

/// Install the fmt subscriber.  The filter comes from `MNEMO_LOG`, then
/// `RUST_LOG`, then `telemetry.log_level`.  Logs go to stderr unless a log
/// file is configured; the returned guard must live until exit.
fn init_tracing(telemetry: &TelemetryConfig) -> Result<Option<WorkerGuard>> {
    let directive = env::var("MNEMO_LOG")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| telemetry.log_level.clone());
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{directive}'"))?;

    let Some(log_file) = telemetry.log_file.as_deref() else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        return Ok(None);
    };

    let path = Path::new(log_file);
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("telemetry.log_file '{log_file}' has no file name"))?;
    fs::create_dir_all(dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}
