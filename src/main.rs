//! Herald - real-time message-delivery server.
//!
//! Main entry point for the herald CLI: the server (`serve`) and the
//! notification driver (`notify`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use herald_config::{Config, ConfigLoader};
use herald_notify::{DEFAULT_COUNT, NotifyBridge, NotifyClient, SqliteRegistry};
use herald_server::Server;

/// Herald CLI.
#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Real-time message-delivery server with a cross-process notify bridge")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "herald.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server in foreground (default)
    Serve {
        /// Host for both listeners
        #[arg(long)]
        host: Option<String>,

        /// Listener port for client connections
        #[arg(long)]
        port: Option<u16>,

        /// Notify bridge port
        #[arg(long)]
        notify_port: Option<u16>,
    },

    /// Send notifications to a connected channel
    Notify {
        /// Target channel (bare name or full path)
        channel: String,

        /// Message to deliver
        message: String,

        /// Number of notifications to send
        #[arg(long, default_value_t = DEFAULT_COUNT)]
        count: u32,

        /// Seconds between notifications
        #[arg(long, default_value_t = 3)]
        interval_secs: u64,
    },
}

/// Get the .herald directory path.
fn herald_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".herald"))
        .unwrap_or_else(|| PathBuf::from(".herald"))
}

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.herald/debug/ with daily rotation.
fn init_tracing() -> anyhow::Result<()> {
    let log_dir = herald_dir().join("debug");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("herald")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    // Keep the writer guard alive for the program duration.
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(&cli.config)?;

    match cli.command {
        None => serve(config, None, None, None).await,
        Some(Commands::Serve {
            host,
            port,
            notify_port,
        }) => serve(config, host, port, notify_port).await,
        Some(Commands::Notify {
            channel,
            message,
            count,
            interval_secs,
        }) => {
            notify(
                config,
                &channel,
                &message,
                count,
                Duration::from_secs(interval_secs),
            )
            .await
        }
    }
}

async fn open_registry(config: &Config) -> anyhow::Result<Arc<SqliteRegistry>> {
    let path = ConfigLoader::expand_path(&config.notify.registry_path);
    Ok(Arc::new(SqliteRegistry::open(&path).await?))
}

/// Run the server and notify bridge in foreground.
async fn serve(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
    notify_port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host.clone();
        config.notify.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(port) = notify_port {
        config.notify.port = port;
    }

    info!("Starting herald v{}", env!("CARGO_PKG_VERSION"));

    let coordination = open_registry(&config).await?;
    let server = Server::bind(&config.server).await?;
    info!(
        "Client listener on {}:{}, notify bridge on {}:{}",
        config.server.host, config.server.port, config.notify.host, config.notify.port
    );

    let bridge = Arc::new(NotifyBridge::new(
        server.registry(),
        coordination,
        config.notify.clone(),
    ));
    tokio::spawn(async move {
        if let Err(e) = bridge.serve().await {
            error!("Notify bridge failed: {e}");
        }
    });

    server.run().await?;
    Ok(())
}

/// Drive notifications against the published server.
async fn notify(
    config: Config,
    channel: &str,
    message: &str,
    count: u32,
    interval: Duration,
) -> anyhow::Result<()> {
    let coordination = open_registry(&config).await?;
    let client = NotifyClient::new(coordination, config.notify.registry_key.clone());

    info!(%channel, count, "sending notifications");
    client.run(channel, message, count, interval).await;
    info!("done sending");
    Ok(())
}
