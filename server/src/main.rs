use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use coderun_core::Engine;
use coderun_core::EngineConfig;
use coderun_protocol::Language;
use coderun_server::DEFAULT_BIND_ADDR;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Runs Python, Java, C and C++ snippets on a pseudo-terminal and streams
/// their output to WebSocket clients.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Engine configuration file. Defaults to `coderun.toml` in the working
    /// directory when present.
    #[arg(long, short = 'c', value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve execution sessions over WebSocket (default).
    Serve {
        #[arg(long, default_value = DEFAULT_BIND_ADDR)]
        bind_addr: SocketAddr,
    },
    /// Run one source file locally, wired to this terminal.
    Run {
        file: PathBuf,
        /// Overrides detection from the file extension.
        #[arg(long, short = 'l')]
        language: Option<Language>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    setup_tracing(&cli.log_level);

    let config = EngineConfig::load_or_default(cli.config.as_deref())?;
    let engine = Engine::new(&config);

    match cli.command {
        Some(Command::Run { file, language }) => {
            coderun_server::local::run_file(&engine, &file, language).await
        }
        Some(Command::Serve { bind_addr }) => serve(engine, bind_addr).await,
        None => {
            let bind_addr = DEFAULT_BIND_ADDR
                .parse()
                .context("invalid default bind address")?;
            serve(engine, bind_addr).await
        }
    }
}

async fn serve(engine: Engine, bind_addr: SocketAddr) -> anyhow::Result<ExitCode> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    coderun_server::serve(
        listener,
        Arc::new(engine),
        coderun_server::shutdown_signal(),
    )
    .await?;
    info!("server shut down");
    Ok(ExitCode::SUCCESS)
}

fn setup_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
