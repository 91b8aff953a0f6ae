mod chat;
mod init;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use cheatcode_core::bootstrap::{build_chain, build_indexer};
use cheatcode_core::config::{Config, resolve_config_path};
use cheatcode_core::vault::Credentials;
use cheatcode_core::{ConversationChain, CoreError};
use cheatcode_gateway::GatewayServer;
use cheatcode_index::IndexError;
use cheatcode_llm::any::AnyProvider;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio::sync::watch;

/// Ask questions about a codebase.
#[derive(Debug, Parser)]
#[command(name = "cheatcode", version, about)]
struct Cli {
    /// Config file (defaults to $CHEATCODE_CONFIG, then <DIRECTORY>/.cheatcode/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Index the source files of a project
    Init {
        #[arg(default_value = ".")]
        directory: PathBuf,
    },
    /// Ask questions interactively about an indexed project
    Chat {
        #[arg(default_value = ".")]
        directory: PathBuf,
        /// Print the files each answer was drawn from
        #[arg(long)]
        show_sources: bool,
    },
    /// Serve the chat page and JSON API over HTTP
    Serve {
        #[arg(default_value = ".")]
        directory: PathBuf,
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Command {
    fn directory(&self) -> &Path {
        match self {
            Self::Init { directory } | Self::Chat { directory, .. } | Self::Serve { directory, .. } => {
                directory
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let credentials = Credentials::from_env()?;

    let directory = cli.command.directory();
    if !directory.is_dir() {
        bail!("{} is not a directory", directory.display());
    }
    let config_path = resolve_config_path(cli.config.as_deref(), directory);
    let config = Config::load(&config_path)?;
    config.validate()?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    match &cli.command {
        Command::Init { directory } => {
            let indexer = build_indexer(&config, &credentials)?;
            println!("{}", init::run(&indexer, directory).await?);
        }
        Command::Chat {
            directory,
            show_sources,
        } => {
            let chain = open_chain(&config, &credentials, directory)?;
            let stdin = BufReader::new(tokio::io::stdin());
            chat::run(&chain, stdin, tokio::io::stdout(), *show_sources).await?;
        }
        Command::Serve {
            directory,
            bind,
            port,
        } => {
            let chain = Arc::new(open_chain(&config, &credentials, directory)?);
            let bind = bind.as_deref().unwrap_or(&config.gateway.bind);
            let port = port.unwrap_or(config.gateway.port);

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("failed to listen for ctrl-c: {e:#}");
                    return;
                }
                tracing::info!("received shutdown signal");
                let _ = shutdown_tx.send(true);
            });

            GatewayServer::new(bind, port, chain, shutdown_rx)
                .with_max_body_size(config.gateway.max_body_size)
                .with_session_ttl(Duration::from_secs(config.gateway.session_ttl_secs))
                .serve()
                .await?;
        }
    }

    Ok(())
}

fn open_chain(
    config: &Config,
    credentials: &Credentials,
    directory: &Path,
) -> anyhow::Result<ConversationChain<AnyProvider>> {
    match build_chain(config, credentials, directory) {
        Ok(chain) => Ok(chain),
        Err(CoreError::Index(IndexError::NotInitialized(_))) => bail!(
            "{} has not been indexed yet; run `cheatcode init {}` first",
            directory.display(),
            directory.display()
        ),
        Err(e) => Err(e).context("failed to load index"),
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
