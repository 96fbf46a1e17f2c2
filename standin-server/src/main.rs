//! Standin server - answers registered HTTP routes with generated JSON.
//!
//! With the broker generator, intercepted requests park until a fulfiller
//! answers them through the HTTP API or the MCP tools on stdio.

mod app;
mod intercept;
mod mcp;
mod protocol;
mod routes;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use standin::broker::Broker;
use standin::generator::{GeneratorKind, build_generator};
use standin::io::config::{StandinConfig, load_config, write_config};
use standin::logging;
use standin::routes::RouteTable;
use tokio::io::BufReader;
use tracing::{info, warn};

use crate::mcp::McpServer;
use crate::state::AppState;

#[derive(Parser)]
#[command(
    name = "standin-server",
    version,
    about = "Schema-driven mock HTTP server with agent fulfilment"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write an example `standin.toml`.
    Init {
        /// Config file to create.
        #[arg(long, default_value = "standin.toml")]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Serve registered routes.
    Serve(ServeArgs),
}

#[derive(clap::Args)]
struct ServeArgs {
    /// Config file (defaults are used if missing).
    #[arg(long, default_value = "standin.toml")]
    config: PathBuf,

    /// Address to bind the server to (overrides config)
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Generator answering intercepted routes (overrides config)
    #[arg(long, value_enum, ignore_case = true)]
    generator: Option<GeneratorKind>,

    /// Also expose the broker as MCP tools on stdio
    #[arg(long)]
    mcp: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("standin=info,standin_server=info");

    let cli = Cli::parse();
    match cli.command {
        Command::Init { config, force } => cmd_init(&config, force),
        Command::Serve(args) => cmd_serve(args).await,
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &StandinConfig::example())?;
    info!(path = %path.display(), "wrote example config");
    Ok(())
}

async fn cmd_serve(args: ServeArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(kind) = args.generator {
        config.generator.kind = kind;
    }
    config.validate().context("invalid configuration")?;

    let broker = Arc::new(Broker::new());
    let generator = build_generator(&config, &broker)?;
    let routes = RouteTable::from_config(&config.routes);
    if routes.is_empty() {
        warn!("no routes configured; every request will 404");
    }
    info!(
        generator = generator.name(),
        routes = routes.len(),
        "starting standin-server"
    );

    let timeout = (config.request_timeout_secs > 0)
        .then(|| Duration::from_secs(config.request_timeout_secs));
    let state = AppState::new(Arc::clone(&broker), config.generator.kind, generator, routes)
        .with_request_timeout(timeout);
    let shutdown = state.shutdown.clone();

    if args.mcp {
        if !state.broker_selected() {
            warn!("--mcp has no effect unless the broker generator is selected");
        }
        let server = McpServer::new(Arc::clone(&broker));
        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = server.run(stdin, tokio::io::stdout()).await {
                warn!(error = %e, "mcp server failed");
            }
        });
    }

    let app = app::build_app(state, &config.admin_prefix);

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    info!(addr = %addr, admin = %config.admin_prefix, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutting down; releasing parked requests");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve_defaults() {
        let cli = Cli::parse_from(["standin-server", "serve"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.config, PathBuf::from("standin.toml"));
        assert!(!args.mcp);
        assert!(args.generator.is_none());
    }

    #[test]
    fn parse_serve_overrides() {
        let cli = Cli::parse_from([
            "standin-server",
            "serve",
            "--port",
            "9000",
            "--generator",
            "Static",
            "--mcp",
        ]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.generator, Some(GeneratorKind::Static));
        assert!(args.mcp);
    }

    #[test]
    fn parse_rejects_unknown_generator() {
        let parsed = Cli::try_parse_from(["standin-server", "serve", "--generator", "gpt"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["standin-server", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true, .. }));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("standin.toml");
        cmd_init(&path, false).expect("first init");
        assert!(cmd_init(&path, false).is_err());
        cmd_init(&path, true).expect("forced init");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.routes.len(), 1);
    }
}
