//! `pyrepl` binary: serve the execution server, or talk to a running one.

mod client;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pyrepl_core::ServerConfig;
use pyrepl_core::config::DEFAULT_PORT;
use pyrepl_engine::EngineHandle;
use pyrepl_server::run_server;
use pyrepl_session::{Coordinator, TranscriptWriter};

use client::{ClientError, PyreplClient};

#[derive(Parser)]
#[command(name = "pyrepl")]
#[command(about = "HTTP execution server for a persistent Python REPL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the execution server (the default when no subcommand is given)
    Serve {
        /// Listening port; the PYREPL_PORT environment variable takes
        /// precedence over this flag
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Directory where .pyrepl transcript logs are stored
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Optional name for the transcript session file
        #[arg(long)]
        log_name: Option<String>,

        /// Extra module imported into the namespace at startup (repeatable)
        #[arg(long = "module", value_name = "MODULE")]
        modules: Vec<String>,
    },
    /// Send code to a running server and print the result
    Run {
        /// Source to execute; embedded newlines split it into lines
        code: String,

        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Clear the REPL scope of a running server
    Reset {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Check whether a server is running
    Health {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        None => serve_command(ServerConfig::new(ServerConfig::resolve_port(DEFAULT_PORT))).await,
        Some(Commands::Serve {
            port,
            log_dir,
            log_name,
            modules,
        }) => {
            let mut config = ServerConfig::new(ServerConfig::resolve_port(port));
            config.log_dir = log_dir;
            config.log_name = log_name;
            config.extra_modules = modules;
            serve_command(config).await
        }
        Some(Commands::Run { code, port }) => run_command(port, &code).await,
        Some(Commands::Reset { port }) => reset_command(port).await,
        Some(Commands::Health { port }) => health_command(port).await,
    }
}

async fn serve_command(config: ServerConfig) -> ExitCode {
    init_tracing();
    match serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    let engine = EngineHandle::spawn(config.modules()).await?;

    let transcript = config.log_dir.as_deref().map(|dir| {
        let writer = TranscriptWriter::new(dir, config.log_name.as_deref());
        tracing::info!("logging enabled, transcript at {}", writer.path().display());
        writer
    });

    let coordinator = Arc::new(Coordinator::new(engine, transcript));
    tracing::info!(session_id = %coordinator.id(), "session ready");

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", config.port))
        .await
        .with_context(|| {
            format!(
                "failed to bind port {} (is another pyrepl server running?)",
                config.port
            )
        })?;

    run_server(listener, coordinator).await
}

async fn run_command(port: u16, code: &str) -> ExitCode {
    let port = ServerConfig::resolve_port(port);
    let client = PyreplClient::new(port);
    if let Err(err) = client.health().await {
        eprintln!("pyrepl server is not running on port {port} ({err})");
        return ExitCode::FAILURE;
    }

    let lines: Vec<String> = code.lines().map(str::to_owned).collect();
    match client.execute(lines).await {
        Ok(reply) => {
            print!("{}", reply.output);
            if let Some(value) = &reply.value {
                println!("{value}");
            }
            if !reply.error.is_empty() {
                eprint!("{}", reply.error);
            }
            if reply.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => report_client_error(port, &err),
    }
}

async fn reset_command(port: u16) -> ExitCode {
    let port = ServerConfig::resolve_port(port);
    match PyreplClient::new(port).reset().await {
        Ok(_) => {
            println!("REPL scope cleared");
            ExitCode::SUCCESS
        }
        Err(err) => report_client_error(port, &err),
    }
}

async fn health_command(port: u16) -> ExitCode {
    let port = ServerConfig::resolve_port(port);
    match PyreplClient::new(port).health().await {
        Ok(reply) => {
            println!("server alive on port {port} (session {})", reply.session_id);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("pyrepl server is not running on port {port} ({err})");
            ExitCode::FAILURE
        }
    }
}

/// The three failure classes get three distinct messages; none is retried.
fn report_client_error(port: u16, err: &ClientError) -> ExitCode {
    match err {
        ClientError::Busy(message) => eprintln!("server busy: {message}"),
        ClientError::Server { status, body } => {
            eprintln!("server error ({status}): {body}");
        }
        ClientError::Unreachable(source) => {
            eprintln!("pyrepl server is not running on port {port} ({source})");
        }
    }
    ExitCode::FAILURE
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
