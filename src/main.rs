//! ChatRelay - chat server and terminal client
//!
#![doc = "Main entry point for the ChatRelay binary."]

use anyhow::Result;
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatrelay::cli::{Cli, Commands};
use chatrelay::client::{repl, ChatClient};
use chatrelay::config::Config;
use chatrelay::{metrics, server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    init_tracing(config.logging.json, cli.verbose);
    install_panic_hook();

    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("Starting chat server");
            metrics::init_metrics_exporter();
            server::serve(&config).await
        }
        Commands::Chat {
            no_stream, system, ..
        } => {
            tracing::info!(server = %config.client.server_url, "Starting terminal chat");
            if system.is_some() {
                tracing::debug!("Using system prompt override");
            }
            repl::run_chat(config, no_stream, system).await
        }
        Commands::Health { .. } => {
            let client = ChatClient::new(&config.client)?;
            match client.health_check().await {
                Ok(reply) => {
                    println!(
                        "{} {} ({})",
                        "healthy".green().bold(),
                        client.base_url(),
                        reply.timestamp.as_deref().unwrap_or("no timestamp")
                    );
                    Ok(())
                }
                Err(e) => {
                    eprintln!("{} {}: {:#}", "unhealthy".red().bold(), client.base_url(), e);
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(json: bool, verbose: bool) {
    let default_level = if verbose {
        "chatrelay=debug"
    } else {
        "chatrelay=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Route panics through tracing so they reach the same sink as other logs
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(panic = %info, "Unhandled panic");
        default_hook(info);
    }));
}
