//! Command-line interface definition for ChatRelay
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for running the relay server, chatting against it
//! from a terminal, and probing its health endpoint.

use clap::{Parser, Subcommand};

/// ChatRelay - chat server relaying conversations to an LLM completion API
///
/// Runs the HTTP chat API with in-memory conversation memory, or connects
/// to a running server as an interactive terminal client.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatrelay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for ChatRelay
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the chat API server
    Serve {
        /// Address to bind (overrides config and CHATRELAY_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Start an interactive chat session against a running server
    Chat {
        /// Base URL of the chat API (e.g. http://localhost:3000/api/v1)
        #[arg(long, env = "CHATRELAY_SERVER_URL")]
        server: Option<String>,

        /// Wait for complete replies instead of streaming tokens
        #[arg(long)]
        no_stream: bool,

        /// System prompt sent with every request
        #[arg(long)]
        system: Option<String>,
    },

    /// Check that a running server is alive
    Health {
        /// Base URL of the chat API (e.g. http://localhost:3000/api/v1)
        #[arg(long, env = "CHATRELAY_SERVER_URL")]
        server: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
