//! ChatRelay - chat server and terminal client library
//!
//! The server keeps short-lived conversation memory and relays chat turns
//! to an OpenAI-compatible completion API, streaming replies back as
//! server-sent events. The client drives the same API from a terminal.
//!
//! # Architecture
//!
//! - `server`: HTTP routes, request validation and the chat relay
//! - `conversation`: in-memory conversation store with expiry
//! - `providers`: upstream completion API abstraction
//! - `client`: terminal client state, streaming consumer and REPL
//! - `config`: configuration loading and validation
//! - `metrics`: request counters and gauges
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use chatrelay::cli::{Cli, Commands};
//! use chatrelay::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cli = Cli {
//!         config: None,
//!         verbose: false,
//!         json_logs: false,
//!         command: Commands::Serve { host: None, port: None },
//!     };
//!     let config = Config::load("config/config.yaml", &cli)?;
//!     config.validate()?;
//!     chatrelay::server::serve(&config).await
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod metrics;
pub mod providers;
pub mod server;

pub use config::Config;
pub use error::{ChatRelayError, Result};
